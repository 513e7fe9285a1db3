use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::path::Path;

use super::{types::Config, ConfigError};

/// Format of deadlines written in local time.
const LOCAL_DEADLINE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Load configuration from file with environment variable overrides
///
/// Nested keys are separated by a double underscore, e.g.
/// `CURTAIN_CREDENTIALS__PASSWORD` overrides `credentials.password`.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    let config: Config = Figment::new()
        .merge(Toml::file(path))
        .merge(Env::prefixed("CURTAIN_").split("__"))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))?;

    Ok(config)
}

/// Load configuration from TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// Parse a deadline written either as RFC 3339 or as `YYYY-MM-DD HH:MM:SS` local time.
pub fn parse_deadline(value: &str) -> Result<DateTime<Utc>, ConfigError> {
    let trimmed = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(parsed.with_timezone(&Utc));
    }

    let naive = NaiveDateTime::parse_from_str(trimmed, LOCAL_DEADLINE_FORMAT).map_err(|e| {
        ConfigError::InvalidDeadline {
            value: value.to_string(),
            reason: format!("expected RFC 3339 or {}: {}", LOCAL_DEADLINE_FORMAT, e),
        }
    })?;

    // Ambiguous local times (DST fold) resolve to the earlier instant.
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
        .ok_or_else(|| ConfigError::InvalidDeadline {
            value: value.to_string(),
            reason: "time does not exist in the local timezone".to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures::SAMPLE_TOML;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config_from_str_valid() {
        let config = load_config_from_str(SAMPLE_TOML).unwrap();
        assert_eq!(config.contact.phone, "010-1234-5678");
        assert_eq!(config.payment.bank_code, "88");
    }

    #[test]
    fn test_load_config_from_str_missing_credentials() {
        let toml = r#"
[contact]
phone = "010-1234-5678"
"#;
        let result = load_config_from_str(toml);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/curtaincall.toml"));
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    fn test_load_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "{}", SAMPLE_TOML).unwrap();
        writeln!(temp_file, "[browser]\nheadless = false").unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.credentials.username, "alice");
        assert!(!config.browser.headless);
    }

    #[test]
    fn test_parse_deadline_rfc3339() {
        let deadline = parse_deadline("2030-01-01T12:00:00+09:00").unwrap();
        assert_eq!(deadline.to_rfc3339(), "2030-01-01T03:00:00+00:00");
    }

    #[test]
    fn test_parse_deadline_local() {
        let deadline = parse_deadline("2030-01-01 12:00:00").unwrap();
        let local = deadline.with_timezone(&Local);
        assert_eq!(local.format("%Y-%m-%d %H:%M:%S").to_string(), "2030-01-01 12:00:00");
    }

    #[test]
    fn test_parse_deadline_garbage() {
        let err = parse_deadline("tomorrow at noon").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidDeadline { .. }));
    }
}

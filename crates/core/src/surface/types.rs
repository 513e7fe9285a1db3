//! Value types exchanged with a surface.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Address of a control on a surface (a CSS-style selector string).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Selector(String);

impl Selector {
    pub fn new(selector: impl Into<String>) -> Self {
        Self(selector.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Selector {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<&String> for Selector {
    fn from(value: &String) -> Self {
        Self(value.clone())
    }
}

/// A control located by [`super::Surface::wait_for_control`].
///
/// Only valid on the surface that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Control {
    /// The selector it was found with.
    pub selector: Selector,
    /// Id of the surface that owns it.
    pub surface_id: String,
}

impl Control {
    pub fn new(selector: Selector, surface_id: impl Into<String>) -> Self {
        Self {
            selector,
            surface_id: surface_id.into(),
        }
    }
}

/// The fixed set of scripts the workflow evaluates on a surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScriptKind {
    DismissNotice,
    ClearField,
    ChallengeImage,
    ChallengePassed,
    EnumeratePartitions,
    SelectPartition,
    CountAvailableUnits,
    SelectFirstUnit,
    SelectOption,
}

impl ScriptKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScriptKind::DismissNotice => "dismiss-notice",
            ScriptKind::ClearField => "clear-field",
            ScriptKind::ChallengeImage => "challenge-image",
            ScriptKind::ChallengePassed => "challenge-passed",
            ScriptKind::EnumeratePartitions => "enumerate-partitions",
            ScriptKind::SelectPartition => "select-partition",
            ScriptKind::CountAvailableUnits => "count-available-units",
            ScriptKind::SelectFirstUnit => "select-first-unit",
            ScriptKind::SelectOption => "select-option",
        }
    }
}

impl fmt::Display for ScriptKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A script to evaluate on a surface.
///
/// `source` is self-contained (arguments are already embedded); `args`
/// carries the same arguments in structured form so drivers and test
/// doubles can dispatch on `kind` without parsing the source.
#[derive(Debug, Clone, PartialEq)]
pub struct Script {
    pub kind: ScriptKind,
    pub source: String,
    pub args: serde_json::Value,
}

impl Script {
    /// Name used in logs and errors.
    pub fn name(&self) -> &'static str {
        self.kind.as_str()
    }

    /// String argument by key.
    pub fn arg_str(&self, key: &str) -> Option<&str> {
        self.args.get(key).and_then(|v| v.as_str())
    }
}

//! The commit sequence: from a held unit to a submitted order.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::{Config, ConfigError};
use crate::surface::{cancellable, script, Selector, Surface, SurfaceError};

use super::error::CommitError;
use super::types::CommitStep;

/// Drives the fixed, ordered commit steps on the allocation surface.
///
/// Each step waits for its control up to the step timeout. A step is never
/// retried on its own.
#[derive(Debug, Clone)]
pub struct CommitSequencer {
    confirm_selection: Selector,
    advance_to_payment: Selector,
    phone_fields: [Selector; 3],
    phone: [String; 3],
    payment_method: Selector,
    receipt_option: Selector,
    bank_select: Selector,
    bank_code: String,
    consent_all: Selector,
    final_submit: Selector,
    step_timeout: Duration,
}

impl CommitSequencer {
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        let phone = config.contact.phone_parts().ok_or_else(|| {
            ConfigError::ValidationError(
                "contact.phone must have exactly three numeric dash-separated parts".to_string(),
            )
        })?;
        let selectors = &config.selectors;

        Ok(Self {
            confirm_selection: Selector::from(&selectors.confirm_selection),
            advance_to_payment: Selector::from(&selectors.advance_to_payment),
            phone_fields: [
                Selector::from(&selectors.phone_fields[0]),
                Selector::from(&selectors.phone_fields[1]),
                Selector::from(&selectors.phone_fields[2]),
            ],
            phone,
            payment_method: Selector::from(&selectors.payment_method),
            receipt_option: Selector::from(&selectors.receipt_option),
            bank_select: Selector::from(&selectors.bank_select),
            bank_code: config.payment.bank_code.clone(),
            consent_all: Selector::from(&selectors.consent_all),
            final_submit: Selector::from(&selectors.final_submit),
            step_timeout: Duration::from_secs(config.timeouts.commit_step_secs),
        })
    }

    /// Runs every step in order, stopping at the first failure.
    pub async fn run(
        &self,
        surface: &dyn Surface,
        cancel: &CancellationToken,
    ) -> Result<(), CommitError> {
        for step in CommitStep::ALL {
            debug!(step = %step, "Commit step");
            self.step(surface, step, cancel)
                .await
                .map_err(|e| CommitError::from_surface(step, e))?;
        }
        info!("Commit sequence submitted");
        Ok(())
    }

    async fn step(
        &self,
        surface: &dyn Surface,
        step: CommitStep,
        cancel: &CancellationToken,
    ) -> Result<(), SurfaceError> {
        match step {
            CommitStep::ConfirmSelection => {
                self.click(surface, &self.confirm_selection, cancel).await
            }
            CommitStep::AdvanceToPayment => {
                self.click(surface, &self.advance_to_payment, cancel).await
            }
            CommitStep::Contact => {
                for (field, part) in self.phone_fields.iter().zip(self.phone.iter()) {
                    let control =
                        cancellable(cancel, surface.wait_for_control(field, self.step_timeout))
                            .await?;
                    let clear = script::clear_field(field.as_str());
                    cancellable(cancel, surface.evaluate(&clear)).await?;
                    cancellable(cancel, surface.type_text(&control, part)).await?;
                }
                Ok(())
            }
            CommitStep::PaymentMethod => self.click(surface, &self.payment_method, cancel).await,
            CommitStep::ReceiptOption => self.click(surface, &self.receipt_option, cancel).await,
            CommitStep::Bank => {
                cancellable(
                    cancel,
                    surface.wait_for_control(&self.bank_select, self.step_timeout),
                )
                .await?;
                let select = script::select_option(self.bank_select.as_str(), &self.bank_code);
                let chosen = cancellable(cancel, surface.evaluate(&select)).await?;
                if chosen.as_bool() == Some(true) {
                    Ok(())
                } else {
                    Err(SurfaceError::NotFound(format!(
                        "option '{}' in {}",
                        self.bank_code, self.bank_select
                    )))
                }
            }
            CommitStep::Consent => self.click(surface, &self.consent_all, cancel).await,
            CommitStep::FinalSubmit => self.click(surface, &self.final_submit, cancel).await,
        }
    }

    async fn click(
        &self,
        surface: &dyn Surface,
        selector: &Selector,
        cancel: &CancellationToken,
    ) -> Result<(), SurfaceError> {
        let control =
            cancellable(cancel, surface.wait_for_control(selector, self.step_timeout)).await?;
        cancellable(cancel, surface.click(&control)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fixtures, MockSurface};
    use std::sync::Arc;

    fn commit_surface() -> Arc<MockSurface> {
        let surface = Arc::new(MockSurface::new("frame"));
        fixtures::wire_commit(&surface, "88");
        surface
    }

    #[tokio::test(start_paused = true)]
    async fn test_runs_every_step_in_order() {
        let sequencer = CommitSequencer::new(&fixtures::config()).unwrap();
        let surface = commit_surface();

        sequencer
            .run(surface.as_ref(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            surface.clicks(),
            vec![
                "#confirm-selection",
                "#next-payment",
                "#pay-transfer",
                "#receipt-none",
                "#agree-all",
                "#final-submit"
            ]
        );
        assert_eq!(
            surface.typed(),
            vec![
                ("#tel1".to_string(), "010".to_string()),
                ("#tel2".to_string(), "1234".to_string()),
                ("#tel3".to_string(), "5678".to_string()),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_control_names_the_step() {
        let sequencer = CommitSequencer::new(&fixtures::config()).unwrap();
        let surface = commit_surface();
        surface.remove_control("#receipt-none");

        let err = sequencer
            .run(surface.as_ref(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            CommitError::StepMissing {
                step: CommitStep::ReceiptOption,
                ..
            }
        ));
        assert!(!surface.clicks().contains(&"#final-submit".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_bank_option() {
        let sequencer = CommitSequencer::new(&fixtures::config()).unwrap();
        let surface = Arc::new(MockSurface::new("frame"));
        fixtures::wire_commit(&surface, "04");

        let err = sequencer
            .run(surface.as_ref(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            CommitError::StepMissing {
                step: CommitStep::Bank,
                ..
            }
        ));
    }

    #[test]
    fn test_rejects_malformed_phone() {
        let mut config = fixtures::config();
        config.contact.phone = "01012345678".to_string();
        assert!(CommitSequencer::new(&config).is_err());
    }
}

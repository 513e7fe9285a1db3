//! Types for acquisition attempts.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use uuid::Uuid;

use crate::search::SearchReport;

/// Stage of an acquisition attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AttemptState {
    Init,
    AwaitingChildSurface,
    SolvingChallenge,
    SearchingAllocation,
    Committing,
    Succeeded,
    Failed,
    Aborted,
}

impl AttemptState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptState::Init => "init",
            AttemptState::AwaitingChildSurface => "awaiting-child-surface",
            AttemptState::SolvingChallenge => "solving-challenge",
            AttemptState::SearchingAllocation => "searching-allocation",
            AttemptState::Committing => "committing",
            AttemptState::Succeeded => "succeeded",
            AttemptState::Failed => "failed",
            AttemptState::Aborted => "aborted",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AttemptState::Succeeded | AttemptState::Failed | AttemptState::Aborted
        )
    }
}

impl fmt::Display for AttemptState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One step of the commit sequence, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CommitStep {
    ConfirmSelection,
    AdvanceToPayment,
    Contact,
    PaymentMethod,
    ReceiptOption,
    Bank,
    Consent,
    FinalSubmit,
}

impl CommitStep {
    pub const ALL: [CommitStep; 8] = [
        CommitStep::ConfirmSelection,
        CommitStep::AdvanceToPayment,
        CommitStep::Contact,
        CommitStep::PaymentMethod,
        CommitStep::ReceiptOption,
        CommitStep::Bank,
        CommitStep::Consent,
        CommitStep::FinalSubmit,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CommitStep::ConfirmSelection => "confirm-selection",
            CommitStep::AdvanceToPayment => "advance-to-payment",
            CommitStep::Contact => "contact",
            CommitStep::PaymentMethod => "payment-method",
            CommitStep::ReceiptOption => "receipt-option",
            CommitStep::Bank => "bank",
            CommitStep::Consent => "consent",
            CommitStep::FinalSubmit => "final-submit",
        }
    }
}

impl fmt::Display for CommitStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Broad reason an attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureClass {
    /// Timing, connectivity or a slow/unavailable target.
    Environment,
    /// Nothing left to acquire.
    SoldOut,
    /// The target no longer matches the configured selectors or scripts.
    ContractMismatch,
}

impl FailureClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureClass::Environment => "environment",
            FailureClass::SoldOut => "sold-out",
            FailureClass::ContractMismatch => "contract-mismatch",
        }
    }
}

impl fmt::Display for FailureClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Machine-readable reason for a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureTag {
    NoChildSurface,
    ChallengeExhausted,
    SoldOut,
    NoPartitions,
    CommitStepMissing(CommitStep),
    /// Any other failure, tagged with the stage it happened in.
    Stage(AttemptState),
}

impl FailureTag {
    /// The tag as reported, e.g. `sold-out` or `commit-step-missing:bank`.
    pub fn as_tag(&self) -> String {
        match self {
            FailureTag::NoChildSurface => "no-child-surface".to_string(),
            FailureTag::ChallengeExhausted => "challenge-exhausted".to_string(),
            FailureTag::SoldOut => "sold-out".to_string(),
            FailureTag::NoPartitions => "no-partitions".to_string(),
            FailureTag::CommitStepMissing(step) => format!("commit-step-missing:{}", step),
            FailureTag::Stage(state) => state.as_str().to_string(),
        }
    }

    /// The class this tag falls into when nothing more specific is known.
    pub fn default_class(&self) -> FailureClass {
        match self {
            FailureTag::SoldOut | FailureTag::NoPartitions => FailureClass::SoldOut,
            FailureTag::CommitStepMissing(_) => FailureClass::ContractMismatch,
            FailureTag::NoChildSurface | FailureTag::ChallengeExhausted | FailureTag::Stage(_) => {
                FailureClass::Environment
            }
        }
    }
}

impl fmt::Display for FailureTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_tag())
    }
}

impl Serialize for FailureTag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.as_tag())
    }
}

/// Terminal result of an attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AttemptOutcome {
    Succeeded {
        /// Confirmation screenshot, when one could be taken.
        confirmation: Option<PathBuf>,
    },
    Failed {
        tag: FailureTag,
        class: FailureClass,
        cause: String,
    },
    Aborted {
        reason: String,
    },
}

impl AttemptOutcome {
    pub fn failed(tag: FailureTag, cause: impl Into<String>) -> Self {
        Self::Failed {
            tag,
            class: tag.default_class(),
            cause: cause.into(),
        }
    }

    pub fn cancelled() -> Self {
        Self::Aborted {
            reason: "cancelled".to_string(),
        }
    }

    /// Rendered as `succeeded`, `failed:<tag>` or `aborted:<reason>`.
    pub fn label(&self) -> String {
        match self {
            AttemptOutcome::Succeeded { .. } => "succeeded".to_string(),
            AttemptOutcome::Failed { tag, .. } => format!("failed:{}", tag),
            AttemptOutcome::Aborted { reason } => format!("aborted:{}", reason),
        }
    }

    /// The terminal state this outcome corresponds to.
    pub fn state(&self) -> AttemptState {
        match self {
            AttemptOutcome::Succeeded { .. } => AttemptState::Succeeded,
            AttemptOutcome::Failed { .. } => AttemptState::Failed,
            AttemptOutcome::Aborted { .. } => AttemptState::Aborted,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, AttemptOutcome::Succeeded { .. })
    }

    pub fn failure_tag(&self) -> Option<FailureTag> {
        match self {
            AttemptOutcome::Failed { tag, .. } => Some(*tag),
            _ => None,
        }
    }
}

impl fmt::Display for AttemptOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// A recorded state change.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transition {
    pub from: AttemptState,
    pub to: AttemptState,
    pub at: DateTime<Utc>,
}

/// Invoked on every state change with the attempt id and the new state.
pub type StateCallback = Arc<dyn Fn(&str, AttemptState) + Send + Sync>;

/// One run of the acquisition state machine.
#[derive(Debug, Clone, Serialize)]
pub struct AcquisitionAttempt {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    state: AttemptState,
    challenge_attempts: u32,
    challenge_reloads: u32,
    partitions_probed: u32,
    transitions: Vec<Transition>,
    outcome: Option<AttemptOutcome>,
}

impl AcquisitionAttempt {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at,
            state: AttemptState::Init,
            challenge_attempts: 0,
            challenge_reloads: 0,
            partitions_probed: 0,
            transitions: Vec::new(),
            outcome: None,
        }
    }

    pub fn state(&self) -> AttemptState {
        self.state
    }

    pub fn challenge_attempts(&self) -> u32 {
        self.challenge_attempts
    }

    pub fn challenge_reloads(&self) -> u32 {
        self.challenge_reloads
    }

    pub fn partitions_probed(&self) -> u32 {
        self.partitions_probed
    }

    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    pub fn outcome(&self) -> Option<&AttemptOutcome> {
        self.outcome.as_ref()
    }

    /// States visited so far, starting with `Init`.
    pub fn path(&self) -> Vec<AttemptState> {
        std::iter::once(AttemptState::Init)
            .chain(self.transitions.iter().map(|t| t.to))
            .collect()
    }

    pub(crate) fn record_challenge_attempt(&mut self) {
        self.challenge_attempts += 1;
    }

    pub(crate) fn record_challenge_reload(&mut self) {
        self.challenge_reloads += 1;
    }

    pub(crate) fn record_partitions_probed(&mut self, count: u32) {
        self.partitions_probed += count;
    }

    /// Moves to `to`. Returns false (and changes nothing) once the attempt is terminal.
    pub(crate) fn advance(&mut self, to: AttemptState, at: DateTime<Utc>) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        self.transitions.push(Transition {
            from: self.state,
            to,
            at,
        });
        self.state = to;
        true
    }

    /// Records the outcome and moves to the matching terminal state.
    pub(crate) fn finish(&mut self, outcome: AttemptOutcome, at: DateTime<Utc>) -> bool {
        if !self.advance(outcome.state(), at) {
            return false;
        }
        self.outcome = Some(outcome);
        true
    }
}

/// Everything known about a finished attempt.
#[derive(Debug, Clone, Serialize)]
pub struct AcquisitionReport {
    pub attempt: AcquisitionAttempt,
    pub outcome: AttemptOutcome,
    /// Present once the allocation search ran.
    pub search: Option<SearchReport>,
}

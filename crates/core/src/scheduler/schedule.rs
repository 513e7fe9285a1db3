//! The pair of deadlines and their fire-at-most-once slots.

use chrono::{DateTime, Utc};

use super::error::ScheduleError;
use super::types::{Deadline, Phase, SlotState};

#[derive(Debug, Clone)]
struct Slot {
    deadline: Deadline,
    state: SlotState,
}

/// Session and acquisition deadlines, in that order.
#[derive(Debug, Clone)]
pub struct Schedule {
    slots: [Slot; 2],
}

impl Schedule {
    /// Arms both deadlines.
    ///
    /// Fails if either instant is before `now` or the session deadline is not
    /// strictly earlier than the acquisition deadline.
    pub fn new(
        session_open: DateTime<Utc>,
        acquisition_open: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Self, ScheduleError> {
        if session_open >= acquisition_open {
            return Err(ScheduleError::OutOfOrder {
                session_open,
                acquisition_open,
            });
        }
        for (phase, at) in [
            (Phase::SessionOpen, session_open),
            (Phase::AcquisitionOpen, acquisition_open),
        ] {
            if at < now {
                return Err(ScheduleError::DeadlinePassed { phase, at, now });
            }
        }

        let slot = |phase, at| Slot {
            deadline: Deadline { phase, at },
            state: SlotState::Armed,
        };
        Ok(Self {
            slots: [
                slot(Phase::SessionOpen, session_open),
                slot(Phase::AcquisitionOpen, acquisition_open),
            ],
        })
    }

    fn slot(&self, phase: Phase) -> &Slot {
        match phase {
            Phase::SessionOpen => &self.slots[0],
            Phase::AcquisitionOpen => &self.slots[1],
        }
    }

    fn slot_mut(&mut self, phase: Phase) -> &mut Slot {
        match phase {
            Phase::SessionOpen => &mut self.slots[0],
            Phase::AcquisitionOpen => &mut self.slots[1],
        }
    }

    pub fn deadline(&self, phase: Phase) -> Deadline {
        self.slot(phase).deadline
    }

    pub fn state(&self, phase: Phase) -> SlotState {
        self.slot(phase).state
    }

    /// Marks an armed phase as already done so it never fires.
    pub fn satisfy(&mut self, phase: Phase) -> bool {
        let slot = self.slot_mut(phase);
        if slot.state != SlotState::Armed {
            return false;
        }
        slot.state = SlotState::Satisfied;
        true
    }

    /// Returns the earliest armed phase whose instant has come, marking it fired.
    ///
    /// A phase is returned at most once, whatever `now` does afterwards.
    pub fn poll(&mut self, now: DateTime<Utc>) -> Option<Deadline> {
        let slot = self
            .slots
            .iter_mut()
            .find(|slot| slot.state == SlotState::Armed && slot.deadline.at <= now)?;
        slot.state = SlotState::Fired;
        Some(slot.deadline)
    }

    /// The earliest deadline still armed.
    pub fn next_armed(&self) -> Option<Deadline> {
        self.slots
            .iter()
            .filter(|slot| slot.state == SlotState::Armed)
            .map(|slot| slot.deadline)
            .min_by_key(|deadline| deadline.at)
    }
}

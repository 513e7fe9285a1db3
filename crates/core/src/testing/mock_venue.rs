//! A scripted target site built from mock surfaces.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::json;

use crate::surface::{ScriptKind, Surface};

use super::fixtures::{self, selectors, ENTRY_LOCATION, EVENT_LOCATION};
use super::mock_surface::{MockPage, MockSurface};

/// Location of the reservation popup.
pub const POPUP_LOCATION: &str = "https://tickets.example/onestop/reserve?event=42";

#[derive(Debug, Clone)]
struct VenuePartition {
    id: String,
    x: f64,
    y: f64,
    units: u32,
    slow: bool,
}

#[derive(Debug, Default)]
struct VenueState {
    partitions: Vec<VenuePartition>,
    /// Partition whose unit view is open.
    selected: Option<String>,
    visits: Vec<String>,
    held: Option<String>,
    /// Selections made while another partition was still open.
    violations: u32,
    /// Bumped by every challenge reload; picks the image shown.
    generation: u32,
    challenge_passed: bool,
    submissions: Vec<String>,
}

/// Builder for [`MockVenue`].
#[derive(Debug, Clone)]
pub struct MockVenueBuilder {
    center_x: f64,
    partitions: Vec<VenuePartition>,
    answer: String,
    challenge: bool,
    popup: bool,
    login: bool,
    bank_option: String,
    missing: Vec<String>,
}

impl MockVenueBuilder {
    /// Horizontal centre of the partition space.
    pub fn center_x(mut self, center_x: f64) -> Self {
        self.center_x = center_x;
        self
    }

    /// Add a partition centred at `(x, y)` holding `units` available units.
    pub fn partition(mut self, id: &str, x: f64, y: f64, units: u32) -> Self {
        self.partitions.push(VenuePartition {
            id: id.to_string(),
            x,
            y,
            units,
            slow: false,
        });
        self
    }

    /// The unit view of partition `id` never finishes loading.
    pub fn slow_units(mut self, id: &str) -> Self {
        for partition in self.partitions.iter_mut().filter(|p| p.id == id) {
            partition.slow = true;
        }
        self
    }

    /// The text the challenge accepts (compared after normalization).
    pub fn answer(mut self, answer: &str) -> Self {
        self.answer = answer.to_string();
        self
    }

    /// Skip the challenge: the popup opens straight onto the allocation frame.
    pub fn without_challenge(mut self) -> Self {
        self.challenge = false;
        self
    }

    /// The reserve button never opens a popup.
    pub fn without_popup(mut self) -> Self {
        self.popup = false;
        self
    }

    /// Leave out the credential entry point wiring on the parent.
    pub fn without_login(mut self) -> Self {
        self.login = false;
        self
    }

    /// Remove a control from the allocation frame.
    pub fn without_control(mut self, selector: &str) -> Self {
        self.missing.push(selector.to_string());
        self
    }

    /// The bank option value the payment form offers.
    pub fn bank_option(mut self, value: &str) -> Self {
        self.bank_option = value.to_string();
        self
    }

    pub fn build(self) -> MockVenue {
        let state = Arc::new(Mutex::new(VenueState {
            partitions: self.partitions.clone(),
            ..VenueState::default()
        }));

        let parent = Arc::new(MockSurface::new("parent"));
        let popup = Arc::new(MockSurface::new("popup"));
        let frame = Arc::new(MockSurface::new("allocation"));

        wire_parent(&parent, &popup, &self);
        wire_popup(&popup, &frame, &state, &self);
        wire_frame(&frame, &state, &self);

        MockVenue {
            parent,
            popup,
            frame,
            state,
        }
    }
}

/// A complete mock target: event page, reservation popup and allocation frame.
///
/// The parent surface carries the date, time and reserve controls (and the
/// credential entry point unless disabled); clicking reserve opens the popup.
/// The popup presents a challenge whose image changes on every reload and
/// reveals the allocation frame once the right answer is submitted. The frame
/// answers the partition and unit scripts from the configured partitions and
/// carries every commit control.
///
/// # Example
///
/// ```rust,ignore
/// use curtaincall_core::testing::MockVenue;
///
/// let venue = MockVenue::builder()
///     .center_x(500.0)
///     .partition("front", 500.0, 100.0, 0)
///     .partition("back", 500.0, 300.0, 2)
///     .build();
///
/// // ...run an attempt against venue.parent...
///
/// assert_eq!(venue.held_unit(), Some("back".to_string()));
/// ```
pub struct MockVenue {
    pub parent: Arc<MockSurface>,
    pub popup: Arc<MockSurface>,
    pub frame: Arc<MockSurface>,
    state: Arc<Mutex<VenueState>>,
}

impl MockVenue {
    pub fn builder() -> MockVenueBuilder {
        MockVenueBuilder {
            center_x: 500.0,
            partitions: Vec::new(),
            answer: "ABCD".to_string(),
            challenge: true,
            popup: true,
            login: true,
            bank_option: "88".to_string(),
            missing: Vec::new(),
        }
    }

    fn state(&self) -> MutexGuard<'_, VenueState> {
        lock(&self.state)
    }

    /// Partitions selected, in order.
    pub fn visits(&self) -> Vec<String> {
        self.state().visits.clone()
    }

    /// Partition in which a unit was taken.
    pub fn held_unit(&self) -> Option<String> {
        self.state().held.clone()
    }

    /// Times a partition was selected while another was still open.
    pub fn selection_violations(&self) -> u32 {
        self.state().violations
    }

    /// Number of challenge reloads.
    pub fn challenge_reloads(&self) -> u32 {
        self.state().generation
    }

    /// Answers submitted to the challenge, in order.
    pub fn challenge_submissions(&self) -> Vec<String> {
        self.state().submissions.clone()
    }

    pub fn challenge_passed(&self) -> bool {
        self.state().challenge_passed
    }
}

fn lock(state: &Mutex<VenueState>) -> MutexGuard<'_, VenueState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn wire_parent(parent: &MockSurface, popup: &Arc<MockSurface>, builder: &MockVenueBuilder) {
    if builder.login {
        fixtures::wire_login(parent, EVENT_LOCATION, ENTRY_LOCATION);
    }
    parent.add_control(selectors::DATE_OPTION);
    parent.add_control(selectors::TIME_OPTION);
    parent.add_control(selectors::RESERVE);

    if builder.popup {
        let popup: Arc<dyn Surface> = popup.clone();
        parent.on_click(selectors::RESERVE, move |page| {
            if !page.children.iter().any(|c| c.id() == popup.id()) {
                page.children.push(Arc::clone(&popup));
            }
        });
    }
}

fn wire_popup(
    popup: &MockSurface,
    frame: &Arc<MockSurface>,
    state: &Arc<Mutex<VenueState>>,
    builder: &MockVenueBuilder,
) {
    popup.set_location(POPUP_LOCATION);
    popup.add_frame(selectors::ALLOCATION_FRAME, frame.clone());

    if !builder.challenge {
        popup.add_control(selectors::ALLOCATION_FRAME);
        return;
    }

    for selector in [
        selectors::CHALLENGE_IMAGE,
        selectors::CHALLENGE_INPUT,
        selectors::CHALLENGE_SUBMIT,
        selectors::CHALLENGE_RELOAD,
        selectors::CHALLENGE_PANEL,
    ] {
        popup.add_control(selector);
    }

    let images = Arc::clone(state);
    popup.on_script(ScriptKind::ChallengeImage, move |_, _| {
        let generation = lock(&images).generation;
        let png = fixtures::challenge_png(generation);
        json!(format!("data:image/png;base64,{}", STANDARD.encode(png)))
    });

    let passed = Arc::clone(state);
    popup.on_script(ScriptKind::ChallengePassed, move |_, _| {
        json!(lock(&passed).challenge_passed)
    });

    let reloads = Arc::clone(state);
    popup.on_click(selectors::CHALLENGE_RELOAD, move |_| {
        lock(&reloads).generation += 1;
    });

    let submits = Arc::clone(state);
    let answer = builder.answer.clone();
    popup.on_click(selectors::CHALLENGE_SUBMIT, move |page: &mut MockPage| {
        let typed = page
            .last_typed(selectors::CHALLENGE_INPUT)
            .unwrap_or_default()
            .to_string();
        let mut venue = lock(&submits);
        venue.submissions.push(typed.clone());
        if typed == answer {
            venue.challenge_passed = true;
            page.controls.insert(selectors::ALLOCATION_FRAME.to_string());
        }
    });
}

fn wire_frame(frame: &MockSurface, state: &Arc<Mutex<VenueState>>, builder: &MockVenueBuilder) {
    let layout = Arc::clone(state);
    let center_x = builder.center_x;
    frame.on_script(ScriptKind::EnumeratePartitions, move |_, _| {
        let venue = lock(&layout);
        let partitions: Vec<_> = venue
            .partitions
            .iter()
            .map(|p| json!({ "id": p.id, "x": p.x, "y": p.y }))
            .collect();
        json!({ "center_x": center_x, "partitions": partitions })
    });

    let select = Arc::clone(state);
    frame.on_script(ScriptKind::SelectPartition, move |script, page| {
        let mut venue = lock(&select);
        let Some(id) = script.arg_str("id") else {
            return json!(false);
        };
        let Some(partition) = venue.partitions.iter().find(|p| p.id == id).cloned() else {
            return json!(false);
        };
        if venue.selected.is_some() {
            venue.violations += 1;
        }
        venue.selected = Some(partition.id.clone());
        venue.visits.push(partition.id);
        if !partition.slow {
            page.controls.insert(selectors::UNIT_CANVAS.to_string());
        }
        json!(true)
    });

    let count = Arc::clone(state);
    frame.on_script(ScriptKind::CountAvailableUnits, move |_, _| {
        let venue = lock(&count);
        json!(selected_units(&venue))
    });

    let take = Arc::clone(state);
    frame.on_script(ScriptKind::SelectFirstUnit, move |_, _| {
        let mut venue = lock(&take);
        if selected_units(&venue) == 0 {
            return json!(false);
        }
        venue.held = venue.selected.clone();
        json!(true)
    });

    let back = Arc::clone(state);
    frame.add_control(selectors::BACK_TO_PARTITIONS);
    frame.on_click(selectors::BACK_TO_PARTITIONS, move |page| {
        lock(&back).selected = None;
        page.controls.remove(selectors::UNIT_CANVAS);
    });

    fixtures::wire_commit(frame, &builder.bank_option);
    let missing: HashSet<&String> = builder.missing.iter().collect();
    for selector in missing {
        frame.remove_control(selector);
    }
}

fn selected_units(venue: &VenueState) -> u32 {
    venue
        .selected
        .as_ref()
        .and_then(|id| venue.partitions.iter().find(|p| &p.id == id))
        .map(|p| p.units)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::{script, Selector};
    use std::time::Duration;

    #[tokio::test]
    async fn test_reserve_opens_popup() {
        let venue = MockVenue::builder().build();
        let reserve = venue
            .parent
            .wait_for_control(&Selector::from(selectors::RESERVE), Duration::ZERO)
            .await
            .unwrap();
        venue.parent.click(&reserve).await.unwrap();
        venue.parent.click(&reserve).await.unwrap();

        let children = venue.parent.open_child_surfaces().await.unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].id(), "popup");
    }

    #[tokio::test]
    async fn test_reload_changes_image() {
        let venue = MockVenue::builder().build();
        let image = script::challenge_image(selectors::CHALLENGE_IMAGE);
        let first = venue.popup.evaluate(&image).await.unwrap();

        let reload = venue
            .popup
            .wait_for_control(&Selector::from(selectors::CHALLENGE_RELOAD), Duration::ZERO)
            .await
            .unwrap();
        venue.popup.click(&reload).await.unwrap();

        let second = venue.popup.evaluate(&image).await.unwrap();
        assert_ne!(first, second);
        assert_eq!(venue.challenge_reloads(), 1);
    }
}

//! The wizard's screen state machine.
//!
//! Navigation is linear, so the back map is a pure function of the current
//! step and no history stack is kept. All transition logic lives in
//! [`WizardState::apply`], a pure `(state, event) -> state` function; the
//! async controller in `wizard.rs` only feeds it events.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use thiserror::Error;

use crate::backend::types::TariffId;
use crate::booking::availability::{self, AvailabilityRules, DateUnavailable};

/// Screens of the booking wizard. Exactly one is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardStep {
    Main,
    Tariff,
    Date,
    Time,
    Confirm,
    MyCleanings,
}

impl WizardStep {
    /// Strict inverse of the forward navigation table.
    pub fn back(self) -> WizardStep {
        match self {
            WizardStep::Main => WizardStep::Main,
            WizardStep::Tariff => WizardStep::Main,
            WizardStep::Date => WizardStep::Tariff,
            WizardStep::Time => WizardStep::Date,
            WizardStep::Confirm => WizardStep::Time,
            WizardStep::MyCleanings => WizardStep::Main,
        }
    }
}

/// In-progress selections of one booking flow.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookingSelection {
    pub tariff: Option<TariffId>,
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
}

impl BookingSelection {
    pub fn is_complete(&self) -> bool {
        self.tariff.is_some() && self.date.is_some() && self.time.is_some()
    }

    pub fn clear(&mut self) {
        *self = BookingSelection::default();
    }
}

/// What the current flow will submit.
///
/// A reschedule reuses the DATE and TIME screens but needs no tariff pick,
/// so completeness is judged per mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FlowMode {
    #[default]
    New,
    Reschedule,
}

/// User actions the state machine reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardEvent {
    /// "Запланировать уборку" on the main menu
    StartScheduling,
    /// "Мои уборки" on the main menu
    OpenMyCleanings,
    /// "Перенести" next to a scheduled visit on the cleanings screen
    StartReschedule,
    TariffChosen(TariffId),
    DateChosen(NaiveDate),
    TimeChosen(NaiveTime),
    /// "Изменить" on the confirmation screen
    Edit,
    Back,
    /// A submission was accepted by the backend
    BookingDone,
}

/// Why an event was rejected. The state is unchanged in every case.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StepError {
    #[error("действие недоступно на этом экране")]
    NotAllowed,
    #[error("дата недоступна: {0}")]
    DateUnavailable(DateUnavailable),
    #[error("неизвестный слот времени: {0}")]
    UnknownSlot(String),
    #[error("выбор не завершён: нужны тариф, дата и время")]
    IncompleteSelection,
}

/// The wizard's full navigational state: active step, flow mode, selections.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WizardState {
    pub step: WizardStep,
    pub mode: FlowMode,
    pub selection: BookingSelection,
}

impl Default for WizardStep {
    fn default() -> Self {
        WizardStep::Main
    }
}

impl WizardState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the selection carries everything the current flow submits.
    pub fn is_submittable(&self) -> bool {
        let base = self.selection.date.is_some() && self.selection.time.is_some();
        match self.mode {
            FlowMode::New => base && self.selection.tariff.is_some(),
            FlowMode::Reschedule => base,
        }
    }

    /// Applies one event, returning the next state or an error with the
    /// state untouched (the caller keeps `self`).
    ///
    /// `booked` is the set of calendar dates that already hold a scheduled
    /// visit; `now` anchors the availability rules.
    pub fn apply(
        &self,
        event: WizardEvent,
        rules: &AvailabilityRules,
        booked: &[NaiveDate],
        now: NaiveDateTime,
    ) -> Result<WizardState, StepError> {
        let mut next = self.clone();
        match (self.step, event) {
            (WizardStep::Main, WizardEvent::StartScheduling) => {
                // A fresh flow starts with a clean selection
                next.selection.clear();
                next.mode = FlowMode::New;
                next.step = WizardStep::Tariff;
            }
            (WizardStep::Main, WizardEvent::OpenMyCleanings) => {
                next.step = WizardStep::MyCleanings;
            }
            (WizardStep::MyCleanings, WizardEvent::StartReschedule) => {
                next.selection.clear();
                next.mode = FlowMode::Reschedule;
                next.step = WizardStep::Date;
            }
            (WizardStep::Tariff, WizardEvent::TariffChosen(tariff)) => {
                next.selection.tariff = Some(tariff);
                next.step = WizardStep::Date;
            }
            (WizardStep::Date, WizardEvent::DateChosen(date)) => {
                availability::check_date(date, now, booked, rules).map_err(StepError::DateUnavailable)?;
                next.selection.date = Some(date);
                next.step = WizardStep::Time;
            }
            (WizardStep::Time, WizardEvent::TimeChosen(time)) => {
                if !availability::time_slots().contains(&time) {
                    return Err(StepError::UnknownSlot(availability::slot_label(time)));
                }
                next.selection.time = Some(time);
                next.step = WizardStep::Confirm;
            }
            (WizardStep::Confirm, WizardEvent::Edit) => {
                // Selection is preserved so the user only re-picks what
                // they want to change
                next.step = WizardStep::Date;
            }
            (WizardStep::Confirm, WizardEvent::BookingDone) => {
                if !self.is_submittable() {
                    return Err(StepError::IncompleteSelection);
                }
                next.selection.clear();
                // A finished reschedule lands back on the cleanings list
                next.step = match self.mode {
                    FlowMode::New => WizardStep::Main,
                    FlowMode::Reschedule => WizardStep::MyCleanings,
                };
                next.mode = FlowMode::New;
            }
            (_, WizardEvent::Back) => {
                next.step = match (self.mode, self.step) {
                    // The reschedule sub-flow entered at DATE, so back exits
                    // to the cleanings list, not to TARIFF
                    (FlowMode::Reschedule, WizardStep::Date) => WizardStep::MyCleanings,
                    _ => self.step.back(),
                };
                if matches!(next.step, WizardStep::Main | WizardStep::MyCleanings) {
                    next.mode = FlowMode::New;
                }
            }
            _ => return Err(StepError::NotAllowed),
        }

        // CONFIRM is reachable only with everything the flow will submit
        debug_assert!(next.step != WizardStep::Confirm || next.is_submittable());
        Ok(next)
    }
}

//! The booking wizard controller.
//!
//! Wraps the pure state machine with everything stateful: the cleanings
//! projection, the backend seam, the host bridge, and the submission
//! bookkeeping. Submissions are generation-stamped so a response that comes
//! back after the user navigated away is recognised as stale and dropped.

use std::sync::Arc;

use chrono::NaiveDateTime;
use thiserror::Error;

use crate::backend::client::BackendApi;
use crate::backend::types::{CleaningRecord, CleaningStatus, RescheduleRequest, ScheduleRequest};
use crate::booking::availability::{self, AvailabilityRules};
use crate::booking::cleanings::CleaningsList;
use crate::booking::state::{FlowMode, StepError, WizardEvent, WizardState, WizardStep};
use crate::bridge::{BridgePayload, HapticKind, HostBridge};
use crate::core::AppError;

/// How the "перенести уборку" action behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RescheduleMode {
    /// Walk the user through a real date/time re-pick
    Subflow,
    /// Only explain that rescheduling means cancel plus rebook
    Guidance,
}

#[derive(Debug, Clone, Copy)]
pub struct WizardConfig {
    pub rules: AvailabilityRules,
    pub reschedule: RescheduleMode,
}

impl Default for WizardConfig {
    fn default() -> Self {
        Self {
            rules: AvailabilityRules::from_config(),
            reschedule: RescheduleMode::Subflow,
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum WizardError {
    #[error(transparent)]
    Step(#[from] StepError),
    #[error("операция уже выполняется, подождите")]
    Busy,
    #[error("уборка не найдена")]
    UnknownCleaning,
    #[error("уборка уже не запланирована")]
    NotActionable,
}

/// Outcome of a finished submission.
#[derive(Debug, PartialEq)]
pub enum SubmissionOutcome {
    Success,
    /// The backend rejected the request; the confirmation screen and the
    /// selection are untouched so the user can retry
    Failed(String),
    /// The user navigated away while the request was in flight; the
    /// response is dropped
    Stale,
}

#[derive(Debug, PartialEq, Eq)]
pub enum CancelOutcome {
    Cancelled,
    Declined,
}

#[derive(Debug, PartialEq, Eq)]
pub enum RescheduleStart {
    /// The wizard moved to the date screen of the reschedule sub-flow
    Subflow,
    /// Nothing changed; show the cancel-and-rebook explanation
    Guidance,
}

/// What a prepared submission will ask the backend for.
#[derive(Debug, Clone)]
enum SubmissionKind {
    New(ScheduleRequest),
    Move { id: String, req: RescheduleRequest },
}

/// Claim on one in-flight submission, stamped with the wizard generation
/// at the moment of preparation.
#[derive(Debug)]
pub struct SubmissionTicket {
    generation: u64,
    kind: SubmissionKind,
}

pub struct BookingWizard {
    state: WizardState,
    cleanings: CleaningsList,
    backend: Arc<dyn BackendApi>,
    bridge: Arc<dyn HostBridge>,
    config: WizardConfig,
    /// Bumped on every state change; stale responses compare against it
    generation: u64,
    in_flight: bool,
    /// Id of the cleaning being moved, while a reschedule sub-flow runs
    reschedule_target: Option<String>,
}

impl BookingWizard {
    pub fn new(backend: Arc<dyn BackendApi>, bridge: Arc<dyn HostBridge>, config: WizardConfig) -> Self {
        Self {
            state: WizardState::new(),
            cleanings: CleaningsList::new(),
            backend,
            bridge,
            config,
            generation: 0,
            in_flight: false,
            reschedule_target: None,
        }
    }

    pub fn state(&self) -> &WizardState {
        &self.state
    }

    pub fn cleanings(&self) -> &CleaningsList {
        &self.cleanings
    }

    pub fn rules(&self) -> &AvailabilityRules {
        &self.config.rules
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight
    }

    /// Fetches the tariff catalog through the wizard's backend.
    pub async fn load_catalog(&self) -> crate::booking::catalog::TariffCatalog {
        crate::booking::catalog::TariffCatalog::load(self.backend.as_ref()).await
    }

    /// Replaces the cleanings projection with a fresh backend fetch.
    pub async fn refresh_cleanings(&mut self) -> Result<(), AppError> {
        let records = self.backend.list_cleanings().await?;
        self.cleanings = CleaningsList::from_records(records);
        Ok(())
    }

    /// Feeds one navigation event to the pure state machine.
    pub fn handle_event(&mut self, event: WizardEvent, now: NaiveDateTime) -> Result<(), StepError> {
        let booked = self.cleanings.booked_dates();
        self.state = self.state.apply(event, &self.config.rules, &booked, now)?;
        self.generation += 1;
        if self.state.mode == FlowMode::New && self.state.step != WizardStep::Confirm {
            self.reschedule_target = None;
        }
        Ok(())
    }

    /// Starts the reschedule action for a scheduled visit.
    pub fn start_reschedule(&mut self, id: &str, now: NaiveDateTime) -> Result<RescheduleStart, WizardError> {
        let record = self.cleanings.get(id).ok_or(WizardError::UnknownCleaning)?;
        if record.status != CleaningStatus::Scheduled {
            return Err(WizardError::NotActionable);
        }
        match self.config.reschedule {
            RescheduleMode::Guidance => Ok(RescheduleStart::Guidance),
            RescheduleMode::Subflow => {
                self.handle_event(WizardEvent::StartReschedule, now)?;
                self.reschedule_target = Some(id.to_string());
                Ok(RescheduleStart::Subflow)
            }
        }
    }

    /// Claims the current selection for submission.
    ///
    /// Fails with [`WizardError::Busy`] while a previous submission is
    /// still in flight, which is what swallows a double-tapped confirm
    /// button.
    pub fn prepare_submission(&mut self) -> Result<SubmissionTicket, WizardError> {
        if self.state.step != WizardStep::Confirm || !self.state.is_submittable() {
            return Err(StepError::IncompleteSelection.into());
        }
        if self.in_flight {
            return Err(WizardError::Busy);
        }
        let (date, time) = match (self.state.selection.date, self.state.selection.time) {
            (Some(d), Some(t)) => (d, t),
            _ => return Err(StepError::IncompleteSelection.into()),
        };
        let instant = availability::combine(date, time);
        let slot = availability::slot_label(time);
        let kind = match (self.state.mode, &self.reschedule_target) {
            (FlowMode::Reschedule, Some(id)) => SubmissionKind::Move {
                id: id.clone(),
                req: RescheduleRequest {
                    date: instant,
                    time: slot,
                },
            },
            _ => {
                let tariff_id = self
                    .state
                    .selection
                    .tariff
                    .ok_or(WizardError::Step(StepError::IncompleteSelection))?;
                SubmissionKind::New(ScheduleRequest {
                    date: instant,
                    time: slot,
                    tariff_id,
                })
            }
        };
        self.in_flight = true;
        Ok(SubmissionTicket {
            generation: self.generation,
            kind,
        })
    }

    /// Folds the backend's answer back into the wizard.
    ///
    /// A ticket whose generation no longer matches is reported stale: the
    /// user navigated meanwhile and their current screen wins.
    pub fn complete_submission(
        &mut self,
        ticket: SubmissionTicket,
        result: Result<CleaningRecord, AppError>,
    ) -> SubmissionOutcome {
        self.in_flight = false;
        if ticket.generation != self.generation {
            log::info!("Dropping stale submission response (generation {} != {})", ticket.generation, self.generation);
            return SubmissionOutcome::Stale;
        }
        match result {
            Ok(record) => {
                match &ticket.kind {
                    SubmissionKind::New(_) => self.cleanings.apply_scheduled(record),
                    SubmissionKind::Move { id, .. } => {
                        self.cleanings.apply_rescheduled(id, record.scheduled_at);
                    }
                }
                self.reschedule_target = None;
                self.state.selection.clear();
                self.state.step = match self.state.mode {
                    FlowMode::New => WizardStep::Main,
                    FlowMode::Reschedule => WizardStep::MyCleanings,
                };
                self.state.mode = FlowMode::New;
                self.generation += 1;
                SubmissionOutcome::Success
            }
            Err(e) => {
                log::warn!("Submission failed: {}", e);
                SubmissionOutcome::Failed(e.to_string())
            }
        }
    }

    /// The confirm button: claims the selection, calls the backend, folds
    /// the answer back, and notifies the host on success.
    pub async fn confirm(&mut self) -> Result<SubmissionOutcome, WizardError> {
        let ticket = self.prepare_submission()?;
        let kind = ticket.kind.clone();
        let result = match &kind {
            SubmissionKind::New(req) => self.backend.schedule(req).await,
            SubmissionKind::Move { id, req } => self.backend.reschedule(id, req).await,
        };
        let outcome = self.complete_submission(ticket, result);
        if outcome == SubmissionOutcome::Success {
            if let SubmissionKind::New(req) = &kind {
                let payload = BridgePayload::ScheduleCleaning {
                    date: req.date.format("%Y-%m-%dT%H:%M:%S").to_string(),
                    time: req.time.clone(),
                    tariff: req.tariff_id,
                };
                if let Err(e) = self.bridge.send_payload(&payload).await {
                    log::warn!("Bridge payload delivery failed: {}", e);
                }
            }
            self.bridge.haptic(HapticKind::Success);
        }
        Ok(outcome)
    }

    /// Cancels a scheduled visit after a bridge confirmation prompt.
    ///
    /// The scheduled-status precondition is checked before the backend is
    /// involved; cancel on a completed or already cancelled visit never
    /// leaves the process.
    pub async fn cancel_cleaning(&mut self, id: &str) -> Result<CancelOutcome, AppError> {
        let record = match self.cleanings.get(id) {
            Some(r) => r,
            None => return Err(AppError::Validation("уборка не найдена".to_string())),
        };
        if record.status != CleaningStatus::Scheduled {
            return Err(AppError::Validation("уборка уже не запланирована".to_string()));
        }
        let prompt = format!(
            "Отменить уборку {}?",
            record.scheduled_at.format("%d.%m.%Y в %H:%M")
        );
        if !self.bridge.request_confirmation(&prompt).await? {
            return Ok(CancelOutcome::Declined);
        }
        self.backend.cancel(id).await?;
        self.cleanings.apply_cancelled(id);
        if self.reschedule_target.as_deref() == Some(id) {
            self.reschedule_target = None;
        }
        // The cancel already happened; the outbound payload is advisory
        if let Err(e) = self
            .bridge
            .send_payload(&BridgePayload::CancelCleaning {
                cleaning_id: id.to_string(),
            })
            .await
        {
            log::warn!("Bridge payload delivery failed: {}", e);
        }
        self.bridge.haptic(HapticKind::Success);
        Ok(CancelOutcome::Cancelled)
    }

    /// The support button: hands the user over to the hosting application.
    pub async fn open_support(&self) -> Result<(), AppError> {
        self.bridge.send_payload(&BridgePayload::OpenSupportChat).await
    }
}

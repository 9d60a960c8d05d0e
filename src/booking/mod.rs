pub mod availability;
pub mod catalog;
pub mod cleanings;
pub mod state;
pub mod wizard;

pub use availability::AvailabilityRules;
pub use catalog::TariffCatalog;
pub use cleanings::CleaningsList;
pub use state::{BookingSelection, FlowMode, StepError, WizardEvent, WizardState, WizardStep};
pub use wizard::{
    BookingWizard, CancelOutcome, RescheduleMode, RescheduleStart, SubmissionOutcome, WizardConfig,
    WizardError,
};

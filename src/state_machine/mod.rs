mod item;
mod outcome;
mod state;

pub use item::{ContentItem, LifecycleState};
pub use outcome::{ItemReport, OutcomeLog, OutcomeRecord, RunSummary, StepCounts, StepStatus};
pub use state::{ItemState, StateMachine, Step, StepResult, TransitionError};

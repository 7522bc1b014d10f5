use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::item::LifecycleState;
use crate::arc::ErrorKind;

/// The three write steps, in the only order they may run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Step {
    RemoveFromCirculation,
    Unpublish,
    Delete,
}

impl Step {
    pub const ALL: [Step; 3] = [Step::RemoveFromCirculation, Step::Unpublish, Step::Delete];

    /// Steps a run executes; deletion is opt-in because it cannot be undone.
    pub fn sequence(delete_enabled: bool) -> &'static [Step] {
        if delete_enabled {
            &Self::ALL
        } else {
            &Self::ALL[..2]
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::RemoveFromCirculation => write!(f, "remove-from-circulation"),
            Step::Unpublish => write!(f, "unpublish"),
            Step::Delete => write!(f, "delete"),
        }
    }
}

/// Where an item stands in the pipeline.
///
/// Each item flows through: START → CIRCULATION_REMOVED → UNPUBLISHED → DELETED,
/// or stops in the absorbing FAILED state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "kebab-case")]
pub enum ItemState {
    Start,
    CirculationRemoved,
    Unpublished,
    Deleted,
    Failed { step: Step, reason: ErrorKind },
}

impl fmt::Display for ItemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemState::Start => write!(f, "START"),
            ItemState::CirculationRemoved => write!(f, "CIRCULATION_REMOVED"),
            ItemState::Unpublished => write!(f, "UNPUBLISHED"),
            ItemState::Deleted => write!(f, "DELETED"),
            ItemState::Failed { step, reason } => write!(f, "FAILED({step}, {reason})"),
        }
    }
}

impl ItemState {
    /// Entry state for an item whose lifecycle is already known.
    pub fn from_lifecycle(state: LifecycleState) -> Self {
        match state {
            LifecycleState::Unknown | LifecycleState::Published | LifecycleState::Error => {
                ItemState::Start
            }
            LifecycleState::CirculationRemoved => ItemState::CirculationRemoved,
            LifecycleState::Unpublished => ItemState::Unpublished,
            LifecycleState::Deleted => ItemState::Deleted,
        }
    }

    /// The step whose success moves the item out of this state, if any.
    pub fn pending_step(&self) -> Option<Step> {
        match self {
            ItemState::Start => Some(Step::RemoveFromCirculation),
            ItemState::CirculationRemoved => Some(Step::Unpublish),
            ItemState::Unpublished => Some(Step::Delete),
            ItemState::Deleted | ItemState::Failed { .. } => None,
        }
    }

    /// Whether `step`'s postcondition already holds in this state.
    pub fn satisfies(&self, step: Step) -> bool {
        let reached = match self {
            ItemState::Start | ItemState::Failed { .. } => return false,
            ItemState::CirculationRemoved => Step::RemoveFromCirculation,
            ItemState::Unpublished => Step::Unpublish,
            ItemState::Deleted => Step::Delete,
        };
        step <= reached
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ItemState::Failed { .. })
    }
}

/// What a single step execution produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepResult {
    /// The platform changed state.
    Applied,
    /// The postcondition already held; nothing was written.
    AlreadySatisfied,
    Failed(ErrorKind),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("step {step} is out of order in state {state}")]
    OutOfOrder { state: ItemState, step: Step },
}

/// Pure transition function for a single item.
pub struct StateMachine;

impl StateMachine {
    /// Compute the state after `step` finished with `result`.
    ///
    /// - `step` must be the pending step of `state`; anything else is rejected,
    ///   which is what keeps unpublish from running before circulation removal
    ///   and delete from running before unpublish.
    /// - Success (applied or already satisfied) advances one state.
    /// - Failure moves to the absorbing `Failed` state.
    pub fn advance(
        state: ItemState,
        step: Step,
        result: StepResult,
    ) -> Result<ItemState, TransitionError> {
        if state.pending_step() != Some(step) {
            return Err(TransitionError::OutOfOrder { state, step });
        }
        let next = match result {
            StepResult::Applied | StepResult::AlreadySatisfied => match step {
                Step::RemoveFromCirculation => ItemState::CirculationRemoved,
                Step::Unpublish => ItemState::Unpublished,
                Step::Delete => ItemState::Deleted,
            },
            StepResult::Failed(reason) => ItemState::Failed { step, reason },
        };
        Ok(next)
    }
}

use tracing::{debug, error, info, warn};

use crate::arc::{ApiError, ContentApi, ErrorKind};
use crate::state_machine::{
    ContentItem, ItemReport, ItemState, OutcomeLog, OutcomeRecord, StateMachine, Step, StepResult,
};
use crate::throttle::Governor;

/// Drives one story at a time through remove-from-circulation → unpublish → delete.
pub struct TransitionEngine<'a, A> {
    api: &'a A,
    governor: &'a Governor,
    delete_enabled: bool,
}

impl<'a, A: ContentApi> TransitionEngine<'a, A> {
    pub fn new(api: &'a A, governor: &'a Governor, delete_enabled: bool) -> Self {
        Self {
            api,
            governor,
            delete_enabled,
        }
    }

    pub fn delete_enabled(&self) -> bool {
        self.delete_enabled
    }

    /// Run every configured step for `item`, appending one record per step to `log`.
    ///
    /// Stops at the first failure; the failure is reported in the returned
    /// [`ItemReport`] and never propagated, so the caller can move on.
    pub async fn process(&self, item: &ContentItem, log: &OutcomeLog) -> ItemReport {
        let id = item.id.as_str();
        let mut state = ItemState::from_lifecycle(item.state);
        info!(story = id, start = %state, "processing story");

        for &step in Step::sequence(self.delete_enabled) {
            if state.satisfies(step) {
                log.append(OutcomeRecord::already_satisfied(id, step, "state known from input"));
                continue;
            }

            let result = match self.apply_step(id, step).await {
                Ok(result) => {
                    log.append(match result {
                        StepResult::AlreadySatisfied => {
                            OutcomeRecord::already_satisfied(id, step, "confirmed before call")
                        }
                        _ => OutcomeRecord::succeeded(id, step),
                    });
                    result
                }
                Err(ApiError::NotFound(_))
                    if step == Step::RemoveFromCirculation && self.delete_enabled =>
                {
                    // The story itself is gone, so every remaining step already holds.
                    info!(story = id, "story no longer exists");
                    for &rest in Step::sequence(true).iter().filter(|s| **s >= step) {
                        log.append(OutcomeRecord::already_satisfied(id, rest, "story no longer exists"));
                    }
                    state = ItemState::Deleted;
                    break;
                }
                Err(err) => {
                    warn!(story = id, %step, kind = %err.kind(), error = %err, "step failed");
                    log.append(OutcomeRecord::failed(id, step, &err));
                    StepResult::Failed(err.kind())
                }
            };

            state = match StateMachine::advance(state, step, result) {
                Ok(next) => next,
                Err(err) => {
                    error!(story = id, error = %err, "invalid transition");
                    ItemState::Failed {
                        step,
                        reason: ErrorKind::Unexpected,
                    }
                }
            };
            debug!(story = id, %step, state = %state, "step finished");
            if state.is_failed() {
                break;
            }
        }

        info!(story = id, end = %state, "story finished");
        ItemReport {
            story_id: item.id.clone(),
            final_state: state,
        }
    }

    /// Execute one step against the platform, checking its postcondition first
    /// so that re-running a step on a story already past it writes nothing.
    pub async fn apply_step(&self, id: &str, step: Step) -> Result<StepResult, ApiError> {
        let api = self.api;
        match step {
            Step::RemoveFromCirculation => {
                let websites = self
                    .governor
                    .call("circulations", || api.circulations(id))
                    .await?;
                if websites.is_empty() {
                    return Ok(StepResult::AlreadySatisfied);
                }
                let mut removed = 0;
                for website in &websites {
                    match self
                        .governor
                        .call("remove_circulation", || api.remove_circulation(id, website))
                        .await
                    {
                        Ok(()) => {
                            debug!(story = id, website = %website, "circulation removed");
                            removed += 1;
                        }
                        Err(ApiError::NotFound(_)) => {
                            debug!(story = id, website = %website, "circulation already gone");
                        }
                        Err(err) => return Err(err),
                    }
                }
                Ok(if removed == 0 {
                    StepResult::AlreadySatisfied
                } else {
                    StepResult::Applied
                })
            }
            Step::Unpublish => {
                let published = self
                    .governor
                    .call("has_published_revision", || api.has_published_revision(id))
                    .await?;
                if !published {
                    return Ok(StepResult::AlreadySatisfied);
                }
                self.governor.call("unpublish", || api.unpublish(id)).await?;
                Ok(StepResult::Applied)
            }
            Step::Delete => {
                self.governor.call("delete", || api.delete(id)).await?;
                Ok(StepResult::Applied)
            }
        }
    }
}

//! Local claim bookkeeping for tasks this agent has seen.
//!
//! Ownership is decided by the platform, which reports the winner of each
//! race through `task:assigned`. The coordinator only records what this
//! agent tried and what it was told, following
//! `Unclaimed -> ClaimAttempted -> {Mine, NotMine} -> Completed`.
//!
//! Every transition happens under one lock. The lock is never held across
//! a network call: callers check and transition, release, then talk to the
//! platform, then come back to record the outcome.

use std::collections::HashMap;

use agora_core::model::{ClaimState, EntityId};
use agora_core::{CoordinationError, TransportError};
use parking_lot::Mutex;
use tracing::{debug, warn};

/// What an authoritative assignment did to the local state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// This agent won the task
    BecameMine,
    /// Another agent won the task
    BecameNotMine,
    /// The task was already resolved; nothing changed
    Duplicate(ClaimState),
}

#[derive(Debug, Default)]
pub struct TaskCoordinator {
    states: Mutex<HashMap<EntityId, ClaimState>>,
}

impl TaskCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a newly created task. A task already known (for example one
    /// whose assignment arrived first) keeps its state.
    pub fn observe_created(&self, task_id: EntityId) -> ClaimState {
        *self
            .states
            .lock()
            .entry(task_id)
            .or_insert(ClaimState::Unclaimed)
    }

    /// Move a task to `ClaimAttempted` if no claim has been made yet.
    ///
    /// Unknown tasks (e.g. found through a pending-task query) are claimable.
    /// Anything past `Unclaimed` is rejected so no redundant request is sent.
    pub fn begin_claim(&self, task_id: EntityId) -> Result<(), CoordinationError> {
        let mut states = self.states.lock();
        let state = states.entry(task_id).or_insert(ClaimState::Unclaimed);
        if !state.is_claimable() {
            return Err(CoordinationError::AlreadyTracked {
                task_id,
                state: *state,
            });
        }
        *state = ClaimState::ClaimAttempted;
        debug!(task_id, "Claim attempted");
        Ok(())
    }

    /// Apply an authoritative assignment.
    ///
    /// A task enters `Mine` at most once. Once resolved, later assignments for
    /// the same id are duplicates, even if they name a different agent.
    pub fn resolve(&self, task_id: EntityId, assigned_to_self: bool) -> Resolution {
        let mut states = self.states.lock();
        let state = states.entry(task_id).or_insert(ClaimState::Unclaimed);
        if state.is_resolved() {
            if (*state == ClaimState::NotMine) == assigned_to_self {
                warn!(task_id, current = %state, assigned_to_self, "Conflicting assignment ignored");
            } else {
                debug!(task_id, current = %state, "Duplicate assignment ignored");
            }
            return Resolution::Duplicate(*state);
        }

        if assigned_to_self {
            *state = ClaimState::Mine;
            Resolution::BecameMine
        } else {
            *state = ClaimState::NotMine;
            Resolution::BecameNotMine
        }
    }

    /// Record that a claim request failed.
    ///
    /// Failures that prove nothing was sent roll back to `Unclaimed`; an
    /// explicit client-error refusal means someone else holds the task.
    /// Anything ambiguous leaves `ClaimAttempted` for a later assignment or
    /// reconcile pass to settle. Only applies while still `ClaimAttempted`.
    /// Returns the new state when it changed.
    pub fn claim_failed(&self, task_id: EntityId, err: &TransportError) -> Option<ClaimState> {
        let next = if err.never_sent() {
            ClaimState::Unclaimed
        } else if err
            .status_code()
            .is_some_and(|code| (400..500).contains(&code))
        {
            ClaimState::NotMine
        } else {
            return None;
        };

        let mut states = self.states.lock();
        match states.get_mut(&task_id) {
            Some(state) if *state == ClaimState::ClaimAttempted => {
                *state = next;
                Some(next)
            }
            _ => None,
        }
    }

    /// Roll a pending claim back to `Unclaimed`. False if it already resolved.
    pub fn revert(&self, task_id: EntityId) -> bool {
        let mut states = self.states.lock();
        match states.get_mut(&task_id) {
            Some(state) if *state == ClaimState::ClaimAttempted => {
                *state = ClaimState::Unclaimed;
                true
            }
            _ => false,
        }
    }

    /// Fail unless the task is `Mine`.
    pub fn ensure_owned(&self, task_id: EntityId) -> Result<(), CoordinationError> {
        let state = self.state(task_id).unwrap_or(ClaimState::Unclaimed);
        if state == ClaimState::Mine {
            Ok(())
        } else {
            Err(CoordinationError::NotOwner { task_id, state })
        }
    }

    /// `Mine -> Completed`, the one transition driven by this process.
    pub fn mark_completed(&self, task_id: EntityId) -> Result<(), CoordinationError> {
        let mut states = self.states.lock();
        match states.get_mut(&task_id) {
            Some(state) if *state == ClaimState::Mine => {
                *state = ClaimState::Completed;
                Ok(())
            }
            other => Err(CoordinationError::NotOwner {
                task_id,
                state: other.map_or(ClaimState::Unclaimed, |s| *s),
            }),
        }
    }

    pub fn state(&self, task_id: EntityId) -> Option<ClaimState> {
        self.states.lock().get(&task_id).copied()
    }

    /// Tasks with a claim in flight, in id order.
    pub fn attempted(&self) -> Vec<EntityId> {
        let mut ids: Vec<_> = self
            .states
            .lock()
            .iter()
            .filter(|(_, state)| **state == ClaimState::ClaimAttempted)
            .map(|(id, _)| *id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Every known task and its state, in id order.
    pub fn snapshot(&self) -> Vec<(EntityId, ClaimState)> {
        let mut all: Vec<_> = self
            .states
            .lock()
            .iter()
            .map(|(id, state)| (*id, *state))
            .collect();
        all.sort_unstable_by_key(|(id, _)| *id);
        all
    }

    pub fn len(&self) -> usize {
        self.states.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn created_then_claimed_then_won() {
        let tasks = TaskCoordinator::new();
        assert_eq!(tasks.observe_created(42), ClaimState::Unclaimed);
        tasks.begin_claim(42).unwrap();
        assert_eq!(tasks.state(42), Some(ClaimState::ClaimAttempted));
        assert_eq!(tasks.resolve(42, true), Resolution::BecameMine);
        tasks.mark_completed(42).unwrap();
        assert_eq!(tasks.state(42), Some(ClaimState::Completed));
    }

    #[test]
    fn mine_entered_at_most_once() {
        let tasks = TaskCoordinator::new();
        tasks.begin_claim(42).unwrap();
        assert_eq!(tasks.resolve(42, true), Resolution::BecameMine);
        assert_eq!(
            tasks.resolve(42, true),
            Resolution::Duplicate(ClaimState::Mine)
        );
        assert_eq!(
            tasks.resolve(42, false),
            Resolution::Duplicate(ClaimState::Mine)
        );
        assert_eq!(tasks.state(42), Some(ClaimState::Mine));
    }

    #[test]
    fn not_mine_never_becomes_mine() {
        let tasks = TaskCoordinator::new();
        tasks.begin_claim(42).unwrap();
        assert_eq!(tasks.resolve(42, false), Resolution::BecameNotMine);
        assert_eq!(
            tasks.resolve(42, true),
            Resolution::Duplicate(ClaimState::NotMine)
        );
    }

    #[test]
    fn assignment_before_creation_is_tolerated() {
        let tasks = TaskCoordinator::new();
        assert_eq!(tasks.resolve(7, false), Resolution::BecameNotMine);
        // The late creation event keeps the resolved state.
        assert_eq!(tasks.observe_created(7), ClaimState::NotMine);
        assert_eq!(tasks.state(7), Some(ClaimState::NotMine));
    }

    #[test]
    fn claim_guard_rejects_every_non_unclaimed_state() {
        let tasks = TaskCoordinator::new();

        tasks.begin_claim(1).unwrap();
        let err = tasks.begin_claim(1).unwrap_err();
        assert!(matches!(
            err,
            CoordinationError::AlreadyTracked {
                state: ClaimState::ClaimAttempted,
                ..
            }
        ));

        tasks.resolve(2, false);
        assert!(tasks.begin_claim(2).is_err());

        tasks.begin_claim(3).unwrap();
        tasks.resolve(3, true);
        assert!(tasks.begin_claim(3).is_err());
        tasks.mark_completed(3).unwrap();
        assert!(tasks.begin_claim(3).is_err());
    }

    #[test]
    fn never_sent_failure_reverts() {
        let tasks = TaskCoordinator::new();
        tasks.begin_claim(5).unwrap();
        assert_eq!(
            tasks.claim_failed(5, &TransportError::NotConnected),
            Some(ClaimState::Unclaimed)
        );
        // A retry is allowed again.
        tasks.begin_claim(5).unwrap();
    }

    #[test]
    fn refusal_means_not_mine() {
        let tasks = TaskCoordinator::new();
        tasks.begin_claim(5).unwrap();
        let refused = TransportError::Request {
            status_code: 400,
            body: "Task is not available for assignment".into(),
        };
        assert_eq!(tasks.claim_failed(5, &refused), Some(ClaimState::NotMine));
    }

    #[test]
    fn ambiguous_failure_stays_attempted() {
        let tasks = TaskCoordinator::new();
        tasks.begin_claim(5).unwrap();
        assert_eq!(
            tasks.claim_failed(5, &TransportError::Network("timeout".into())),
            None
        );
        let server_error = TransportError::Request {
            status_code: 503,
            body: String::new(),
        };
        assert_eq!(tasks.claim_failed(5, &server_error), None);
        assert_eq!(tasks.state(5), Some(ClaimState::ClaimAttempted));
        assert_eq!(tasks.attempted(), vec![5]);
    }

    #[test]
    fn failure_after_resolution_is_ignored() {
        let tasks = TaskCoordinator::new();
        tasks.begin_claim(5).unwrap();
        tasks.resolve(5, true);
        assert_eq!(tasks.claim_failed(5, &TransportError::NotConnected), None);
        assert!(!tasks.revert(5));
        assert_eq!(tasks.state(5), Some(ClaimState::Mine));
    }

    #[test]
    fn completion_requires_ownership() {
        let tasks = TaskCoordinator::new();
        assert!(matches!(
            tasks.mark_completed(9),
            Err(CoordinationError::NotOwner {
                state: ClaimState::Unclaimed,
                ..
            })
        ));
        tasks.resolve(9, false);
        assert!(tasks.ensure_owned(9).is_err());
        assert!(tasks.mark_completed(9).is_err());
    }

    #[test]
    fn concurrent_claims_send_exactly_one() {
        let tasks = Arc::new(TaskCoordinator::new());
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let tasks = tasks.clone();
                std::thread::spawn(move || tasks.begin_claim(42).is_ok())
            })
            .collect();
        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(winners, 1);
    }

    #[test]
    fn snapshot_is_sorted() {
        let tasks = TaskCoordinator::new();
        tasks.observe_created(3);
        tasks.observe_created(1);
        tasks.begin_claim(2).unwrap();
        assert_eq!(
            tasks.snapshot(),
            vec![
                (1, ClaimState::Unclaimed),
                (2, ClaimState::ClaimAttempted),
                (3, ClaimState::Unclaimed)
            ]
        );
        assert_eq!(tasks.len(), 3);
    }
}

//! One-shot timers for feature actions.
//!
//! Each owner has at most one pending timer. Arming again supersedes the old
//! token, and a superseded or cancelled token is never handed out by
//! [TimerService::pop_due].

use std::time::Instant;

use crate::action::ActionState;

/// Handle of an armed timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerToken(u64);

/// Id of whoever armed a timer, the runner uses one per action.
pub type TimerOwner = u64;

/// A timer that elapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerEvent {
    pub token: TimerToken,
    pub owner: TimerOwner,
    /// the action state the timer was armed in
    pub state: ActionState,
    pub deadline: Instant,
}

#[derive(Debug, Default)]
pub struct TimerService {
    next_token: u64,
    pending: Vec<TimerEvent>,
}

impl TimerService {
    pub fn new() -> Self {
        Self::default()
    }
    /// Arm a timer for `owner`, dropping whatever it had pending.
    pub fn arm(&mut self, owner: TimerOwner, state: ActionState, deadline: Instant) -> TimerToken {
        self.cancel(owner);
        self.next_token += 1;
        let token = TimerToken(self.next_token);
        self.pending.push(TimerEvent {
            token,
            owner,
            state,
            deadline,
        });
        token
    }
    /// Drop the pending timer of `owner`. Returns true if there was one.
    pub fn cancel(&mut self, owner: TimerOwner) -> bool {
        let before = self.pending.len();
        self.pending.retain(|t| t.owner != owner);
        before != self.pending.len()
    }
    pub fn is_pending(&self, token: TimerToken) -> bool {
        self.pending.iter().any(|t| t.token == token)
    }
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.iter().map(|t| t.deadline).min()
    }
    /// Remove and return the earliest timer due at `now`.
    ///
    /// Ties are resolved in arming order.
    pub fn pop_due(&mut self, now: Instant) -> Option<TimerEvent> {
        let idx = self
            .pending
            .iter()
            .enumerate()
            .filter(|(_, t)| t.deadline <= now)
            .min_by_key(|(_, t)| (t.deadline, t.token))
            .map(|(i, _)| i)?;
        Some(self.pending.remove(idx))
    }
    pub fn len(&self) -> usize {
        self.pending.len()
    }
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const WAIT: ActionState = ActionState::WaitingForReportPowerStatus;

    #[test]
    fn rearm_supersedes() {
        let t0 = Instant::now();
        let mut timers = TimerService::new();
        let first = timers.arm(1, WAIT, t0 + Duration::from_millis(10));
        let second = timers.arm(1, WAIT, t0 + Duration::from_millis(20));
        assert!(!timers.is_pending(first));
        assert!(timers.is_pending(second));
        assert_eq!(timers.len(), 1);

        assert!(timers.pop_due(t0 + Duration::from_millis(15)).is_none());
        let ev = timers.pop_due(t0 + Duration::from_millis(20)).unwrap();
        assert_eq!(ev.token, second);
        assert!(timers.is_empty());
    }

    #[test]
    fn cancel_drops_owner_only() {
        let t0 = Instant::now();
        let mut timers = TimerService::new();
        let a = timers.arm(1, WAIT, t0);
        let b = timers.arm(2, WAIT, t0);
        assert!(timers.cancel(1));
        assert!(!timers.cancel(1));
        assert!(!timers.is_pending(a));
        assert_eq!(timers.pop_due(t0).map(|e| e.token), Some(b));
        assert_eq!(timers.pop_due(t0), None);
    }

    #[test]
    fn earliest_first() {
        let t0 = Instant::now();
        let mut timers = TimerService::new();
        timers.arm(1, WAIT, t0 + Duration::from_millis(30));
        timers.arm(2, WAIT, t0 + Duration::from_millis(10));
        timers.arm(3, WAIT, t0 + Duration::from_millis(10));
        assert_eq!(timers.next_deadline(), Some(t0 + Duration::from_millis(10)));
        let later = t0 + Duration::from_millis(40);
        let order: Vec<_> = std::iter::from_fn(|| timers.pop_due(later))
            .map(|e| e.owner)
            .collect();
        assert_eq!(order, vec![2, 3, 1]);
        assert_eq!(timers.next_deadline(), None);
    }
}

//! Cancellable frame timers
//!
//! Timers are counted in simulation frames and tagged with the run epoch they
//! were scheduled under. Scheduling a kind that is already pending replaces it,
//! and a timer from an older epoch never fires.

use std::mem::discriminant;

/// What a timer does when it fires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    /// One countdown step (3..1)
    CountdownStep,
    /// Terminal state -> new run
    AutoRestart,
    /// Clear the feedback message
    FeedbackExpiry,
    /// Grace period before the ammo-exhaustion penalty
    AmmoGrace { question_index: u32 },
    /// Report pass/fail to the enclosing assessment
    AssessmentReport,
}

#[derive(Debug, Clone, Copy)]
struct Timer {
    kind: TimerKind,
    due: u64,
    epoch: u64,
}

#[derive(Debug, Clone, Default)]
pub struct Timers {
    pending: Vec<Timer>,
}

impl Timers {
    /// Schedule `kind` to fire `delay` frames after `now`, superseding any
    /// pending timer of the same kind
    pub fn schedule(&mut self, kind: TimerKind, now: u64, delay: u32, epoch: u64) {
        self.cancel(kind);
        self.pending.push(Timer {
            kind,
            due: now + delay as u64,
            epoch,
        });
    }

    /// Cancel any pending timer of the same kind (payload ignored)
    pub fn cancel(&mut self, kind: TimerKind) {
        let d = discriminant(&kind);
        self.pending.retain(|t| discriminant(&t.kind) != d);
    }

    pub fn is_pending(&self, kind: TimerKind) -> bool {
        let d = discriminant(&kind);
        self.pending.iter().any(|t| discriminant(&t.kind) == d)
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Remove and return the timers due at `now`, earliest first. Timers from
    /// another epoch are discarded without firing.
    pub fn take_due(&mut self, now: u64, epoch: u64) -> Vec<TimerKind> {
        self.pending.retain(|t| t.epoch == epoch);
        let mut due: Vec<Timer> = self.pending.iter().filter(|t| t.due <= now).copied().collect();
        self.pending.retain(|t| t.due > now);
        due.sort_by_key(|t| t.due);
        due.into_iter().map(|t| t.kind).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timer_fires_once_when_due() {
        let mut timers = Timers::default();
        timers.schedule(TimerKind::FeedbackExpiry, 10, 5, 1);
        assert!(timers.take_due(14, 1).is_empty());
        assert_eq!(timers.take_due(15, 1), vec![TimerKind::FeedbackExpiry]);
        assert!(timers.take_due(16, 1).is_empty());
        assert!(timers.is_empty());
    }

    #[test]
    fn test_reschedule_supersedes() {
        let mut timers = Timers::default();
        timers.schedule(TimerKind::AmmoGrace { question_index: 0 }, 0, 10, 1);
        timers.schedule(TimerKind::AmmoGrace { question_index: 1 }, 5, 10, 1);
        assert_eq!(timers.len(), 1);
        assert!(timers.take_due(10, 1).is_empty());
        assert_eq!(
            timers.take_due(15, 1),
            vec![TimerKind::AmmoGrace { question_index: 1 }]
        );
    }

    #[test]
    fn test_stale_epoch_never_fires() {
        let mut timers = Timers::default();
        timers.schedule(TimerKind::AutoRestart, 0, 3, 1);
        assert!(timers.take_due(100, 2).is_empty());
        assert!(timers.is_empty());
    }

    #[test]
    fn test_due_order() {
        let mut timers = Timers::default();
        timers.schedule(TimerKind::AssessmentReport, 0, 9, 1);
        timers.schedule(TimerKind::CountdownStep, 0, 3, 1);
        assert_eq!(
            timers.take_due(10, 1),
            vec![TimerKind::CountdownStep, TimerKind::AssessmentReport]
        );
    }

    #[test]
    fn test_cancel_ignores_payload() {
        let mut timers = Timers::default();
        timers.schedule(TimerKind::AmmoGrace { question_index: 4 }, 0, 3, 1);
        assert!(timers.is_pending(TimerKind::AmmoGrace { question_index: 0 }));
        timers.cancel(TimerKind::AmmoGrace { question_index: 0 });
        assert!(timers.is_empty());
    }
}

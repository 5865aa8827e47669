/// A one-shot expiry check armed for a particular epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryTimer {
    pub epoch: u64,
    pub deadline_ms: i64,
}

/// What happened when a due timer fired
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryOutcome {
    /// A later arm or a logout replaced this timer
    Superseded,
    /// The session was still valid at fire time, nothing done
    StillValid,
    /// No session was active any more
    NoSession,
    /// The session had lapsed and was ended
    Expired,
}

/// Pending expiry timers plus the epoch that decides which one is live.
///
/// Re-arming bumps the epoch and drops the older timers. A logout only
/// bumps the epoch, so its timer still fires and is reported as superseded.
#[derive(Debug, Default)]
pub struct ExpirySchedule {
    epoch: u64,
    pending: Vec<ExpiryTimer>,
}

impl ExpirySchedule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Arm a timer for `deadline_ms`, superseding every earlier one
    pub fn arm(&mut self, deadline_ms: i64) -> ExpiryTimer {
        self.epoch += 1;
        let epoch = self.epoch;
        self.pending.retain(|timer| timer.epoch == epoch);

        let timer = ExpiryTimer { epoch, deadline_ms };
        self.pending.push(timer);
        timer
    }

    /// Make every pending timer stale without arming a new one
    pub fn invalidate(&mut self) {
        self.epoch += 1;
    }

    pub fn is_current(&self, timer: &ExpiryTimer) -> bool {
        timer.epoch == self.epoch
    }

    /// Remove and return the timers whose deadline is at or before `now_ms`, oldest first
    pub fn take_due(&mut self, now_ms: i64) -> Vec<ExpiryTimer> {
        let (mut due, waiting): (Vec<ExpiryTimer>, Vec<ExpiryTimer>) =
            std::mem::take(&mut self.pending)
                .into_iter()
                .partition(|timer| timer.deadline_ms <= now_ms);
        self.pending = waiting;
        due.sort_by_key(|timer| (timer.deadline_ms, timer.epoch));
        due
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Deadline of the live timer, if it has not fired yet
    pub fn next_deadline(&self) -> Option<i64> {
        self.pending
            .iter()
            .find(|timer| timer.epoch == self.epoch)
            .map(|timer| timer.deadline_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rearm_supersedes_previous_timer() {
        let mut schedule = ExpirySchedule::new();
        let first = schedule.arm(1_000);
        assert!(schedule.is_current(&first));

        let second = schedule.arm(2_000);
        assert!(!schedule.is_current(&first));
        assert!(schedule.is_current(&second));
        assert_eq!(schedule.pending(), 1);
        assert_eq!(schedule.next_deadline(), Some(2_000));
    }

    #[test]
    fn test_rearming_does_not_grow_queue() {
        let mut schedule = ExpirySchedule::new();
        for deadline in (1..=100).map(|step| step * 1_000) {
            schedule.arm(deadline);
        }
        assert_eq!(schedule.pending(), 1);
        assert_eq!(schedule.epoch(), 100);

        // Dropped timers never come due
        assert!(schedule.take_due(99_000).is_empty());
        let due = schedule.take_due(100_000);
        assert_eq!(due.len(), 1);
        assert!(schedule.is_current(&due[0]));
    }

    #[test]
    fn test_take_due_only_returns_elapsed_timers() {
        let mut schedule = ExpirySchedule::new();
        schedule.arm(2_000);

        assert!(schedule.take_due(1_999).is_empty());
        assert_eq!(schedule.pending(), 1);

        let due = schedule.take_due(2_000);
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].deadline_ms, 2_000);
        assert_eq!(schedule.pending(), 0);
        assert!(schedule.take_due(2_500).is_empty());
    }

    #[test]
    fn test_invalidate_makes_all_stale() {
        let mut schedule = ExpirySchedule::new();
        let timer = schedule.arm(1_000);
        schedule.invalidate();
        assert!(!schedule.is_current(&timer));
        assert_eq!(schedule.next_deadline(), None);
        // Still queued, to be reported as superseded when due
        assert_eq!(schedule.pending(), 1);
    }
}

/// Where the single-shot alert currently stands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LatchState {
    /// No alert delivered and none in flight. A trigger may fire.
    Armed,
    /// A notification sequence is in flight.
    Dispatching { pending: usize, failures: usize },
    /// Every attempt of the last sequence failed and re-arming is disabled.
    Exhausted,
    /// At least one notification was delivered. Terminal.
    Sent,
}

/// Process-lifetime single-shot alert latch.
///
/// `Sent` is reached exactly once, by the first successful notification, and
/// is never left. While a sequence is in flight no new sequence may start.
#[derive(Clone, Debug)]
pub struct AlertLatch {
    state: LatchState,
    rearm_on_failure: bool,
}

impl AlertLatch {
    pub fn new(rearm_on_failure: bool) -> Self {
        Self {
            state: LatchState::Armed,
            rearm_on_failure,
        }
    }

    pub fn state(&self) -> LatchState {
        self.state
    }

    pub fn is_sent(&self) -> bool {
        self.state == LatchState::Sent
    }

    /// True when `count` exceeds `threshold` and the latch is armed.
    pub fn should_trigger(&self, count: usize, threshold: usize) -> bool {
        count > threshold && self.state == LatchState::Armed
    }

    /// Record that a sequence of `attempts` notifications has been launched.
    pub fn begin_dispatch(&mut self, attempts: usize) {
        if self.state != LatchState::Armed || attempts == 0 {
            return;
        }
        self.state = LatchState::Dispatching {
            pending: attempts,
            failures: 0,
        };
    }

    /// Record a successful notification. Idempotent.
    pub fn mark_sent(&mut self) {
        self.state = LatchState::Sent;
    }

    /// Record a failed notification.
    ///
    /// When the last pending attempt of a sequence fails without any success,
    /// the latch re-arms or becomes `Exhausted` depending on configuration.
    pub fn record_failure(&mut self) {
        let LatchState::Dispatching { pending, failures } = self.state else {
            return;
        };
        let pending = pending.saturating_sub(1);
        let failures = failures + 1;
        self.state = if pending > 0 {
            LatchState::Dispatching { pending, failures }
        } else if self.rearm_on_failure {
            LatchState::Armed
        } else {
            LatchState::Exhausted
        };
    }
}

impl Default for AlertLatch {
    fn default() -> Self {
        Self::new(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn every_state() -> Vec<AlertLatch> {
        let armed = AlertLatch::new(true);
        let mut dispatching = AlertLatch::new(true);
        dispatching.begin_dispatch(2);
        let mut sent = AlertLatch::new(true);
        sent.mark_sent();
        let mut exhausted = AlertLatch::new(false);
        exhausted.begin_dispatch(1);
        exhausted.record_failure();
        vec![armed, dispatching, sent, exhausted]
    }

    #[test]
    fn never_triggers_at_or_below_threshold() {
        for latch in every_state() {
            for count in 0..=8 {
                assert!(!latch.should_trigger(count, 8), "{:?} count={}", latch, count);
            }
        }
    }

    #[test]
    fn triggers_above_threshold_when_armed() {
        let latch = AlertLatch::default();
        for count in 9..40 {
            assert!(latch.should_trigger(count, 8));
        }
        assert!(latch.should_trigger(1, 0));
    }

    #[test]
    fn never_triggers_once_sent() {
        let mut latch = AlertLatch::default();
        latch.mark_sent();
        for count in [0, 9, 100, usize::MAX] {
            assert!(!latch.should_trigger(count, 8));
        }
    }

    #[test]
    fn mark_sent_is_idempotent() {
        let mut latch = AlertLatch::default();
        latch.mark_sent();
        latch.mark_sent();
        assert!(latch.is_sent());
        assert_eq!(latch.state(), LatchState::Sent);
    }

    #[test]
    fn in_flight_sequence_blocks_new_trigger() {
        let mut latch = AlertLatch::default();
        latch.begin_dispatch(2);
        assert!(!latch.should_trigger(10, 8));
        assert!(!latch.is_sent());
    }

    #[test]
    fn one_success_among_failures_sets_latch() {
        let mut latch = AlertLatch::default();
        latch.begin_dispatch(2);
        latch.record_failure();
        latch.mark_sent();
        assert!(latch.is_sent());

        // A late failure cannot undo a delivered alert.
        latch.record_failure();
        assert!(latch.is_sent());
    }

    #[test]
    fn total_failure_rearms_by_default() {
        let mut latch = AlertLatch::new(true);
        latch.begin_dispatch(2);
        latch.record_failure();
        assert!(matches!(
            latch.state(),
            LatchState::Dispatching {
                pending: 1,
                failures: 1
            }
        ));
        latch.record_failure();
        assert_eq!(latch.state(), LatchState::Armed);
        assert!(latch.should_trigger(10, 8));
    }

    #[test]
    fn total_failure_exhausts_when_rearm_disabled() {
        let mut latch = AlertLatch::new(false);
        latch.begin_dispatch(2);
        latch.record_failure();
        latch.record_failure();
        assert_eq!(latch.state(), LatchState::Exhausted);
        assert!(!latch.should_trigger(10, 8));
        assert!(!latch.is_sent());
    }

    #[test]
    fn empty_dispatch_keeps_latch_armed() {
        let mut latch = AlertLatch::default();
        latch.begin_dispatch(0);
        assert_eq!(latch.state(), LatchState::Armed);
    }
}

// crates/mlt-consumer/src/skip.rs
//
// A pure function of rolling accumulators and queue depth. Split out of the
// worker loop into its own small struct purely so the decision is
// unit-testable without spinning up a thread; the original keeps this
// inline in `consumer_read_ahead_thread`, and so does the worker loop here.
// `SkipState` just holds the state that loop mutates.

/// PAL frame budget in microseconds. The original hard-codes this regardless
/// of normalisation: NTSC's true budget is roughly 33370 microseconds at
/// 29.97 fps, but `mlt_consumer.c` uses 40000 unconditionally, so this port
/// does too rather than silently correcting it.
pub const SKIP_THRESHOLD_MICROS: i64 = 40_000;

/// Consecutive skips before the accumulators reset defensively.
pub const MAX_CONSECUTIVE_SKIPS: u32 = 6;

#[derive(Debug, Default)]
pub struct SkipState {
    pub count: u32,
    pub skipped: u32,
    pub time_wait: i64,
    pub time_frame: i64,
    pub time_process: i64,
    pub skip_next: bool,
}

impl SkipState {
    pub fn new() -> Self {
        Self {
            count: 1,
            ..Default::default()
        }
    }

    /// Trick-play reset: any frame with `speed != 1` clears every rolling
    /// counter and the skip flag. Such a frame is always fully materialised.
    pub fn reset_for_trick_play(&mut self) {
        *self = Self::new();
    }

    /// Record one more consecutive skip, resetting defensively at the
    /// threshold. Returns whether a reset happened, mostly useful for tests.
    pub fn record_skip(&mut self) -> bool {
        self.skipped += 1;
        self.skip_next = false;
        if self.skipped >= MAX_CONSECUTIVE_SKIPS {
            *self = Self::new();
            true
        } else {
            false
        }
    }

    /// Decide whether the *next* frame should be skipped, given the current
    /// queue depth: occupancy <= 5 and the rolling per-frame average exceeds
    /// the PAL budget.
    pub fn decide_skip_next(&mut self, queue_depth: usize) {
        let total = self.time_wait + self.time_frame + self.time_process;
        let average = total / self.count.max(1) as i64;
        self.skip_next = queue_depth <= 5 && average > SKIP_THRESHOLD_MICROS;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skip_gated_by_queue_depth_even_under_load() {
        let mut s = SkipState::new();
        s.time_wait = 50_000;
        s.time_frame = 0;
        s.time_process = 0;
        // Queue occupancy 6, over the <=5 gate, must not skip even though
        // the average is well above threshold.
        s.decide_skip_next(6);
        assert!(!s.skip_next);
    }

    #[test]
    fn skip_triggered_when_shallow_and_over_budget() {
        let mut s = SkipState::new();
        s.time_wait = 50_000;
        s.decide_skip_next(5);
        assert!(s.skip_next);
    }

    #[test]
    fn not_triggered_when_under_budget() {
        let mut s = SkipState::new();
        s.time_wait = 10_000;
        s.decide_skip_next(0);
        assert!(!s.skip_next);
    }

    #[test]
    fn sixth_consecutive_skip_resets_counters() {
        let mut s = SkipState::new();
        s.time_wait = 1_000_000; // force something nonzero pre-reset
        for i in 1..=5 {
            let reset = s.record_skip();
            assert!(!reset, "skip #{i} should not reset yet");
        }
        let reset = s.record_skip();
        assert!(reset, "6th consecutive skip must reset counters");
        assert_eq!(s.skipped, 0);
        assert_eq!(s.time_wait, 0);
        assert_eq!(s.count, 1);
    }

    #[test]
    fn seventh_frame_after_reset_is_not_forced_to_skip() {
        let mut s = SkipState::new();
        for _ in 0..6 {
            s.record_skip();
        }
        // Fresh state after the reset: well under budget, deep queue -> no skip.
        s.decide_skip_next(10);
        assert!(!s.skip_next);
    }

    #[test]
    fn trick_play_clears_skip_flag_and_accumulators() {
        let mut s = SkipState::new();
        s.time_wait = 99_999;
        s.skip_next = true;
        s.reset_for_trick_play();
        assert!(!s.skip_next);
        assert_eq!(s.time_wait, 0);
        assert_eq!(s.count, 1);
    }
}

// crates/mlt-core/src/sample_calculator.rs
//
// Maps (fps, frequency, frame-index) to the integer number of audio samples
// belonging to that frame. Per-frame values sum to `frequency / fps` on
// average; the remainder is distributed across frames rather than truncated
// every time, which is what keeps audio in sync with video over a long run.

/// `counter` is the 0-based index of the frame within the worker's current
/// lifetime (reset whenever the read-ahead thread restarts).
pub fn sample_calculator(fps: f64, frequency: u32, counter: u32) -> u32 {
    if fps <= 0.0 {
        return 0;
    }
    let total_to_here = ((counter as f64 + 1.0) * frequency as f64 / fps).round() as i64;
    let total_before = (counter as f64 * frequency as f64 / fps).round() as i64;
    (total_to_here - total_before).max(0) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sums_to_frequency_over_fps_cycle() {
        // 25 fps @ 48000 Hz: exactly 1920 samples/frame, no rounding needed.
        for i in 0..25 {
            assert_eq!(sample_calculator(25.0, 48000, i), 1920);
        }
    }

    #[test]
    fn distributes_rounding_for_ntsc() {
        // 30000/1001 fps @ 48000 Hz doesn't divide evenly; verify the running
        // total over one "second" (30 frames) lands within a sample of 48000.
        let fps = 30000.0 / 1001.0;
        let total: u32 = (0..30).map(|i| sample_calculator(fps, 48000, i)).sum();
        let target = (30.0 * 48000.0 / fps).round() as u32;
        assert!((total as i64 - target as i64).abs() <= 1);
    }

    #[test]
    fn never_negative_for_degenerate_fps() {
        assert_eq!(sample_calculator(0.0, 48000, 0), 0);
    }
}

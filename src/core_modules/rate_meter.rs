// THEORY:
// The rate meter is a diagnostic: it reports how many frames per second the engine
// actually pushes through. It is deliberately coarse. Frames are counted inside a
// window; once the window has been open for at least its length, the meter emits
// `frames / elapsed` and starts a fresh window at that instant. Frames that do not
// close a window produce no reading at all.
//
// Time is always passed in, never read from a clock here, so replaying recorded or
// synthetic timestamps gives the same readings as running live.

use std::time::{Duration, Instant};

pub const DEFAULT_RATE_WINDOW: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct RateMeter {
    window: Duration,
    frames_in_window: u64,
    window_start: Instant,
}

impl RateMeter {
    pub fn new(start: Instant) -> Self {
        Self::with_window(start, DEFAULT_RATE_WINDOW)
    }

    pub fn with_window(start: Instant, window: Duration) -> Self {
        Self {
            window,
            frames_in_window: 0,
            window_start: start,
        }
    }

    /// Counts one processed frame at `now`.
    /// Returns frames per second only when this frame closes a window.
    pub fn tick(&mut self, now: Instant) -> Option<f64> {
        self.frames_in_window += 1;

        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed < self.window {
            return None;
        }

        let fps = self.frames_in_window as f64 / elapsed.as_secs_f64();
        self.frames_in_window = 0;
        self.window_start = now;
        Some(fps)
    }

    /// Drops the partial window and opens a new one at `start`.
    pub fn restart(&mut self, start: Instant) {
        self.frames_in_window = 0;
        self.window_start = start;
    }

    pub fn frames_in_window(&self) -> u64 {
        self.frames_in_window
    }

    pub fn window_start(&self) -> Instant {
        self.window_start
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emits_once_per_second_over_two_seconds() {
        let start = Instant::now();
        let mut meter = RateMeter::new(start);

        // 20 frames spread evenly over 2.0 seconds, 10 per second.
        let readings: Vec<(u64, Option<f64>)> = (1..=20u64)
            .map(|i| (i, meter.tick(start + Duration::from_millis(100 * i))))
            .collect();

        let emissions: Vec<(u64, f64)> = readings
            .iter()
            .filter_map(|(i, fps)| fps.map(|fps| (*i, fps)))
            .collect();

        assert_eq!(emissions.len(), 2);
        assert_eq!(emissions[0].0, 10);
        assert_eq!(emissions[1].0, 20);
        for (_, fps) in emissions {
            assert!((fps - 10.0).abs() < 1e-9, "fps was {fps}");
        }
    }

    #[test]
    fn nothing_before_a_full_window() {
        let start = Instant::now();
        let mut meter = RateMeter::new(start);
        for i in 1..10u64 {
            assert_eq!(meter.tick(start + Duration::from_millis(100 * i)), None);
        }
        assert_eq!(meter.frames_in_window(), 9);
    }

    #[test]
    fn slow_frames_report_fractional_rate() {
        let start = Instant::now();
        let mut meter = RateMeter::new(start);
        let fps = meter.tick(start + Duration::from_millis(2_000));
        assert_eq!(fps, Some(0.5));
    }

    #[test]
    fn window_resets_at_emission() {
        let start = Instant::now();
        let mut meter = RateMeter::new(start);
        let emitted_at = start + Duration::from_millis(1_500);

        assert!(meter.tick(emitted_at).is_some());
        assert_eq!(meter.frames_in_window(), 0);
        assert_eq!(meter.window_start(), emitted_at);
        assert_eq!(meter.tick(emitted_at + Duration::from_millis(999)), None);
    }

    #[test]
    fn custom_window_length() {
        let start = Instant::now();
        let mut meter = RateMeter::with_window(start, Duration::from_millis(250));
        assert_eq!(meter.tick(start + Duration::from_millis(100)), None);
        let fps = meter.tick(start + Duration::from_millis(250)).unwrap();
        assert!((fps - 8.0).abs() < 1e-9);
    }

    #[test]
    fn restart_drops_the_partial_window() {
        let start = Instant::now();
        let mut meter = RateMeter::new(start);
        meter.tick(start + Duration::from_millis(400));
        meter.tick(start + Duration::from_millis(800));

        let later = start + Duration::from_secs(10);
        meter.restart(later);
        assert_eq!(meter.frames_in_window(), 0);
        assert_eq!(meter.window_start(), later);
        assert_eq!(meter.tick(later + Duration::from_millis(500)), None);
    }
}

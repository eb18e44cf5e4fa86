//! Frame timing
//!
//! The host supplies a monotonic timestamp in seconds each frame
//! (`performance.now() / 1000` in the browser, an `Instant` offset on
//! desktop). The clock turns that into a clamped simulation timestep.

/// Largest timestep fed to the simulation, regardless of frame drops
pub const MAX_TIMESTEP: f32 = 1.0 / 60.0;

/// Clamp a measured frame delta to `0..=MAX_TIMESTEP`
pub fn clamp_timestep(raw: f32) -> f32 {
    if raw.is_nan() {
        return 0.0;
    }
    raw.clamp(0.0, MAX_TIMESTEP)
}

/// Tracks wall time between frames and total simulated time
#[derive(Clone, Debug, Default)]
pub struct FrameClock {
    last: Option<f64>,
    elapsed: f32,
    frames: u64,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance to `now_secs` and return the clamped timestep
    ///
    /// The first tick has no reference point and yields zero.
    pub fn tick(&mut self, now_secs: f64) -> f32 {
        let dt = match self.last {
            Some(last) => clamp_timestep((now_secs - last) as f32),
            None => 0.0,
        };
        self.last = Some(now_secs);
        self.elapsed += dt;
        self.frames += 1;
        dt
    }

    /// Sum of all clamped timesteps
    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    /// Number of ticks so far
    pub fn frames(&self) -> u64 {
        self.frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_passes_short_frames() {
        assert_eq!(clamp_timestep(0.01), 0.01);
        assert_eq!(clamp_timestep(MAX_TIMESTEP), MAX_TIMESTEP);
    }

    #[test]
    fn test_clamp_long_frames() {
        for raw in [0.017_f32, 0.05, 0.5, 3.0, 1e6] {
            assert_eq!(clamp_timestep(raw), raw.min(MAX_TIMESTEP));
        }
    }

    #[test]
    fn test_clamp_rejects_negative_and_nan() {
        assert_eq!(clamp_timestep(-0.1), 0.0);
        assert_eq!(clamp_timestep(f32::NAN), 0.0);
    }

    #[test]
    fn test_tick_sequence() {
        let mut clock = FrameClock::new();
        assert_eq!(clock.tick(10.0), 0.0);

        let dt = clock.tick(10.008);
        assert!((dt - 0.008).abs() < 1e-5);

        // Frame drop gets clamped
        assert_eq!(clock.tick(11.0), MAX_TIMESTEP);
        assert_eq!(clock.frames(), 3);
        assert!((clock.elapsed() - (0.008 + MAX_TIMESTEP)).abs() < 1e-5);
    }
}

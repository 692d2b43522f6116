/// Fixed simulation rate every per-step constant is tuned for.
pub const DEFAULT_STEP_HZ: u32 = 60;

/// Convert a duration in seconds to a whole number of simulation steps,
/// rounding to nearest. Negative durations become zero.
pub fn secs_to_steps(secs: f32, step_hz: u32) -> u32 {
    if secs <= 0.0 {
        return 0;
    }
    (secs * step_hz as f32).round() as u32
}

/// Duration of one simulation step in seconds.
pub fn step_secs(step_hz: u32) -> f32 {
    1.0 / step_hz.max(1) as f32
}

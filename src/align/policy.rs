use serde::Serialize;

/// Lowest and highest speed ceilings the schedule is defined for.
pub const MIN_MAX_SPEED: f64 = 1.2;
pub const MAX_MAX_SPEED: f64 = 2.0;

/// Speed increments used by the speed-correction steps, derived from `max_speed`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SpeedPolicy {
    pub step3_increment: f64,
    pub step4_increment: f64,
    pub step5_speed: f64,
}

/// Map a speed ceiling to its step schedule.
///
/// Lower ceilings leave less headroom, so they get smaller jumps. The buckets are
/// hand-tuned; values outside `[1.2, 2.0]` are clamped to the nearest boundary and
/// non-finite input falls into the most conservative bucket.
pub fn compute_policy(max_speed: f64) -> SpeedPolicy {
    let max_speed = if max_speed.is_finite() {
        max_speed.clamp(MIN_MAX_SPEED, MAX_MAX_SPEED)
    } else {
        MIN_MAX_SPEED
    };

    let (step3_increment, step4_increment) = if max_speed >= 2.0 {
        (0.20, 0.50)
    } else if max_speed >= 1.8 {
        (0.20, 0.40)
    } else if max_speed >= 1.6 {
        (0.20, 0.30)
    } else if max_speed >= 1.4 {
        (0.15, 0.20)
    } else {
        (0.10, 0.10)
    };

    SpeedPolicy {
        step3_increment,
        step4_increment,
        step5_speed: max_speed,
    }
}

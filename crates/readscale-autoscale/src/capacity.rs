//! Capacity calculator — pure reader-count arithmetic.

/// Desired reader count for a utilization sample.
///
/// The proportional size `metric / target * current` is rounded up when
/// it exceeds `current` and down otherwise, then clamped to `[min, max]`.
/// `target` must be positive.
pub fn desired_capacity(metric: f64, current: u32, target: f64, min: u32, max: u32) -> u32 {
    let current_f = f64::from(current);
    let proportional = metric / target * current_f;

    let rounded = if proportional > current_f {
        proportional.ceil()
    } else {
        proportional.floor()
    };

    // `as` saturates: NaN and negatives become 0, overflow becomes u32::MAX.
    (rounded as u32).max(min).min(max)
}

/// Readers a schedule-mode scale-out should add.
///
/// Starts from `delta`. If `current + delta` exceeds `max` the addition is
/// cut to the remaining headroom (zero when there is none). If
/// `current + delta` falls below `min` the addition is raised to reach
/// `min`. Never negative.
pub fn scheduled_additions(current: u32, delta: i32, min: u32, max: u32) -> u32 {
    let current = i64::from(current);
    let desired = current + i64::from(delta);
    let mut additions = i64::from(delta);

    if desired > i64::from(max) {
        additions = i64::from(max) - current;
        if additions <= 0 {
            return 0;
        }
    }
    if desired < i64::from(min) {
        additions = i64::from(min) - current;
    }

    u32::try_from(additions).unwrap_or(0)
}

//! Angular delta between consecutive samples, corrected for the 0/360° wrap.

/// `previous_angle` value meaning "no baseline yet". Anything above 360°
/// is treated the same way.
pub const UNINITIALIZED_ANGLE: f32 = 361.0;

/// Returns `true` when `angle` holds the "no baseline" sentinel.
pub fn is_uninitialized(angle: f32) -> bool {
    angle > 360.0
}

/// Signed rotation from `previous` to `current`, in `(-180, 180]` degrees.
///
/// The shortest way round is assumed: a jump of more than half a turn is
/// a wrap through 0°, not a fast spin. With no baseline the delta is 0 so
/// the first sample only establishes the reference.
pub fn angle_delta(current: f32, previous: f32) -> f32 {
    if is_uninitialized(previous) {
        return 0.0;
    }

    let mut delta = current - previous;
    if delta > 180.0 {
        delta -= 360.0;
    } else if delta <= -180.0 {
        delta += 360.0;
    }
    delta
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_without_wrap() {
        assert_eq!(angle_delta(40.0, 10.0), 30.0);
    }

    #[test]
    fn backward_without_wrap() {
        assert_eq!(angle_delta(10.0, 40.0), -30.0);
    }

    #[test]
    fn forward_through_zero() {
        assert_eq!(angle_delta(10.0, 350.0), 20.0);
    }

    #[test]
    fn backward_through_zero() {
        assert_eq!(angle_delta(350.0, 10.0), -20.0);
    }

    #[test]
    fn half_turn_is_positive() {
        assert_eq!(angle_delta(180.0, 0.0), 180.0);
        assert_eq!(angle_delta(0.0, 180.0), 180.0);
        assert_eq!(angle_delta(270.0, 90.0), 180.0);
    }

    #[test]
    fn sentinel_gives_zero() {
        assert_eq!(angle_delta(123.0, UNINITIALIZED_ANGLE), 0.0);
        assert_eq!(angle_delta(0.0, 400.0), 0.0);
        assert!(is_uninitialized(UNINITIALIZED_ANGLE));
        assert!(!is_uninitialized(360.0));
        assert!(!is_uninitialized(0.0));
    }

    #[test]
    fn delta_range_and_congruence_over_grid() {
        let mut previous = 0.0f32;
        while previous < 360.0 {
            let mut current = 0.0f32;
            while current < 360.0 {
                let delta = angle_delta(current, previous);
                assert!(delta > -180.0 && delta <= 180.0, "{} -> {}: {}", previous, current, delta);

                let raw = current - previous;
                let diff = (delta - raw).rem_euclid(360.0);
                assert!(diff < 1e-3 || diff > 360.0 - 1e-3, "{} -> {}", previous, current);
                current += 7.5;
            }
            previous += 5.0;
        }
    }
}

//! Degree-valued phase arithmetic on the 360°-periodic circle.

/// Wrap a phase in degrees into [0, 360).
///
/// `rem_euclid` can round tiny negative inputs up to exactly 360.0, which
/// is folded back to 0.
pub fn wrap_degrees(deg: f64) -> f64 {
    let wrapped = deg.rem_euclid(360.0);
    if wrapped >= 360.0 { 0.0 } else { wrapped }
}

/// Shortest angular separation between two phases, in [0, 180].
///
/// d(a, b) = |((a − b + 180) mod 360) − 180|
pub fn circular_distance(a: f64, b: f64) -> f64 {
    ((a - b + 180.0).rem_euclid(360.0) - 180.0).abs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_wrap_negative() {
        assert!((wrap_degrees(-90.0) - 270.0).abs() < 1e-12);
        assert!((wrap_degrees(-360.0)).abs() < 1e-12);
    }

    #[test]
    fn test_wrap_large() {
        assert!((wrap_degrees(725.0) - 5.0).abs() < 1e-12);
        assert_eq!(wrap_degrees(360.0), 0.0);
    }

    #[test]
    fn test_wrap_tiny_negative_stays_in_range() {
        let w = wrap_degrees(-1e-15);
        assert!((0.0..360.0).contains(&w), "got {w}");
    }

    #[test]
    fn test_distance_wraps_across_zero() {
        let d = circular_distance(359.999, 0.0001);
        assert!((d - 0.0011).abs() < 1e-9, "expected ~0.0011, got {d}");
    }

    #[test]
    fn test_distance_opposite() {
        assert!((circular_distance(0.0, 180.0) - 180.0).abs() < 1e-12);
        assert!((circular_distance(270.0, 90.0) - 180.0).abs() < 1e-12);
    }

    proptest! {
        #[test]
        fn distance_to_self_is_zero(a in -720.0f64..720.0) {
            prop_assert!(circular_distance(a, a).abs() < 1e-9);
        }

        #[test]
        fn distance_is_symmetric(a in -720.0f64..720.0, b in -720.0f64..720.0) {
            let ab = circular_distance(a, b);
            let ba = circular_distance(b, a);
            prop_assert!((ab - ba).abs() < 1e-9, "d(a,b)={} d(b,a)={}", ab, ba);
        }

        #[test]
        fn distance_is_bounded(a in -1e4f64..1e4, b in -1e4f64..1e4) {
            let d = circular_distance(a, b);
            prop_assert!((0.0..=180.0).contains(&d), "d={}", d);
        }

        #[test]
        fn wrap_is_in_range(a in -1e6f64..1e6) {
            let w = wrap_degrees(a);
            prop_assert!((0.0..360.0).contains(&w), "w={}", w);
        }
    }
}

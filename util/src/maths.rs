//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::Float;

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Clamp a value into `[min, max]`.
///
/// NaN values are passed through unchanged.
pub fn clamp<T>(value: &T, min: &T, max: &T) -> T
where
    T: Float,
{
    let mut ret = *value;

    if ret > *max {
        ret = *max
    }
    if ret < *min {
        ret = *min
    }

    ret
}

/// Wrap an angle in degrees into the half-open range (-180, 180].
///
/// Non-finite inputs are returned as-is rather than looping forever.
pub fn wrap_deg_180<T>(angle_deg: T) -> T
where
    T: Float,
{
    if !angle_deg.is_finite() {
        return angle_deg;
    }

    let half = from_f64::<T>(180.0);
    let full = from_f64::<T>(360.0);

    // Reduce large inputs with a single remainder before the loops tidy up the boundaries
    let mut a = angle_deg % full;

    while a > half {
        a = a - full;
    }
    while a <= -half {
        a = a + full;
    }

    a
}

/// Wrap an angle in radians into (-pi, pi].
pub fn wrap_rad_pi<T>(angle_rad: T) -> T
where
    T: Float,
{
    wrap_deg_180(angle_rad.to_degrees()).to_radians()
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn from_f64<T: Float>(v: f64) -> T {
    // Every Float implementor can represent these small constants
    T::from(v).unwrap_or_else(T::zero)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_clamp() {
        assert_eq!(clamp(&2.0, &0.0, &1.0), 1.0);
        assert_eq!(clamp(&-2.0, &0.0, &1.0), 0.0);
        assert_eq!(clamp(&0.3, &0.0, &1.0), 0.3);
    }

    #[test]
    fn test_wrap_deg_180() {
        assert_eq!(wrap_deg_180(190.0), -170.0);
        assert_eq!(wrap_deg_180(-190.0), 170.0);
        assert_eq!(wrap_deg_180(180.0), 180.0);
        assert_eq!(wrap_deg_180(-180.0), 180.0);
        assert_eq!(wrap_deg_180(0.0), 0.0);
        assert_eq!(wrap_deg_180(720.0 + 45.0), 45.0);

        let mut a = -1000.0;
        while a < 1000.0 {
            let w = wrap_deg_180(a);
            assert!(w > -180.0 && w <= 180.0, "{} wrapped to {}", a, w);
            a += 7.3;
        }

        assert!(wrap_deg_180(std::f64::NAN).is_nan());
    }

    #[test]
    fn test_wrap_rad_pi() {
        assert!((wrap_rad_pi(2.5 * std::f64::consts::PI) - 0.5 * std::f64::consts::PI).abs() < 1e-9);
    }
}

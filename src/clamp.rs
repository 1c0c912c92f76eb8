
#[cfg(feature = "internal-no-panic")]
use no_panic::no_panic;

/// Saturates `value` into the range `low..=high`.
///
/// The arguments are 64-bit so that intermediate sums of 16-bit samples and step sizes
/// can never overflow before they are clamped. `low` must not be greater than `high`;
/// if it is, `low` wins.
#[cfg_attr(feature = "internal-no-panic", no_panic)]
#[inline(always)]
pub fn clamp(value: i64, low: i64, high: i64) -> i64 {
    // Ord::clamp() panics when low > high, this never does
    if value < low {
        low
    } else if value > high {
        high
    } else {
        value
    }
}

/// Saturates `value` into the range of a 16-bit signed sample (-32768..=32767).
#[cfg_attr(feature = "internal-no-panic", no_panic)]
#[inline(always)]
pub fn clamp_to_i16(value: i64) -> i16 {
    #[allow(clippy::cast_possible_truncation)] // value is clamped so truncation never happens
    {
    clamp(value, i64::from(i16::MIN), i64::from(i16::MAX)) as i16
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp() {
        assert_eq!(clamp(5, 0, 10), 5);
        assert_eq!(clamp(-1, 0, 10), 0);
        assert_eq!(clamp(11, 0, 10), 10);
        assert_eq!(clamp(0, 0, 0), 0);
        assert_eq!(clamp(i64::MIN, -88, 88), -88);
        assert_eq!(clamp(i64::MAX, -88, 88), 88);
        // reversed bounds don't panic
        assert_eq!(clamp(5, 10, 0), 10);
    }

    #[test]
    fn test_clamp_to_i16() {
        assert_eq!(clamp_to_i16(0), 0);
        assert_eq!(clamp_to_i16(32767), 32767);
        assert_eq!(clamp_to_i16(32768), 32767);
        assert_eq!(clamp_to_i16(-32768), -32768);
        assert_eq!(clamp_to_i16(-32769), -32768);
        assert_eq!(clamp_to_i16(i64::from(i32::MAX)), 32767);
        assert_eq!(clamp_to_i16(i64::from(i32::MIN)), -32768);
        assert_eq!(clamp_to_i16(i64::MAX), 32767);
        assert_eq!(clamp_to_i16(i64::MIN), -32768);
        assert_eq!(clamp_to_i16(-1234), -1234);
    }
}

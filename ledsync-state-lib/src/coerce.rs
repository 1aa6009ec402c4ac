//! Bounded numeric coercion for 8-bit request fields
//!
//! Numeric fields accept either a plain integer or a short text command:
//!
//! ```text
//!   "120"        absolute value
//!   "~"  / "~-"  step up / down by one, wrapping around [min, max]
//!   "~N" / "~-N" relative change, saturating at min / max
//!   "+N" / "-N"  same as "~N" / "~-N"
//!   "r"          uniformly random value in [min, max]
//! ```
//!
//! Negative integers mean "field absent" (clients send `{"ps":-1}` to mean no preset).

use log::debug;
use rand::{Rng, RngCore};

use crate::value::Value;

/// Longest text command accepted, in bytes.
const MAX_COMMAND_LEN: usize = 10;

/// Resolve `value` against the attribute's `current` value.
///
/// Returns the value to store, or `None` when the attribute must stay unchanged.
/// Plain integers are taken verbatim (saturating at 255) and are not checked
/// against `[min, max]`; the bounds only steer the relative and random forms.
#[must_use]
pub fn coerce_u8(value: &Value, current: u8, min: u8, max: u8, rng: &mut dyn RngCore) -> Option<u8> {
    match value {
        Value::Integer(n) if *n < 0 => None,
        Value::Integer(n) => Some(u8::try_from(*n).unwrap_or(u8::MAX)),
        Value::Text(text) if !text.is_empty() && text.len() <= MAX_COMMAND_LEN => {
            let parsed = parse_command(text, current, min, max, rng);
            if parsed.is_none() {
                debug!("Ignoring numeric command {text:?}");
            }
            parsed
        }
        _ => None,
    }
}

/// In-place form of [`coerce_u8`]; returns whether the field was applied.
pub fn apply_u8(value: &Value, target: &mut u8, min: u8, max: u8, rng: &mut dyn RngCore) -> bool {
    match coerce_u8(value, *target, min, max, rng) {
        Some(v) => {
            *target = v;
            true
        }
        None => false,
    }
}

fn parse_command(text: &str, current: u8, min: u8, max: u8, rng: &mut dyn RngCore) -> Option<u8> {
    if text.starts_with('r') {
        if min > max {
            return None;
        }
        return Some(rng.gen_range(min..=max));
    }

    if let Some(rest) = text.strip_prefix('~') {
        return match rest {
            "" => Some(step_up(current, min, max)),
            "-" => Some(step_down(current, min, max)),
            delta => delta
                .parse::<i16>()
                .ok()
                .map(|d| add_saturating(current, d, min, max)),
        };
    }

    if text.starts_with('+') || text.starts_with('-') {
        return text
            .parse::<i16>()
            .ok()
            .map(|d| add_saturating(current, d, min, max));
    }

    text.parse::<u16>()
        .ok()
        .map(|n| u8::try_from(n).unwrap_or(u8::MAX))
}

const fn step_up(current: u8, min: u8, max: u8) -> u8 {
    if current >= max {
        min
    } else if current < min {
        min
    } else {
        current + 1
    }
}

const fn step_down(current: u8, min: u8, max: u8) -> u8 {
    if current <= min {
        max
    } else if current > max {
        max
    } else {
        current - 1
    }
}

fn add_saturating(current: u8, delta: i16, min: u8, max: u8) -> u8 {
    if delta == 0 {
        return current;
    }
    let sum = (i16::from(current) + delta).clamp(i16::from(min), i16::from(max.max(min)));
    u8::try_from(sum).unwrap_or(max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn coerce(value: Value, current: u8, min: u8, max: u8) -> Option<u8> {
        let mut rng = StdRng::seed_from_u64(7);
        coerce_u8(&value, current, min, max, &mut rng)
    }

    #[test]
    fn test_plain_integers() {
        assert_eq!(coerce(Value::Integer(42), 0, 0, 255), Some(42));
        assert_eq!(coerce(Value::Integer(0), 9, 1, 100), Some(0));
        assert_eq!(coerce(Value::Integer(999), 0, 0, 255), Some(255));
        assert_eq!(coerce(Value::Integer(-1), 5, 0, 255), None);
    }

    #[test]
    fn test_other_types_leave_value_alone() {
        assert_eq!(coerce(Value::Absent, 5, 0, 255), None);
        assert_eq!(coerce(Value::Boolean(true), 5, 0, 255), None);
        assert_eq!(coerce(Value::Float(3.5), 5, 0, 255), None);
        assert_eq!(coerce(Value::List(vec![]), 5, 0, 255), None);
    }

    #[test]
    fn test_absolute_text() {
        assert_eq!(coerce(Value::from("120"), 0, 0, 255), Some(120));
        assert_eq!(coerce(Value::from("abc"), 3, 0, 255), None);
        assert_eq!(coerce(Value::from(""), 3, 0, 255), None);
        assert_eq!(coerce(Value::from("12345678901"), 3, 0, 255), None);
    }

    #[test]
    fn test_step_wraps() {
        assert_eq!(coerce(Value::from("~"), 10, 1, 10), Some(1));
        assert_eq!(coerce(Value::from("~"), 4, 1, 10), Some(5));
        assert_eq!(coerce(Value::from("~-"), 1, 1, 10), Some(10));
        assert_eq!(coerce(Value::from("~-"), 4, 1, 10), Some(3));
    }

    #[test]
    fn test_relative_saturates() {
        assert_eq!(coerce(Value::from("~20"), 240, 0, 255), Some(255));
        assert_eq!(coerce(Value::from("~-50"), 30, 10, 255), Some(10));
        assert_eq!(coerce(Value::from("+5"), 30, 0, 255), Some(35));
        assert_eq!(coerce(Value::from("-5"), 30, 0, 255), Some(25));
        assert_eq!(coerce(Value::from("~0"), 30, 0, 255), Some(30));
        assert_eq!(coerce(Value::from("~x"), 30, 0, 255), None);
    }

    #[test]
    fn test_random_stays_in_bounds() {
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..200 {
            let v = coerce_u8(&Value::from("r"), 0, 3, 9, &mut rng).unwrap();
            assert!((3..=9).contains(&v), "{v} out of range");
        }
    }

    #[test]
    fn test_apply_in_place() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut speed = 100;
        assert!(apply_u8(&Value::from("~10"), &mut speed, 0, 255, &mut rng));
        assert_eq!(speed, 110);
        assert!(!apply_u8(&Value::Absent, &mut speed, 0, 255, &mut rng));
        assert_eq!(speed, 110);
    }
}

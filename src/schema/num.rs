use serde_json::Value;

use crate::error::{ErrorKind, ValidationError};

// tolerance for `multiple_of` on floats
const MULTIPLE_EPSILON: f64 = 1e-9;

#[derive(Clone, Debug, Default)]
pub struct NumRules {
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub exclusive_minimum: bool,
    pub exclusive_maximum: bool,
    pub multiple_of: Option<f64>,
}

/// Integers accept JSON numbers and numeric text. Integral floats (`3.0`,
/// `"3.0"`) are accepted, fractional ones are not.
pub(crate) fn coerce_int(raw: &Value) -> Result<i64, ValidationError> {
    let invalid = || ValidationError::invalid("Not a valid integer.");
    match raw {
        Value::Number(n) => match n.as_i64() {
            Some(i) => Ok(i),
            None => n.as_f64().and_then(integral).ok_or_else(invalid),
        },
        Value::String(s) => {
            let t = s.trim();
            if let Ok(i) = t.parse::<i64>() {
                return Ok(i);
            }
            t.parse::<f64>().ok().and_then(integral).ok_or_else(invalid)
        }
        _ => Err(invalid()),
    }
}

pub(crate) fn coerce_float(raw: &Value) -> Result<f64, ValidationError> {
    let invalid = || ValidationError::invalid("Not a valid number.");
    let x = match raw {
        Value::Number(n) => n.as_f64().ok_or_else(invalid)?,
        Value::String(s) => s.trim().parse::<f64>().map_err(|_| invalid())?,
        _ => return Err(invalid()),
    };
    if x.is_finite() { Ok(x) } else { Err(invalid()) }
}

// `i64::MAX as f64` rounds up to 2^63, which no i64 can hold
pub(super) fn integral(x: f64) -> Option<i64> {
    if x.is_finite() && x.fract() == 0.0 && x >= i64::MIN as f64 && x < i64::MAX as f64 {
        Some(x as i64)
    } else {
        None
    }
}

/// `1.0` prints as `1`, `0.5` as `0.5`.
pub(crate) fn fmt_bound(x: f64) -> String {
    match integral(x) {
        Some(i) => i.to_string(),
        None => x.to_string(),
    }
}

impl NumRules {
    pub(crate) fn check(&self, x: f64, err: &mut ValidationError) {
        if let Some(min) = self.minimum {
            if self.exclusive_minimum && x <= min {
                err.push_msg(ErrorKind::Minimum, format!("The value must be greater than {}.", fmt_bound(min)));
            } else if !self.exclusive_minimum && x < min {
                err.push_msg(ErrorKind::Minimum, format!("The value must be greater than or equal to {}.", fmt_bound(min)));
            }
        }
        if let Some(max) = self.maximum {
            if self.exclusive_maximum && x >= max {
                err.push_msg(ErrorKind::Maximum, format!("The value must be less than {}.", fmt_bound(max)));
            } else if !self.exclusive_maximum && x > max {
                err.push_msg(ErrorKind::Maximum, format!("The value must be less than or equal to {}.", fmt_bound(max)));
            }
        }
        if let Some(m) = self.multiple_of {
            if m != 0.0 && !is_multiple(x, m) {
                err.push_msg(ErrorKind::MultipleOf, format!("The value must be a multiple of {}.", fmt_bound(m)));
            }
        }
    }
}

fn is_multiple(x: f64, m: f64) -> bool {
    let q = x / m;
    (q - q.round()).abs() < MULTIPLE_EPSILON
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn integers_coerce_from_text_and_integral_floats() {
        assert_eq!(coerce_int(&json!(7)).unwrap(), 7);
        assert_eq!(coerce_int(&json!("7")).unwrap(), 7);
        assert_eq!(coerce_int(&json!(" -3 ")).unwrap(), -3);
        assert_eq!(coerce_int(&json!(3.0)).unwrap(), 3);
        assert_eq!(coerce_int(&json!("1.0")).unwrap(), 1);
        let err = coerce_int(&json!("1.1")).unwrap_err();
        assert_eq!(err.to_string(), "Not a valid integer.");
        assert!(coerce_int(&json!(true)).is_err());
    }

    #[test]
    fn integers_past_i64_are_rejected_not_clamped() {
        let two_pow_63 = json!(9223372036854775808u64);
        assert_eq!(coerce_int(&two_pow_63).unwrap_err().to_string(), "Not a valid integer.");
        assert_eq!(coerce_int(&json!("9223372036854775808")).unwrap_err().to_string(), "Not a valid integer.");
        assert_eq!(coerce_int(&json!(9.3e18)).unwrap_err().to_string(), "Not a valid integer.");
        assert_eq!(coerce_int(&json!(i64::MAX)).unwrap(), i64::MAX);
        assert_eq!(coerce_int(&json!("-9223372036854775808")).unwrap(), i64::MIN);
    }

    #[test]
    fn floats_reject_non_finite_text() {
        assert_eq!(coerce_float(&json!("2.5")).unwrap(), 2.5);
        assert!(coerce_float(&json!("inf")).is_err());
        assert!(coerce_float(&json!("NaN")).is_err());
    }

    #[test]
    fn bounds_respect_exclusivity() {
        let inclusive = NumRules { minimum: Some(1.0), maximum: Some(10.0), ..NumRules::default() };
        let mut err = ValidationError::new();
        inclusive.check(1.0, &mut err);
        inclusive.check(10.0, &mut err);
        assert!(err.is_empty());

        let exclusive = NumRules { exclusive_minimum: true, exclusive_maximum: true, ..inclusive };
        let mut err = ValidationError::new();
        exclusive.check(1.0, &mut err);
        exclusive.check(10.0, &mut err);
        let texts: Vec<_> = err.messages().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["The value must be greater than 1.", "The value must be less than 10."]);
    }

    #[test]
    fn multiple_of_tolerates_float_noise() {
        let rules = NumRules { multiple_of: Some(0.1), ..NumRules::default() };
        let mut err = ValidationError::new();
        rules.check(0.3, &mut err);
        assert!(err.is_empty());
        rules.check(0.35, &mut err);
        assert_eq!(err.to_string(), "The value must be a multiple of 0.1.");
    }
}

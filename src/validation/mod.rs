use bigdecimal::BigDecimal;
use std::fmt;

pub const ORDER_ID_MAX_LEN: usize = 64;
pub const AMOUNT_MAX_SCALE: i64 = 2;
/// `NUMERIC(10, 2)` leaves eight integer digits.
pub const AMOUNT_MAX_INTEGER_DIGITS: u64 = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

pub type ValidationResult = Result<(), ValidationError>;

pub fn validate_required(field: &'static str, value: &str) -> ValidationResult {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }

    Ok(())
}

pub fn validate_max_len(field: &'static str, value: &str, max_len: usize) -> ValidationResult {
    if value.len() > max_len {
        return Err(ValidationError::new(
            field,
            format!("must be at most {} characters", max_len),
        ));
    }

    Ok(())
}

/// PayPal order ids are short alphanumeric tokens. Anything else is rejected
/// before it is spliced into the provider URL.
pub fn validate_order_id(order_id: &str) -> ValidationResult {
    validate_required("order_id", order_id)?;
    validate_max_len("order_id", order_id, ORDER_ID_MAX_LEN)?;

    if !order_id
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_')
    {
        return Err(ValidationError::new(
            "order_id",
            "must contain only letters, digits, '-' and '_'",
        ));
    }

    Ok(())
}

pub fn validate_total_amount(amount: &BigDecimal) -> ValidationResult {
    if amount < &BigDecimal::from(0) {
        return Err(ValidationError::new("total_amount", "must not be negative"));
    }

    let (_, scale) = amount.as_bigint_and_exponent();
    if scale > AMOUNT_MAX_SCALE {
        return Err(ValidationError::new(
            "total_amount",
            format!("must have at most {} fractional digits", AMOUNT_MAX_SCALE),
        ));
    }

    if amount.with_scale(0).digits() > AMOUNT_MAX_INTEGER_DIGITS {
        return Err(ValidationError::new(
            "total_amount",
            format!("must have at most {} integer digits", AMOUNT_MAX_INTEGER_DIGITS),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn validates_required_field() {
        assert!(validate_required("field", "value").is_ok());
        assert!(validate_required("field", "   ").is_err());
    }

    #[test]
    fn validates_max_len() {
        assert!(validate_max_len("field", "abc", 3).is_ok());
        assert!(validate_max_len("field", "abcd", 3).is_err());
    }

    #[test]
    fn validates_order_id() {
        assert!(validate_order_id("ORDER123").is_ok());
        assert!(validate_order_id("5O190127TN364715T").is_ok());
        assert!(validate_order_id("").is_err());
        assert!(validate_order_id("../v1/oauth2/token").is_err());
        assert!(validate_order_id("ORDER 123").is_err());
        assert!(validate_order_id(&"A".repeat(65)).is_err());
    }

    #[test]
    fn validates_total_amount() {
        let valid = BigDecimal::from_str("12.50").expect("valid decimal");
        let zero = BigDecimal::from(0);
        let negative = BigDecimal::from_str("-0.01").expect("valid decimal");
        let too_precise = BigDecimal::from_str("1.005").expect("valid decimal");
        let too_large = BigDecimal::from_str("123456789.00").expect("valid decimal");

        assert!(validate_total_amount(&valid).is_ok());
        assert!(validate_total_amount(&zero).is_ok());
        assert!(validate_total_amount(&negative).is_err());
        assert!(validate_total_amount(&too_precise).is_err());
        assert!(validate_total_amount(&too_large).is_err());
    }

    #[test]
    fn validation_error_display() {
        let error = ValidationError::new("order_id", "must not be empty");
        assert_eq!(error.to_string(), "order_id: must not be empty");
    }
}

//! Validation utilities applied at service boundaries before any business logic runs

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::error::{DomainError, DomainResult};
use crate::models::OrderLine;
use crate::types::is_week_start;

/// Maximum length accepted for item, ingredient and customer names
pub const MAX_NAME_LENGTH: usize = 120;

/// Largest quantity accepted for a stock level, purchase or recipe ratio
pub const MAX_QUANTITY: i64 = 1_000_000_000;

/// Largest unit price or unit cost accepted
pub const MAX_UNIT_PRICE: i64 = 1_000_000_000;

// ============================================================================
// General Validations
// ============================================================================

/// Validate a menu item, ingredient or customer name
pub fn validate_name(field: &str, name: &str) -> DomainResult<()> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation(field, "must not be empty"));
    }
    if trimmed.len() > MAX_NAME_LENGTH {
        return Err(DomainError::validation(
            field,
            format!("must be at most {} characters", MAX_NAME_LENGTH),
        ));
    }
    Ok(())
}

/// Validate that a stock or purchase quantity is strictly positive and bounded
pub fn validate_positive_quantity(field: &str, quantity: Decimal) -> DomainResult<()> {
    if quantity <= Decimal::ZERO {
        return Err(DomainError::validation(field, "must be positive"));
    }
    if quantity > Decimal::from(MAX_QUANTITY) {
        return Err(DomainError::validation(
            field,
            format!("must be at most {}", MAX_QUANTITY),
        ));
    }
    Ok(())
}

/// Validate a unit price or unit cost: zero allowed, negative and oversized refused
pub fn validate_unit_price(field: &str, price: Decimal) -> DomainResult<()> {
    if price < Decimal::ZERO {
        return Err(DomainError::validation(field, "must not be negative"));
    }
    if price > Decimal::from(MAX_UNIT_PRICE) {
        return Err(DomainError::validation(
            field,
            format!("must be at most {}", MAX_UNIT_PRICE),
        ));
    }
    Ok(())
}

// ============================================================================
// Checked Arithmetic
// ============================================================================

fn overflow(field: &str) -> DomainError {
    DomainError::validation(field, "value is too large")
}

/// `a * b`, or a validation error on `field` when the result does not fit
pub fn checked_product(field: &str, a: Decimal, b: Decimal) -> DomainResult<Decimal> {
    a.checked_mul(b).ok_or_else(|| overflow(field))
}

/// `a + b`, or a validation error on `field` when the result does not fit
pub fn checked_sum(field: &str, a: Decimal, b: Decimal) -> DomainResult<Decimal> {
    a.checked_add(b).ok_or_else(|| overflow(field))
}

/// Sum of all values, failing on `field` instead of overflowing
pub fn checked_total<I>(field: &str, values: I) -> DomainResult<Decimal>
where
    I: IntoIterator<Item = Decimal>,
{
    values
        .into_iter()
        .try_fold(Decimal::ZERO, |acc, v| checked_sum(field, acc, v))
}

/// Validate that a week identifier is the Monday starting an ISO week
pub fn validate_week_start(week_start: NaiveDate) -> DomainResult<()> {
    if !is_week_start(week_start) {
        return Err(DomainError::validation(
            "week_start",
            format!("{} is not a Monday", week_start),
        ));
    }
    Ok(())
}

// ============================================================================
// Order Validations
// ============================================================================

/// Validate the lines of an incoming order
pub fn validate_order_lines(lines: &[OrderLine]) -> DomainResult<()> {
    if lines.is_empty() {
        return Err(DomainError::validation("lines", "order must contain at least one item"));
    }
    for (idx, line) in lines.iter().enumerate() {
        validate_name(&format!("lines[{}].item", idx), &line.item)?;
        if line.quantity <= 0 {
            return Err(DomainError::validation(
                format!("lines[{}].quantity", idx),
                "must be positive",
            ));
        }
        validate_unit_price(&format!("lines[{}].unit_price", idx), line.unit_price)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(item: &str, quantity: i32, price: i64) -> OrderLine {
        OrderLine {
            item: item.to_string(),
            quantity,
            unit_price: Decimal::from(price),
        }
    }

    #[test]
    fn test_validate_order_lines_valid() {
        assert!(validate_order_lines(&[line("Latte", 2, 30000), line("capucino", 1, 0)]).is_ok());
    }

    #[test]
    fn test_validate_order_lines_empty() {
        let err = validate_order_lines(&[]).unwrap_err();
        assert!(matches!(err, DomainError::Validation { ref field, .. } if field == "lines"));
    }

    #[test]
    fn test_validate_order_lines_non_positive_quantity() {
        let err = validate_order_lines(&[line("Latte", 1, 10), line("Latte", 0, 10)]).unwrap_err();
        assert_eq!(
            err,
            DomainError::validation("lines[1].quantity", "must be positive")
        );
    }

    #[test]
    fn test_validate_order_lines_negative_price() {
        assert!(validate_order_lines(&[line("Latte", 1, -5)]).is_err());
    }

    #[test]
    fn test_validate_order_lines_price_too_large() {
        let huge = OrderLine {
            item: "Latte".to_string(),
            quantity: 2,
            unit_price: Decimal::MAX,
        };
        let err = validate_order_lines(&[huge]).unwrap_err();
        assert!(matches!(err, DomainError::Validation { ref field, .. } if field == "lines[0].unit_price"));
        assert!(validate_order_lines(&[line("Latte", 1, MAX_UNIT_PRICE)]).is_ok());
    }

    #[test]
    fn test_checked_arithmetic_reports_overflow() {
        assert_eq!(
            checked_product("total", Decimal::from(3), Decimal::from(4)).unwrap(),
            Decimal::from(12)
        );
        assert_eq!(
            checked_product("total", Decimal::MAX, Decimal::TWO).unwrap_err(),
            DomainError::validation("total", "value is too large")
        );
        assert!(checked_sum("total", Decimal::MAX, Decimal::ONE).is_err());
        assert!(checked_total("total", [Decimal::MAX, Decimal::ONE]).is_err());
        assert_eq!(
            checked_total("total", [Decimal::ONE, Decimal::TWO]).unwrap(),
            Decimal::from(3)
        );
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("item", "Latte").is_ok());
        assert!(validate_name("item", "   ").is_err());
        assert!(validate_name("item", &"x".repeat(MAX_NAME_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_validate_week_start() {
        let monday = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let tuesday = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        assert!(validate_week_start(monday).is_ok());
        assert!(validate_week_start(tuesday).is_err());
    }

    #[test]
    fn test_validate_positive_quantity() {
        assert!(validate_positive_quantity("quantity", Decimal::ONE).is_ok());
        assert!(validate_positive_quantity("quantity", Decimal::ZERO).is_err());
        assert!(validate_positive_quantity("quantity", Decimal::NEGATIVE_ONE).is_err());
        assert!(validate_positive_quantity("quantity", Decimal::from(MAX_QUANTITY)).is_ok());
        assert!(validate_positive_quantity("quantity", Decimal::from(MAX_QUANTITY + 1)).is_err());
    }
}

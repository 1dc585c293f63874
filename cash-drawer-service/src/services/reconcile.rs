//! Reconciliation calculator.
//!
//! Pure functions shared by the live close path and the backfill job. The
//! two paths must never diverge on expected/variance, so both call through
//! here and nowhere else.

use rust_decimal::Decimal;

use crate::models::{CashMovement, MovementType, TenderMethod};

/// Two-decimal-currency epsilon for the explanation-required policy: a
/// close whose absolute variance exceeds this requires notes.
pub const VARIANCE_EPSILON: Decimal = Decimal::from_parts(9, 0, 0, false, 3);

/// Normalize a money value to two fractional digits.
pub fn normalize(amount: Decimal) -> Decimal {
    amount.round_dp(2)
}

/// Expected physical cash at close:
/// `opening + sum(cash inflows) - sum(cash outflows)`.
///
/// Cash-method movements only. Card, mobile-money and bank-transfer rows
/// recorded under the same session do not need counting and never affect
/// drawer variance.
pub fn expected_cash(opening_amount: Decimal, cash_in: Decimal, cash_out: Decimal) -> Decimal {
    normalize(opening_amount + cash_in - cash_out)
}

/// Like [`expected_cash`] but summing a slice of movements directly. Used
/// where the caller already holds the rows rather than store aggregates.
pub fn expected_cash_from_movements(opening_amount: Decimal, movements: &[CashMovement]) -> Decimal {
    let mut cash_in = Decimal::ZERO;
    let mut cash_out = Decimal::ZERO;
    for movement in movements {
        if movement.parsed_method() != Some(TenderMethod::Cash) {
            continue;
        }
        match movement.parsed_type() {
            Some(MovementType::Inflow) => cash_in += movement.amount,
            Some(MovementType::Outflow) => cash_out += movement.amount,
            None => {}
        }
    }
    expected_cash(opening_amount, cash_in, cash_out)
}

/// `closing - expected`, or `None` when no closing count exists yet.
pub fn variance(closing_amount: Option<Decimal>, expected: Decimal) -> Option<Decimal> {
    closing_amount.map(|closing| normalize(closing - expected))
}

/// Whether a variance is large enough to require an operator explanation.
pub fn requires_explanation(variance: Decimal) -> bool {
    variance.abs() > VARIANCE_EPSILON
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn movement(movement_type: MovementType, method: TenderMethod, amount: i64) -> CashMovement {
        CashMovement {
            movement_id: Uuid::new_v4(),
            session_id: None,
            movement_type: movement_type.as_str().to_string(),
            method: Some(method.as_str().to_string()),
            amount: Decimal::new(amount, 2),
            reason: None,
            payment_id: None,
            refund_id: None,
            created_by: None,
            created_utc: Utc::now(),
        }
    }

    #[test]
    fn epsilon_is_nine_thousandths() {
        assert_eq!(VARIANCE_EPSILON.to_string(), "0.009");
    }

    #[test]
    fn expected_is_opening_plus_cash_in_minus_cash_out() {
        let expected = expected_cash(
            Decimal::new(100_000_00, 2),
            Decimal::new(50_000_00, 2),
            Decimal::new(20_000_00, 2),
        );
        assert_eq!(expected, Decimal::new(130_000_00, 2));
    }

    #[test]
    fn non_cash_movements_are_excluded() {
        let movements = vec![
            movement(MovementType::Inflow, TenderMethod::Cash, 50_000_00),
            movement(MovementType::Inflow, TenderMethod::Card, 99_999_00),
            movement(MovementType::Outflow, TenderMethod::Cash, 20_000_00),
            movement(MovementType::Outflow, TenderMethod::BankTransfer, 1_00),
        ];
        let expected = expected_cash_from_movements(Decimal::new(100_000_00, 2), &movements);
        assert_eq!(expected, Decimal::new(130_000_00, 2));
    }

    #[test]
    fn variance_is_null_without_closing_count() {
        assert_eq!(variance(None, Decimal::new(130_000_00, 2)), None);
        assert_eq!(
            variance(Some(Decimal::new(130_500_00, 2)), Decimal::new(130_000_00, 2)),
            Some(Decimal::new(500_00, 2))
        );
    }

    #[test]
    fn explanation_policy_boundary() {
        assert!(!requires_explanation(Decimal::ZERO));
        assert!(!requires_explanation(Decimal::new(9, 3))); // exactly 0.009
        assert!(requires_explanation(Decimal::new(1, 2))); // 0.01
        assert!(requires_explanation(Decimal::new(-1, 2)));
    }

    #[test]
    fn order_independent_sum() {
        let mut movements = vec![
            movement(MovementType::Inflow, TenderMethod::Cash, 1_25),
            movement(MovementType::Outflow, TenderMethod::Cash, 75),
            movement(MovementType::Inflow, TenderMethod::Cash, 10_00),
        ];
        let forward = expected_cash_from_movements(Decimal::new(5_00, 2), &movements);
        movements.reverse();
        let backward = expected_cash_from_movements(Decimal::new(5_00, 2), &movements);
        assert_eq!(forward, backward);
        assert_eq!(forward, Decimal::new(15_50, 2));
    }
}

//! Freight apportionment for purchase posting.
//!
//! This is the only place money is divided. Shares are rounded half-up per
//! line; lot unit costs come out as whole minor units, so the allocation
//! engine downstream only ever multiplies and adds.

use crate::domain::Money;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LandedCostError {
    #[error("purchase line values overflow")]
    WeightOverflow,
    #[error("freight share overflows")]
    ShareOverflow,
}

fn round_half_up(value: Decimal) -> Result<i64, LandedCostError> {
    value
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or(LandedCostError::ShareOverflow)
}

/// Split `total` across lines proportionally to `weights`, each share rounded
/// half-up independently.
///
/// Because every line is rounded on its own, the shares may differ from
/// `total` by a few minor units. When all weights are zero the total is split
/// evenly by line count.
pub fn apportion_half_up(total: Money, weights: &[Money]) -> Result<Vec<Money>, LandedCostError> {
    if weights.is_empty() {
        return Ok(Vec::new());
    }

    let total = Decimal::from(total.minor_units());
    let weight_sum = weights
        .iter()
        .try_fold(0i64, |acc, w| acc.checked_add(w.minor_units()))
        .ok_or(LandedCostError::WeightOverflow)?;

    if weight_sum == 0 {
        let even = total
            .checked_div(Decimal::from(weights.len() as i64))
            .ok_or(LandedCostError::ShareOverflow)?;
        let share = Money::new(round_half_up(even)?);
        return Ok(vec![share; weights.len()]);
    }

    let weight_sum = Decimal::from(weight_sum);
    weights
        .iter()
        .map(|w| {
            let share = total
                .checked_mul(Decimal::from(w.minor_units()))
                .and_then(|v| v.checked_div(weight_sum))
                .ok_or(LandedCostError::ShareOverflow)?;
            round_half_up(share).map(Money::new)
        })
        .collect()
}

/// Per-unit part of a line's share, rounded half-up. `qty` must be positive.
pub fn per_unit_half_up(share: Money, qty: i64) -> Result<Money, LandedCostError> {
    if qty <= 0 {
        return Ok(Money::zero());
    }
    let unit = Decimal::from(share.minor_units())
        .checked_div(Decimal::from(qty))
        .ok_or(LandedCostError::ShareOverflow)?;
    round_half_up(unit).map(Money::new)
}

use chrono::{DateTime, Utc};

use crate::{
    core::{
        consumption::ConsumptionPeriod,
        rate::{PaymentMethod, RatePeriod},
    },
    prelude::*,
    quantity::{cost::Cost, energy::KilowattHours, rate::KilowattHourRate},
};

#[derive(Debug, thiserror::Error)]
#[error("no rate covers the period ending at {read_at}")]
pub struct RateNotFound {
    pub read_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PeriodCost {
    pub read_at: DateTime<Utc>,
    pub energy: KilowattHours,
    pub rate: KilowattHourRate,
    pub cost: Cost,
}

/// Cost every consumption period with the rate in effect at its end.
///
/// The first matching rate in the provider order wins. Overlapping rates should not happen,
/// and are only logged. A single uncovered period fails the whole calculation.
pub fn calculate_cost(
    consumption: &[ConsumptionPeriod],
    rates: &[RatePeriod],
    payment_method: PaymentMethod,
) -> Result<Vec<PeriodCost>, RateNotFound> {
    consumption
        .iter()
        .map(|period| {
            let mut matching =
                rates.iter().filter(|rate| rate.applies_to(period.read_at, payment_method));
            let rate = matching.next().ok_or(RateNotFound { read_at: period.read_at })?;
            if matching.next().is_some() {
                warn!(read_at = %period.read_at, rate = ?rate.value, "overlapping rates, using the first one");
            }
            Ok(PeriodCost {
                read_at: period.read_at,
                energy: period.energy,
                rate: rate.value,
                cost: (period.energy * rate.value).round_to_ten_thousandths(),
            })
        })
        .collect()
}

/// Sum of the already rounded period costs.
pub fn total_cost(period_costs: &[PeriodCost]) -> Cost {
    period_costs.iter().map(|period_cost| period_cost.cost).sum()
}

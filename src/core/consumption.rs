use chrono::{DateTime, Utc};

use crate::quantity::{cost::Cost, energy::KilowattHours};

/// Smart meter reading for one period.
#[derive(Clone, Debug, PartialEq)]
pub struct ConsumptionPeriod {
    /// End of the period.
    pub read_at: DateTime<Utc>,

    pub energy: KilowattHours,

    /// Cost already billed under the current tariff, tax included.
    pub billed_cost: Option<Cost>,
}

impl ConsumptionPeriod {
    pub fn from_watt_hours(read_at: DateTime<Utc>, watt_hours: f64, billed_cost: Option<Cost>) -> Self {
        Self { read_at, energy: KilowattHours::from_watt_hours(watt_hours), billed_cost }
    }
}

pub fn total_energy(periods: &[ConsumptionPeriod]) -> KilowattHours {
    periods.iter().map(|period| period.energy).sum()
}

/// Missing billed costs count as zero.
pub fn total_billed_cost(periods: &[ConsumptionPeriod]) -> Cost {
    periods.iter().filter_map(|period| period.billed_cost).sum()
}

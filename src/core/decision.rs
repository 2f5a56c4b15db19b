use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::{core::comparison::ComparisonResult, quantity::cost::Cost};

/// Switch only to a different tariff, and only when the savings strictly exceed the threshold.
pub fn should_switch(result: &ComparisonResult, threshold: Cost) -> bool {
    result.cheapest.is_some_and(|cheapest| cheapest != result.current.tariff)
        && result.potential_savings > threshold
}

/// What happened to the switch during the run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SwitchOutcome {
    /// No switch was due.
    NotDue,

    /// A switch was due but the run is a dry run.
    Suppressed,

    /// Switched; unverified switches still count.
    Switched { verified: bool },

    Failed(String),
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Switched,
    NotSwitched,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reason {
    AlreadyCheapest,
    ThresholdNotMet,
    DryRun,
    Error,
}

impl Display for Reason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::AlreadyCheapest => "already on the cheapest tariff",
            Self::ThresholdNotMet => "savings below the threshold",
            Self::DryRun => "dry run",
            Self::Error => "switch failed",
        })
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Decision {
    pub action: Action,

    /// `None` for a successful switch.
    pub reason: Option<Reason>,
}

impl Decision {
    /// Classify the run: an error beats a dry run, which beats the comparison outcome.
    pub fn classify(result: &ComparisonResult, outcome: &SwitchOutcome) -> Self {
        let (action, reason) = match outcome {
            SwitchOutcome::Failed(_) => (Action::NotSwitched, Some(Reason::Error)),
            SwitchOutcome::Switched { .. } => (Action::Switched, None),
            SwitchOutcome::Suppressed => (Action::NotSwitched, Some(Reason::DryRun)),
            SwitchOutcome::NotDue if result.is_current_cheapest() => {
                (Action::NotSwitched, Some(Reason::AlreadyCheapest))
            }
            SwitchOutcome::NotDue => (Action::NotSwitched, Some(Reason::ThresholdNotMet)),
        };
        Self { action, reason }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        core::{
            comparison::{CostBreakdown, Quote, TariffComparison},
            tariff::Tariff,
        },
        quantity::energy::KilowattHours,
        testing::tariff,
    };

    fn comparison(tariff: Tariff, total: f64) -> TariffComparison {
        TariffComparison {
            tariff,
            outcome: Ok(Quote {
                breakdown: CostBreakdown::new(
                    Cost::from_pence(total),
                    Cost::ZERO,
                    KilowattHours::from(10.0),
                ),
                product_code: None,
            }),
        }
    }

    fn result(cheapest: Option<Tariff>, savings: f64) -> ComparisonResult {
        ComparisonResult {
            current: comparison(tariff("flexible"), 500.0),
            alternatives: vec![comparison(tariff("go"), 300.0), comparison(tariff("agile"), 498.0)],
            cheapest,
            potential_savings: Cost::from_pence(savings),
        }
    }

    #[test]
    fn test_switch_when_savings_exceed_threshold() {
        let result = result(Some(tariff("go")), 200.0);
        assert!(should_switch(&result, Cost::from_pence(2.0)));
    }

    #[test]
    fn test_threshold_is_strict() {
        let result = result(Some(tariff("agile")), 2.0);
        assert!(!should_switch(&result, Cost::from_pence(2.0)));
        assert_eq!(
            Decision::classify(&result, &SwitchOutcome::NotDue),
            Decision { action: Action::NotSwitched, reason: Some(Reason::ThresholdNotMet) },
        );
    }

    #[test]
    fn test_already_cheapest() {
        let result = result(Some(tariff("flexible")), 0.0);
        assert!(!should_switch(&result, Cost::ZERO));
        assert!(!should_switch(&result, Cost::from_pence(-1.0)));
        assert_eq!(
            Decision::classify(&result, &SwitchOutcome::NotDue).reason,
            Some(Reason::AlreadyCheapest),
        );
    }

    #[test]
    fn test_no_cheapest() {
        let result = result(None, 0.0);
        assert!(!should_switch(&result, Cost::from_pence(-100.0)));
    }

    #[test]
    fn test_reason_priority() {
        let result = result(Some(tariff("go")), 200.0);
        assert_eq!(
            Decision::classify(&result, &SwitchOutcome::Failed("boom".into())),
            Decision { action: Action::NotSwitched, reason: Some(Reason::Error) },
        );
        assert_eq!(
            Decision::classify(&result, &SwitchOutcome::Suppressed),
            Decision { action: Action::NotSwitched, reason: Some(Reason::DryRun) },
        );
        assert_eq!(
            Decision::classify(&result, &SwitchOutcome::Switched { verified: false }),
            Decision { action: Action::Switched, reason: None },
        );
    }
}

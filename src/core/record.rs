use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

use crate::{
    core::{
        comparison::{ComparisonResult, TariffComparison},
        decision::{Action, Decision, Reason},
    },
    prelude::*,
    quantity::{cost::Cost, energy::KilowattHours},
};

/// Summary of a single run, persisted for inspection by external tools.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub decision: DecisionSummary,
    pub datetime: DateTime<Utc>,
    pub total_consumption_kwh: KilowattHours,

    /// Identifier of the tariff the account was on when the run started.
    pub current_tariff: String,

    pub comparisons: Vec<TariffSnapshot>,
}

#[skip_serializing_none]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DecisionSummary {
    pub action: Action,
    pub reason: Option<Reason>,
    pub dry_run: bool,
    pub savings_pence: Cost,
    pub threshold_pence: Cost,
    pub cheapest_tariff_id: Option<String>,

    /// Tariff switched to, if any.
    pub chosen_tariff_id: Option<String>,

    /// Cost of the day on the tariff the account ends up on.
    pub cost_today: Option<Cost>,
}

#[skip_serializing_none]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TariffSnapshot {
    pub id: String,
    pub name: String,
    pub valid: bool,
    pub total_pence: Option<Cost>,
    pub consumption_pence: Option<Cost>,
    pub standing_pence: Option<Cost>,
    pub error: Option<String>,
}

impl From<&TariffComparison> for TariffSnapshot {
    fn from(comparison: &TariffComparison) -> Self {
        let breakdown = comparison.breakdown();
        Self {
            id: comparison.tariff.id.to_string(),
            name: comparison.tariff.display_name.to_string(),
            valid: comparison.is_valid(),
            total_pence: breakdown.map(|breakdown| breakdown.total_cost),
            consumption_pence: breakdown.map(|breakdown| breakdown.consumption_cost),
            standing_pence: breakdown.map(|breakdown| breakdown.standing_charge),
            error: comparison.error().map(ToString::to_string),
        }
    }
}

impl DecisionRecord {
    pub fn new(
        datetime: DateTime<Utc>,
        result: &ComparisonResult,
        decision: Decision,
        dry_run: bool,
        threshold: Cost,
    ) -> Self {
        let chosen = result.cheapest.filter(|_| decision.action == Action::Switched);
        let cost_today = chosen
            .and_then(|tariff| result.get(&tariff))
            .unwrap_or(&result.current)
            .total_cost();
        Self {
            decision: DecisionSummary {
                action: decision.action,
                reason: decision.reason,
                dry_run,
                savings_pence: result.potential_savings,
                threshold_pence: threshold,
                cheapest_tariff_id: result.cheapest.map(|tariff| tariff.id.to_string()),
                chosen_tariff_id: chosen.map(|tariff| tariff.id.to_string()),
                cost_today,
            },
            datetime,
            total_consumption_kwh: result
                .current
                .breakdown()
                .map_or(KilowattHours::ZERO, |breakdown| breakdown.total_energy),
            current_tariff: result.current.tariff.id.to_string(),
            comparisons: result.all().map(TariffSnapshot::from).collect(),
        }
    }
}

pub trait RunRecorder: Sync {
    fn persist(&self, record: &DecisionRecord) -> Result;
}

/// Keeps the latest record in a JSON file.
pub struct JsonFileRecorder {
    path: PathBuf,
}

impl JsonFileRecorder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the latest record, `None` when no run has been recorded yet.
    pub fn load(&self) -> Result<Option<DecisionRecord>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(None),
            Err(error) => {
                return Err(error).with_context(|| format!("failed to read `{}`", self.path.display()));
            }
        };
        serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse `{}`", self.path.display()))
            .map(Some)
    }
}

impl RunRecorder for JsonFileRecorder {
    #[instrument(skip_all, fields(path = %self.path.display()))]
    fn persist(&self, record: &DecisionRecord) -> Result {
        let contents = serde_json::to_string_pretty(record)?;
        let temporary_path = self.path.with_extension("json.tmp");
        fs::write(&temporary_path, contents)
            .with_context(|| format!("failed to write `{}`", temporary_path.display()))?;
        fs::rename(&temporary_path, &self.path)
            .with_context(|| format!("failed to replace `{}`", self.path.display()))?;
        info!("saved the decision record");
        Ok(())
    }
}

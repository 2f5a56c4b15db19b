use chrono::Local;
use clap::{Parser, Subcommand};

use crate::{
    api::{AccountProvider, RateProvider},
    cli::octopus::OctopusApiArgs,
    core::{account::Region, record::JsonFileRecorder, tariff::Tariff},
    prelude::*,
    tables::{build_consumption_table, build_rates_table},
};

#[derive(Parser)]
pub struct BurrowArgs {
    #[command(subcommand)]
    command: BurrowCommand,
}

impl BurrowArgs {
    pub async fn run(self) -> Result {
        match self.command {
            BurrowCommand::Rates(args) => args.run().await,
            BurrowCommand::Account(args) => args.run().await,
            BurrowCommand::LastRun(args) => args.run(),
        }
    }
}

#[derive(Subcommand)]
enum BurrowCommand {
    /// Print today's rates of a tariff.
    Rates(BurrowRatesArgs),

    /// Print the account snapshot used for the comparison.
    Account(BurrowAccountArgs),

    /// Print the last decision record.
    LastRun(BurrowLastRunArgs),
}

#[derive(Parser)]
struct BurrowRatesArgs {
    #[clap(flatten)]
    octopus: OctopusApiArgs,

    /// Tariff ID, for example `agile`.
    #[clap(long)]
    tariff: String,

    /// Region code, taken from the account when omitted.
    #[clap(long)]
    region: Option<char>,
}

impl BurrowRatesArgs {
    #[instrument(skip_all, fields(tariff = %self.tariff))]
    async fn run(self) -> Result {
        let tariff = Tariff::lookup(&self.tariff)
            .with_context(|| format!("unknown tariff `{}`", self.tariff))?;
        let api = self.octopus.connect()?;
        let today = Local::now().date_naive();
        let region = match self.region {
            Some(code) => Region::try_from(code)?,
            None => api.get_snapshot(today).await?.region,
        };
        let schedule = api.get_rates(tariff.api_display_name, region, today).await?;
        info!(
            product_code = %schedule.product_code,
            %region,
            standing_charge = %schedule.standing_charge,
            "gotcha",
        );
        println!("{}", build_rates_table(&schedule));
        Ok(())
    }
}

#[derive(Parser)]
struct BurrowAccountArgs {
    #[clap(flatten)]
    octopus: OctopusApiArgs,
}

impl BurrowAccountArgs {
    #[instrument(skip_all)]
    async fn run(self) -> Result {
        let snapshot = self.octopus.connect()?.get_snapshot(Local::now().date_naive()).await?;
        info!(
            current_tariff = snapshot.current_tariff.id,
            tariff_code = %snapshot.tariff_code,
            region = %snapshot.region,
            standing_charge = %snapshot.standing_charge,
            meter_id = ?snapshot.meter_id,
            "gotcha",
        );
        println!("{}", build_consumption_table(&snapshot));
        Ok(())
    }
}

#[derive(Parser)]
struct BurrowLastRunArgs {
    #[clap(long, env = "LAST_RUN_PATH", default_value = "last_run.json")]
    path: std::path::PathBuf,
}

impl BurrowLastRunArgs {
    fn run(self) -> Result {
        let recorder = JsonFileRecorder::new(self.path);
        match recorder.load()? {
            Some(record) => println!("{}", serde_json::to_string_pretty(&record)?),
            None => warn!(path = %recorder.path().display(), "no run has been recorded yet"),
        }
        Ok(())
    }
}

use std::time::Duration;

use chrono::{DateTime, Days, Local, NaiveTime, TimeZone};
use clap::Parser;
use rand::Rng;

use crate::{cli::run::RunArgs, core::shutdown::Shutdown, prelude::*};

#[derive(Parser)]
pub struct DaemonArgs {
    #[clap(flatten)]
    run: RunArgs,

    /// Local time of the daily run, `HH:MM`.
    #[clap(long, env = "EXECUTION_TIME", default_value = "23:00", value_parser = parse_time)]
    execution_time: NaiveTime,

    /// Upper bound of the random delay added to the execution time.
    #[clap(long, env = "MAX_JITTER", default_value = "10min")]
    max_jitter: humantime::Duration,
}

impl DaemonArgs {
    pub async fn run(self) -> Result {
        let shutdown = Shutdown::register()?;
        let api = self.run.octopus.connect()?;
        let notifications = self.run.notifications.service()?;
        let max_jitter: Duration = self.max_jitter.into();
        info!(execution_time = %self.execution_time, max_jitter = %self.max_jitter, "scheduled");

        loop {
            let now = Local::now();
            let next_run = next_run(&now, self.execution_time)
                .with_context(|| format!("cannot schedule the run at {}", self.execution_time))?;
            let jitter = rand::rng().random_range(Duration::ZERO..=max_jitter);
            info!(%next_run, ?jitter, "sleeping until the next run…");
            let delay = (next_run - now).to_std().unwrap_or_default() + jitter;
            if shutdown.sleep(delay).await.is_err() {
                break;
            }
            if let Err(error) = self.run.run_once(&api, &notifications, &shutdown).await {
                error!("the run has failed: {error:#}");
            }
            if shutdown.is_requested() {
                break;
            }
        }

        info!("stopped");
        Ok(())
    }
}

fn parse_time(value: &str) -> Result<NaiveTime, chrono::ParseError> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
}

/// The first occurrence of the local time strictly after `now`.
///
/// Skips a day when the time does not exist because of a daylight saving transition.
fn next_run<Tz: TimeZone>(now: &DateTime<Tz>, at: NaiveTime) -> Option<DateTime<Tz>> {
    let timezone = now.timezone();
    (0..=2)
        .filter_map(|n_days| now.date_naive().checked_add_days(Days::new(n_days)))
        .filter_map(|date| timezone.from_local_datetime(&date.and_time(at)).earliest())
        .find(|candidate| candidate > now)
}

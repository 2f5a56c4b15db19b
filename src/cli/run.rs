use chrono::Local;
use clap::Parser;

use crate::{
    api::octopus::Api,
    bot::Bot,
    cli::{
        bot::BotArgs,
        heartbeat::HeartbeatArgs,
        notifications::NotificationArgs,
        octopus::OctopusApiArgs,
    },
    core::{record::JsonFileRecorder, shutdown::Shutdown},
    notify::{Notification, NotificationService, Notifier},
    prelude::*,
    tables::build_comparison_table,
};

#[derive(Parser)]
pub struct RunArgs {
    #[clap(flatten)]
    pub octopus: OctopusApiArgs,

    #[clap(flatten)]
    pub bot: BotArgs,

    #[clap(flatten)]
    pub notifications: NotificationArgs,

    #[clap(flatten)]
    pub heartbeat: HeartbeatArgs,
}

impl RunArgs {
    pub async fn run(self) -> Result {
        let api = self.octopus.connect()?;
        let notifications = self.notifications.service()?;
        self.run_once(&api, &notifications, &Shutdown::default()).await
    }

    /// Compare today's costs, flush the batched notifications and send the heartbeat.
    #[instrument(skip_all)]
    pub async fn run_once(
        &self,
        api: &Api,
        notifications: &NotificationService,
        shutdown: &Shutdown,
    ) -> Result {
        let on = Local::now().date_naive();
        let (tariffs, unknown_ids) = self.bot.resolve_tariffs();
        for id in unknown_ids {
            warn!(%id, "unknown tariff");
            notifications.send(Notification::info(format!("Warning: no tariff found for ID `{id}`."))).await;
        }
        let recorder = JsonFileRecorder::new(&self.bot.last_run_path);

        let result = Bot::builder()
            .account_provider(api)
            .rate_provider(api)
            .gateway(api)
            .notifier(notifications)
            .recorder(&recorder)
            .tariffs(&tariffs)
            .threshold(self.bot.threshold)
            .dry_run(self.bot.dry_run)
            .only_results(self.bot.only_results)
            .payment_method(self.bot.payment_method)
            .stay_option(self.bot.stay_option)
            .policy(self.bot.retry_policy())
            .shutdown(shutdown.clone())
            .build()
            .run_reporting(on)
            .await;
        notifications.flush(&format!("Octobot {on}")).await;

        let report = result?;
        println!("{}", build_comparison_table(&report.comparison));
        self.heartbeat.send().await;
        Ok(())
    }
}

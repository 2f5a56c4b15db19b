use clap::Parser;
use reqwest::Url;

use crate::{notify::NotificationService, prelude::*};

#[derive(Parser)]
pub struct NotificationArgs {
    /// Webhooks receiving the notifications as JSON with `title` and `body`.
    #[clap(long = "notification-urls", env = "NOTIFICATION_URLS", value_delimiter = ',')]
    urls: Vec<Url>,

    /// Send the notifications of a run as a single message at the end.
    #[clap(long = "batch-notifications", env = "BATCH_NOTIFICATIONS")]
    batch: bool,
}

impl NotificationArgs {
    pub fn service(&self) -> Result<NotificationService> {
        NotificationService::new(self.urls.clone(), self.batch)
    }
}

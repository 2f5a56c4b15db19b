//! [Octopus Energy](https://developer.octopus.energy) client.

mod account;
mod enrolment;
mod graphql;
mod products;

use std::time::Duration;

use reqwest::{Client, Url};
use serde::{Deserialize, de::DeserializeOwned};

pub use self::graphql::Backoff;
use self::graphql::Graphql;
use crate::prelude::*;

pub struct Api {
    client: Client,
    base_url: Url,
    account_number: String,
    graphql: Graphql,
}

impl Api {
    /// Build the client, `base_url` is the API root with the trailing slash.
    pub fn try_new(
        base_url: Url,
        api_key: String,
        account_number: String,
        backoff: Backoff,
    ) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("octobot/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()?;
        let graphql_url = base_url.join("graphql/").context("invalid base URL")?;
        let graphql = Graphql::new(client.clone(), graphql_url, api_key, backoff);
        Ok(Self { client, base_url, account_number, graphql })
    }

    #[instrument(skip_all, level = Level::DEBUG, fields(url = %url))]
    async fn get<R: DeserializeOwned>(&self, url: Url) -> Result<R> {
        self.client
            .get(url)
            .send()
            .await
            .context("failed to call")?
            .error_for_status()
            .context("request failed")?
            .json::<R>()
            .await
            .context("failed to deserialize the response")
    }

    /// Fetch every page of a paginated listing.
    async fn get_all<T: DeserializeOwned>(&self, url: Url) -> Result<Vec<T>> {
        #[derive(Deserialize)]
        struct Page<T> {
            results: Vec<T>,
            next: Option<String>,
        }

        let mut results = Vec::new();
        let mut next = Some(url);
        while let Some(url) = next {
            let page = self.get::<Page<T>>(url).await?;
            results.extend(page.results);
            next = page.next.as_deref().map(Url::parse).transpose().context("invalid next page URL")?;
        }
        Ok(results)
    }
}

#[derive(Deserialize)]
struct Link {
    href: String,
    rel: String,
}

fn find_link(links: &[Link], rel: &str) -> Result<Url> {
    let link = links.iter().find(|link| link.rel == rel).with_context(|| format!("no `{rel}` link"))?;
    Url::parse(&link.href).with_context(|| format!("invalid `{rel}` link"))
}

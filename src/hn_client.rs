use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;

use crate::config::Settings;
use crate::error::FetchError;
use crate::models::Item;

const USER_AGENT: &str = concat!("hacker_news_reader/", env!("CARGO_PKG_VERSION"));

/// Read access to the listing and item endpoints.
///
/// The loaders only talk to this trait so they can be driven by an
/// in-memory source in tests.
#[async_trait]
pub trait ItemSource: Send + Sync {
    /// Newest story ids, in the order the endpoint returns them.
    async fn new_story_ids(&self) -> Result<Vec<u64>, FetchError>;

    /// A single item. A `null` body comes back as `FetchError::NotFound`.
    async fn item(&self, id: u64) -> Result<Item, FetchError>;
}

pub struct HackerNewsClient {
    client: Client,
    base_url: String,
}

impl HackerNewsClient {
    pub fn new(settings: &Settings) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(settings.request_timeout())
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            base_url: settings.api_base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, FetchError> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

#[async_trait]
impl ItemSource for HackerNewsClient {
    async fn new_story_ids(&self) -> Result<Vec<u64>, FetchError> {
        let url = format!("{}/newstories.json", self.base_url);
        let ids: Vec<u64> = self.get_json(&url).await?;
        tracing::debug!(count = ids.len(), "fetched story ids");
        Ok(ids)
    }

    async fn item(&self, id: u64) -> Result<Item, FetchError> {
        let url = format!("{}/item/{}.json", self.base_url, id);
        match self.get_json::<Option<Item>>(&url).await? {
            Some(mut item) => {
                if item.id == 0 {
                    item.id = id;
                }
                Ok(item)
            }
            None => {
                tracing::debug!(item_id = id, "item endpoint returned null");
                Err(FetchError::NotFound(id))
            }
        }
    }
}

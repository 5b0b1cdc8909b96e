//! # Fresh Feed Discovery
//!
//! A polling ingestor for the site's "fresh" discovery feed. Each poll looks
//! at the single most recently published photo; workers call
//! [`Discovery::next_new_item`] and block until that photo is one nobody has
//! claimed yet.
//!
//! ## Key Design Principles:
//! - **Fixed re-poll**: when the newest photo is already claimed (or the page
//!   is empty) the loop sleeps `poll_interval` and asks again, without bound.
//! - **Fail fast**: a non-success status or an unusable body is
//!   `CrawlerError::DiscoveryUnavailable`. It is never retried here.
//! - **Cancellable wait**: the re-poll sleep races the shutdown token, so a
//!   worker waiting for fresh content stops promptly.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::core::model::{ClaimedItem, ItemId, OwnerId};
use crate::core::registry::Registry;
use crate::error::{CrawlerError, CrawlerResult};
use crate::retrieve::ky_http::ApiClient;

/// First page, one photo per page: only the newest upload matters.
pub const DEFAULT_FEED_URL: &str = "https://webapi.500px.com/discovery/fresh?feature=fresh&include_states=true&include_licensing=false&page=1&rpp=1";

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// The newest item on the feed, before anyone claimed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FreshItem {
    pub id: ItemId,
    pub owner: OwnerId,
}

/// Anything that can report the most recently published item.
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// `Ok(None)` when the feed currently lists nothing.
    async fn latest(&self) -> CrawlerResult<Option<FreshItem>>;
}

#[derive(Debug, Deserialize)]
struct FreshPage {
    photos: Vec<FreshPhoto>,
}

#[derive(Debug, Deserialize)]
struct FreshPhoto {
    id: u64,
    user: FreshUser,
}

#[derive(Debug, Deserialize)]
struct FreshUser {
    username: String,
}

/// HTTP client for the fresh feed endpoint.
#[derive(Debug, Clone)]
pub struct FreshFeed {
    client: ApiClient,
}

impl FreshFeed {
    pub fn new(feed_url: &str) -> CrawlerResult<Self> {
        Ok(Self {
            client: ApiClient::new(feed_url)?,
        })
    }
}

#[async_trait]
impl FeedSource for FreshFeed {
    async fn latest(&self) -> CrawlerResult<Option<FreshItem>> {
        // The base URL already is the full feed URL; joining "" keeps its query.
        let response = self
            .client
            .get_json::<FreshPage>("")
            .await
            .map_err(|e| CrawlerError::DiscoveryUnavailable {
                status: None,
                reason: e.to_string(),
            })?;

        if !response.success {
            return Err(CrawlerError::DiscoveryUnavailable {
                status: Some(response.status),
                reason: "unable to get a new photo".to_string(),
            });
        }

        let page = response.data.ok_or_else(|| CrawlerError::DiscoveryUnavailable {
            status: Some(response.status),
            reason: "empty response body".to_string(),
        })?;

        Ok(page.photos.into_iter().next().map(|photo| FreshItem {
            id: ItemId(photo.id),
            owner: OwnerId(photo.user.username),
        }))
    }
}

/// Turns feed polls into exclusive claims.
pub struct Discovery {
    source: Arc<dyn FeedSource>,
    registry: Arc<Registry>,
    poll_interval: Duration,
}

impl Discovery {
    pub fn new(source: Arc<dyn FeedSource>, registry: Arc<Registry>) -> Self {
        Self {
            source,
            registry,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// # Next New Item
    ///
    /// Polls until the newest feed item is unclaimed and this caller wins the
    /// claim for it. Returns `Ok(None)` if `cancel` fires while waiting.
    ///
    /// ## Errors
    /// `CrawlerError::DiscoveryUnavailable` as soon as one poll fails.
    pub async fn next_new_item(
        &self,
        cancel: &CancellationToken,
    ) -> CrawlerResult<Option<ClaimedItem>> {
        loop {
            if cancel.is_cancelled() {
                return Ok(None);
            }

            match self.source.latest().await? {
                Some(fresh) if !self.registry.is_claimed(fresh.id) => {
                    if self.registry.claim(fresh.id) {
                        return Ok(Some(ClaimedItem {
                            id: fresh.id,
                            owner: fresh.owner,
                        }));
                    }
                    tracing::debug!(item_id = %fresh.id, "lost claim race, re-polling");
                }
                Some(fresh) => {
                    tracing::trace!(item_id = %fresh.id, "newest item already claimed");
                }
                None => {
                    tracing::debug!("fresh feed is empty");
                }
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(None),
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }
}

//! # Snapshot Fetcher
//!
//! Retrieves the raw public pages of an item and of its owner. Bodies are kept
//! verbatim; field extraction happens offline.

use async_trait::async_trait;

use crate::core::model::{ItemId, OwnerId, RawPage};
use crate::error::CrawlerResult;
use crate::retrieve::ky_http::{ApiClient, ApiResponse};

pub const DEFAULT_SITE_URL: &str = "https://500px.com/";

/// Source of raw item and owner pages.
///
/// A returned `RawPage` may carry any status; `Err` means no response at all.
#[async_trait]
pub trait SnapshotFetcher: Send + Sync {
    async fn fetch_item(&self, id: ItemId) -> CrawlerResult<RawPage>;

    async fn fetch_owner(&self, owner: &OwnerId) -> CrawlerResult<RawPage>;
}

/// Fetches `<site>/photo/<id>` and `<site>/<username>`.
#[derive(Debug, Clone)]
pub struct SiteFetcher {
    client: ApiClient,
}

impl SiteFetcher {
    pub fn new(site_url: &str) -> CrawlerResult<Self> {
        Ok(Self {
            client: ApiClient::new(site_url)?,
        })
    }

    fn raw_page(response: ApiResponse<String>) -> RawPage {
        RawPage {
            status: response.status,
            body: response.data.or(response.error_body).unwrap_or_default(),
        }
    }
}

#[async_trait]
impl SnapshotFetcher for SiteFetcher {
    async fn fetch_item(&self, id: ItemId) -> CrawlerResult<RawPage> {
        let response = self.client.get_text(&format!("photo/{}", id)).await?;
        Ok(Self::raw_page(response))
    }

    async fn fetch_owner(&self, owner: &OwnerId) -> CrawlerResult<RawPage> {
        // Usernames come from the feed; keep them inside a single path segment.
        let url = self.client.segment_url(&owner.0)?;
        Ok(Self::raw_page(self.client.get_text_url(url).await?))
    }
}

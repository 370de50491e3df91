//! AWS S3 listing for discovering raw scene files in public buckets.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::error::{CatalogError, Result};

/// Metadata for one listed object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct S3ObjectInfo {
    pub key: String,
    pub size: i64,
    pub last_modified: Option<DateTime<Utc>>,
}

impl S3ObjectInfo {
    /// Final path segment of the key.
    pub fn file_name(&self) -> &str {
        self.key.rsplit('/').next().unwrap_or(&self.key)
    }
}

/// One page of a `ListObjectsV2` response.
#[derive(Debug, Clone, Default)]
pub struct ListPage {
    pub objects: Vec<S3ObjectInfo>,
    /// Set when the listing is truncated and more pages follow.
    pub next_token: Option<String>,
}

/// Paged object listing.
#[async_trait]
pub trait ObjectLister: Send + Sync {
    async fn list_page(
        &self,
        bucket: &str,
        prefix: &str,
        continuation_token: Option<String>,
    ) -> Result<ListPage>;
}

#[async_trait]
impl ObjectLister for aws_sdk_s3::Client {
    async fn list_page(
        &self,
        bucket: &str,
        prefix: &str,
        continuation_token: Option<String>,
    ) -> Result<ListPage> {
        let mut request = self.list_objects_v2().bucket(bucket).prefix(prefix);
        if let Some(token) = continuation_token {
            request = request.continuation_token(token);
        }

        let response = request.send().await.map_err(|e| {
            CatalogError::S3(aws_sdk_s3::error::DisplayErrorContext(&e).to_string())
        })?;

        let objects = response
            .contents()
            .iter()
            .filter_map(|object| {
                let key = object.key()?.to_string();
                Some(S3ObjectInfo {
                    key,
                    size: object.size().unwrap_or(0),
                    last_modified: object
                        .last_modified()
                        .and_then(|t| DateTime::<Utc>::from_timestamp(t.secs(), t.subsec_nanos())),
                })
            })
            .collect();

        let next_token = if response.is_truncated() == Some(true) {
            response.next_continuation_token().map(|s| s.to_string())
        } else {
            None
        };

        Ok(ListPage {
            objects,
            next_token,
        })
    }
}

/// Build an S3 client that sends unsigned requests, for public buckets such
/// as `globalnightlight`.
pub async fn anonymous_client(region: &str) -> aws_sdk_s3::Client {
    let aws_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(aws_config::Region::new(region.to_string()))
        .no_credentials()
        .load()
        .await;
    aws_sdk_s3::Client::new(&aws_config)
}

/// List every object under `prefix` whose key ends with `suffix`.
///
/// Pages through the listing with continuation tokens until the response is
/// no longer truncated. An empty `suffix` matches every key.
#[instrument(skip(lister))]
pub async fn search_aws<L>(
    lister: &L,
    bucket: &str,
    suffix: &str,
    prefix: &str,
) -> Result<Vec<S3ObjectInfo>>
where
    L: ObjectLister + ?Sized,
{
    let mut matches = Vec::new();
    let mut continuation_token: Option<String> = None;
    let mut pages = 0usize;

    loop {
        let page = lister
            .list_page(bucket, prefix, continuation_token.take())
            .await?;
        pages += 1;

        let listed = page.objects.len();
        matches.extend(page.objects.into_iter().filter(|o| o.key.ends_with(suffix)));
        debug!(page = pages, listed, matched = matches.len(), "Completed listing page");

        match page.next_token {
            Some(token) => continuation_token = Some(token),
            None => break,
        }
    }

    info!(pages, matched = matches.len(), "S3 listing complete");
    Ok(matches)
}

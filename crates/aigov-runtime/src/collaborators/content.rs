//! Content-addressed storage for full proposal documents.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use thiserror::Error;

/// Public gateway used when none is configured.
pub const DEFAULT_GATEWAY: &str = "https://ipfs.io/ipfs/";

pub type ContentId = String;

#[derive(Error, Debug)]
pub enum ContentStoreError {
    #[error("Content {0} not found")]
    NotFound(ContentId),

    #[error("Content store unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid content document: {0}")]
    Invalid(#[from] serde_json::Error),
}

/// The document stored for each proposal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposalDocument {
    pub title: String,
    pub description: String,
    pub author: String,
    pub timestamp: DateTime<Utc>,
}

#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn put(&self, document: &JsonValue) -> Result<ContentId, ContentStoreError>;

    async fn get(&self, id: &str) -> Result<JsonValue, ContentStoreError>;

    fn name(&self) -> &str;
}

/// Public URL of `id` under `gateway`.
pub fn gateway_url(gateway: &str, id: &str) -> String {
    if gateway.ends_with('/') {
        format!("{gateway}{id}")
    } else {
        format!("{gateway}/{id}")
    }
}

/// Local content id: "Qm" followed by the first 44 hex digits of the
/// SHA-256 of the serialized document.
pub fn content_id(document: &JsonValue) -> Result<ContentId, ContentStoreError> {
    let bytes = serde_json::to_vec(document)?;
    let digest = hex::encode(Sha256::digest(&bytes));
    Ok(format!("Qm{}", &digest[..44]))
}

/// Documents held in process memory.
#[derive(Debug, Default)]
pub struct InMemoryContentStore {
    documents: RwLock<HashMap<ContentId, JsonValue>>,
    offline: AtomicBool,
    failing_puts: AtomicU32,
}

impl InMemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.documents.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.read().is_empty()
    }

    /// Make every call fail with `Unavailable` until turned back on.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Fail the next `count` writes, then accept writes again.
    pub fn fail_next_puts(&self, count: u32) {
        self.failing_puts.store(count, Ordering::SeqCst);
    }

    fn ensure_online(&self) -> Result<(), ContentStoreError> {
        if self.offline.load(Ordering::SeqCst) {
            Err(ContentStoreError::Unavailable("node unreachable".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ContentStore for InMemoryContentStore {
    async fn put(&self, document: &JsonValue) -> Result<ContentId, ContentStoreError> {
        self.ensure_online()?;
        let failing = self
            .failing_puts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if failing.is_ok() {
            return Err(ContentStoreError::Unavailable("write refused".to_string()));
        }

        let id = content_id(document)?;
        self.documents
            .write()
            .insert(id.clone(), document.clone());
        Ok(id)
    }

    async fn get(&self, id: &str) -> Result<JsonValue, ContentStoreError> {
        self.ensure_online()?;
        self.documents
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| ContentStoreError::NotFound(id.to_string()))
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(feature = "ipfs")]
mod ipfs {
    use super::*;
    use std::time::Duration;

    #[derive(Deserialize)]
    struct AddResponse {
        #[serde(rename = "Hash")]
        hash: String,
    }

    /// Documents pinned through an IPFS node's HTTP API.
    #[derive(Debug, Clone)]
    pub struct IpfsContentStore {
        api_url: String,
        client: reqwest::Client,
    }

    impl IpfsContentStore {
        pub fn new(api_url: &str, timeout: Duration) -> Result<Self, ContentStoreError> {
            let client = reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .map_err(|e| ContentStoreError::Unavailable(e.to_string()))?;
            Ok(Self {
                api_url: api_url.trim_end_matches('/').to_string(),
                client,
            })
        }

        fn unavailable(e: reqwest::Error) -> ContentStoreError {
            ContentStoreError::Unavailable(e.to_string())
        }
    }

    #[async_trait]
    impl ContentStore for IpfsContentStore {
        async fn put(&self, document: &JsonValue) -> Result<ContentId, ContentStoreError> {
            let part = reqwest::multipart::Part::bytes(serde_json::to_vec(document)?)
                .file_name("proposal.json");
            let form = reqwest::multipart::Form::new().part("file", part);

            let response: AddResponse = self
                .client
                .post(format!("{}/api/v0/add", self.api_url))
                .multipart(form)
                .send()
                .await
                .and_then(|r| r.error_for_status())
                .map_err(Self::unavailable)?
                .json()
                .await
                .map_err(Self::unavailable)?;

            tracing::debug!(content_id = %response.hash, "Document added to IPFS");
            Ok(response.hash)
        }

        async fn get(&self, id: &str) -> Result<JsonValue, ContentStoreError> {
            let response = self
                .client
                .post(format!("{}/api/v0/cat", self.api_url))
                .query(&[("arg", id)])
                .send()
                .await
                .map_err(Self::unavailable)?;

            if response.status().as_u16() == 404 {
                return Err(ContentStoreError::NotFound(id.to_string()));
            }

            let bytes = response
                .error_for_status()
                .map_err(Self::unavailable)?
                .bytes()
                .await
                .map_err(Self::unavailable)?;
            Ok(serde_json::from_slice(&bytes)?)
        }

        fn name(&self) -> &str {
            "ipfs"
        }
    }
}

#[cfg(feature = "ipfs")]
pub use ipfs::IpfsContentStore;

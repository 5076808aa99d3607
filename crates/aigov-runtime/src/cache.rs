//! Analysis cache.
//!
//! Identical proposal text gets identical attributes without asking the
//! oracle again. Entries are keyed by the SHA-256 of the text, expire after
//! a TTL, and are bounded in number.

use moka::future::Cache;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::Duration;

use aigov_core::ProposalAttributes;

use crate::config::duration_str;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub max_entries: u64,

    #[serde(with = "duration_str")]
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            ttl: Duration::from_secs(3600),
        }
    }
}

/// Hex SHA-256 of proposal text.
pub fn text_key(proposal_text: &str) -> String {
    hex::encode(Sha256::digest(proposal_text.as_bytes()))
}

pub struct AnalysisCache {
    cache: Cache<String, ProposalAttributes>,
}

impl AnalysisCache {
    pub fn new(config: &CacheConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.max_entries)
            .time_to_live(config.ttl)
            .build();

        Self { cache }
    }

    pub async fn get(&self, proposal_text: &str) -> Option<ProposalAttributes> {
        self.cache.get(&text_key(proposal_text)).await
    }

    /// Store attributes. Fallback attributes are not stored, so a passing
    /// oracle outage is not remembered.
    pub async fn insert(&self, proposal_text: &str, attributes: ProposalAttributes) -> bool {
        if attributes.is_fallback() {
            return false;
        }
        self.cache.insert(text_key(proposal_text), attributes).await;
        true
    }
}

impl Default for AnalysisCache {
    fn default() -> Self {
        Self::new(&CacheConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aigov_core::{Category, RiskScore};

    fn attributes() -> ProposalAttributes {
        ProposalAttributes {
            summary: "Fund a bug bounty.".to_string(),
            risk_score: RiskScore::new(3).unwrap(),
            category: Category::Technical,
            explanation: "Small, capped spend.".to_string(),
        }
    }

    #[test]
    fn test_key_is_sha256_hex() {
        assert_eq!(
            text_key(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_ne!(text_key("a"), text_key("b"));
    }

    #[tokio::test]
    async fn test_hit_and_miss() {
        let cache = AnalysisCache::default();
        assert!(cache.get("Fund a bug bounty").await.is_none());

        assert!(cache.insert("Fund a bug bounty", attributes()).await);
        assert_eq!(cache.get("Fund a bug bounty").await, Some(attributes()));
        assert!(cache.get("Fund a bug bounty!").await.is_none());
    }

    #[tokio::test]
    async fn test_fallback_is_not_cached() {
        let cache = AnalysisCache::default();
        assert!(!cache.insert("text", ProposalAttributes::fallback()).await);
        assert!(cache.get("text").await.is_none());
    }

    #[test]
    fn test_config_from_yaml() {
        let config: CacheConfig = serde_yaml::from_str("ttl: 10m").unwrap();
        assert_eq!(config.ttl, Duration::from_secs(600));
        assert_eq!(config.max_entries, 10_000);
    }
}

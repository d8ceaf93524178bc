//! Hashtag and mention extraction plus trend counters
//!
//! Tags keep the form they were written in for display but aggregate on
//! their lowercase key, so `#Go` and `#go` feed one counter.

use regex::Regex;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, LazyLock};
use tracing::debug;
use uuid::Uuid;

use crate::domain::{AccountSummary, Hashtag};
use crate::error::{AppError, Result};
use crate::metrics::HASHTAG_INCREMENTS_TOTAL;
use crate::repository::SocialStore;

static HASHTAG_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#([A-Za-z0-9_]+)").expect("Invalid hashtag regex"));

static MENTION_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@([A-Za-z0-9_]+)").expect("Invalid mention regex"));

static TAG_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_]+$").expect("Invalid tag regex"));

/// Tokens found in a piece of text, without their `#` / `@` prefix.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extracted {
    /// Distinct case-insensitively, first written form kept
    pub hashtags: Vec<String>,
    /// Distinct usernames, first occurrence order
    pub mentions: Vec<String>,
}

pub fn extract(content: &str) -> Extracted {
    let mut seen = HashSet::new();
    let mentions = scan_mentions(content)
        .into_iter()
        .filter(|m| seen.insert(m.clone()))
        .collect();

    Extracted {
        hashtags: dedup_tags(scan(&HASHTAG_REGEX, content)),
        mentions,
    }
}

/// Mentions in authored order, repeats kept.
pub fn scan_mentions(content: &str) -> Vec<String> {
    scan(&MENTION_REGEX, content)
}

fn scan(regex: &Regex, content: &str) -> Vec<String> {
    regex
        .captures_iter(content)
        .filter_map(|cap| cap.get(1).map(|m| m.as_str().to_string()))
        .collect()
}

/// Lowercase aggregation key of a tag, with any leading `#` removed.
pub fn tag_key(tag: &str) -> String {
    tag.trim_start_matches('#').to_lowercase()
}

/// Case-insensitive dedup; the first form of each tag wins.
pub fn dedup_tags<I>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut seen = HashSet::new();
    tags.into_iter()
        .filter(|tag| seen.insert(tag_key(tag)))
        .collect()
}

/// Normalise caller-supplied tags (`#` optional); rejects anything that
/// would not have been extracted from text.
pub fn normalize_tags(tags: &[String]) -> Result<Vec<String>> {
    tags.iter()
        .map(|raw| {
            let tag = raw.trim().trim_start_matches('#');
            if TAG_REGEX.is_match(tag) {
                Ok(tag.to_string())
            } else {
                Err(AppError::Validation(format!("invalid hashtag: {}", raw)))
            }
        })
        .collect()
}

/// `(key, display)` counter pairs for the distinct tags in `tags`.
pub fn tag_pairs(tags: &[String]) -> Vec<(String, String)> {
    dedup_tags(tags.iter().cloned())
        .into_iter()
        .map(|tag| (tag_key(&tag), tag))
        .collect()
}

pub(crate) fn note_counted(updated: &[Hashtag]) {
    if updated.is_empty() {
        return;
    }
    HASHTAG_INCREMENTS_TOTAL.inc_by(updated.len() as u64);
    debug!(tags = updated.len(), "hashtag counters incremented");
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedContent {
    pub hashtags: Vec<Hashtag>,
    pub mentions: Vec<AccountSummary>,
}

#[derive(Clone)]
pub struct HashtagService {
    store: Arc<dyn SocialStore>,
}

impl HashtagService {
    pub fn new(store: Arc<dyn SocialStore>) -> Self {
        Self { store }
    }

    /// Add one to the counter of every distinct tag in `tags`.
    pub async fn record_hashtags(&self, tags: &[String]) -> Result<Vec<Hashtag>> {
        let pairs = tag_pairs(tags);
        if pairs.is_empty() {
            return Ok(Vec::new());
        }

        let updated = self.store.increment_hashtags(&pairs).await?;
        note_counted(&updated);
        Ok(updated)
    }

    pub async fn trending(&self, limit: usize) -> Result<Vec<Hashtag>> {
        Ok(self.store.trending_hashtags(limit).await?)
    }

    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<Hashtag>> {
        let needle = tag_key(query.trim());
        if needle.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.store.search_hashtags(&needle, limit).await?)
    }

    /// Extract tokens from free text, bump hashtag counters and resolve mentions.
    pub async fn process_content(&self, content: &str) -> Result<ProcessedContent> {
        let extracted = extract(content);
        let hashtags = self.record_hashtags(&extracted.hashtags).await?;
        let mentions = self
            .store
            .get_accounts_by_usernames(&extracted.mentions)
            .await?
            .iter()
            .map(|account| account.summary())
            .collect();

        Ok(ProcessedContent { hashtags, mentions })
    }

    /// Map usernames to account ids keeping order and repeats; unknown names are dropped.
    pub async fn resolve_mentions(&self, usernames: &[String]) -> Result<Vec<Uuid>> {
        if usernames.is_empty() {
            return Ok(Vec::new());
        }

        let mut distinct = usernames.to_vec();
        distinct.sort();
        distinct.dedup();

        let ids: HashMap<String, Uuid> = self
            .store
            .get_accounts_by_usernames(&distinct)
            .await?
            .into_iter()
            .map(|account| (account.username, account.id))
            .collect();

        Ok(usernames
            .iter()
            .filter_map(|name| ids.get(name).copied())
            .collect())
    }
}

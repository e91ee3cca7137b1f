//! Feed and item model shared by the pipeline stages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One upstream item, as produced by the feed translation step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedItem {
    pub url: String,
    pub title: String,
    pub published_at: DateTime<Utc>,
    #[serde(default)]
    pub nsfw: bool,
}

/// An ordered batch of items plus the feed's canonical link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feed {
    pub link: String,
    #[serde(default)]
    pub items: Vec<FeedItem>,
}

impl Feed {
    /// Drop items flagged NSFW, keeping the order of the rest.
    pub fn without_nsfw(mut self) -> Self {
        let before = self.items.len();
        self.items.retain(|item| !item.nsfw);
        if self.items.len() != before {
            tracing::debug!(dropped = before - self.items.len(), link = %self.link, "filtered nsfw items");
        }
        self
    }
}

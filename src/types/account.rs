//! Account-level responses: quota and generation history.

use super::events::GenerationStatus;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Credit quota of the current API key (`GET /veo/me`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quota {
    #[serde(default)]
    pub total_quota: i64,
    #[serde(default)]
    pub used_quota: i64,
    #[serde(default)]
    pub available_quota: i64,
}

impl Quota {
    /// Fraction of the quota already consumed, in `0.0..=1.0`.
    pub fn usage_ratio(&self) -> f64 {
        if self.total_quota <= 0 {
            return 0.0;
        }
        (self.used_quota as f64 / self.total_quota as f64).clamp(0.0, 1.0)
    }
}

/// One page of `GET /veo/histories`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoryPage {
    #[serde(default)]
    pub data: Vec<HistoryItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u32>,
    /// Vendor pagination fields not covered above.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A past generation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoryItem {
    #[serde(default, deserialize_with = "string_or_number")]
    pub id: Option<String>,
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub file_url: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub file_urls: Vec<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl HistoryItem {
    pub fn status(&self) -> GenerationStatus {
        self.status
            .as_deref()
            .map(GenerationStatus::from_wire)
            .unwrap_or(GenerationStatus::Processing)
    }

    pub fn urls(&self) -> Vec<String> {
        if !self.file_urls.is_empty() {
            self.file_urls.clone()
        } else {
            self.file_url.iter().cloned().collect()
        }
    }

    /// Loose prompt match used to find a generation whose stream was lost:
    /// either prompt contains the other, ignoring case.
    pub fn matches_prompt(&self, prompt: &str) -> bool {
        let mine = self.prompt.trim().to_lowercase();
        let theirs = prompt.trim().to_lowercase();
        if mine.is_empty() || theirs.is_empty() {
            return false;
        }
        mine.contains(&theirs) || theirs.contains(&mine)
    }
}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

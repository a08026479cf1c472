//! Speech history domain models
//!
//! A history entry records one synthesized utterance: the text, the selected
//! voice, and the prosody knobs the client used. Knob ranges mirror what the
//! Web Speech API accepts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Speech history entry
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct History {
    pub id: Uuid,
    pub user_id: Uuid,
    pub text: String,
    pub voice: String,
    pub rate: f64,
    pub pitch: f64,
    pub volume: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_knob() -> f64 {
    1.0
}

/// Create history request
///
/// Omitted prosody knobs default to 1.0.
#[derive(Debug, Deserialize, validator::Validate)]
pub struct CreateHistoryRequest {
    #[validate(length(min = 1, max = 10000, message = "text must be 1-10000 characters"))]
    pub text: String,
    #[validate(length(min = 1, max = 200, message = "voice must be 1-200 characters"))]
    pub voice: String,
    #[serde(default = "default_knob")]
    #[validate(range(min = 0.1, max = 5.0, message = "rate must be between 0.1 and 5"))]
    pub rate: f64,
    #[serde(default = "default_knob")]
    #[validate(range(min = 0.0, max = 2.0, message = "pitch must be between 0 and 2"))]
    pub pitch: f64,
    #[serde(default = "default_knob")]
    #[validate(range(min = 0.0, max = 1.0, message = "volume must be between 0 and 1"))]
    pub volume: f64,
}

/// Update history request; absent fields are left unchanged
#[derive(Debug, Deserialize, validator::Validate)]
pub struct UpdateHistoryRequest {
    #[validate(length(min = 1, max = 10000, message = "text must be 1-10000 characters"))]
    pub text: Option<String>,
    #[validate(length(min = 1, max = 200, message = "voice must be 1-200 characters"))]
    pub voice: Option<String>,
    #[validate(range(min = 0.1, max = 5.0, message = "rate must be between 0.1 and 5"))]
    pub rate: Option<f64>,
    #[validate(range(min = 0.0, max = 2.0, message = "pitch must be between 0 and 2"))]
    pub pitch: Option<f64>,
    #[validate(range(min = 0.0, max = 1.0, message = "volume must be between 0 and 1"))]
    pub volume: Option<f64>,
}

impl UpdateHistoryRequest {
    pub fn is_empty(&self) -> bool {
        self.text.is_none()
            && self.voice.is_none()
            && self.rate.is_none()
            && self.pitch.is_none()
            && self.volume.is_none()
    }
}

fn default_page() -> i64 {
    1
}

fn default_limit() -> i64 {
    20
}

/// History list query parameters
#[derive(Debug, Deserialize, validator::Validate)]
pub struct HistoriesQuery {
    #[serde(default = "default_page")]
    #[validate(range(min = 1, message = "page must be at least 1"))]
    pub page: i64,
    #[serde(default = "default_limit")]
    #[validate(range(min = 1, max = 100, message = "limit must be between 1 and 100"))]
    pub limit: i64,
}

impl HistoriesQuery {
    /// 饱和运算：极大的 page 值产生 OFFSET i64::MAX（空结果），而非算术溢出
    pub fn offset(&self) -> i64 {
        self.page.saturating_sub(1).saturating_mul(self.limit)
    }
}

/// Paginated history list response
#[derive(Debug, Serialize)]
pub struct HistoryListResponse {
    pub items: Vec<History>,
    pub page: i64,
    pub limit: i64,
    pub total: i64,
}

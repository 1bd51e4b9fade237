//! Data models for the lead dashboard.
//!
//! This module contains the records exchanged with the lead backend
//! (events, templates, login responses) and the report envelope that
//! the generators render.

use crate::analysis::ReportTable;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Placeholder used wherever a display cell has no value.
pub const NOT_AVAILABLE: &str = "N/A";

/// Processing status of a lead.
///
/// The backend vocabulary is `pendiente` / `gestionado`. Older screens wrote
/// `resuelto`; it is still accepted on input and mapped to [`LeadStatus::Resolved`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LeadStatus {
    #[serde(rename = "pendiente")]
    Pending,
    #[serde(rename = "gestionado", alias = "resuelto")]
    Resolved,
}

impl LeadStatus {
    /// Wire value sent to and expected from the backend.
    pub fn as_str(&self) -> &'static str {
        match self {
            LeadStatus::Pending => "pendiente",
            LeadStatus::Resolved => "gestionado",
        }
    }

    /// Human-readable label for tables.
    pub fn label(&self) -> &'static str {
        match self {
            LeadStatus::Pending => "Pendiente",
            LeadStatus::Resolved => "Gestionado",
        }
    }
}

impl fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for LeadStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pendiente" | "pending" => Ok(LeadStatus::Pending),
            "gestionado" | "resuelto" | "resolved" => Ok(LeadStatus::Resolved),
            other => Err(format!("Unknown lead status: {}", other)),
        }
    }
}

/// Which lead lists a report is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReportScope {
    #[serde(rename = "pendiente")]
    Pending,
    #[serde(rename = "gestionado")]
    Resolved,
    /// Both lists, pending first.
    #[serde(rename = "totales")]
    All,
}

impl ReportScope {
    /// Statuses to fetch, in concatenation order.
    pub fn statuses(&self) -> &'static [LeadStatus] {
        match self {
            ReportScope::Pending => &[LeadStatus::Pending],
            ReportScope::Resolved => &[LeadStatus::Resolved],
            ReportScope::All => &[LeadStatus::Pending, LeadStatus::Resolved],
        }
    }
}

impl fmt::Display for ReportScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportScope::Pending => write!(f, "pendiente"),
            ReportScope::Resolved => write!(f, "gestionado"),
            ReportScope::All => write!(f, "totales"),
        }
    }
}

/// A lead event as produced by the backend.
///
/// Every descriptive field may be absent or null in the feed; consumers
/// substitute placeholders instead of rejecting the record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(default, deserialize_with = "de::opaque_id")]
    pub id: String,
    #[serde(default, deserialize_with = "de::text")]
    pub created_at: Option<String>,
    /// Some feeds spell the timestamp `createdAt`; `created_at` wins when
    /// both parse.
    #[serde(
        default,
        rename = "createdAt",
        deserialize_with = "de::text",
        skip_serializing
    )]
    pub created_at_camel: Option<String>,
    #[serde(default, deserialize_with = "de::text")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "de::text")]
    pub icodcli: Option<String>,
    #[serde(default, deserialize_with = "de::text")]
    pub asunto: Option<String>,
    #[serde(default, deserialize_with = "de::text")]
    pub colectivo: Option<String>,
    #[serde(default, deserialize_with = "de::text")]
    pub fuente: Option<String>,
    #[serde(default, deserialize_with = "de::text")]
    pub section: Option<String>,
    #[serde(default, deserialize_with = "de::text")]
    pub status: Option<String>,
}

impl Event {
    /// Occurrence time, if the raw timestamp parses.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.created_at
            .as_deref()
            .and_then(parse_timestamp)
            .or_else(|| self.created_at_camel.as_deref().and_then(parse_timestamp))
    }

    /// Parsed status; `None` for missing or unrecognised values.
    pub fn lead_status(&self) -> Option<LeadStatus> {
        self.status.as_deref().and_then(|s| s.parse().ok())
    }
}

/// Parse a backend timestamp.
///
/// Accepts RFC 3339 and the naive `YYYY-MM-DD[ T]HH:MM:SS[.fff]` forms, the
/// latter read as UTC. A bare `YYYY-MM-DD` is midnight UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }

    for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// An email template with its aggregate click count.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Plantilla {
    #[serde(default, deserialize_with = "de::opaque_id")]
    pub id: String,
    #[serde(default, deserialize_with = "de::text_or_empty")]
    pub template_name: String,
    #[serde(default, deserialize_with = "de::text")]
    pub start_date: Option<String>,
    #[serde(default, deserialize_with = "de::text")]
    pub end_date: Option<String>,
    #[serde(default, deserialize_with = "de::count")]
    pub click_count: u64,
    #[serde(default, deserialize_with = "de::text")]
    pub created_at: Option<String>,
    #[serde(default, deserialize_with = "de::text")]
    pub updated_at: Option<String>,
}

/// Dashboard role. Unknown roles from the backend degrade to `Viewer`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Editor,
    #[default]
    #[serde(other)]
    Viewer,
}

impl Role {
    /// Reports and template statistics are restricted to admins and editors.
    pub fn can_view_reports(&self) -> bool {
        matches!(self, Role::Admin | Role::Editor)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Admin => write!(f, "admin"),
            Role::Editor => write!(f, "editor"),
            Role::Viewer => write!(f, "viewer"),
        }
    }
}

/// User returned by a successful `POST /login`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginUser {
    #[serde(deserialize_with = "de::text_or_empty")]
    pub email: String,
    #[serde(default, deserialize_with = "de::role")]
    pub role: Role,
}

/// Metadata about a generated report.
#[derive(Debug, Clone, Serialize)]
pub struct ReportMetadata {
    /// When the report was produced.
    pub generated_at: DateTime<Utc>,
    /// Lead lists the report covers.
    pub scope: ReportScope,
    /// Events received from the backend.
    pub events_fetched: usize,
    /// Events left after the optional date-range filter.
    pub events_included: usize,
    /// Included events whose timestamp could not be parsed.
    pub events_undated: usize,
    /// Inclusive date range applied, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_range: Option<(NaiveDate, NaiveDate)>,
}

/// A complete aggregate report ready for rendering.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub metadata: ReportMetadata,
    /// Overall counts per collective and per source.
    pub summaries: Vec<ReportTable>,
    pub tables: Vec<ReportTable>,
}

mod de {
    use super::Role;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    /// Scalars as text; null, arrays and objects count as absent.
    fn scalar_text(value: Option<Value>) -> Option<String> {
        match value? {
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }

    /// Identifiers arrive as strings or numbers; null means absent.
    pub fn opaque_id<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        text_or_empty(deserializer)
    }

    pub fn text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(scalar_text(Option::<Value>::deserialize(deserializer)?))
    }

    pub fn text_or_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(text(deserializer)?.unwrap_or_default())
    }

    /// Non-negative counts; anything unreadable is zero.
    pub fn count<'de, D>(deserializer: D) -> Result<u64, D::Error>
    where
        D: Deserializer<'de>,
    {
        let count = match Option::<Value>::deserialize(deserializer)? {
            Some(Value::Number(n)) => n
                .as_u64()
                .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
            Some(Value::String(s)) => s.trim().parse().ok(),
            _ => None,
        };
        Ok(count.unwrap_or(0))
    }

    /// Unknown, missing or null roles degrade to `Viewer`.
    pub fn role<'de, D>(deserializer: D) -> Result<Role, D::Error>
    where
        D: Deserializer<'de>,
    {
        let role = text(deserializer)?.unwrap_or_default();
        Ok(match role.trim().to_lowercase().as_str() {
            "admin" => Role::Admin,
            "editor" => Role::Editor,
            _ => Role::Viewer,
        })
    }
}

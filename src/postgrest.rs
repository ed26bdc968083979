//! Wire-level helpers for the PostgREST endpoint behind `/rest/v1`.
//!
//! Error bodies look like
//! `{"code":"42P01","message":"relation \"public.ghost\" does not exist","details":null,"hint":null}`.

use crate::errors::ProbeError;
use regex::Regex;
use reqwest::StatusCode;
use serde::Deserialize;
use std::collections::BTreeSet;

/// Field name sent by the insert probe. Chosen so it cannot collide with a real column.
pub const SENTINEL_FIELD: &str = "__table_probe_sentinel__";

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct PostgrestErrorBody {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default)]
    pub hint: Option<String>,
}

impl PostgrestErrorBody {
    /// Parses a body only when it is a JSON object carrying a message or code.
    pub fn parse(body: &str) -> Option<Self> {
        let parsed: Self = serde_json::from_str(body).ok()?;
        if parsed.code.is_none() && parsed.message.is_none() {
            return None;
        }
        Some(parsed)
    }

    fn texts(&self) -> impl Iterator<Item = &str> {
        [&self.message, &self.details, &self.hint]
            .into_iter()
            .filter_map(|t| t.as_deref())
    }

    pub fn summary(&self) -> String {
        let mut out = String::new();
        if let Some(code) = &self.code {
            out.push_str(code);
            out.push_str(": ");
        }
        out.push_str(self.message.as_deref().unwrap_or("no message"));
        if let Some(hint) = &self.hint {
            out.push_str(" (hint: ");
            out.push_str(hint);
            out.push(')');
        }
        out
    }
}

const NOT_FOUND_CODES: &[&str] = &["42P01", "PGRST205", "PGRST200"];
const PERMISSION_CODES: &[&str] = &["42501"];

/// Maps a non-success response to a classified error.
pub fn classify_failure(status: StatusCode, body: &str) -> ProbeError {
    let parsed = PostgrestErrorBody::parse(body);
    let code = parsed.as_ref().and_then(|p| p.code.as_deref());
    let message = match &parsed {
        Some(p) => format!("{} {}", status.as_u16(), p.summary()),
        None if body.trim().is_empty() => format!(
            "{} {}",
            status.as_u16(),
            status.canonical_reason().unwrap_or("no body")
        ),
        None => format!("{} {}", status.as_u16(), body.trim()),
    };

    if code.is_some_and(|c| NOT_FOUND_CODES.contains(&c)) || status == StatusCode::NOT_FOUND {
        ProbeError::NotFound(message)
    } else if code.is_some_and(|c| PERMISSION_CODES.contains(&c))
        || status == StatusCode::UNAUTHORIZED
        || status == StatusCode::FORBIDDEN
    {
        ProbeError::PermissionDenied(message)
    } else {
        ProbeError::Unknown(message)
    }
}

/// Reads the total from `Content-Range: 0-2/3` or `*/0`.
pub fn parse_content_range_total(header: &str) -> Result<u64, ProbeError> {
    let total = header
        .rsplit_once('/')
        .map(|(_, total)| total.trim())
        .ok_or_else(|| {
            ProbeError::Malformed(format!("Content-Range without total: {}", header))
        })?;

    if total == "*" {
        return Err(ProbeError::Malformed(
            "Content-Range total is unknown; exact count was not honoured".to_string(),
        ));
    }

    total
        .parse::<u64>()
        .map_err(|_| ProbeError::Malformed(format!("Content-Range total not a number: {}", header)))
}

/// Recovers column names from an insert rejection.
///
/// Recognises `column "name"`, `'name' column` and `Key (a, b)=` fragments
/// in the message, details and hint. The sentinel field never counts.
pub fn harvest_columns(body: &PostgrestErrorBody) -> BTreeSet<String> {
    let quoted = Regex::new(r#"column "([^"]+)""#).expect("static regex");
    let single = Regex::new(r"'([^']+)' column").expect("static regex");
    let key = Regex::new(r"Key \(([^)]+)\)=").expect("static regex");

    let mut columns = BTreeSet::new();
    for text in body.texts() {
        for caps in quoted.captures_iter(text).chain(single.captures_iter(text)) {
            columns.insert(caps[1].to_string());
        }
        for caps in key.captures_iter(text) {
            columns.extend(caps[1].split(',').map(|c| c.trim().to_string()));
        }
    }
    columns.remove(SENTINEL_FIELD);
    columns.retain(|c| !c.is_empty());
    columns
}

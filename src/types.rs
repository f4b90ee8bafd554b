use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

// ═══════════════════════════════════════════════════════════════════════════
// ATS PROVIDER
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AtsProvider {
    Ashby,
    Greenhouse,
    Lever,
    Workable,
    Rippling,
}

pub const ALL_PROVIDERS: [AtsProvider; 5] = [
    AtsProvider::Ashby,
    AtsProvider::Greenhouse,
    AtsProvider::Lever,
    AtsProvider::Workable,
    AtsProvider::Rippling,
];

impl AtsProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            AtsProvider::Ashby => "ashby",
            AtsProvider::Greenhouse => "greenhouse",
            AtsProvider::Lever => "lever",
            AtsProvider::Workable => "workable",
            AtsProvider::Rippling => "rippling",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "ashby" => Some(AtsProvider::Ashby),
            "greenhouse" | "gh" => Some(AtsProvider::Greenhouse),
            "lever" | "lv" => Some(AtsProvider::Lever),
            "workable" => Some(AtsProvider::Workable),
            "rippling" => Some(AtsProvider::Rippling),
            _ => None,
        }
    }

    /// Registry CSV listing (name, url) rows for this provider.
    pub fn registry_csv(&self, root: &Path) -> PathBuf {
        match self {
            AtsProvider::Ashby => root.join("ashby").join("companies.csv"),
            AtsProvider::Greenhouse => root.join("greenhouse").join("greenhouse_companies.csv"),
            AtsProvider::Lever => root.join("lever").join("lever_companies.csv"),
            AtsProvider::Workable => root.join("workable").join("workable_companies.csv"),
            AtsProvider::Rippling => root.join("rippling").join("rippling_companies.csv"),
        }
    }

    /// Directory holding per-company JSON blobs written by the scrapers.
    pub fn companies_dir(&self, root: &Path) -> PathBuf {
        root.join(self.as_str()).join("companies")
    }

    /// Script invoked by the refresh hook for this provider.
    pub fn scraper_script(&self, root: &Path) -> PathBuf {
        root.join(self.as_str()).join("main.py")
    }

    /// Extract the company slug from a public board URL.
    ///
    /// Rippling boards live at `ats.rippling.com/{slug}/jobs`, so only the
    /// first path segment identifies the company. The other providers use the
    /// full (percent-decoded) path.
    pub fn slug_from_url(&self, raw_url: &str) -> String {
        let path = match Url::parse(raw_url) {
            Ok(u) => u.path().trim_start_matches('/').to_string(),
            Err(_) => raw_url.trim_start_matches('/').to_string(),
        };
        let slug = match self {
            AtsProvider::Rippling => path.split('/').next().unwrap_or("unknown").to_string(),
            _ => path,
        };
        urlencoding::decode(&slug)
            .map(|s| s.into_owned())
            .unwrap_or(slug)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// SOURCE BLOBS
// ═══════════════════════════════════════════════════════════════════════════

/// Why a per-company JSON blob could not be loaded. Adapters log this and
/// yield zero records; a blob failure never aborts the run.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Load and parse a scraper-written JSON blob.
pub fn read_json_blob(path: &Path) -> Result<Value, SourceError> {
    let text = std::fs::read_to_string(path).map_err(|source| SourceError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| SourceError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

// ═══════════════════════════════════════════════════════════════════════════
// CANONICAL JOB RECORD
// ═══════════════════════════════════════════════════════════════════════════

/// One output row of the snapshot CSV. `url` is the identity key for diffing;
/// `location` holds a single location after multi-location splitting.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobRecord {
    pub url: String,
    pub title: String,
    pub location: String,
    pub company: String,
    pub ats_id: String,
    pub ats_type: String,
    pub salary_currency: Option<String>,
    pub salary_period: Option<String>,
    pub salary_summary: Option<String>,
    pub experience: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub posted_at: Option<String>,
    pub date: Option<String>,
}

// ═══════════════════════════════════════════════════════════════════════════
// LOCATION HELPERS
// ═══════════════════════════════════════════════════════════════════════════

/// Split a multi-location string into individual locations.
///
/// `|` is preferred over `;`; a `;` inside a pipe-split fragment is NOT
/// re-split. Fragments are trimmed and empties dropped. A fully-empty input
/// still yields one empty entry so downstream emits one row.
pub fn split_locations(location: &str) -> Vec<String> {
    let parts: Vec<String> = if location.contains('|') {
        location
            .split('|')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect()
    } else {
        location
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect()
    };
    if parts.is_empty() {
        vec![String::new()]
    } else {
        parts
    }
}

/// Per-company location rewrites applied before splitting.
pub fn normalize_location_by_company(location: &str, company: &str) -> String {
    let location_lower = location.trim().to_lowercase();
    let company_lower = company.trim().to_lowercase();

    if company_lower == "tavily" && location_lower == "all locations - on site" {
        return "New York".to_string();
    }

    location.to_string()
}

// ═══════════════════════════════════════════════════════════════════════════
// TIMESTAMPS
// ═══════════════════════════════════════════════════════════════════════════

/// Render a datetime as UTC ISO 8601 with second precision and `Z` suffix.
pub fn to_utc_iso(dt: DateTime<Utc>) -> String {
    dt.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// Parse an ISO-8601-ish timestamp. Accepts offsets (`Z`, `+00:00`), naive
/// datetimes (assumed UTC) and bare dates (UTC midnight).
pub fn parse_iso_flexible(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(Utc.from_utc_datetime(&naive));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(Utc.from_utc_datetime(&naive));
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?));
    }
    for fmt in ["%m/%d/%Y", "%d/%m/%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(raw, fmt) {
            return Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?));
        }
    }
    None
}

/// Compute `posted_at` from a raw job object based on ATS type.
///
/// - ashby:      `publishedAt` (ISO)
/// - greenhouse: `updated_at`, falling back to `first_published` (ISO)
/// - lever:      `createdAt` (epoch ms, or ISO when a string)
/// - rippling:   `created_on` (ISO)
/// - workable:   `published_on`, falling back to `created_at` (YYYY-MM-DD)
/// - amazon:     `createdDate` (epoch seconds)
pub fn posted_at_from_source(ats_type: &str, raw_job: &Value) -> Option<String> {
    match ats_type {
        "ashby" => raw_job
            .get("publishedAt")
            .and_then(Value::as_str)
            .and_then(parse_iso_flexible)
            .map(to_utc_iso),
        "greenhouse" => raw_job
            .get("updated_at")
            .and_then(Value::as_str)
            .or_else(|| raw_job.get("first_published").and_then(Value::as_str))
            .and_then(parse_iso_flexible)
            .map(to_utc_iso),
        "lever" => match raw_job.get("createdAt") {
            Some(Value::Number(n)) => {
                let ms = n.as_f64()?;
                let dt = DateTime::from_timestamp_millis(ms as i64)?;
                Some(to_utc_iso(dt))
            }
            Some(Value::String(s)) => parse_iso_flexible(s).map(to_utc_iso),
            _ => None,
        },
        "rippling" => raw_job
            .get("created_on")
            .and_then(Value::as_str)
            .and_then(parse_iso_flexible)
            .map(to_utc_iso),
        "workable" => {
            let published = raw_job.get("published_on").and_then(Value::as_str);
            let created = raw_job.get("created_at").and_then(Value::as_str);
            published
                .and_then(parse_iso_flexible)
                .or_else(|| created.and_then(parse_iso_flexible))
                .map(to_utc_iso)
        }
        "amazon" => {
            let created = raw_job.get("createdDate")?;
            let secs = match created {
                Value::Number(n) => n.as_f64()?,
                Value::String(s) => s.parse::<f64>().ok()?,
                _ => return None,
            };
            DateTime::from_timestamp(secs as i64, 0).map(to_utc_iso)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn splits_on_pipe_before_semicolon() {
        let parts = split_locations("San Francisco, CA | New York; NY | Austin");
        assert_eq!(parts, vec!["San Francisco, CA", "New York; NY", "Austin"]);
    }

    #[test]
    fn splits_on_semicolon_when_no_pipe() {
        let parts = split_locations("Austin; Remote ; ");
        assert_eq!(parts, vec!["Austin", "Remote"]);
    }

    #[test]
    fn empty_input_yields_single_empty_entry() {
        assert_eq!(split_locations(""), vec![""]);
        assert_eq!(split_locations(" ; "), vec![""]);
    }

    #[test]
    fn tavily_location_rewrite() {
        assert_eq!(
            normalize_location_by_company("All Locations - On Site", "Tavily"),
            "New York"
        );
        assert_eq!(
            normalize_location_by_company("All Locations - On Site", "Acme"),
            "All Locations - On Site"
        );
    }

    #[test]
    fn lever_epoch_ms_posted_at() {
        let raw = json!({"createdAt": 1710079920000i64});
        assert_eq!(
            posted_at_from_source("lever", &raw).as_deref(),
            Some("2024-03-10T14:12:00Z")
        );
    }

    #[test]
    fn workable_date_posted_at() {
        let raw = json!({"published_on": "2025-03-10"});
        assert_eq!(
            posted_at_from_source("workable", &raw).as_deref(),
            Some("2025-03-10T00:00:00Z")
        );
    }

    #[test]
    fn amazon_epoch_seconds_posted_at() {
        let raw = json!({"createdDate": 1741617120i64});
        assert_eq!(
            posted_at_from_source("amazon", &raw).as_deref(),
            Some("2025-03-10T14:32:00Z")
        );
    }

    #[test]
    fn greenhouse_prefers_updated_at() {
        let raw = json!({
            "updated_at": "2025-03-10T14:32:00-04:00",
            "first_published": "2024-01-01T00:00:00Z"
        });
        assert_eq!(
            posted_at_from_source("greenhouse", &raw).as_deref(),
            Some("2025-03-10T18:32:00Z")
        );
    }

    #[test]
    fn rippling_slug_takes_first_segment() {
        let slug = AtsProvider::Rippling.slug_from_url("https://ats.rippling.com/acme/jobs");
        assert_eq!(slug, "acme");
    }

    #[test]
    fn ashby_slug_keeps_full_decoded_path() {
        let slug = AtsProvider::Ashby.slug_from_url("https://jobs.ashbyhq.com/Hello%20World");
        assert_eq!(slug, "Hello World");
    }
}

use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::atlas;
use crate::types::{
    normalize_location_by_company, parse_iso_flexible, posted_at_from_source, split_locations,
    to_utc_iso, JobRecord,
};

// ═══════════════════════════════════════════════════════════════════════════
// BESPOKE SOURCES
// ═══════════════════════════════════════════════════════════════════════════
//
// Corporate careers sites scraped by dedicated external scrapers. Each writes
// a single `<source>/<source>.json` blob shaped like the ATS blobs (a `jobs`
// array plus `last_scraped`), but with per-site field names.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BespokeSource {
    Google,
    Microsoft,
    Nvidia,
    Amazon,
    Meta,
    TikTok,
    Cursor,
    Apple,
    Uber,
}

pub const ALL_BESPOKE: [BespokeSource; 9] = [
    BespokeSource::Google,
    BespokeSource::Microsoft,
    BespokeSource::Nvidia,
    BespokeSource::Amazon,
    BespokeSource::Meta,
    BespokeSource::TikTok,
    BespokeSource::Cursor,
    BespokeSource::Apple,
    BespokeSource::Uber,
];

impl BespokeSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            BespokeSource::Google => "google",
            BespokeSource::Microsoft => "microsoft",
            BespokeSource::Nvidia => "nvidia",
            BespokeSource::Amazon => "amazon",
            BespokeSource::Meta => "meta",
            BespokeSource::TikTok => "tiktok",
            BespokeSource::Cursor => "cursor",
            BespokeSource::Apple => "apple",
            BespokeSource::Uber => "uber",
        }
    }

    pub fn from_normalized_name(name: &str) -> Option<Self> {
        ALL_BESPOKE.iter().copied().find(|s| s.as_str() == name)
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            BespokeSource::Google => "Google",
            BespokeSource::Microsoft => "Microsoft",
            BespokeSource::Nvidia => "NVIDIA",
            BespokeSource::Amazon => "Amazon",
            BespokeSource::Meta => "Meta",
            BespokeSource::TikTok => "TikTok",
            BespokeSource::Cursor => "Cursor",
            BespokeSource::Apple => "Apple",
            BespokeSource::Uber => "Uber",
        }
    }

    pub fn json_path(&self, root: &Path) -> PathBuf {
        root.join(self.as_str()).join(format!("{}.json", self.as_str()))
    }

    pub fn scraper_script(&self, root: &Path) -> PathBuf {
        root.join(self.as_str()).join("main.py")
    }

    /// Freshness window in hours. The slow scrapers keep their data longer.
    pub fn max_age_hours(&self) -> f64 {
        match self {
            BespokeSource::Apple | BespokeSource::Uber => 6.0,
            BespokeSource::Nvidia | BespokeSource::TikTok => 12.0,
            _ => 1.0,
        }
    }

    pub fn extract_jobs(&self, json_file: &Path) -> Vec<JobRecord> {
        let Some(raw_jobs) = read_job_array(json_file) else {
            return Vec::new();
        };
        let company = self.display_name();

        match self {
            BespokeSource::Google | BespokeSource::TikTok | BespokeSource::Cursor => raw_jobs
                .iter()
                .flat_map(|raw| extract_simple(raw, company, self.as_str()))
                .collect(),
            BespokeSource::Microsoft => raw_jobs
                .iter()
                .flat_map(|raw| extract_locations_array(raw, company, "microsoft", true))
                .collect(),
            BespokeSource::Nvidia => raw_jobs
                .iter()
                .flat_map(|raw| extract_locations_array(raw, company, "nvidia", false))
                .collect(),
            BespokeSource::Amazon => raw_jobs
                .iter()
                .flat_map(|raw| extract_amazon(raw, company))
                .collect(),
            BespokeSource::Meta => raw_jobs
                .iter()
                .flat_map(|raw| extract_meta(raw, company))
                .collect(),
            BespokeSource::Apple => raw_jobs
                .iter()
                .flat_map(|raw| extract_semicolon_locations(raw, company, "apple", "postingDate"))
                .collect(),
            BespokeSource::Uber => raw_jobs
                .iter()
                .flat_map(|raw| extract_uber(raw, company))
                .collect(),
        }
    }
}

fn read_job_array(json_file: &Path) -> Option<Vec<Value>> {
    let data: Value = match crate::types::read_json_blob(json_file) {
        Ok(data) => data,
        Err(e) => {
            tracing::warn!("{e}");
            return None;
        }
    };
    match data {
        Value::Array(list) => Some(list),
        Value::Object(_) => Some(
            data.get("jobs")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default(),
        ),
        _ => None,
    }
}

fn str_field<'a>(raw: &'a Value, key: &str) -> &'a str {
    raw.get(key).and_then(Value::as_str).unwrap_or("").trim()
}

fn id_field(raw: &Value, key: &str) -> Option<String> {
    match raw.get(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

fn rows_for(
    raw_location: &str,
    company: &str,
    ats_type: &str,
    url: &str,
    title: &str,
    ats_id: &str,
    posted_at: Option<String>,
) -> Vec<JobRecord> {
    let location_str = normalize_location_by_company(raw_location, company);
    split_locations(&location_str)
        .into_iter()
        .map(|loc| {
            let coords = atlas::lookup(&loc);
            JobRecord {
                url: url.to_string(),
                title: title.to_string(),
                location: loc,
                company: company.to_string(),
                ats_id: ats_id.to_string(),
                ats_type: ats_type.to_string(),
                salary_currency: None,
                salary_period: None,
                salary_summary: None,
                experience: None,
                lat: coords.map(|c| c.0),
                lon: coords.map(|c| c.1),
                posted_at: posted_at.clone(),
                date: None,
            }
        })
        .collect()
}

/// url/title/location fields, ats_id = url, no posted_at.
fn extract_simple(raw: &Value, company: &str, ats_type: &str) -> Vec<JobRecord> {
    let url = str_field(raw, "url");
    let title = str_field(raw, "title");
    if url.is_empty() || title.is_empty() {
        return Vec::new();
    }
    rows_for(str_field(raw, "location"), company, ats_type, url, title, url, None)
}

/// `locations` array joined with " | "; Microsoft carries an `eightfold_id`.
/// These sources are not in the posted_at derivation set, so posted_at stays
/// unset.
fn extract_locations_array(
    raw: &Value,
    company: &str,
    ats_type: &str,
    use_eightfold_id: bool,
) -> Vec<JobRecord> {
    let url = str_field(raw, "url");
    let title = str_field(raw, "title");
    if url.is_empty() || title.is_empty() {
        return Vec::new();
    }

    let location = match raw.get("locations") {
        Some(Value::Array(list)) => list
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" | "),
        Some(Value::String(s)) => s.trim().to_string(),
        _ => String::new(),
    };

    let ats_id = if use_eightfold_id {
        id_field(raw, "eightfold_id").unwrap_or_else(|| url.to_string())
    } else {
        url.to_string()
    };

    rows_for(&location, company, ats_type, url, title, &ats_id, None)
}

fn extract_amazon(raw: &Value, company: &str) -> Vec<JobRecord> {
    let url = str_field(raw, "urlNextStep");
    let title = str_field(raw, "title");
    if url.is_empty() || title.is_empty() {
        return Vec::new();
    }
    let posted_at = posted_at_from_source("amazon", raw);
    rows_for(str_field(raw, "location"), company, "amazon", url, title, url, posted_at)
}

/// Meta is not in the posted_at derivation set either; posted_at stays unset.
fn extract_meta(raw: &Value, company: &str) -> Vec<JobRecord> {
    let url = str_field(raw, "url");
    let title = str_field(raw, "title");
    let ats_id = id_field(raw, "id").unwrap_or_else(|| url.to_string());

    let location_values: Vec<String> = match raw.get("locations").or_else(|| raw.get("location")) {
        Some(Value::Array(list)) => list
            .iter()
            .filter_map(Value::as_str)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        Some(Value::String(s)) => vec![s.trim().to_string()],
        _ => vec![String::new()],
    };

    location_values
        .iter()
        .flat_map(|raw_loc| rows_for(raw_loc, company, "meta", url, title, &ats_id, None))
        .collect()
}

/// Apple-style: `locations` array joined with "; ", `location` fallback,
/// "N/A" when both are empty.
fn extract_semicolon_locations(
    raw: &Value,
    company: &str,
    ats_type: &str,
    date_key: &str,
) -> Vec<JobRecord> {
    let url = str_field(raw, "url");
    let title = str_field(raw, "title");
    if url.is_empty() || title.is_empty() {
        return Vec::new();
    }

    let ats_id = id_field(raw, "positionId")
        .or_else(|| id_field(raw, "id"))
        .unwrap_or_else(|| url.to_string());

    let mut location = match raw.get("locations") {
        Some(Value::Array(list)) if !list.is_empty() => list
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("; "),
        _ => str_field(raw, "location").to_string(),
    };
    if location.is_empty() {
        location = "N/A".to_string();
    }

    let posted_at = raw
        .get(date_key)
        .and_then(Value::as_str)
        .and_then(parse_iso_flexible)
        .map(to_utc_iso);

    rows_for(&location, company, ats_type, url, title, &ats_id, posted_at)
}

fn extract_uber(raw: &Value, company: &str) -> Vec<JobRecord> {
    let url = str_field(raw, "url");
    let title = str_field(raw, "title");
    if url.is_empty() || title.is_empty() {
        return Vec::new();
    }

    let ats_id = id_field(raw, "id").unwrap_or_else(|| url.to_string());

    let mut location = match raw.get("locations") {
        Some(Value::Array(list)) if !list.is_empty() => list
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("; "),
        _ => str_field(raw, "location").to_string(),
    };
    if location.is_empty() {
        location = "N/A".to_string();
    }

    let posted_at = raw
        .get("creation_date")
        .and_then(Value::as_str)
        .or_else(|| raw.get("creationDate").and_then(Value::as_str))
        .and_then(parse_iso_flexible)
        .map(to_utc_iso);

    rows_for(&location, company, "uber", url, title, &ats_id, posted_at)
}

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};

use crate::types::JobRecord;

pub const CLOUDFLARE_FAILURES_FILE: &str = "cloudflare_location_failures.jsonl";
pub const MISSING_LOCATIONS_FILE: &str = "missing_locations.json";

// ═══════════════════════════════════════════════════════════════════════════
// Cloudflare location-extraction failure log (JSONL, append-only)
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Serialize)]
pub struct CloudflareFailure {
    pub timestamp: String,
    pub job_url: String,
    pub job_title: String,
    pub original_location: String,
    pub workplace_type: String,
    pub description_snippet: String,
    pub description_length: usize,
    pub metadata_job_posting_location: Option<Value>,
    pub offices: Option<Value>,
}

impl CloudflareFailure {
    pub fn new(
        job_url: &str,
        job_title: &str,
        original_location: &str,
        workplace_type: &str,
        description: Option<&str>,
        metadata_value: Option<Value>,
        offices: Option<Value>,
    ) -> Self {
        let snippet = description
            .map(|d| {
                let decoded = html_escape::decode_html_entities(d);
                let clean = crate::enrichment::strip_html_tags(&decoded);
                clean.chars().take(500).collect::<String>().trim().to_string()
            })
            .unwrap_or_default();
        Self {
            timestamp: Utc::now().to_rfc3339(),
            job_url: job_url.to_string(),
            job_title: job_title.to_string(),
            original_location: original_location.to_string(),
            workplace_type: workplace_type.to_string(),
            description_snippet: snippet,
            description_length: description.map(str::len).unwrap_or(0),
            metadata_job_posting_location: metadata_value,
            offices,
        }
    }
}

/// Append one failure record to the JSONL log. Logging problems are warned
/// about but never fail the run.
pub fn log_cloudflare_failure(root: &Path, failure: &CloudflareFailure) {
    let path = root.join(CLOUDFLARE_FAILURES_FILE);
    let result = serde_json::to_string(failure).map_err(anyhow::Error::from).and_then(|line| {
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        writeln!(file, "{line}")?;
        Ok(())
    });
    if let Err(e) = result {
        tracing::warn!("failed to log Cloudflare extraction failure: {e}");
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Missing-locations report
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Default)]
pub struct MissingLocationsSummary {
    pub total: usize,
    pub empty_count: usize,
    /// Unique missing location strings, sorted by descending count then name.
    pub unique: Vec<(String, usize)>,
}

pub fn summarize_missing_locations(jobs: &[JobRecord]) -> MissingLocationsSummary {
    let missing: Vec<&JobRecord> = jobs
        .iter()
        .filter(|j| j.lat.is_none() || j.lon.is_none())
        .collect();

    let mut counts: std::collections::HashMap<String, usize> = std::collections::HashMap::new();
    let mut empty_count = 0usize;
    for job in &missing {
        let location = job.location.trim();
        if location.is_empty() {
            empty_count += 1;
        } else {
            *counts.entry(location.to_string()).or_default() += 1;
        }
    }

    let mut unique: Vec<(String, usize)> = counts.into_iter().collect();
    unique.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    MissingLocationsSummary {
        total: missing.len(),
        empty_count,
        unique,
    }
}

/// Persist the missing-locations report next to the snapshots.
pub fn write_missing_locations_report(
    root: &Path,
    jobs: &[JobRecord],
    summary: &MissingLocationsSummary,
) -> anyhow::Result<()> {
    let sample: Vec<Value> = jobs
        .iter()
        .filter(|j| (j.lat.is_none() || j.lon.is_none()) && j.location.trim().is_empty())
        .take(20)
        .map(|j| {
            json!({
                "company": j.company,
                "title": j.title,
                "url": j.url,
                "ats_type": j.ats_type,
            })
        })
        .collect();

    let report = json!({
        "total_jobs_with_missing_locations": summary.total,
        "jobs_with_empty_null_locations": summary.empty_count,
        "unique_missing_locations_count": summary.unique.len(),
        "locations": summary
            .unique
            .iter()
            .map(|(location, count)| json!({"location": location, "count": count}))
            .collect::<Vec<_>>(),
        "sample_empty_null_jobs": sample,
    });

    let path = root.join(MISSING_LOCATIONS_FILE);
    std::fs::write(&path, serde_json::to_string_pretty(&report)?)?;
    Ok(())
}

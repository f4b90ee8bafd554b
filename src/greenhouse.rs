use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use crate::atlas;
use crate::diagnostics::{self, CloudflareFailure};
use crate::types::{
    normalize_location_by_company, posted_at_from_source, split_locations, JobRecord,
};

// ═══════════════════════════════════════════════════════════════════════════
// Greenhouse Job Board API v1 types
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Deserialize, Clone, Debug)]
pub struct GreenhouseLocation {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct GreenhouseOffice {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct GreenhouseMetadataField {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub value_type: Option<String>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct GreenhouseJob {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub absolute_url: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub first_published: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub location: Option<GreenhouseLocation>,
    #[serde(default)]
    pub offices: Option<Vec<GreenhouseOffice>>,
    #[serde(default)]
    pub metadata: Option<Vec<GreenhouseMetadataField>>,
}

// ═══════════════════════════════════════════════════════════════════════════
// Cloudflare workplace-type resolution
// ═══════════════════════════════════════════════════════════════════════════
//
// Cloudflare boards put the workplace type ("Hybrid", "Distributed", ...)
// where every other company puts a city. The real location hides in the
// "Job Posting Location" metadata entry, in the offices list, or in an
// "Available Location(s): ..." line inside the description.

const WORKPLACE_TYPES: [&str; 4] = ["hybrid", "in-office", "in office", "distributed"];

static AVAILABLE_LOCATIONS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)Available\s+Location(?:s)?\s*:\s*([^<]+?)(?:</[^>]+>|$)").unwrap()
});

fn is_generic_workplace(location: &str) -> bool {
    let lower = location.to_lowercase();
    WORKPLACE_TYPES.iter().any(|wt| lower.contains(wt))
}

fn normalize_workplace_type(raw: &str) -> String {
    let lower = raw.to_lowercase();
    match lower.as_str() {
        "in office" | "in-office" => "In-Office".to_string(),
        "hybrid" | "distributed" => {
            let mut chars = raw.chars();
            match chars.next() {
                Some(c) => c.to_uppercase().to_string() + &chars.as_str().to_lowercase(),
                None => String::new(),
            }
        }
        _ => raw.to_string(),
    }
}

/// Resolve the real location from the structured metadata/offices fields.
pub fn location_from_metadata(job: &GreenhouseJob) -> Option<String> {
    if let Some(metadata) = &job.metadata {
        for meta in metadata {
            let name_matches = meta
                .name
                .as_deref()
                .map(|n| n.eq_ignore_ascii_case("job posting location"))
                .unwrap_or(false);
            if !name_matches {
                continue;
            }
            match &meta.value {
                Some(Value::Array(values)) => {
                    let locations: Vec<String> = values
                        .iter()
                        .filter_map(|v| v.as_str())
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(String::from)
                        .collect();
                    if !locations.is_empty() {
                        return Some(locations.join("; "));
                    }
                }
                Some(Value::String(s)) => {
                    let location = s.trim();
                    if !location.is_empty() {
                        return Some(location.to_string());
                    }
                }
                _ => {}
            }
        }
    }

    if let Some(offices) = &job.offices {
        let office_locations: Vec<String> = offices
            .iter()
            .filter_map(|o| {
                o.location
                    .as_deref()
                    .filter(|s| !s.trim().is_empty())
                    .or(o.name.as_deref())
            })
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if !office_locations.is_empty() {
            return Some(office_locations.join("; "));
        }
    }

    None
}

fn location_from_description(content: &str) -> Option<String> {
    let decoded = html_escape::decode_html_entities(content);
    let captured = AVAILABLE_LOCATIONS_RE
        .captures(&decoded)
        .and_then(|c| c.get(1))?;
    let location = crate::enrichment::strip_html_tags(captured.as_str());
    let location = html_escape::decode_html_entities(&location);
    let location = location.trim().trim_end_matches(['.', ',', ';']).trim();
    if location.is_empty() {
        None
    } else {
        Some(location.to_string())
    }
}

fn resolve_cloudflare_location(
    job: &GreenhouseJob,
    location_str: &str,
    root: &Path,
) -> String {
    let workplace_type = normalize_workplace_type(
        location_str.split(';').next().unwrap_or("").trim(),
    );

    let extracted = location_from_metadata(job)
        .or_else(|| job.content.as_deref().and_then(location_from_description));

    match extracted {
        Some(extracted) => {
            let formatted: Vec<String> = split_locations(&extracted)
                .into_iter()
                .filter(|l| !l.is_empty())
                .map(|l| format!("{l} ({workplace_type})"))
                .collect();
            if formatted.is_empty() {
                extracted
            } else {
                formatted.join("; ")
            }
        }
        None => {
            tracing::warn!(
                "Cloudflare location extraction failed for: {} - {}",
                job.title.as_deref().unwrap_or("Unknown"),
                job.absolute_url.as_deref().unwrap_or("No URL"),
            );
            let metadata_value = job.metadata.as_ref().and_then(|metadata| {
                metadata
                    .iter()
                    .find(|m| {
                        m.name
                            .as_deref()
                            .map(|n| n.eq_ignore_ascii_case("job posting location"))
                            .unwrap_or(false)
                    })
                    .map(|m| {
                        serde_json::json!({
                            "name": m.name,
                            "value": m.value,
                            "value_type": m.value_type,
                        })
                    })
            });
            let offices = job.offices.as_ref().map(|offices| {
                Value::Array(
                    offices
                        .iter()
                        .map(|o| {
                            serde_json::json!({
                                "id": o.id,
                                "name": o.name,
                                "location": o.location,
                            })
                        })
                        .collect(),
                )
            });
            diagnostics::log_cloudflare_failure(
                root,
                &CloudflareFailure::new(
                    job.absolute_url.as_deref().unwrap_or(""),
                    job.title.as_deref().unwrap_or(""),
                    location_str,
                    &workplace_type,
                    job.content.as_deref(),
                    metadata_value,
                    offices,
                ),
            );
            // The raw workplace-type string stays; the row is still emitted
            // and will surface in the missing-locations report.
            location_str.to_string()
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// EXTRACTION
// ═══════════════════════════════════════════════════════════════════════════

/// Parse a Greenhouse per-company JSON blob into canonical records.
pub fn extract_jobs(json_file: &Path, company_name: &str, root: &Path) -> Vec<JobRecord> {
    let mut jobs = Vec::new();

    let data: Value = match crate::types::read_json_blob(json_file) {
        Ok(data) => data,
        Err(e) => {
            tracing::warn!("{e}");
            return jobs;
        }
    };

    let raw_jobs = data
        .get("jobs")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    for raw in &raw_jobs {
        let job: GreenhouseJob = match serde_json::from_value(raw.clone()) {
            Ok(j) => j,
            Err(_) => continue,
        };

        let mut location_str = job
            .location
            .as_ref()
            .and_then(|l| l.name.as_deref())
            .unwrap_or("")
            .to_string();

        if company_name.eq_ignore_ascii_case("cloudflare") && is_generic_workplace(&location_str)
        {
            location_str = resolve_cloudflare_location(&job, &location_str, root);
        }

        let location_str = normalize_location_by_company(&location_str, company_name);
        let locations = split_locations(&location_str);

        // The board API has no compensation object; a salary occasionally
        // shows up as a metadata entry.
        let salary_summary = job.metadata.as_ref().and_then(|metadata| {
            metadata
                .iter()
                .find(|m| {
                    m.name
                        .as_deref()
                        .map(|n| n.to_lowercase().contains("salary"))
                        .unwrap_or(false)
                })
                .and_then(|m| m.value.as_ref())
                .map(|v| match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
        });

        let posted_at = posted_at_from_source("greenhouse", raw);

        for loc in locations {
            let coords = atlas::lookup(&loc);
            jobs.push(JobRecord {
                url: job.absolute_url.clone().unwrap_or_default(),
                title: job.title.as_deref().unwrap_or("").trim().to_string(),
                location: loc,
                company: company_name.to_string(),
                ats_id: job.id.map(|id| id.to_string()).unwrap_or_default(),
                ats_type: "greenhouse".to_string(),
                salary_currency: None,
                salary_period: None,
                salary_summary: salary_summary.clone(),
                experience: None,
                lat: coords.map(|c| c.0),
                lon: coords.map(|c| c.1),
                posted_at: posted_at.clone(),
                date: None,
            });
        }
    }

    jobs
}

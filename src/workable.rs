use std::path::Path;

use serde::Deserialize;
use serde_json::Value;

use crate::atlas;
use crate::types::{
    normalize_location_by_company, posted_at_from_source, split_locations, JobRecord,
};

// ═══════════════════════════════════════════════════════════════════════════
// Workable Widget API v1 types
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Deserialize, Clone, Debug)]
pub struct WorkableLocation {
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct WorkableJob {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub shortcode: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub application_url: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub locations: Option<Vec<WorkableLocation>>,
}

/// Parse a Workable per-company JSON blob into canonical records. The blob is
/// a top-level list, or an object with a `results` or `jobs` array.
pub fn extract_jobs(json_file: &Path, company_name: &str) -> Vec<JobRecord> {
    let mut jobs = Vec::new();

    let data: Value = match crate::types::read_json_blob(json_file) {
        Ok(data) => data,
        Err(e) => {
            tracing::warn!("{e}");
            return jobs;
        }
    };

    let raw_jobs = match &data {
        Value::Array(list) => list.clone(),
        Value::Object(_) => data
            .get("results")
            .and_then(Value::as_array)
            .or_else(|| data.get("jobs").and_then(Value::as_array))
            .cloned()
            .unwrap_or_default(),
        _ => Vec::new(),
    };

    for raw in &raw_jobs {
        let job: WorkableJob = match serde_json::from_value(raw.clone()) {
            Ok(j) => j,
            Err(_) => continue,
        };

        let location_str = if let Some(locations) = job.locations.as_ref().filter(|l| !l.is_empty())
        {
            locations
                .iter()
                .map(|loc| {
                    [loc.city.as_deref(), loc.region.as_deref(), loc.country.as_deref()]
                        .into_iter()
                        .flatten()
                        .filter(|p| !p.is_empty())
                        .collect::<Vec<_>>()
                        .join(", ")
                })
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join(", ")
        } else {
            [job.city.as_deref(), job.state.as_deref(), job.country.as_deref()]
                .into_iter()
                .flatten()
                .filter(|p| !p.is_empty())
                .collect::<Vec<_>>()
                .join(", ")
        };

        let location_str = normalize_location_by_company(&location_str, company_name);
        let locations = split_locations(&location_str);

        let posted_at = posted_at_from_source("workable", raw);
        let url = job
            .url
            .as_deref()
            .or(job.application_url.as_deref())
            .unwrap_or("")
            .to_string();
        let ats_id = job
            .shortcode
            .as_deref()
            .or(job.code.as_deref())
            .unwrap_or("")
            .to_string();

        for loc in locations {
            let coords = atlas::lookup(&loc);
            jobs.push(JobRecord {
                url: url.clone(),
                title: job.title.as_deref().unwrap_or("").trim().to_string(),
                location: loc,
                company: company_name.to_string(),
                ats_id: ats_id.clone(),
                ats_type: "workable".to_string(),
                salary_currency: None,
                salary_period: None,
                salary_summary: None,
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

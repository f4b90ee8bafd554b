use std::path::Path;

use serde::Deserialize;
use serde_json::Value;

use crate::atlas;
use crate::types::{
    normalize_location_by_company, posted_at_from_source, split_locations, JobRecord,
};

// ═══════════════════════════════════════════════════════════════════════════
// Lever Postings API v0 types
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct LeverCategories {
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub team: Option<String>,
    #[serde(default)]
    pub commitment: Option<String>,
    #[serde(default)]
    pub all_locations: Option<Vec<String>>,
}

#[derive(Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct LeverPosting {
    #[serde(default)]
    pub id: Option<String>,
    /// Job title
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub categories: Option<LeverCategories>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub hosted_url: Option<String>,
    #[serde(default)]
    pub apply_url: Option<String>,
}

/// Parse a Lever per-company JSON blob into canonical records. The blob is a
/// top-level list, or an object with a `postings` or `jobs` array.
pub fn extract_jobs(json_file: &Path, company_name: &str) -> Vec<JobRecord> {
    let mut jobs = Vec::new();

    let data: Value = match crate::types::read_json_blob(json_file) {
        Ok(data) => data,
        Err(e) => {
            tracing::warn!("{e}");
            return jobs;
        }
    };

    let raw_jobs = job_array(&data);

    for raw in &raw_jobs {
        let posting: LeverPosting = match serde_json::from_value(raw.clone()) {
            Ok(p) => p,
            Err(_) => continue,
        };

        let mut location_str = String::new();
        if let Some(categories) = &posting.categories {
            if let Some(location) = categories.location.as_deref() {
                location_str = location.to_string();
            } else if let Some(all) = &categories.all_locations {
                location_str = all
                    .iter()
                    .filter(|l| !l.is_empty())
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(", ");
            }
        }
        if location_str.is_empty() {
            location_str = posting.country.clone().unwrap_or_default();
        }

        let location_str = normalize_location_by_company(&location_str, company_name);
        let locations = split_locations(&location_str);

        let posted_at = posted_at_from_source("lever", raw);
        let url = posting
            .hosted_url
            .as_deref()
            .or(posting.apply_url.as_deref())
            .unwrap_or("")
            .to_string();

        for loc in locations {
            let coords = atlas::lookup(&loc);
            jobs.push(JobRecord {
                url: url.clone(),
                title: posting.text.as_deref().unwrap_or("").trim().to_string(),
                location: loc,
                company: company_name.to_string(),
                ats_id: posting.id.clone().unwrap_or_default(),
                ats_type: "lever".to_string(),
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

fn job_array(data: &Value) -> Vec<Value> {
    match data {
        Value::Array(list) => list.clone(),
        Value::Object(_) => data
            .get("postings")
            .and_then(Value::as_array)
            .or_else(|| data.get("jobs").and_then(Value::as_array))
            .cloned()
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

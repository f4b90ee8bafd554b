use std::path::Path;

use serde_json::Value;

use crate::ashby::{extract_compensation_data, Compensation};
use crate::atlas;
use crate::types::{
    normalize_location_by_company, posted_at_from_source, split_locations, JobRecord,
};

/// Parse a Rippling per-company JSON blob into canonical records.
///
/// Rippling blobs have no stable schema, so fields are pulled straight out of
/// the raw JSON: `url`/`applyUrl`, `title`/`name`, `location`/`city`. The
/// compensation object, when present, reuses the Ashby component layout.
pub fn extract_jobs(json_file: &Path, company_name: &str) -> Vec<JobRecord> {
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
        .or_else(|| data.get("results").and_then(Value::as_array))
        .cloned()
        .unwrap_or_default();

    for raw in &raw_jobs {
        let url = raw
            .get("url")
            .and_then(Value::as_str)
            .or_else(|| raw.get("applyUrl").and_then(Value::as_str))
            .unwrap_or("")
            .to_string();
        let title = raw
            .get("title")
            .and_then(Value::as_str)
            .or_else(|| raw.get("name").and_then(Value::as_str))
            .unwrap_or("")
            .trim()
            .to_string();
        let location = raw
            .get("location")
            .and_then(Value::as_str)
            .or_else(|| raw.get("city").and_then(Value::as_str))
            .unwrap_or("");
        let ats_id = match raw.get("id") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => String::new(),
        };

        let compensation: Option<Compensation> = raw
            .get("compensation")
            .cloned()
            .and_then(|c| serde_json::from_value(c).ok());
        let comp_data = extract_compensation_data(compensation.as_ref());

        let location = normalize_location_by_company(location, company_name);
        let locations = split_locations(&location);

        let posted_at = posted_at_from_source("rippling", raw);

        for loc in locations {
            let coords = atlas::lookup(&loc);
            jobs.push(JobRecord {
                url: url.clone(),
                title: title.clone(),
                location: loc,
                company: company_name.to_string(),
                ats_id: ats_id.clone(),
                ats_type: "rippling".to_string(),
                salary_currency: comp_data.salary_currency.clone(),
                salary_period: comp_data.salary_period.clone(),
                salary_summary: comp_data.salary_summary.clone(),
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

use std::path::Path;

use serde::Deserialize;
use serde_json::Value;

use crate::atlas;
use crate::types::{
    normalize_location_by_company, posted_at_from_source, split_locations, JobRecord,
};

// ═══════════════════════════════════════════════════════════════════════════
// Ashby Posting API types
// ═══════════════════════════════════════════════════════════════════════════

/// One compensation component. Only components with
/// `compensationType == "Salary"` contribute to the salary fields; equity and
/// other component kinds are ignored. Field spellings arrive as camelCase or
/// snake_case depending on the scraper revision, so both are accepted.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct CompensationComponent {
    #[serde(default, alias = "compensationType")]
    pub compensation_type: Option<String>,
    #[serde(default)]
    pub interval: Option<String>,
    #[serde(default, alias = "currencyCode")]
    pub currency_code: Option<String>,
    #[serde(default, alias = "minValue")]
    pub min_value: Option<f64>,
    #[serde(default, alias = "maxValue")]
    pub max_value: Option<f64>,
}

#[derive(Deserialize, Clone, Debug, Default)]
pub struct CompensationTier {
    #[serde(default, alias = "tierSummary")]
    pub tier_summary: Option<String>,
    #[serde(default)]
    pub components: Vec<CompensationComponent>,
}

#[derive(Deserialize, Clone, Debug, Default)]
pub struct Compensation {
    #[serde(default, alias = "compensationTierSummary")]
    pub compensation_tier_summary: Option<String>,
    #[serde(default, alias = "scrapeableCompensationSalarySummary")]
    pub scrapeable_compensation_salary_summary: Option<String>,
    #[serde(default, alias = "compensationTiers")]
    pub compensation_tiers: Vec<CompensationTier>,
    #[serde(default, alias = "summaryComponents")]
    pub summary_components: Vec<CompensationComponent>,
}

#[derive(Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AshbyJobPosting {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub location_name: Option<String>,
    #[serde(default)]
    pub job_url: Option<String>,
    #[serde(default)]
    pub apply_url: Option<String>,
    #[serde(default)]
    pub compensation: Option<Compensation>,
}

/// Salary fields pulled out of the compensation object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SalaryData {
    pub salary_min: Option<String>,
    pub salary_max: Option<String>,
    pub salary_currency: Option<String>,
    pub salary_period: Option<String>,
    pub salary_summary: Option<String>,
}

/// Two-pass salary search over a compensation object: summary components
/// first, then tier components. The first `Salary` component wins.
pub fn extract_compensation_data(compensation: Option<&Compensation>) -> SalaryData {
    let mut result = SalaryData::default();
    let Some(comp) = compensation else {
        return result;
    };

    let summary = comp
        .scrapeable_compensation_salary_summary
        .as_deref()
        .or(comp.compensation_tier_summary.as_deref());
    if let Some(summary) = summary {
        result.salary_summary = Some(summary.to_string());
    }

    let is_salary = |c: &CompensationComponent| {
        c.compensation_type
            .as_deref()
            .map(|t| t.eq_ignore_ascii_case("salary"))
            .unwrap_or(false)
    };

    if let Some(component) = comp.summary_components.iter().find(|c| is_salary(c)) {
        apply_salary_component(&mut result, component);
    }

    if result.salary_min.is_none() {
        if let Some(component) = comp
            .compensation_tiers
            .iter()
            .flat_map(|tier| tier.components.iter())
            .find(|c| is_salary(c))
        {
            apply_salary_component(&mut result, component);
        }
    }

    result
}

fn apply_salary_component(result: &mut SalaryData, component: &CompensationComponent) {
    if let Some(min) = component.min_value {
        result.salary_min = Some(format!("{}", min as i64));
    }
    if let Some(max) = component.max_value {
        result.salary_max = Some(format!("{}", max as i64));
    }
    if let Some(currency) = component.currency_code.as_deref() {
        result.salary_currency = Some(currency.to_string());
    }
    if let Some(interval) = component.interval.as_deref() {
        result.salary_period = Some(interval.to_string());
    }
}

/// Parse an Ashby per-company JSON blob into canonical records, one per
/// location. A malformed job is skipped; a malformed file yields no records.
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
        .cloned()
        .unwrap_or_default();

    for raw in &raw_jobs {
        let posting: AshbyJobPosting = match serde_json::from_value(raw.clone()) {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!("skipping malformed ashby job in {}: {e}", json_file.display());
                continue;
            }
        };

        let comp_data = extract_compensation_data(posting.compensation.as_ref());

        let location_str = posting
            .location
            .as_deref()
            .or(posting.location_name.as_deref())
            .unwrap_or("");
        let location_str = normalize_location_by_company(location_str, company_name);
        let locations = split_locations(&location_str);

        let url = posting
            .job_url
            .as_deref()
            .or(posting.apply_url.as_deref())
            .unwrap_or("")
            .to_string();
        let posted_at = posted_at_from_source("ashby", raw);

        for loc in locations {
            let coords = atlas::lookup(&loc);
            jobs.push(JobRecord {
                url: url.clone(),
                title: posting.title.trim().to_string(),
                location: loc,
                company: company_name.to_string(),
                ats_id: posting.id.clone(),
                ats_type: "ashby".to_string(),
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

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    fn write_blob(value: &Value) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{value}").unwrap();
        file
    }

    #[test]
    fn salary_component_wins_over_equity() {
        let comp: Compensation = serde_json::from_value(json!({
            "scrapeableCompensationSalarySummary": "$150K - $180K",
            "summaryComponents": [
                {"compensationType": "EquityCashValue", "minValue": 10000.0, "maxValue": 40000.0},
                {"compensationType": "Salary", "minValue": 150000.0, "maxValue": 180000.0,
                 "currencyCode": "USD", "interval": "1 YEAR"}
            ]
        }))
        .unwrap();

        let data = extract_compensation_data(Some(&comp));
        assert_eq!(data.salary_min.as_deref(), Some("150000"));
        assert_eq!(data.salary_max.as_deref(), Some("180000"));
        assert_eq!(data.salary_currency.as_deref(), Some("USD"));
        assert_eq!(data.salary_period.as_deref(), Some("1 YEAR"));
        assert_eq!(data.salary_summary.as_deref(), Some("$150K - $180K"));
    }

    #[test]
    fn snake_case_compensation_is_accepted() {
        let comp: Compensation = serde_json::from_value(json!({
            "compensation_tier_summary": "Tier A",
            "compensation_tiers": [
                {"components": [
                    {"compensation_type": "Salary", "min_value": 90000.0, "max_value": 120000.0,
                     "currency_code": "EUR"}
                ]}
            ]
        }))
        .unwrap();

        let data = extract_compensation_data(Some(&comp));
        assert_eq!(data.salary_min.as_deref(), Some("90000"));
        assert_eq!(data.salary_currency.as_deref(), Some("EUR"));
        assert_eq!(data.salary_summary.as_deref(), Some("Tier A"));
    }

    #[test]
    fn multi_location_posting_fans_out() {
        let blob = write_blob(&json!({
            "apiVersion": "1",
            "jobs": [{
                "id": "j1",
                "title": " Staff Engineer ",
                "location": "San Francisco, CA | New York, NY",
                "jobUrl": "https://jobs.ashbyhq.com/acme/j1",
                "publishedAt": "2025-03-10T14:32:00Z"
            }]
        }));

        let jobs = extract_jobs(blob.path(), "Acme");
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].location, "San Francisco, CA");
        assert_eq!((jobs[0].lat, jobs[0].lon), (Some(37.7749), Some(-122.4194)));
        assert_eq!(jobs[1].location, "New York, NY");
        assert_eq!((jobs[1].lat, jobs[1].lon), (Some(40.7128), Some(-74.006)));
        assert_eq!(jobs[0].title, "Staff Engineer");
        assert_eq!(jobs[0].posted_at.as_deref(), Some("2025-03-10T14:32:00Z"));
        assert_eq!(jobs[0].url, jobs[1].url);
    }

    #[test]
    fn malformed_file_yields_no_records() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{not json").unwrap();
        assert!(extract_jobs(file.path(), "Acme").is_empty());
    }
}

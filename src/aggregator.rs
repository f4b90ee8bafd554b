use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use crate::bespoke::{BespokeSource, ALL_BESPOKE};
use crate::companies::{self, CompanyMap};
use crate::diagnostics;
use crate::enrichment::{enrich_jobs, DescriptionIndex};
use crate::freshness;
use crate::resolver::{self, normalize_company_name, CompanyMatch};
use crate::snapshot::{self, record_to_row};
use crate::types::{AtsProvider, JobRecord};

/// Freshness window for ATS blobs during aggregation.
const ATS_MAX_AGE_HOURS: f64 = 1.0;

#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Project root holding the per-ATS directories, snapshots and ledgers.
    pub root: PathBuf,
    pub companies: Vec<String>,
    pub ai_companies: bool,
    pub ats: Option<AtsProvider>,
    /// Canonical snapshot path; relative paths resolve against the root.
    pub output: PathBuf,
}

/// Postings known to be test data: Nintendo publishes rows whose title
/// carries a literal `TEST` marker.
fn is_dirty(job: &JobRecord) -> bool {
    job.title.trim().contains("TEST") && job.company.trim().to_lowercase() == "nintendo"
}

fn refresh_ats_source(root: &Path, ats: AtsProvider, slug: &str, company_name: &str) -> bool {
    let script = ats.scraper_script(root);
    match freshness::refresh_source(root, &script, Some(slug), true, company_name) {
        Ok(outcome) => {
            let was_scraped = outcome.was_scraped.unwrap_or(true);
            if was_scraped {
                tracing::info!(
                    "fetched fresh data for {company_name} ({})",
                    ats.as_str()
                );
            } else {
                tracing::info!(
                    "skipped fetching for {company_name} ({}), data was scraped recently",
                    ats.as_str()
                );
            }
            was_scraped
        }
        Err(e) => {
            tracing::warn!(
                "error fetching fresh data for {company_name} ({}): {e}",
                ats.as_str()
            );
            false
        }
    }
}

fn extract_for(ats: AtsProvider, json_file: &Path, company_name: &str, root: &Path) -> Vec<JobRecord> {
    match ats {
        AtsProvider::Ashby => crate::ashby::extract_jobs(json_file, company_name),
        AtsProvider::Greenhouse => crate::greenhouse::extract_jobs(json_file, company_name, root),
        AtsProvider::Lever => crate::lever::extract_jobs(json_file, company_name),
        AtsProvider::Workable => crate::workable::extract_jobs(json_file, company_name),
        AtsProvider::Rippling => crate::rippling::extract_jobs(json_file, company_name),
    }
}

/// Gather jobs for the given company names across ATS registries.
///
/// Returns the canonical rows plus the names that matched nothing (neither an
/// ATS registry nor an on-disk bespoke blob).
pub fn gather_jobs_for_companies(
    root: &Path,
    company_names: &[String],
    ats_filter: Option<AtsProvider>,
) -> (Vec<JobRecord>, Vec<String>) {
    let mut all_jobs = Vec::new();
    let mut all_matches: Vec<CompanyMatch> = Vec::new();
    let mut companies_without_ats = Vec::new();

    for company_name in company_names {
        let matches = resolver::find_companies(root, company_name, ats_filter);
        if matches.is_empty() {
            if resolver::bespoke_match(root, company_name).is_some() {
                tracing::info!("found 1 match(es) for '{company_name}': bespoke source");
                continue;
            }
            tracing::info!("found 0 match(es) for '{company_name}'");
            companies_without_ats.push(company_name.clone());
            continue;
        }
        tracing::info!("found {} match(es) for '{company_name}':", matches.len());
        for m in &matches {
            tracing::info!("  - {} ({})", m.display_name, m.ats.as_str());
        }
        all_matches.extend(matches);
    }

    if all_matches.is_empty() {
        return (all_jobs, companies_without_ats);
    }

    for m in &all_matches {
        let companies_dir = m.ats.companies_dir(root);
        let mut json_file = freshness::resolve_json_path(&companies_dir, &m.slug);

        if json_file.is_none() {
            tracing::warn!(
                "JSON file not found for {} ({}): {}.json",
                m.display_name,
                m.ats.as_str(),
                m.slug,
            );
            continue;
        }

        if !json_file
            .as_deref()
            .map(|p| freshness::is_fresh(p, ATS_MAX_AGE_HOURS))
            .unwrap_or(false)
        {
            tracing::info!(
                "JSON for {} ({}) is stale (older than {ATS_MAX_AGE_HOURS}h), fetching fresh data",
                m.display_name,
                m.ats.as_str(),
            );
            let was_fetched = refresh_ats_source(root, m.ats, &m.slug, &m.display_name);

            // the scraper may have created or renamed the blob
            json_file = freshness::resolve_json_path(&companies_dir, &m.slug);

            // the authoritative freshness signal is the blob itself
            if let Some(path) = json_file.as_deref() {
                match freshness::last_scraped_age_hours(path) {
                    Some((raw, hours)) if was_fetched => {
                        tracing::info!("data file updated with last_scraped: {raw} ({hours:.2}h ago)")
                    }
                    Some((raw, hours)) => {
                        tracing::info!("using existing data with last_scraped: {raw} ({hours:.2}h ago)")
                    }
                    None => tracing::info!("no last_scraped field found in {}", path.display()),
                }
            }
        }

        let Some(json_file) = json_file else {
            continue;
        };

        tracing::info!("extracting jobs from {} ({})", m.display_name, m.ats.as_str());
        let mut jobs = extract_for(m.ats, &json_file, &m.display_name, root);
        jobs.retain(|job| !is_dirty(job));
        tracing::info!("  extracted {} jobs", jobs.len());
        all_jobs.extend(jobs);
    }

    (all_jobs, companies_without_ats)
}

/// Gather jobs from the bespoke corporate-careers scrapers named in the
/// input list, refreshing their blobs when stale.
pub fn gather_bespoke_jobs(root: &Path, company_names: &[String]) -> Vec<JobRecord> {
    let normalized: HashSet<String> = company_names
        .iter()
        .map(|n| normalize_company_name(n))
        .collect();

    let mut jobs = Vec::new();
    for source in ALL_BESPOKE {
        if !normalized.contains(source.as_str()) {
            continue;
        }
        let json_path = source.json_path(root);
        if !freshness::is_fresh(&json_path, source.max_age_hours()) {
            let script = source.scraper_script(root);
            if let Err(e) =
                freshness::refresh_source(root, &script, None, false, source.display_name())
            {
                tracing::warn!("error gathering {} jobs: {e}", source.display_name());
            }
        }
        if json_path.exists() {
            let extracted = source.extract_jobs(&json_path);
            tracing::info!(
                "extracted {} jobs from {} (bespoke)",
                extracted.len(),
                source.display_name()
            );
            jobs.extend(extracted);
        }
    }
    jobs
}

fn learn_ats_map(map: &mut CompanyMap, jobs: &[JobRecord]) {
    let mut ats_by_company: BTreeMap<String, HashSet<String>> = BTreeMap::new();
    for job in jobs {
        let company = job.company.trim();
        let ats = job.ats_type.trim();
        if company.is_empty() || AtsProvider::from_str(ats).is_none() {
            continue;
        }
        ats_by_company
            .entry(normalize_company_name(company))
            .or_default()
            .insert(ats.to_string());
    }
    for (key, ats_set) in ats_by_company {
        let value = if ats_set.len() == 1 {
            ats_set.into_iter().next()
        } else {
            // seen on several ATS, keep searching all of them
            None
        };
        map.insert(key, value);
    }
}

/// Drive the full pipeline: resolve, refresh, parse, enrich, diff, persist.
pub fn run(opts: &RunOptions) -> anyhow::Result<()> {
    let root = opts.root.as_path();
    let output_path = if opts.output.is_absolute() {
        opts.output.clone()
    } else {
        root.join(&opts.output)
    };

    let use_ai_list = opts.ai_companies || opts.companies.is_empty();
    let mut company_map: CompanyMap = if use_ai_list {
        companies::load_company_map(root)
    } else {
        CompanyMap::new()
    };
    let companies_to_search: Vec<String>;
    let mut jobs: Vec<JobRecord>;
    let mut companies_without_ats: Vec<String>;

    if use_ai_list {
        companies_to_search = company_map.keys().cloned().collect();
        tracing::info!(
            "using AI companies list ({} companies)",
            companies_to_search.len()
        );

        if opts.ats.is_none() {
            // group by the learned ATS so each name only hits the boards it
            // actually lives on
            let mut by_ats: BTreeMap<Option<String>, Vec<String>> = BTreeMap::new();
            for name in &companies_to_search {
                let ats = company_map
                    .get(&normalize_company_name(name))
                    .cloned()
                    .flatten();
                by_ats.entry(ats).or_default().push(name.clone());
            }

            jobs = Vec::new();
            companies_without_ats = Vec::new();
            for (ats, names) in by_ats {
                let filter = ats.as_deref().and_then(AtsProvider::from_str);
                let (group_jobs, group_without) =
                    gather_jobs_for_companies(root, &names, filter);
                jobs.extend(group_jobs);
                companies_without_ats.extend(group_without);
            }
        } else {
            let (j, w) = gather_jobs_for_companies(root, &companies_to_search, opts.ats);
            jobs = j;
            companies_without_ats = w;
        }
    } else {
        companies_to_search = opts.companies.clone();
        let (j, w) = gather_jobs_for_companies(root, &companies_to_search, opts.ats);
        jobs = j;
        companies_without_ats = w;
    }

    // Bespoke corporate sources bypass the resolver entirely
    let bespoke_jobs = gather_bespoke_jobs(root, &companies_to_search);
    jobs.extend(bespoke_jobs);
    let bespoke_names: HashSet<&str> = ALL_BESPOKE.iter().map(BespokeSource::as_str).collect();
    companies_without_ats.retain(|name| !bespoke_names.contains(normalize_company_name(name).as_str()));

    if use_ai_list && !jobs.is_empty() {
        learn_ats_map(&mut company_map, &jobs);
        if let Err(e) = companies::save_company_map(root, &company_map) {
            tracing::warn!("error saving learned ATS map: {e}");
        }
    }

    if jobs.is_empty() {
        tracing::info!("no jobs found");
        report_companies_without_ats(&companies_without_ats);
        return Ok(());
    }

    // Enrichment: salary where missing, experience always
    let mut index = DescriptionIndex::build(root);
    enrich_jobs(&mut jobs, &mut index);

    // Missing-locations diagnostics
    let missing = diagnostics::summarize_missing_locations(&jobs);
    if missing.total > 0 {
        tracing::warn!(
            "{} job(s) with missing location coordinates ({} unique values, {} empty)",
            missing.total,
            missing.unique.len(),
            missing.empty_count,
        );
        for (location, count) in missing.unique.iter().take(50) {
            tracing::info!("  missing: {location} ({count} job(s))");
        }
        if let Err(e) = diagnostics::write_missing_locations_report(root, &jobs, &missing) {
            tracing::warn!("failed to save missing-locations report: {e}");
        }
    } else {
        tracing::info!("all {} jobs have location coordinates", jobs.len());
    }

    // Snapshot: preserve first-observed dates, then write canonical + dated
    let existing_dates = snapshot::load_existing_dates(&output_path, root);
    snapshot::apply_dates(&mut jobs, &existing_dates);
    snapshot::write_snapshot(&output_path, root, &jobs)?;

    // Ledgers: URL set algebra against the previous dated snapshot
    let rows: Vec<snapshot::Row> = jobs.iter().map(record_to_row).collect();
    let summary = snapshot::update_ledgers(root, &rows)?;
    tracing::info!(
        "ledgers: +{} new (now {}), {} newly removed (now {})",
        summary.newly_added,
        summary.new_total,
        summary.newly_removed,
        summary.removed_total,
    );

    report_companies_without_ats(&companies_without_ats);
    Ok(())
}

fn report_companies_without_ats(companies_without_ats: &[String]) {
    if companies_without_ats.is_empty() {
        tracing::info!("all companies found matching ATS systems");
        return;
    }
    let mut sorted = companies_without_ats.to_vec();
    sorted.sort();
    tracing::info!(
        "summary: {} company/companies without ATS found:",
        sorted.len()
    );
    for company in sorted {
        tracing::info!("  - {company}");
    }
}

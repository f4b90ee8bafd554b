use std::fs;
use std::path::Path;

use chrono::Local;
use serde_json::json;

use jobs_aggregator::aggregator::{run, RunOptions};
use jobs_aggregator::snapshot::{
    read_rows, write_rows, FIELDNAMES, NEW_LEDGER_FILE, REMOVED_LEDGER_FILE,
};

fn fresh_last_scraped() -> String {
    Local::now()
        .naive_local()
        .format("%Y-%m-%dT%H:%M:%S%.6f")
        .to_string()
}

fn seed_ashby_company(root: &Path, slug: &str, display_name: &str, jobs: serde_json::Value) {
    let ashby = root.join("ashby");
    fs::create_dir_all(ashby.join("companies")).unwrap();
    fs::write(
        ashby.join("companies.csv"),
        format!("name,url\n{display_name},https://jobs.ashbyhq.com/{slug}\n"),
    )
    .unwrap();
    fs::write(
        ashby.join("companies").join(format!("{slug}.json")),
        json!({
            "apiVersion": "1",
            "last_scraped": fresh_last_scraped(),
            "jobs": jobs
        })
        .to_string(),
    )
    .unwrap();
}

fn seed_dated_snapshot(root: &Path, urls: &[&str]) {
    let rows: Vec<_> = urls
        .iter()
        .map(|url| {
            let mut row = jobs_aggregator::snapshot::Row::new();
            row.insert("url".into(), url.to_string());
            row.insert("title".into(), "Engineer".into());
            row.insert("company".into(), "Acme".into());
            row.insert("ats_type".into(), "ashby".into());
            row.insert("date".into(), "2025-01-01T00:00:00Z".into());
            row
        })
        .collect();
    write_rows(&root.join("ai-01-01-2025.csv"), &FIELDNAMES, &rows).unwrap();
}

fn options(root: &Path, companies: &[&str]) -> RunOptions {
    RunOptions {
        root: root.to_path_buf(),
        companies: companies.iter().map(|s| s.to_string()).collect(),
        ai_companies: false,
        ats: None,
        output: "map/public/ai.csv".into(),
    }
}

fn ashby_job(id: &str, title: &str, location: &str, description: &str) -> serde_json::Value {
    json!({
        "id": id,
        "title": title,
        "location": location,
        "jobUrl": format!("https://jobs.ashbyhq.com/acme/{id}"),
        "publishedAt": "2025-03-10T14:32:00Z",
        "descriptionPlain": description
    })
}

#[test]
fn full_pipeline_fans_out_enriches_and_snapshots() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    seed_ashby_company(
        root,
        "acme",
        "Acme",
        json!([
            ashby_job(
                "j1",
                "Staff Engineer",
                "San Francisco, CA | New York, NY",
                "The salary range for this role is $150,000 - $180,000 per year. \
                 Requires 5+ years of experience building distributed systems."
            ),
            ashby_job("j2", "Designer", "Berlin", "We design things."),
        ]),
    );

    run(&options(root, &["Acme"])).unwrap();

    let snapshot = read_rows(&root.join("map/public/ai.csv")).unwrap();
    assert_eq!(snapshot.len(), 3);

    // multi-location fan-out shares every non-location field
    assert_eq!(snapshot[0].get("url").unwrap(), snapshot[1].get("url").unwrap());
    assert_eq!(snapshot[0].get("location").unwrap(), "San Francisco, CA");
    assert_eq!(snapshot[0].get("lat").unwrap(), "37.7749");
    assert_eq!(snapshot[0].get("lon").unwrap(), "-122.4194");
    assert_eq!(snapshot[1].get("location").unwrap(), "New York, NY");
    assert_eq!(snapshot[1].get("lat").unwrap(), "40.7128");
    assert_eq!(snapshot[1].get("lon").unwrap(), "-74.006");

    // enrichment found salary and experience in the description
    assert_eq!(snapshot[0].get("salary_summary").unwrap(), "$150K - $180K");
    assert_eq!(snapshot[0].get("salary_currency").unwrap(), "USD");
    assert_eq!(snapshot[0].get("experience").unwrap(), "5");
    assert_eq!(snapshot[2].get("salary_summary").unwrap(), "");

    // timestamps are second-precision UTC with Z suffix
    assert_eq!(snapshot[0].get("posted_at").unwrap(), "2025-03-10T14:32:00Z");
    let date = snapshot[0].get("date").unwrap();
    assert!(date.ends_with('Z') && date.len() == 20);

    // today's dated copy exists alongside the canonical snapshot
    let dated = root.join(Local::now().format("ai-%d-%m-%Y.csv").to_string());
    assert!(dated.exists());
}

#[test]
fn diff_updates_both_ledgers_and_preserves_dates() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();

    // previous snapshot had A, B, C
    seed_dated_snapshot(
        root,
        &[
            "https://jobs.ashbyhq.com/acme/a",
            "https://jobs.ashbyhq.com/acme/b",
            "https://jobs.ashbyhq.com/acme/c",
        ],
    );

    // the current run produces B, C, D
    seed_ashby_company(
        root,
        "acme",
        "Acme",
        json!([
            ashby_job("b", "B", "Berlin", ""),
            ashby_job("c", "C", "Berlin", ""),
            ashby_job("d", "D", "Berlin", ""),
        ]),
    );

    run(&options(root, &["Acme"])).unwrap();

    // B and C keep their first-observed date, D gets a fresh one
    let snapshot = read_rows(&root.join("map/public/ai.csv")).unwrap();
    let date_of = |id: &str| {
        snapshot
            .iter()
            .find(|r| r.get("url").unwrap().ends_with(id))
            .unwrap()
            .get("date")
            .unwrap()
            .clone()
    };
    assert_eq!(date_of("/b"), "2025-01-01T00:00:00Z");
    assert_eq!(date_of("/c"), "2025-01-01T00:00:00Z");
    assert_ne!(date_of("/d"), "2025-01-01T00:00:00Z");

    // new ledger gained D, stamped today
    let new_rows = read_rows(&root.join(NEW_LEDGER_FILE)).unwrap();
    assert_eq!(new_rows.len(), 1);
    assert!(new_rows[0].get("url").unwrap().ends_with("/d"));
    assert!(!new_rows[0].get("date_added").unwrap().is_empty());

    // removed ledger gained A
    let rm_rows = read_rows(&root.join(REMOVED_LEDGER_FILE)).unwrap();
    assert_eq!(rm_rows.len(), 1);
    assert!(rm_rows[0].get("url").unwrap().ends_with("/a"));
}

#[test]
fn rerun_with_unchanged_data_is_byte_stable() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    seed_ashby_company(
        root,
        "acme",
        "Acme",
        json!([ashby_job("j1", "Engineer", "Berlin", "4+ years of experience required.")]),
    );

    run(&options(root, &["Acme"])).unwrap();
    let first = fs::read_to_string(root.join("map/public/ai.csv")).unwrap();

    run(&options(root, &["Acme"])).unwrap();
    let second = fs::read_to_string(root.join("map/public/ai.csv")).unwrap();
    assert_eq!(first, second);
}

#[test]
fn bespoke_source_bypasses_the_resolver() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    fs::create_dir_all(root.join("google")).unwrap();
    fs::write(
        root.join("google/google.json"),
        json!({
            "last_scraped": fresh_last_scraped(),
            "jobs": [{
                "url": "https://careers.google.com/jobs/1",
                "title": "SWE",
                "location": "Zurich, Switzerland"
            }]
        })
        .to_string(),
    )
    .unwrap();

    run(&options(root, &["Google"])).unwrap();

    let snapshot = read_rows(&root.join("map/public/ai.csv")).unwrap();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].get("ats_type").unwrap(), "google");
    assert_eq!(snapshot[0].get("company").unwrap(), "Google");
    assert_eq!(snapshot[0].get("lat").unwrap(), "47.3769");
}

#[test]
fn no_matches_still_exits_cleanly() {
    let dir = tempfile::tempdir().unwrap();
    run(&options(dir.path(), &["Nonexistent Co"])).unwrap();
    assert!(!dir.path().join("map/public/ai.csv").exists());
}

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{Local, Utc};

use crate::types::{to_utc_iso, JobRecord};

pub const NEW_LEDGER_FILE: &str = "new_ai.csv";
pub const REMOVED_LEDGER_FILE: &str = "rm_ai.csv";
pub const DATE_ADDED_FIELD: &str = "date_added";

/// Canonical snapshot column order.
pub const FIELDNAMES: [&str; 14] = [
    "url",
    "title",
    "location",
    "company",
    "ats_id",
    "ats_type",
    "salary_currency",
    "salary_period",
    "salary_summary",
    "experience",
    "lat",
    "lon",
    "posted_at",
    "date",
];

/// Legacy columns stripped from inherited ledger rows.
const DEPRECATED_FIELDS: [&str; 4] = ["employment_type", "is_remote", "salary_min", "salary_max"];

pub type Row = BTreeMap<String, String>;

pub fn record_to_row(job: &JobRecord) -> Row {
    let mut row = Row::new();
    row.insert("url".into(), job.url.clone());
    row.insert("title".into(), job.title.clone());
    row.insert("location".into(), job.location.clone());
    row.insert("company".into(), job.company.clone());
    row.insert("ats_id".into(), job.ats_id.clone());
    row.insert("ats_type".into(), job.ats_type.clone());
    row.insert(
        "salary_currency".into(),
        job.salary_currency.clone().unwrap_or_default(),
    );
    row.insert(
        "salary_period".into(),
        job.salary_period.clone().unwrap_or_default(),
    );
    row.insert(
        "salary_summary".into(),
        job.salary_summary.clone().unwrap_or_default(),
    );
    row.insert(
        "experience".into(),
        job.experience.clone().unwrap_or_default(),
    );
    row.insert(
        "lat".into(),
        job.lat.map(|v| v.to_string()).unwrap_or_default(),
    );
    row.insert(
        "lon".into(),
        job.lon.map(|v| v.to_string()).unwrap_or_default(),
    );
    row.insert(
        "posted_at".into(),
        job.posted_at.clone().unwrap_or_default(),
    );
    row.insert("date".into(), job.date.clone().unwrap_or_default());
    row
}

fn strip_deprecated(row: &mut Row) {
    for field in DEPRECATED_FIELDS {
        row.remove(field);
    }
}

/// Read a CSV into header-keyed rows. A missing file is not an error here;
/// callers decide what an absent ledger means.
pub fn read_rows(path: &Path) -> anyhow::Result<Vec<Row>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let headers = reader.headers()?.clone();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let row: Row = headers
            .iter()
            .zip(record.iter())
            .map(|(h, v)| (h.to_string(), v.to_string()))
            .collect();
        rows.push(row);
    }
    Ok(rows)
}

/// Write rows atomically (write-then-replace) in the canonical column order.
/// Missing fields serialize as empty strings.
pub fn write_rows(path: &Path, fieldnames: &[&str], rows: &[Row]) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("csv.tmp");
    {
        let mut writer = csv::WriterBuilder::new()
            .terminator(csv::Terminator::Any(b'\n'))
            .from_path(&tmp)
            .with_context(|| format!("writing {}", tmp.display()))?;
        writer.write_record(fieldnames)?;
        for row in rows {
            let record: Vec<&str> = fieldnames
                .iter()
                .map(|field| row.get(*field).map(String::as_str).unwrap_or(""))
                .collect();
            writer.write_record(&record)?;
        }
        writer.flush()?;
    }
    fs::rename(&tmp, path).with_context(|| format!("replacing {}", path.display()))?;
    Ok(())
}

pub fn dated_snapshot_name() -> String {
    Local::now().format("ai-%d-%m-%Y.csv").to_string()
}

/// Most recent `ai-DD-MM-YYYY.csv` by mtime, optionally excluding today's.
pub fn find_most_recent_dated_snapshot(root: &Path, exclude_today: bool) -> Option<PathBuf> {
    let today = dated_snapshot_name();
    let mut candidates: Vec<(std::time::SystemTime, PathBuf)> = fs::read_dir(root)
        .ok()?
        .filter_map(Result::ok)
        .filter(|entry| {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            name.starts_with("ai-")
                && name.ends_with(".csv")
                && !(exclude_today && name == today)
        })
        .filter_map(|entry| {
            let mtime = entry.metadata().ok()?.modified().ok()?;
            Some((mtime, entry.path()))
        })
        .collect();
    candidates.sort_by_key(|(mtime, _)| *mtime);
    candidates.pop().map(|(_, path)| path)
}

fn collect_dates(path: &Path, dates: &mut HashMap<String, String>, only_missing: bool) {
    let Ok(rows) = read_rows(path) else {
        return;
    };
    for row in rows {
        let url = row.get("url").map(String::as_str).unwrap_or("").trim();
        let date = row.get("date").map(String::as_str).unwrap_or("").trim();
        if url.is_empty() || date.is_empty() {
            continue;
        }
        if only_missing && dates.contains_key(url) {
            continue;
        }
        dates.insert(url.to_string(), date.to_string());
    }
}

/// First-observation dates for URL preservation: the canonical snapshot wins,
/// then the most recent dated snapshot fills the gaps.
pub fn load_existing_dates(canonical: &Path, root: &Path) -> HashMap<String, String> {
    let mut dates = HashMap::new();
    if canonical.exists() {
        collect_dates(canonical, &mut dates, false);
    }
    if let Some(previous) = find_most_recent_dated_snapshot(root, false) {
        collect_dates(&previous, &mut dates, true);
    }
    dates
}

/// Stamp the `date` column: preserve the first-observed value per URL,
/// otherwise set it to now.
pub fn apply_dates(jobs: &mut [JobRecord], existing: &HashMap<String, String>) {
    let now = to_utc_iso(Utc::now());
    for job in jobs.iter_mut() {
        let url = job.url.trim();
        job.date = Some(
            existing
                .get(url)
                .cloned()
                .unwrap_or_else(|| now.clone()),
        );
    }
}

/// Write the canonical snapshot and today's dated copy.
pub fn write_snapshot(
    output_path: &Path,
    root: &Path,
    jobs: &[JobRecord],
) -> anyhow::Result<PathBuf> {
    let rows: Vec<Row> = jobs.iter().map(record_to_row).collect();
    write_rows(output_path, &FIELDNAMES, &rows)?;
    tracing::info!("saved {} jobs to {}", rows.len(), output_path.display());

    let dated_path = root.join(dated_snapshot_name());
    write_rows(&dated_path, &FIELDNAMES, &rows)?;
    tracing::info!("also saved {} jobs to {}", rows.len(), dated_path.display());
    Ok(dated_path)
}

// ═══════════════════════════════════════════════════════════════════════════
// LEDGERS
// ═══════════════════════════════════════════════════════════════════════════

/// URL-keyed row set preserving first-insertion order, the way the ledger
/// files accrete rows across runs.
#[derive(Default)]
struct OrderedRows {
    order: Vec<String>,
    by_url: HashMap<String, Row>,
}

impl OrderedRows {
    fn insert(&mut self, url: String, row: Row) {
        if !self.by_url.contains_key(&url) {
            self.order.push(url.clone());
        }
        self.by_url.insert(url, row);
    }

    fn rows(&self) -> Vec<Row> {
        self.order
            .iter()
            .filter_map(|url| self.by_url.get(url).cloned())
            .collect()
    }

    fn len(&self) -> usize {
        self.order.len()
    }

    fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct LedgerSummary {
    pub newly_added: usize,
    pub new_total: usize,
    pub newly_removed: usize,
    pub removed_total: usize,
}

/// Update `new_ai.csv` and `rm_ai.csv` by URL-keyed set algebra against the
/// previous dated snapshot. Both ledgers are garbage-collected against the
/// current snapshot: URLs gone from the current set leave the new ledger,
/// URLs that reappeared leave the removed ledger.
pub fn update_ledgers(root: &Path, current_rows: &[Row]) -> anyhow::Result<LedgerSummary> {
    let mut summary = LedgerSummary::default();
    let current_urls: HashSet<&str> = current_rows
        .iter()
        .filter_map(|row| row.get("url"))
        .map(String::as_str)
        .filter(|url| !url.is_empty())
        .collect();

    let new_path = root.join(NEW_LEDGER_FILE);
    let rm_path = root.join(REMOVED_LEDGER_FILE);
    let date_added_stamp = Local::now().format("%d-%m-%Y-%H-%M").to_string();

    let Some(previous_csv) = find_most_recent_dated_snapshot(root, true) else {
        // First run: no previous snapshot to diff against, but an inherited
        // new-ledger still gets validated against the current URL set.
        if new_path.exists() {
            tracing::info!("no previous dated CSV found, validating existing new ledger");
            let mut kept = OrderedRows::default();
            for mut row in read_rows(&new_path).unwrap_or_default() {
                let url = row.get("url").cloned().unwrap_or_default();
                if url.trim().is_empty() || !current_urls.contains(url.trim()) {
                    continue;
                }
                strip_deprecated(&mut row);
                if row.get(DATE_ADDED_FIELD).map(String::as_str).unwrap_or("").is_empty() {
                    row.insert(DATE_ADDED_FIELD.into(), date_added_stamp.clone());
                }
                kept.insert(url, row);
            }
            if !kept.is_empty() {
                let fields = new_ledger_fields();
                write_rows(&new_path, &fields, &kept.rows())?;
                summary.new_total = kept.len();
            }
        } else {
            tracing::info!("no previous CSV found for comparison (first run)");
        }
        return Ok(summary);
    };

    tracing::info!("comparing with previous CSV: {}", previous_csv.display());
    let previous_rows = read_rows(&previous_csv).unwrap_or_else(|e| {
        tracing::warn!("error reading previous snapshot: {e}");
        Vec::new()
    });
    let previous_urls: HashSet<&str> = previous_rows
        .iter()
        .filter_map(|row| row.get("url"))
        .map(String::as_str)
        .filter(|url| !url.is_empty())
        .collect();

    // current − previous
    let new_jobs: Vec<&Row> = current_rows
        .iter()
        .filter(|row| {
            row.get("url")
                .map(|url| !url.is_empty() && !previous_urls.contains(url.as_str()))
                .unwrap_or(false)
        })
        .collect();
    // previous − current
    let removed_jobs: Vec<&Row> = previous_rows
        .iter()
        .filter(|row| {
            row.get("url")
                .map(|url| !url.is_empty() && !current_urls.contains(url.as_str()))
                .unwrap_or(false)
        })
        .collect();

    // ── removed ledger ──────────────────────────────────────────────────────
    let mut removed = OrderedRows::default();
    if rm_path.exists() {
        for mut row in read_rows(&rm_path).unwrap_or_else(|e| {
            tracing::warn!("error reading existing removed ledger: {e}");
            Vec::new()
        }) {
            let url = row.get("url").cloned().unwrap_or_default();
            // rows that reappeared in the current snapshot drop out
            if url.trim().is_empty() || current_urls.contains(url.trim()) {
                continue;
            }
            strip_deprecated(&mut row);
            removed.insert(url, row);
        }
    }
    for row in &removed_jobs {
        let url = row.get("url").cloned().unwrap_or_default();
        let mut row = (*row).clone();
        strip_deprecated(&mut row);
        removed.insert(url, row);
    }

    summary.newly_removed = removed_jobs.len();
    summary.removed_total = removed.len();
    if removed.is_empty() {
        if rm_path.exists() {
            fs::remove_file(&rm_path)?;
            tracing::info!("no removed jobs, deleted existing removed ledger");
        }
    } else {
        write_rows(&rm_path, &FIELDNAMES, &removed.rows())?;
        tracing::info!(
            "updated {}: {} newly removed, {} total pending deletion",
            REMOVED_LEDGER_FILE,
            summary.newly_removed,
            summary.removed_total,
        );
    }

    // ── new ledger ──────────────────────────────────────────────────────────
    let mut new_ledger = OrderedRows::default();
    if new_path.exists() {
        for mut row in read_rows(&new_path).unwrap_or_else(|e| {
            tracing::warn!("error reading existing new ledger: {e}");
            Vec::new()
        }) {
            let url = row.get("url").cloned().unwrap_or_default();
            // only rows still present in the current snapshot survive
            if url.trim().is_empty() || !current_urls.contains(url.trim()) {
                continue;
            }
            strip_deprecated(&mut row);
            new_ledger.insert(url, row);
        }
    }
    for row in &new_jobs {
        let url = row.get("url").cloned().unwrap_or_default();
        let mut row = (*row).clone();
        strip_deprecated(&mut row);
        row.insert(DATE_ADDED_FIELD.into(), date_added_stamp.clone());
        new_ledger.insert(url, row);
    }

    summary.newly_added = new_jobs.len();
    summary.new_total = new_ledger.len();
    if !new_ledger.is_empty() {
        let fields = new_ledger_fields();
        write_rows(&new_path, &fields, &new_ledger.rows())?;
        tracing::info!(
            "updated {}: {} new jobs added today, {} still active",
            NEW_LEDGER_FILE,
            summary.newly_added,
            summary.new_total - summary.newly_added,
        );
    } else {
        tracing::info!("no new jobs found compared to previous CSV");
    }

    Ok(summary)
}

fn new_ledger_fields() -> Vec<&'static str> {
    let mut fields = FIELDNAMES.to_vec();
    fields.push(DATE_ADDED_FIELD);
    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(url: &str) -> JobRecord {
        JobRecord {
            url: url.to_string(),
            title: "Engineer".into(),
            company: "Acme".into(),
            ats_type: "ashby".into(),
            ..Default::default()
        }
    }

    fn rows_for(urls: &[&str]) -> Vec<Row> {
        urls.iter()
            .map(|u| {
                let mut j = job(u);
                j.date = Some("2025-01-01T00:00:00Z".into());
                record_to_row(&j)
            })
            .collect()
    }

    fn write_dated(root: &Path, urls: &[&str]) {
        // mtime-ordered discovery only needs the file to exist
        let path = root.join("ai-01-01-2025.csv");
        write_rows(&path, &FIELDNAMES, &rows_for(urls)).unwrap();
    }

    #[test]
    fn csv_round_trip_preserves_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ai.csv");
        let mut record = job("https://example.com/a");
        record.lat = Some(52.52);
        record.lon = Some(13.405);
        record.salary_summary = Some("$150K - $180K".into());
        write_rows(&path, &FIELDNAMES, &[record_to_row(&record)]).unwrap();

        let rows = read_rows(&path).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("url").unwrap(), "https://example.com/a");
        assert_eq!(rows[0].get("lat").unwrap(), "52.52");
        assert_eq!(rows[0].get("salary_summary").unwrap(), "$150K - $180K");
    }

    #[test]
    fn dates_preserved_for_known_urls() {
        let dir = tempfile::tempdir().unwrap();
        let canonical = dir.path().join("ai.csv");
        write_rows(&canonical, &FIELDNAMES, &rows_for(&["https://a", "https://b"])).unwrap();

        let existing = load_existing_dates(&canonical, dir.path());
        let mut jobs = vec![job("https://a"), job("https://c")];
        apply_dates(&mut jobs, &existing);

        assert_eq!(jobs[0].date.as_deref(), Some("2025-01-01T00:00:00Z"));
        let fresh = jobs[1].date.as_deref().unwrap();
        assert_ne!(fresh, "2025-01-01T00:00:00Z");
        assert!(fresh.ends_with('Z'));
    }

    #[test]
    fn diff_happy_path() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write_dated(root, &["https://a", "https://b", "https://c"]);

        let current = rows_for(&["https://b", "https://c", "https://d"]);
        let summary = update_ledgers(root, &current).unwrap();
        assert_eq!(summary.newly_added, 1);
        assert_eq!(summary.newly_removed, 1);

        let new_rows = read_rows(&root.join(NEW_LEDGER_FILE)).unwrap();
        assert_eq!(new_rows.len(), 1);
        assert_eq!(new_rows[0].get("url").unwrap(), "https://d");
        assert!(!new_rows[0].get(DATE_ADDED_FIELD).unwrap().is_empty());

        let rm_rows = read_rows(&root.join(REMOVED_LEDGER_FILE)).unwrap();
        assert_eq!(rm_rows.len(), 1);
        assert_eq!(rm_rows[0].get("url").unwrap(), "https://a");
    }

    #[test]
    fn reappearance_leaves_removed_ledger() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        // prior state: A was removed at some point, previous snapshot lacks A
        write_dated(root, &["https://b"]);
        write_rows(
            &root.join(REMOVED_LEDGER_FILE),
            &FIELDNAMES,
            &rows_for(&["https://a"]),
        )
        .unwrap();

        // A reappears: it must leave the removed ledger and, being new versus
        // the previous snapshot, enter the new ledger
        let current = rows_for(&["https://a", "https://b"]);
        let summary = update_ledgers(root, &current).unwrap();

        assert!(!root.join(REMOVED_LEDGER_FILE).exists());
        assert_eq!(summary.newly_added, 1);
        let new_rows = read_rows(&root.join(NEW_LEDGER_FILE)).unwrap();
        assert_eq!(new_rows[0].get("url").unwrap(), "https://a");
    }

    #[test]
    fn new_ledger_is_garbage_collected_against_current() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write_dated(root, &["https://a", "https://b"]);

        // inherited ledger holds a vanished URL plus a legacy column
        let mut stale = rows_for(&["https://gone", "https://a"]);
        for row in &mut stale {
            row.insert("employment_type".into(), "FullTime".into());
            row.insert(DATE_ADDED_FIELD.into(), "01-01-2025-00-00".into());
        }
        let mut fields = FIELDNAMES.to_vec();
        fields.push("employment_type");
        fields.push(DATE_ADDED_FIELD);
        write_rows(&root.join(NEW_LEDGER_FILE), &fields, &stale).unwrap();

        let current = rows_for(&["https://a", "https://b"]);
        update_ledgers(root, &current).unwrap();

        let new_rows = read_rows(&root.join(NEW_LEDGER_FILE)).unwrap();
        assert_eq!(new_rows.len(), 1);
        assert_eq!(new_rows[0].get("url").unwrap(), "https://a");
        // deprecated column dropped, date_added kept
        assert!(new_rows[0].get("employment_type").is_none());
        assert_eq!(new_rows[0].get(DATE_ADDED_FIELD).unwrap(), "01-01-2025-00-00");
    }

    #[test]
    fn removed_ledger_deleted_when_empty() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write_dated(root, &["https://a"]);
        write_rows(
            &root.join(REMOVED_LEDGER_FILE),
            &FIELDNAMES,
            &rows_for(&["https://a"]),
        )
        .unwrap();

        // everything previously removed is back, nothing else went away
        let current = rows_for(&["https://a"]);
        update_ledgers(root, &current).unwrap();
        assert!(!root.join(REMOVED_LEDGER_FILE).exists());
    }

    #[test]
    fn first_run_validates_inherited_new_ledger() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write_rows(
            &root.join(NEW_LEDGER_FILE),
            &FIELDNAMES,
            &rows_for(&["https://kept", "https://dropped"]),
        )
        .unwrap();

        let current = rows_for(&["https://kept"]);
        let summary = update_ledgers(root, &current).unwrap();
        assert_eq!(summary.new_total, 1);

        let new_rows = read_rows(&root.join(NEW_LEDGER_FILE)).unwrap();
        assert_eq!(new_rows.len(), 1);
        assert_eq!(new_rows[0].get("url").unwrap(), "https://kept");
        assert!(!new_rows[0].get(DATE_ADDED_FIELD).unwrap().is_empty());
    }
}

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::Context;
use chrono::{DateTime, Local, NaiveDateTime};
use serde_json::Value;

// ═══════════════════════════════════════════════════════════════════════════
// FRESHNESS
// ═══════════════════════════════════════════════════════════════════════════

/// Parse a `last_scraped` value as written by the scrapers (naive local ISO,
/// occasionally with an offset).
fn parse_last_scraped(raw: &str) -> Option<NaiveDateTime> {
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw.trim(), "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw.trim()) {
        return Some(dt.with_timezone(&Local).naive_local());
    }
    None
}

/// Hours since the blob's `last_scraped` timestamp, with the raw string.
pub fn last_scraped_age_hours(path: &Path) -> Option<(String, f64)> {
    let text = fs::read_to_string(path).ok()?;
    let data: Value = serde_json::from_str(&text).ok()?;
    let raw = data.get("last_scraped")?.as_str()?.to_string();
    let last = parse_last_scraped(&raw)?;
    let hours = (Local::now().naive_local() - last).num_seconds() as f64 / 3600.0;
    Some((raw, hours))
}

/// Decide whether a per-company JSON blob is recent enough to reuse.
///
/// The `last_scraped` field inside the blob wins; a valid file without one
/// falls back to mtime. A missing or unreadable file is never fresh.
pub fn is_fresh(path: &Path, max_age_hours: f64) -> bool {
    if !path.exists() {
        return false;
    }

    let Ok(text) = fs::read_to_string(path) else {
        return false;
    };
    let Ok(data) = serde_json::from_str::<Value>(&text) else {
        return false;
    };

    if let Some(raw) = data.get("last_scraped").and_then(Value::as_str) {
        if let Some(last) = parse_last_scraped(raw) {
            let hours = (Local::now().naive_local() - last).num_seconds() as f64 / 3600.0;
            return hours < max_age_hours;
        }
    }

    match fs::metadata(path).and_then(|m| m.modified()) {
        Ok(modified) => match modified.elapsed() {
            Ok(elapsed) => elapsed.as_secs_f64() / 3600.0 < max_age_hours,
            // mtime in the future counts as fresh
            Err(_) => true,
        },
        Err(_) => false,
    }
}

/// Locate the blob for a slug, trying the raw filename first and the
/// URL-encoded one second (scrapers percent-encode slugs with slashes).
pub fn resolve_json_path(companies_dir: &Path, slug: &str) -> Option<PathBuf> {
    let plain = companies_dir.join(format!("{slug}.json"));
    if plain.exists() {
        return Some(plain);
    }
    let encoded = companies_dir.join(format!("{}.json", urlencoding::encode(slug)));
    if encoded.exists() {
        return Some(encoded);
    }
    None
}

// ═══════════════════════════════════════════════════════════════════════════
// REFRESH HOOK
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Default)]
pub struct RefreshOutcome {
    /// Reported by the scraper, for logging only. The authoritative signal is
    /// the re-read of `last_scraped` from the JSON after refresh.
    pub was_scraped: Option<bool>,
}

/// Invoke an external scraper synchronously.
///
/// `refresh(slug, force, company_name)` maps onto
/// `python3 <script> [slug] --company <name> [--force]` run from the project
/// root. The scraper may print a JSON result line
/// `{"path": ..., "count": ..., "was_scraped": ...}` as its last output.
pub fn refresh_source(
    root: &Path,
    script: &Path,
    slug: Option<&str>,
    force: bool,
    company_name: &str,
) -> anyhow::Result<RefreshOutcome> {
    let mut command = Command::new("python3");
    command.arg(script).current_dir(root);
    if let Some(slug) = slug {
        command.arg(slug);
    }
    command.arg("--company").arg(company_name);
    if force {
        command.arg("--force");
    }

    let output = command
        .output()
        .with_context(|| format!("failed to run scraper {}", script.display()))?;
    if !output.status.success() {
        anyhow::bail!(
            "scraper {} exited with {}: {}",
            script.display(),
            output.status,
            String::from_utf8_lossy(&output.stderr).trim(),
        );
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let was_scraped = stdout
        .lines()
        .rev()
        .find_map(|line| serde_json::from_str::<Value>(line.trim()).ok())
        .and_then(|v| v.get("was_scraped").and_then(Value::as_bool));

    Ok(RefreshOutcome { was_scraped })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::io::Write;

    fn blob_with_last_scraped(last_scraped: NaiveDateTime) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "{{\"last_scraped\": \"{}\", \"jobs\": []}}",
            last_scraped.format("%Y-%m-%dT%H:%M:%S%.6f")
        )
        .unwrap();
        file
    }

    #[test]
    fn missing_file_is_stale() {
        assert!(!is_fresh(Path::new("/nonexistent/acme.json"), 1.0));
    }

    #[test]
    fn recent_last_scraped_is_fresh() {
        let file = blob_with_last_scraped(Local::now().naive_local() - Duration::minutes(10));
        assert!(is_fresh(file.path(), 1.0));
    }

    #[test]
    fn old_last_scraped_is_stale_even_with_fresh_mtime() {
        let file = blob_with_last_scraped(Local::now().naive_local() - Duration::hours(5));
        assert!(!is_fresh(file.path(), 1.0));
        assert!(is_fresh(file.path(), 6.0));
    }

    #[test]
    fn valid_json_without_last_scraped_uses_mtime() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{\"jobs\": []}}").unwrap();
        assert!(is_fresh(file.path(), 1.0));
    }

    #[test]
    fn unreadable_json_is_stale() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{broken").unwrap();
        assert!(!is_fresh(file.path(), 1.0));
    }

    #[test]
    fn resolves_url_encoded_slug_filenames() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a%2Fb.json"), "{}").unwrap();
        let resolved = resolve_json_path(dir.path(), "a/b").unwrap();
        assert!(resolved.ends_with("a%2Fb.json"));
        assert!(resolve_json_path(dir.path(), "missing").is_none());
    }

    #[test]
    fn last_scraped_age_reports_hours() {
        let file = blob_with_last_scraped(Local::now().naive_local() - Duration::hours(2));
        let (_, hours) = last_scraped_age_hours(file.path()).unwrap();
        assert!((1.9..2.1).contains(&hours));
    }
}

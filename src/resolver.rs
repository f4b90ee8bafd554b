use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;

use crate::bespoke::BespokeSource;
use crate::types::{AtsProvider, ALL_PROVIDERS};

/// Corporate suffixes stripped (case-sensitively) before matching.
const COMPANY_SUFFIXES: [&str; 9] = [
    " Inc", " Inc.", " LLC", " Ltd", " Ltd.", " Corp", " Corp.", " Co", " Co.",
];

/// Normalize a company name for matching: trim, strip corporate suffixes,
/// lowercase.
pub fn normalize_company_name(name: &str) -> String {
    let mut name = name.trim().to_string();
    for suffix in COMPANY_SUFFIXES {
        if let Some(stripped) = name.strip_suffix(suffix) {
            name = stripped.trim().to_string();
        }
    }
    name.to_lowercase()
}

/// One (ATS, slug) source a company name resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompanyMatch {
    pub ats: AtsProvider,
    pub slug: String,
    pub display_name: String,
}

#[derive(Debug, Deserialize)]
struct RegistryRow {
    #[serde(default)]
    name: String,
    #[serde(default)]
    url: String,
}

/// Find all registry entries matching `company_name` across the ATS systems
/// in scope. Matching is exact on normalized names; duplicates by
/// `(ats, lowercase slug)` are dropped, first-seen order preserved.
pub fn find_companies(
    root: &Path,
    company_name: &str,
    ats_filter: Option<AtsProvider>,
) -> Vec<CompanyMatch> {
    let normalized_search = normalize_company_name(company_name);
    let providers: Vec<AtsProvider> = match ats_filter {
        Some(ats) => vec![ats],
        None => ALL_PROVIDERS.to_vec(),
    };

    let mut matches = Vec::new();
    for ats in providers {
        let registry = ats.registry_csv(root);
        if !registry.exists() {
            continue;
        }
        let mut reader = match csv::Reader::from_path(&registry) {
            Ok(reader) => reader,
            Err(e) => {
                tracing::warn!("error reading {}: {e}", registry.display());
                continue;
            }
        };
        for row in reader.deserialize::<RegistryRow>() {
            let Ok(row) = row else { continue };
            let csv_name = row.name.trim();
            let url = row.url.trim();
            if csv_name.is_empty() || url.is_empty() {
                continue;
            }
            if normalize_company_name(csv_name) == normalized_search {
                matches.push(CompanyMatch {
                    ats,
                    slug: ats.slug_from_url(url),
                    display_name: csv_name.to_string(),
                });
            }
        }
    }

    let mut seen = HashSet::new();
    matches
        .into_iter()
        .filter(|m| seen.insert((m.ats, m.slug.to_lowercase())))
        .collect()
}

/// A normalized name counts as a bespoke match only when the scraper's JSON
/// blob is actually on disk.
pub fn bespoke_match(root: &Path, company_name: &str) -> Option<BespokeSource> {
    let normalized = normalize_company_name(company_name);
    BespokeSource::from_normalized_name(&normalized)
        .filter(|source| source.json_path(root).exists())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn normalization_strips_suffixes_and_casefolds() {
        assert_eq!(normalize_company_name("  OpenAI Inc. "), "openai");
        assert_eq!(normalize_company_name("Acme Corp"), "acme");
        assert_eq!(normalize_company_name("Tavily"), "tavily");
        // lowercase " inc" is not a recognized suffix
        assert_eq!(normalize_company_name("acme inc"), "acme inc");
    }

    #[test]
    fn finds_matches_across_registries_with_dedup() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir_all(root.path().join("ashby")).unwrap();
        fs::write(
            root.path().join("ashby/companies.csv"),
            "name,url\nAcme Inc,https://jobs.ashbyhq.com/acme\nAcme,https://jobs.ashbyhq.com/Acme\n",
        )
        .unwrap();
        fs::create_dir_all(root.path().join("lever")).unwrap();
        fs::write(
            root.path().join("lever/lever_companies.csv"),
            "name,url\nAcme,https://jobs.lever.co/acme\nOther,https://jobs.lever.co/other\n",
        )
        .unwrap();

        let matches = find_companies(root.path(), "acme", None);
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].ats, AtsProvider::Ashby);
        assert_eq!(matches[0].slug, "acme");
        assert_eq!(matches[0].display_name, "Acme Inc");
        assert_eq!(matches[1].ats, AtsProvider::Lever);
    }

    #[test]
    fn ats_filter_restricts_scope() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir_all(root.path().join("ashby")).unwrap();
        fs::write(
            root.path().join("ashby/companies.csv"),
            "name,url\nAcme,https://jobs.ashbyhq.com/acme\n",
        )
        .unwrap();

        assert!(find_companies(root.path(), "acme", Some(AtsProvider::Lever)).is_empty());
        assert_eq!(
            find_companies(root.path(), "acme", Some(AtsProvider::Ashby)).len(),
            1
        );
    }

    #[test]
    fn bespoke_match_requires_blob_on_disk() {
        let root = tempfile::tempdir().unwrap();
        assert!(bespoke_match(root.path(), "Google").is_none());
        fs::create_dir_all(root.path().join("google")).unwrap();
        fs::write(root.path().join("google/google.json"), "{\"jobs\": []}").unwrap();
        assert_eq!(
            bespoke_match(root.path(), "Google"),
            Some(BespokeSource::Google)
        );
    }
}

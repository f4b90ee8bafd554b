use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use walkdir::WalkDir;

use crate::types::JobRecord;

// ═══════════════════════════════════════════════════════════════════════════
// DESCRIPTION RETRIEVAL
// ═══════════════════════════════════════════════════════════════════════════

static HTML_TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());
static BLANK_RUN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\s*\n").unwrap());

pub fn strip_html_tags(text: &str) -> String {
    HTML_TAG_RE.replace_all(text, "").into_owned()
}

/// Greenhouse `content`: decode HTML entities but keep the tag structure
/// (later regexes tolerate tags), normalize NBSP, collapse blank runs.
pub fn process_greenhouse_content(content: &str) -> Option<String> {
    if content.is_empty() {
        return None;
    }
    let decoded = html_escape::decode_html_entities(content).into_owned();
    let decoded = decoded.replace('\u{a0}', " ");
    let decoded = BLANK_RUN_RE.replace_all(&decoded, "\n\n");
    let decoded = decoded.trim();
    if decoded.is_empty() {
        None
    } else {
        Some(decoded.to_string())
    }
}

/// Lever postings spread the description over `descriptionPlain`, the
/// RESPONSIBILITIES/QUALIFICATIONS `lists` and `additionalPlain` (which is
/// where the salary usually lives). Concatenate them all.
pub fn combine_lever_description(job: &Value) -> Option<String> {
    let mut parts: Vec<String> = Vec::new();

    if let Some(plain) = job.get("descriptionPlain").and_then(Value::as_str) {
        let plain = plain.trim();
        if !plain.is_empty() {
            parts.push(plain.to_string());
        }
    }

    if let Some(lists) = job.get("lists").and_then(Value::as_array) {
        for item in lists {
            let header = item.get("text").and_then(Value::as_str).unwrap_or("").trim();
            let content = item.get("content").and_then(Value::as_str).unwrap_or("");
            if content.is_empty() {
                continue;
            }
            let content_plain = strip_html_tags(content);
            let content_plain = content_plain.trim();
            if content_plain.is_empty() {
                continue;
            }
            if header.is_empty() {
                parts.push(format!("\n\n{content_plain}"));
            } else {
                parts.push(format!("\n\n{header}\n{content_plain}"));
            }
        }
    }

    if let Some(additional) = job.get("additionalPlain").and_then(Value::as_str) {
        let additional = additional.trim();
        if !additional.is_empty() {
            parts.push(additional.to_string());
        }
    }

    if parts.is_empty() {
        None
    } else {
        Some(parts.join("\n\n"))
    }
}

fn plain_description(job: &Value) -> Option<String> {
    let candidates = ["descriptionPlain", "description", "text", "descriptionHtml"];
    let mut html_fallback = None;
    for key in candidates {
        let Some(value) = job.get(key).and_then(Value::as_str) else {
            continue;
        };
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        if value.starts_with('<') {
            if html_fallback.is_none() {
                html_fallback = Some(value.to_string());
            }
            continue;
        }
        return Some(value.to_string());
    }
    html_fallback
}

fn description_by_ats(job: &Value, ats_type: &str) -> Option<String> {
    match ats_type {
        "lever" => combine_lever_description(job),
        "greenhouse" => job
            .get("content")
            .and_then(Value::as_str)
            .and_then(process_greenhouse_content),
        _ => plain_description(job),
    }
}

fn normalize_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Lazily-loaded index over every per-company JSON blob. Built once per run;
/// parsed blobs are cached in memory and never evicted within a run.
pub struct DescriptionIndex {
    paths: HashMap<String, PathBuf>,
    cache: HashMap<String, Value>,
}

impl DescriptionIndex {
    /// One-shot scan of all `*/companies/*.json` blobs under the root.
    pub fn build(root: &Path) -> Self {
        let mut paths = HashMap::new();
        for entry in WalkDir::new(root).into_iter().filter_map(Result::ok) {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let in_companies_dir = path
                .parent()
                .and_then(|p| p.file_name())
                .and_then(|n| n.to_str())
                == Some("companies");
            if !in_companies_dir {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                paths.insert(stem.to_string(), path.to_path_buf());
                paths.insert(normalize_key(stem), path.to_path_buf());
            }
        }
        Self {
            paths,
            cache: HashMap::new(),
        }
    }

    fn blob_for_company(&mut self, company: &str) -> Option<&Value> {
        let path = self
            .paths
            .get(company)
            .or_else(|| self.paths.get(&normalize_key(company)))?
            .clone();
        let cache_key = normalize_key(company);
        if !self.cache.contains_key(&cache_key) {
            let data: Value = serde_json::from_str(&fs::read_to_string(&path).ok()?).ok()?;
            self.cache.insert(cache_key.clone(), data);
        }
        self.cache.get(&cache_key)
    }

    /// Locate the description for a job inside its company blob: by URL,
    /// then by id (ashby/lever/greenhouse), then by title.
    pub fn description_for(&mut self, record: &JobRecord) -> Option<String> {
        let ats_type = record.ats_type.clone();
        let ats_id = record.ats_id.trim().to_string();
        let url = record.url.trim().to_string();
        let title = record.title.trim().to_lowercase();

        let blob = self.blob_for_company(&record.company)?;
        let jobs = match blob {
            Value::Object(_) => blob.get("jobs").and_then(Value::as_array)?,
            Value::Array(list) => list,
            _ => return None,
        };

        let id_matchable = !ats_id.is_empty()
            && matches!(ats_type.as_str(), "ashby" | "lever" | "greenhouse");

        for job in jobs {
            let job_url = job
                .get("jobUrl")
                .or_else(|| job.get("url"))
                .or_else(|| job.get("absolute_url"))
                .or_else(|| job.get("hostedUrl"))
                .and_then(Value::as_str);
            if job_url == Some(url.as_str()) {
                if let Some(description) = description_by_ats(job, &ats_type) {
                    return Some(description.trim().to_string());
                }
            }

            if id_matchable {
                let job_id = match job.get("id") {
                    Some(Value::String(s)) => Some(s.clone()),
                    Some(Value::Number(n)) => Some(n.to_string()),
                    _ => None,
                };
                if job_id.as_deref() == Some(ats_id.as_str()) {
                    if let Some(description) = description_by_ats(job, &ats_type) {
                        return Some(description.trim().to_string());
                    }
                }
            }

            let job_title = job.get("title").and_then(Value::as_str).unwrap_or("");
            if !job_title.is_empty() && job_title.trim().to_lowercase() == title {
                if let Some(description) = description_by_ats(job, &ats_type) {
                    return Some(description.trim().to_string());
                }
            }
        }

        None
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// SALARY EXTRACTION
// ═══════════════════════════════════════════════════════════════════════════

const AMOUNT: &str = r"(\d{1,3}(?:[.,]\d{3})*(?:\.\d+)?)";
const AMOUNT_COMMA: &str = r"(\d{1,3}(?:,\d{3})*(?:\.\d+)?)";

/// Range patterns come before single-value patterns so a range is never
/// reduced to its first number.
static SALARY_RANGE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    let range_sep = r"(?:[-–—]|&mdash;|&ndash;)";
    let loose_sep = r"(?:[-–—to]+|&mdash;|&ndash;)";
    [
        // Estimated annual base salary: $93,000.00 - 135,000.00
        format!(
            r"(?i)(?:estimated\s+)?(?:annual\s+)?(?:base\s+)?salary[:\s]*(?:of\s+)?[\$£€¥]\s*{AMOUNT}\s*(?:k|K)?\s*{range_sep}\s*[\$£€¥]?\s*{AMOUNT}\s*(?:k|K)?"
        ),
        // Annual Salary: $210,000 - $248,500 (also European dot separators)
        format!(
            r"(?i)(?:annual\s+)?salary[:\s]*[\$£€¥]\s*{AMOUNT}\s*(?:k|K)?\s*{range_sep}\s*[\$£€¥]?\s*{AMOUNT}\s*(?:k|K)?"
        ),
        // salary range: $100k-150k, compensation range: $100k-150k
        format!(
            r"(?i)(?:salary|compensation|base\s+salary|base\s+compensation)(?:\s+range)?[:\s]+[\$£€¥]\s*{AMOUNT}\s*(?:k|K)?\s*{loose_sep}\s*[\$£€¥]?\s*{AMOUNT}\s*(?:k|K)?"
        ),
        // salary: $100k-150k
        format!(
            r"(?i)(?:salary|compensation|base\s+salary|base\s+compensation)[:\s]+[\$£€¥]\s*{AMOUNT}\s*(?:k|K)?\s*{loose_sep}\s*[\$£€¥]?\s*{AMOUNT}\s*(?:k|K)?"
        ),
        // $100k-150k, $130,900 - $177,100, €155.000 - €205.000
        format!(r"[\$£€¥]\s*{AMOUNT}\s*(?:k|K)?\s*{range_sep}\s*[\$£€¥]?\s*{AMOUNT}\s*(?:k|K)?"),
        // $100k to $150k
        format!(r"[\$£€¥]\s*{AMOUNT}\s*(?:k|K)?\s+to\s+[\$£€¥]?\s*{AMOUNT}\s*(?:k|K)?"),
        // $100,000 - $150,000 per year
        format!(
            r"[\$£€¥]\s*{AMOUNT}\s*{range_sep}\s*[\$£€¥]?\s*{AMOUNT}\s*(?:per|/)\s*(?:year|annum|annually)"
        ),
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static SALARY_SINGLE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        // Single salary with salary/compensation context: "base : $100k"
        format!(r"(?i)(?:salary|compensation|base)\s+[:\s]+[\$£€¥]\s*{AMOUNT_COMMA}\s*(?:k|K)?"),
        // Single salary, standalone
        format!(r"[\$£€¥]\s*{AMOUNT_COMMA}\s*(?:k|K)?"),
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

/// A single-value match followed by a range separator and another number is
/// really the head of a range; the range patterns should have handled it.
static RANGE_CONTINUATION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:[-–—]|&mdash;|&ndash;|to)\s*[\$£€¥]?\s*\d").unwrap());

/// Likewise, a single value directly preceded by a range separator is the
/// tail of a range the range patterns already rejected.
static RANGE_PRECEDING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:[-–—]|&mdash;|&ndash;|\bto)\s*$").unwrap());

static FALSE_POSITIVE_INDICATORS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"\b(billion|billions|million|millions)\s+.*?\$",
        r"\b(paid|pay|pays|revenue|revenues|raised|valued|valuation)\s+\d+.*?\$",
        r"\$\s*\d+(?:,\d+)*(?:[km])?\s+in\s+revenue",
        r"\$\s*\d+(?:,\d+)*(?:[km])?\s+revenue",
        r"\$\s*\d+(?:,\d+)*(?:[km])?\s+arr\b",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

const SALARY_FLOOR: f64 = 20_000.0;
const SALARY_CEILING: f64 = 1_000_000.0;

fn char_floor(s: &str, mut i: usize) -> usize {
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

fn char_ceil(s: &str, mut i: usize) -> usize {
    while i < s.len() && !s.is_char_boundary(i) {
        i += 1;
    }
    i
}

fn context_window(text: &str, start: usize, end: usize, pad: usize) -> &str {
    let lo = char_floor(text, start.saturating_sub(pad));
    let hi = char_ceil(text, (end + pad).min(text.len()));
    &text[lo..hi]
}

fn is_false_positive(text: &str, start: usize, end: usize) -> bool {
    let context = context_window(text, start, end, 100).to_lowercase();
    FALSE_POSITIVE_INDICATORS
        .iter()
        .any(|re| re.is_match(&context))
}

/// Parse a numeric amount, treating both `,` and `.` as thousand separators
/// when they group digits in threes (European format), and `.` as a decimal
/// point otherwise.
fn parse_amount(raw: &str) -> Option<f64> {
    static GROUPED: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{1,3}(?:[.,]\d{3})+$").unwrap());
    if GROUPED.is_match(raw) {
        raw.replace([',', '.'], "").parse().ok()
    } else {
        raw.replace(',', "").parse().ok()
    }
}

fn currency_symbol(matched: &str) -> char {
    if matched.contains('$') {
        '$'
    } else if matched.contains('€') {
        '€'
    } else if matched.contains('£') {
        '£'
    } else {
        '¥'
    }
}

/// Extract a salary from free-form description text.
///
/// Returns a normalized salary string like `"$150,000-$180,000"` or
/// `"€155000-€205000"`, or `None` when nothing survives the false-positive
/// screen and the 20k..1M sanity bounds.
pub fn extract_salary_from_description(description: &str) -> Option<String> {
    if description.is_empty() {
        return None;
    }
    let clean = strip_html_tags(description);
    let clean = html_escape::decode_html_entities(&clean).into_owned();

    for pattern in SALARY_RANGE_PATTERNS.iter() {
        let Some(caps) = pattern.captures(&clean) else {
            continue;
        };
        let whole = caps.get(0).unwrap();
        if is_false_positive(&clean, whole.start(), whole.end()) {
            continue;
        }
        let matched = whole.as_str();
        let has_k = matched.to_lowercase().contains('k');
        let (Some(mut min), Some(mut max)) = (
            parse_amount(caps.get(1).unwrap().as_str()),
            parse_amount(caps.get(2).unwrap().as_str()),
        ) else {
            continue;
        };
        if has_k && min < 1000.0 {
            min *= 1000.0;
        }
        if has_k && max < 1000.0 {
            max *= 1000.0;
        }
        if min < SALARY_FLOOR || max > SALARY_CEILING || min > max {
            continue;
        }
        let currency = currency_symbol(matched);
        let min_str = preserve_commas(caps.get(1).unwrap().as_str(), min);
        let max_str = preserve_commas(caps.get(2).unwrap().as_str(), max);
        return Some(format!("{currency}{min_str}-{currency}{max_str}"));
    }

    for pattern in SALARY_SINGLE_PATTERNS.iter() {
        for caps in pattern.captures_iter(&clean) {
            let whole = caps.get(0).unwrap();
            // Skip the head or tail of a range the range patterns rejected
            if RANGE_CONTINUATION_RE.is_match(&clean[whole.end()..])
                || RANGE_PRECEDING_RE.is_match(&clean[..whole.start()])
            {
                continue;
            }
            if is_false_positive(&clean, whole.start(), whole.end()) {
                continue;
            }
            let matched = whole.as_str();
            let has_k = matched.to_lowercase().contains('k');
            let Some(mut val) = parse_amount(caps.get(1).unwrap().as_str()) else {
                continue;
            };
            if has_k && val < 1000.0 {
                val *= 1000.0;
            }
            if val < SALARY_FLOOR || val > SALARY_CEILING {
                continue;
            }
            let currency = currency_symbol(matched);
            return Some(format!("{currency}{}", val as i64));
        }
    }

    None
}

fn preserve_commas(original: &str, value: f64) -> String {
    if original.contains(',') {
        original.to_string()
    } else {
        format!("{}", value as i64)
    }
}

/// Split a salary string into (min, max, ISO currency). Currency defaults to
/// USD when no symbol or code is present.
pub fn parse_salary(salary_str: &str) -> Option<(i64, i64, String)> {
    static RANGE_RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"(\d+(?:\.\d+)?)\s*(?:k|K)?\s*[-–—]\s*(\d+(?:\.\d+)?)\s*(?:k|K)?").unwrap());
    static SINGLE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+(?:\.\d+)?)\s*(?:k|K)?").unwrap());

    let salary_str = salary_str.trim();
    if salary_str.is_empty() {
        return None;
    }

    let upper = salary_str.to_uppercase();
    let currency = if salary_str.contains('$') || upper.contains("USD") {
        "USD"
    } else if salary_str.contains('€') || upper.contains("EUR") {
        "EUR"
    } else if salary_str.contains('£') || upper.contains("GBP") {
        "GBP"
    } else {
        "USD"
    }
    .to_string();

    let stripped: String = salary_str.replace(['$', '£', '€', '¥'], "").replace(',', "");
    let has_k = stripped.to_lowercase().contains('k');
    let expand = |v: f64| if has_k && v < 1000.0 { v * 1000.0 } else { v };

    if let Some(caps) = RANGE_RE.captures(&stripped) {
        let min = expand(caps.get(1)?.as_str().parse().ok()?);
        let max = expand(caps.get(2)?.as_str().parse().ok()?);
        return Some((min as i64, max as i64, currency));
    }
    if let Some(caps) = SINGLE_RE.captures(&stripped) {
        let val = expand(caps.get(1)?.as_str().parse().ok()?);
        return Some((val as i64, val as i64, currency));
    }
    None
}

/// Render the canonical salary summary: `"$150K - $180K"`, `"EUR 120K - 140K"`,
/// a single term when min equals max.
pub fn format_salary_summary(min: i64, max: i64, currency: &str) -> String {
    let k = |v: i64| (v as f64 / 1000.0).round() as i64;
    if min == max {
        if currency == "USD" {
            format!("${}K", k(min))
        } else {
            format!("{currency} {}K", k(min))
        }
    } else if currency == "USD" {
        format!("${}K - ${}K", k(min), k(max))
    } else {
        format!("{currency} {}K - {}K", k(min), k(max))
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// EXPERIENCE EXTRACTION
// ═══════════════════════════════════════════════════════════════════════════

static EXPERIENCE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        // "3+ years of experience with research operations"
        r"(?i)(\d+)\+\s+years?\s+of\s+experience\s+with\s+\w+",
        // "3+ years of proven experience in payroll system implementation"
        r"(?i)(\d+)\+\s+years?\s+of\s+(?:proven\s+)?experience\s+in\s+\w+",
        // "Have 4+ years of experience", "Possess 2+ years of ... experience"
        r"(?i)(?:have|possess|require|requires|required|need|needs)\s+(\d+)\+?\s+years?\s+(?:of\s+)?(?:\w+\s+){0,8}(?:experience|exp)",
        // "3–5 years of social media strategy experience"
        r"(?i)(\d+)\s*[-–—to]+\s*(\d+)\+?\s+years?\s+of\s+(?:\w+\s+){0,5}(?:experience|exp)",
        // "2–4 years building full-stack products"
        r"(?i)(\d+)\s*[-–—to]+\s*(\d+)\+?\s+years?\s+(?:building|developing|designing|managing|working|creating|implementing|maintaining|supporting)\s+\w+",
        // "3+ years building ..."
        r"(?i)(\d+)\+\s+years?\s+(?:building|developing|designing|managing|working|creating|implementing|maintaining|supporting)\s+\w+",
        // "3-5 years of ... experience"
        r"(?i)(\d+)\s*[-–—to]+\s*(\d+)\+?\s+years?\s+(?:of\s+)?(?:\w+\s+){0,8}(?:experience|exp)",
        // "5+ years of research engineering experience"
        r"(?i)(\d+)\+\s+years?\s+(?:of\s+)?(?:\w+\s+){0,8}(?:experience|exp)",
        // "at least 3 years", "minimum 3 years"
        r"(?i)(?:at\s+least|minimum|min\.?)\s+(\d+)\s+years?\s+(?:of\s+)?(?:\w+\s+){0,8}(?:experience|exp)",
        // "3-5 years in/with/working ..."
        r"(?i)(\d+)\s*[-–—to]+\s*(\d+)\+?\s+years?\s+(?:in|with|working|building|developing|designing|managing|shipping)",
        // "5+ years in/with/working ..."
        r"(?i)(\d+)\+\s+years?\s+(?:in|with|working|building|developing|designing|managing|shipping)",
        // "3 years experience" (without +)
        r"(?i)(\d+)\s+years?\s+(?:of\s+)?(?:\w+\s+){0,8}(?:experience|exp)",
        // "3-5 years" (bare range)
        r"(?i)(\d+)\s*[-–—to]+\s*(\d+)\+?\s+years?",
        // "5+ years" (bare)
        r"(?i)(\d+)\+\s+years?",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

/// Extract a years-of-experience requirement. Ranges yield their minimum.
pub fn extract_experience_from_description(description: &str) -> Option<u32> {
    if description.is_empty() {
        return None;
    }
    let clean = strip_html_tags(description);
    for pattern in EXPERIENCE_PATTERNS.iter() {
        if let Some(caps) = pattern.captures(&clean) {
            if let Some(years) = caps.get(1).and_then(|m| m.as_str().parse().ok()) {
                return Some(years);
            }
        }
    }
    None
}

// ═══════════════════════════════════════════════════════════════════════════
// ENRICHMENT PASS
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Default)]
pub struct EnrichmentStats {
    pub enriched: usize,
    pub salary_extracted: usize,
    pub experience_extracted: usize,
}

/// Enrich jobs in place: salary only when `salary_summary` is missing,
/// experience always. Jobs whose description cannot be found are left alone.
pub fn enrich_jobs(jobs: &mut [JobRecord], index: &mut DescriptionIndex) -> EnrichmentStats {
    let mut stats = EnrichmentStats::default();
    let total = jobs.len();
    tracing::info!("enriching {total} jobs with salary and experience from descriptions");

    for (idx, job) in jobs.iter_mut().enumerate() {
        if (idx + 1) % 100 == 0 {
            tracing::info!("processing job {}/{total}", idx + 1);
        }
        if job.url.trim().is_empty()
            || job.company.trim().is_empty()
            || job.title.trim().is_empty()
        {
            continue;
        }

        let Some(description) = index.description_for(job) else {
            continue;
        };

        if job.salary_summary.is_none() {
            if let Some(raw) = extract_salary_from_description(&description) {
                if let Some((min, max, currency)) = parse_salary(&raw) {
                    job.salary_summary = Some(format_salary_summary(min, max, &currency));
                    if job.salary_currency.is_none() {
                        job.salary_currency = Some(currency);
                    }
                    stats.salary_extracted += 1;
                }
            }
        }

        if let Some(years) = extract_experience_from_description(&description) {
            job.experience = Some(years.to_string());
            stats.experience_extracted += 1;
        }

        stats.enriched += 1;
    }

    tracing::info!(
        "enriched {} jobs ({} salaries, {} experience values)",
        stats.enriched,
        stats.salary_extracted,
        stats.experience_extracted,
    );
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_range_with_context_keywords() {
        let raw = extract_salary_from_description(
            "The salary range for this role is $150,000 - $180,000 per year. \
             Requires 5+ years of experience building distributed systems.",
        )
        .unwrap();
        let (min, max, currency) = parse_salary(&raw).unwrap();
        assert_eq!((min, max), (150_000, 180_000));
        assert_eq!(currency, "USD");
        assert_eq!(format_salary_summary(min, max, &currency), "$150K - $180K");
    }

    #[test]
    fn extracts_k_suffixed_range() {
        let raw = extract_salary_from_description("Compensation: $120k-150k plus equity").unwrap();
        let (min, max, _) = parse_salary(&raw).unwrap();
        assert_eq!((min, max), (120_000, 150_000));
    }

    #[test]
    fn accepts_european_thousand_separators() {
        let raw = extract_salary_from_description("Annual salary: €155.000 - €205.000").unwrap();
        let (min, max, currency) = parse_salary(&raw).unwrap();
        assert_eq!((min, max), (155_000, 205_000));
        assert_eq!(currency, "EUR");
        assert_eq!(format_salary_summary(min, max, &currency), "EUR 155K - 205K");
    }

    #[test]
    fn accepts_html_entity_dash_ranges() {
        let raw =
            extract_salary_from_description("Annual Salary: $210,000&mdash;$248,500").unwrap();
        let (min, max, _) = parse_salary(&raw).unwrap();
        assert_eq!((min, max), (210_000, 248_500));
    }

    #[test]
    fn rejects_fundraising_false_positive() {
        assert_eq!(
            extract_salary_from_description("We've raised $500M in Series C funding"),
            None
        );
    }

    #[test]
    fn rejects_revenue_context() {
        assert_eq!(
            extract_salary_from_description("We make $500,000 in revenue per customer"),
            None
        );
    }

    #[test]
    fn rejects_below_floor_and_above_ceiling() {
        assert_eq!(extract_salary_from_description("One-time bonus of $19,999"), None);
        assert_eq!(
            extract_salary_from_description("Base pay $25,000 - $1,500,000"),
            None
        );
    }

    #[test]
    fn inverted_range_is_rejected() {
        assert_eq!(extract_salary_from_description("$180,000 - $150,000"), None);
    }

    #[test]
    fn experience_patterns_in_order() {
        assert_eq!(
            extract_experience_from_description("5+ years of experience with Rust"),
            Some(5)
        );
        assert_eq!(
            extract_experience_from_description("3-5 years of backend experience"),
            Some(3)
        );
        assert_eq!(
            extract_experience_from_description("at least 7 years of experience"),
            Some(7)
        );
        assert_eq!(
            extract_experience_from_description("2–4 years building full-stack products"),
            Some(2)
        );
        assert_eq!(extract_experience_from_description("no requirements here"), None);
    }

    #[test]
    fn salary_round_trip_preserves_magnitude_and_currency() {
        for raw in ["$120,000-$150,000", "€90000-€110000", "£80k-£95k"] {
            let (min, max, currency) = parse_salary(raw).unwrap();
            let summary = format_salary_summary(min, max, &currency);
            let (min2, max2, currency2) = parse_salary(&summary).unwrap();
            assert_eq!(currency, currency2);
            assert_eq!(min / 1000, min2 / 1000);
            assert_eq!(max / 1000, max2 / 1000);
        }
    }

    #[test]
    fn greenhouse_content_is_entity_decoded() {
        let processed =
            process_greenhouse_content("&lt;p&gt;Salary:&nbsp;$100,000 &amp; benefits&lt;/p&gt;")
                .unwrap();
        assert!(processed.contains("<p>Salary: $100,000 & benefits</p>"));
    }

    #[test]
    fn lever_description_concatenates_lists_and_additional() {
        let job = json!({
            "descriptionPlain": "About the role",
            "lists": [
                {"text": "Requirements", "content": "<li>5+ years of experience</li>"}
            ],
            "additionalPlain": "Salary range: $140,000 - $170,000"
        });
        let description = combine_lever_description(&job).unwrap();
        assert!(description.contains("About the role"));
        assert!(description.contains("Requirements\n5+ years of experience"));
        assert!(description.contains("$140,000 - $170,000"));
    }

    #[test]
    fn enrichment_is_idempotent_for_present_salary() {
        let root = tempfile::tempdir().unwrap();
        let companies = root.path().join("ashby").join("companies");
        std::fs::create_dir_all(&companies).unwrap();
        std::fs::write(
            companies.join("acme.json"),
            json!({"jobs": [{
                "id": "j1",
                "title": "Engineer",
                "jobUrl": "https://jobs.ashbyhq.com/acme/j1",
                "descriptionPlain": "Salary: $100,000 - $120,000. Requires 4+ years of experience."
            }]})
            .to_string(),
        )
        .unwrap();

        let mut index = DescriptionIndex::build(root.path());
        let mut jobs = vec![JobRecord {
            url: "https://jobs.ashbyhq.com/acme/j1".into(),
            title: "Engineer".into(),
            company: "Acme".into(),
            ats_id: "j1".into(),
            ats_type: "ashby".into(),
            salary_summary: Some("$200K - $250K".into()),
            ..Default::default()
        }];

        let stats = enrich_jobs(&mut jobs, &mut index);
        // pre-existing salary untouched, experience recomputed
        assert_eq!(jobs[0].salary_summary.as_deref(), Some("$200K - $250K"));
        assert_eq!(jobs[0].experience.as_deref(), Some("4"));
        assert_eq!(stats.salary_extracted, 0);
        assert_eq!(stats.experience_extracted, 1);
    }

    #[test]
    fn description_found_by_id_then_title() {
        let root = tempfile::tempdir().unwrap();
        let companies = root.path().join("greenhouse").join("companies");
        std::fs::create_dir_all(&companies).unwrap();
        std::fs::write(
            companies.join("acme.json"),
            json!({"jobs": [{
                "id": 4242,
                "title": "Platform Engineer",
                "absolute_url": "https://boards.greenhouse.io/acme/jobs/4242",
                "content": "Annual salary: $130,000&ndash;$160,000"
            }]})
            .to_string(),
        )
        .unwrap();

        let mut index = DescriptionIndex::build(root.path());
        let by_id = JobRecord {
            url: "https://other.example/mismatch".into(),
            title: "ignored".into(),
            company: "acme".into(),
            ats_id: "4242".into(),
            ats_type: "greenhouse".into(),
            ..Default::default()
        };
        assert!(index.description_for(&by_id).is_some());

        let by_title = JobRecord {
            url: "https://other.example/mismatch".into(),
            title: "platform engineer".into(),
            company: "acme".into(),
            ats_type: "greenhouse".into(),
            ..Default::default()
        };
        assert!(index.description_for(&by_title).is_some());
    }
}

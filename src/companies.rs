use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::resolver::normalize_company_name;

pub const LEARNED_MAP_FILE: &str = "ai_companies.json";

/// Built-in AI-companies map: normalized name to the ATS it is known to live
/// on. `None` means search all ATS systems. The big-tech names at the bottom
/// are handled by bespoke scrapers.
#[rustfmt::skip]
pub const AI_COMPANIES_DEFAULT: &[(&str, Option<&str>)] = &[
    ("openai", None), ("mistral", None), ("anthropic", None), ("deepmind", None),
    ("cohere", None), ("huggingface", None), ("perplexity", None), ("character", None),
    ("inflection", None), ("anyscale", None), ("modal", None), ("together", None),
    ("togetherai", None), ("runwayml", None), ("runway", None), ("scaleai", None),
    ("scale", None), ("stability", None), ("stabilityai", None), ("midjourney", None),
    ("replicate", None), ("fal", None), ("adept", None), ("xai", None),
    ("anysphere", None), ("openrouter", None), ("applied compute", None), ("alan", None),
    ("attio", None), ("cartesia", None), ("cognition", None), ("crusoe", None),
    ("decagon", None), ("deepgram", None), ("deepl", None), ("dust", None),
    ("elevenlabs", None), ("exa", None), ("factory", None), ("firecrawl", None),
    ("gigaml", None), ("gladia", None), ("granola", None), ("graphite", None),
    ("hcompany", None), ("juicebox", None), ("jua", None), ("lambda", None),
    ("langchain", None), ("legora", None), ("lindy", None), ("livekit", None),
    ("lovable", None), ("mercor", None), ("n8n", None), ("parallel", None),
    ("peec", None), ("photoroom", None), ("physical intelligence", None),
    ("prime intellect", None), ("replit", None), ("notion", None), ("ramp", None),
    ("browserbase", None), ("anything", None), ("astral", None), ("axiom", None),
    ("baseten", None), ("braintrust", None), ("claylabs", None), ("clerk", None),
    ("cluely", None), ("codegen", None), ("coder", None), ("compound", None),
    ("confluent", None), ("convex dev", None), ("david ai", None), ("deel", None),
    ("delve", None), ("docker", None), ("eightsleep", None), ("fyxer", None),
    ("greptile", None), ("gumloop", None), ("harvey", None), ("inkeep", None),
    ("julius", None), ("kilocode", None), ("langdock", None), ("langfuse", None),
    ("lime", None), ("magicpatterns", None), ("mapbox", None), ("mem0", None),
    ("mintlify", None), ("posthog", None), ("profound", None), ("pylon labs", None),
    ("retell ai", None), ("revenuecat", None), ("sentry", None), ("sfcompute", None),
    ("sierra", None), ("statista", None), ("stytch", None), ("substack", None),
    ("supabase", None), ("tavily", None), ("telli", None), ("taktile", None),
    ("the browser company", None), ("vapi", None), ("vizcom", None), ("warp", None),
    ("wordware", None), ("airbnb", None), ("algolia", None), ("baselayer", None),
    ("beyondtrust", None), ("bitly", None), ("boxinc", None), ("brave", None),
    ("brex", None), ("careem", None), ("cloudflare", None), ("coursera", None),
    ("dataiku", None), ("databricks", None), ("duolingo", None), ("faire", None),
    ("figma", None), ("figure ai", None), ("gitlab", None), ("intercom", None),
    ("isomorphic labs", None), ("jane street", None), ("neuralink", None),
    ("nintendo", None), ("pagerduty", None), ("planet scale", None), ("postman", None),
    ("proton", None), ("reddit", None), ("stackblitz", None), ("strava", None),
    ("synthesia", None), ("thinking machines", None), ("twilio", None), ("twitch", None),
    ("whoop", None), ("stripe", None), ("snapchat", None), ("shopify", None),
    ("slack", None), ("square", None), ("sumup", None), ("space x", None),
    ("optiver", None), ("oklo", None), ("ngrok", None), ("newrelic", None),
    ("netlify", None), ("neon", None), ("mozilla", None), ("passes", None),
    ("paypaycard", None), ("redis", None), ("reliant", None), ("samsung research", None),
    ("starcloud", None), ("tripadvisor", None), ("typeform", None), ("vercel", None),
    ("1password", None), ("alice bob", None), ("daedalean", None), ("deepjudge", None),
    ("nominal", None), ("pigment", None), ("plaid", None), ("quantco", None),
    ("scaleway", None), ("sonar", None), ("veepee", None), ("wahed", None),
    ("workos", None), ("sana", None), ("sanity", None), ("sardine", None),
    ("sieve", None), ("speckle", None), ("stack ai", None), ("statsig", None),
    ("zip", None), ("yazio", None), ("voodoo", None), ("twenty", None),
    ("turbopuffer", None), ("tldraw", None), ("tabs", None), ("synthflow", None),
    ("svix", None), ("superhuman", None), ("roo code", None), ("riza", None),
    ("resend", None), ("render", None), ("reacher", None), ("ravio", None),
    ("quora", None), ("polar", None), ("phare", None), ("magic.dev", None),
    ("magentic", None), ("lottie", None), ("lmarena", None), ("llamaindex", None),
    ("hud", None), ("gptzero", None), ("general intelligence", None), ("fizz", None),
    // Big tech bespoke scrapers
    ("google", None), ("microsoft", None), ("nvidia", None), ("amazon", None),
    ("cursor", None), ("meta", None), ("apple", None), ("uber", None),
];

pub type CompanyMap = BTreeMap<String, Option<String>>;

/// Load the AI-companies map: the built-in defaults overlaid with whatever
/// `ai_companies.json` has learned from previous runs. The learned map is an
/// optimization, not a source of truth; a malformed file is logged and
/// ignored.
pub fn load_company_map(root: &Path) -> CompanyMap {
    let mut map: CompanyMap = AI_COMPANIES_DEFAULT
        .iter()
        .map(|(name, ats)| (normalize_company_name(name), ats.map(String::from)))
        .collect();

    let path = root.join(LEARNED_MAP_FILE);
    if path.exists() {
        match fs::read_to_string(&path)
            .map_err(anyhow::Error::from)
            .and_then(|text| {
                serde_json::from_str::<BTreeMap<String, Option<String>>>(&text)
                    .map_err(anyhow::Error::from)
            }) {
            Ok(learned) => {
                for (name, ats) in learned {
                    map.insert(normalize_company_name(&name), ats);
                }
            }
            Err(e) => tracing::warn!("error loading {}: {e}", path.display()),
        }
    }

    map
}

/// Atomically rewrite the learned map after a run.
pub fn save_company_map(root: &Path, map: &CompanyMap) -> anyhow::Result<()> {
    let path = root.join(LEARNED_MAP_FILE);
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, serde_json::to_string_pretty(map)?)?;
    fs::rename(&tmp, &path)?;
    Ok(())
}

pub mod extract;
pub mod filename;
pub mod sanitize;

use std::sync::LazyLock;

use regex::Regex;

use extract::ParsedDocument;
use sanitize::BoilerplateScope;

static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Collapse every whitespace run to a single space. PDF text extraction
/// inserts line breaks mid-sentence, so all field patterns run on the
/// collapsed form.
pub fn normalize(text: &str) -> String {
    WS_RE.replace_all(text, " ").into_owned()
}

/// Parse one report: collapse whitespace once, run the three field
/// extractors on the collapsed text (none depends on another's output),
/// then build the sanitized narrative copy.
pub fn process_report(raw: &str, scope: BoilerplateScope) -> ParsedDocument {
    let text = normalize(raw);
    ParsedDocument {
        course_info: extract::course::extract(&text),
        ratings: extract::ratings::extract(&text),
        comments: extract::comments::extract(&text),
        full_text: sanitize::sanitize(raw, scope),
    }
}

// ── Tests ──

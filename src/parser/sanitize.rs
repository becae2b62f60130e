use std::sync::LazyLock;

use clap::ValueEnum;
use regex::Regex;

/// How much of the template preamble to strip before storing narrative text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum BoilerplateScope {
    /// Strip each "<course title> (Spring|Fall YYYY) … Declines: n" span.
    /// Cannot over-strip a reordered template.
    #[default]
    CourseHeader,
    /// Strip everything from the start of the document through each
    /// "Declines: n" marker. More aggressive; assumes the preamble always
    /// precedes the narrative.
    ThroughDeclines,
}

// Standalone page numbers only exist before the whitespace collapse
static PAGE_NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n\s*\d+\s*\n").unwrap());
static COURSE_HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Za-z0-9 :&\-]+\((?:Spring|Fall) \d{4}\).*?Declines:\s*\d*").unwrap()
});
static THROUGH_DECLINES_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r".*?Declines:\s*\d*").unwrap());
static COLUMN_HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(Question|Number of Responses|Response Rate|Course Mean|Dept\. Mean|Univ\. Mean|Course Median|Dept\. Median|Univ\. Median)\s+",
    )
    .unwrap()
});
static LEGEND_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"Note: 5:[^;]*;").unwrap());

/// Produce the clean narrative copy of a report: drop standalone page-number
/// lines, collapse whitespace, strip the boilerplate preamble per `scope`,
/// then remove table column labels and the rating legend. Total and
/// idempotent; unmatched patterns leave the text unchanged.
pub fn sanitize(raw: &str, scope: BoilerplateScope) -> String {
    let text = PAGE_NUMBER_RE.replace_all(raw, "\n");
    let text = super::normalize(&text);
    let text = match scope {
        BoilerplateScope::CourseHeader => COURSE_HEADER_RE.replace_all(&text, ""),
        BoilerplateScope::ThroughDeclines => THROUGH_DECLINES_RE.replace_all(&text, ""),
    }
    .into_owned();
    let text = COLUMN_HEADER_RE.replace_all(&text, "");
    let text = LEGEND_RE.replace_all(&text, "");
    super::normalize(&text).trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPORT: &str = "Netwrk Strctrs Cloud Cmpting (Spring 2024)\n\
        Instructor: Parikh, Tejas\nEnrollment: 48\nDeclines: 2\n\
        Question Number of Responses Response Rate Course Mean Dept. Mean Univ. Mean\n\
        Note: 5: Strongly Agree, 1: Strongly Disagree;\n\
        The students praised the labs.\n2\nSecond page narrative.";

    #[test]
    fn course_header_scope_strips_preamble() {
        let clean = sanitize(REPORT, BoilerplateScope::CourseHeader);
        assert!(!clean.contains("Declines:"));
        assert!(!clean.contains("(Spring 2024)"));
        assert!(clean.contains("The students praised the labs."));
        assert!(clean.contains("Second page narrative."));
    }

    #[test]
    fn through_declines_scope_strips_reordered_preamble() {
        // No course-title phrase at all; the aggressive scope still clears it
        let raw = "Random cover sheet ### Enrollment: 48 Declines: 2 Narrative body.";
        let conservative = sanitize(raw, BoilerplateScope::CourseHeader);
        assert!(conservative.contains("Declines: 2"));
        let aggressive = sanitize(raw, BoilerplateScope::ThroughDeclines);
        assert_eq!(aggressive, "Narrative body.");
    }

    #[test]
    fn column_headers_removed() {
        let clean = sanitize(REPORT, BoilerplateScope::CourseHeader);
        for label in ["Course Mean", "Dept. Mean", "Univ. Mean", "Response Rate"] {
            assert!(!clean.contains(label), "label survived: {}", label);
        }
    }

    #[test]
    fn legend_removed() {
        let clean = sanitize(REPORT, BoilerplateScope::CourseHeader);
        assert!(!clean.contains("Note: 5:"));
        assert!(!clean.contains("Strongly Agree"));
    }

    #[test]
    fn page_number_lines_collapsed() {
        let clean = sanitize("first page\n 3 \nsecond page", BoilerplateScope::CourseHeader);
        assert_eq!(clean, "first page second page");
    }

    #[test]
    fn idempotent_on_both_scopes() {
        for scope in [BoilerplateScope::CourseHeader, BoilerplateScope::ThroughDeclines] {
            for raw in [REPORT, "", "no patterns at all", "Declines: 1 x Declines: 2 y"] {
                let once = sanitize(raw, scope);
                assert_eq!(sanitize(&once, scope), once, "scope {:?} input {:?}", scope, raw);
            }
        }
    }

    #[test]
    fn unmatched_text_only_whitespace_cleaned() {
        let clean = sanitize("  plain   text \n unrelated ", BoilerplateScope::CourseHeader);
        assert_eq!(clean, "plain text unrelated");
    }
}

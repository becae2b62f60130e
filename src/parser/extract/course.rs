use std::sync::LazyLock;

use regex::Regex;

use super::CourseInfo;

static COURSE_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([A-Za-z0-9 :&\-]+)\s+\((?:Spring|Fall)\s+\d{4}\)").unwrap());
static INSTRUCTOR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"Instructor:\s*(.+)").unwrap());
// Template fields the instructor capture can accidentally pull in
static INSTRUCTOR_STOP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Subject:|Catalog & Section:|Enrollment:").unwrap());
static SUBJECT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"Subject:\s*(\w+)").unwrap());
static CATALOG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Catalog & Section:\s*(\w+\s+\d+)").unwrap());
static ENROLLMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Enrollment:\s*(\d+)").unwrap());
static RESPONSES_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Responses\s+Inc\w*\s+Declines:\s*(\d+)").unwrap());
static DECLINES_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"Declines:\s*(\d+)").unwrap());

/// Extract scalar course metadata from collapsed report text. Each field has
/// one independent rule; a miss leaves the field `None` and never affects
/// the others.
pub fn extract(text: &str) -> CourseInfo {
    CourseInfo {
        course_name: COURSE_NAME_RE
            .captures(text)
            .map(|c| c[1].trim().to_string()),
        instructor: INSTRUCTOR_RE.captures(text).map(|c| instructor_name(&c[1])),
        subject: SUBJECT_RE.captures(text).map(|c| c[1].to_string()),
        catalog_section: CATALOG_RE.captures(text).map(|c| c[1].to_string()),
        enrollment: ENROLLMENT_RE
            .captures(text)
            .and_then(|c| c[1].parse().ok()),
        responses: RESPONSES_RE.captures(text).and_then(|c| c[1].parse().ok()),
        declines: DECLINES_RE.captures(text).and_then(|c| c[1].parse().ok()),
    }
}

/// Trim trailing template fields off the raw capture, then normalize
/// "Last, First" to "First Last".
fn instructor_name(raw: &str) -> String {
    let name = INSTRUCTOR_STOP_RE
        .split(raw)
        .next()
        .unwrap_or(raw)
        .trim();
    match name.split_once(',') {
        Some((last, first)) => format!("{} {}", first.trim(), last.trim()),
        None => name.to_string(),
    }
}

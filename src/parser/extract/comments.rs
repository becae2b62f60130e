use std::sync::LazyLock;

use regex::Regex;

use super::Comment;

/// Ordered classification rules: the first needle contained in the question
/// wins. `inclusive` must stay first because that question text also
/// contains "strengths" and "improvement".
const CATEGORY_RULES: &[(&str, &str)] = &[
    ("inclusive", "inclusive_learning"),
    ("strength", "strengths"),
    ("improve", "improvements"),
    ("online", "online_experience"),
];

const DEFAULT_CATEGORY: &str = "other";

static QUESTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Q:\s+(?:What|Please)\b").unwrap());
// A ratings heading terminates a comment block
static SECTION_HEADING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Questions to Assess|Course Related|Learning Related|Instructor Related").unwrap()
});
static INT_TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(\d+)\b").unwrap());

/// Map a question string to its canonical category bucket.
pub fn classify(question: &str) -> &'static str {
    let q = question.to_lowercase();
    CATEGORY_RULES
        .iter()
        .find(|(needle, _)| q.contains(needle))
        .map(|(_, label)| *label)
        .unwrap_or(DEFAULT_CATEGORY)
}

/// Extract numbered student comments from collapsed report text. Each block
/// starts at a recognized question and runs to the next question, a ratings
/// heading, or end of text; blocks that classify to the same label are kept
/// separate.
pub fn extract(text: &str) -> Vec<Comment> {
    let starts: Vec<usize> = QUESTION_RE.find_iter(text).map(|m| m.start()).collect();
    let mut comments = Vec::new();

    for (i, &start) in starts.iter().enumerate() {
        let end = starts.get(i + 1).copied().unwrap_or(text.len());
        let mut block = &text[start..end];
        if let Some(m) = SECTION_HEADING_RE.find(block) {
            block = &block[..m.start()];
        }

        let markers = numbered_markers(block);
        let question_end = markers.first().map(|m| m.start).unwrap_or(block.len());
        let label = classify(&block[..question_end]);

        for (j, marker) in markers.iter().enumerate() {
            let tail = markers.get(j + 1).map(|m| m.start).unwrap_or(block.len());
            let body = block[marker.end..tail].trim();
            if body.is_empty() {
                continue;
            }
            comments.push(Comment {
                question: label.to_string(),
                comment_number: marker.value,
                text: body.to_string(),
            });
        }
    }

    comments
}

struct Marker {
    start: usize,
    end: usize,
    value: i64,
}

/// Find the numbered-comment markers in a block. The whitespace collapse
/// erased the line structure, so a standalone integer only counts as a
/// marker when it continues the sequence: the first must be 1, each next
/// must be the successor. The printed value is kept as-is.
fn numbered_markers(block: &str) -> Vec<Marker> {
    let mut markers = Vec::new();
    let mut expected: i64 = 1;

    for caps in INT_TOKEN_RE.captures_iter(block) {
        let m = caps.get(1).unwrap();
        match m.as_str().parse::<i64>() {
            Ok(value) if value == expected => {
                markers.push(Marker {
                    start: m.start(),
                    end: m.end(),
                    value,
                });
                expected += 1;
            }
            _ => {}
        }
    }

    markers
}

pub mod comments;
pub mod course;
pub mod ratings;

use serde::Serialize;

/// Structured record for one evaluation report. Built once per input text,
/// never mutated afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct ParsedDocument {
    pub full_text: String,
    pub course_info: CourseInfo,
    pub ratings: Vec<Rating>,
    pub comments: Vec<Comment>,
}

/// Scalar course metadata. `None` means the source pattern did not match;
/// callers decide their own defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CourseInfo {
    pub course_name: Option<String>,
    pub instructor: Option<String>,
    pub subject: Option<String>,
    pub catalog_section: Option<String>,
    pub enrollment: Option<i64>,
    pub responses: Option<i64>,
    pub declines: Option<i64>,
}

/// One numeric row from a ratings section. All fields mandatory: a row that
/// fails numeric coercion anywhere is dropped, never emitted partially.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rating {
    pub category: String,
    pub question: String,
    pub response_count: i64,
    pub response_rate: String,
    pub course_mean: f64,
    pub dept_mean: f64,
    pub univ_mean: f64,
}

/// One numbered student comment. `question` holds the canonical category
/// label, `comment_number` the number as printed in the source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comment {
    pub question: String,
    pub comment_number: i64,
    pub text: String,
}

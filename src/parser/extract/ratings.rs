use std::sync::LazyLock;

use regex::{Captures, Regex};

use super::Rating;

static HEADING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Questions to Assess|Course Related|Learning Related|Instructor Related").unwrap()
});
// <question> <count> <rate%> <course mean> <dept mean> <univ mean>
static ROW_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([A-Za-z][^%;]*?)\s+(\d+)\s+(\d+%)\s+([\d.]+)\s+([\d.]+)\s+([\d.]+)").unwrap()
});
// Column labels and the rating legend would otherwise bleed into question text
static COLUMN_HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(Question|Number of Responses|Response Rate|Course Mean|Dept\. Mean|Univ\. Mean|Course Median|Dept\. Median|Univ\. Median)\s+",
    )
    .unwrap()
});
static LEGEND_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"Note: 5:[^;]*;").unwrap());

/// Extract rating rows from collapsed report text. Sections run from one of
/// the four fixed headings to the next heading or end of text; the heading
/// literal is the category label. Rows that fail numeric coercion are
/// dropped one at a time, never the whole section.
pub fn extract(text: &str) -> Vec<Rating> {
    let headings: Vec<(usize, usize, &str)> = HEADING_RE
        .find_iter(text)
        .map(|m| (m.start(), m.end(), m.as_str()))
        .collect();

    let mut ratings = Vec::new();
    for (i, &(_, end, category)) in headings.iter().enumerate() {
        let section_end = headings.get(i + 1).map(|h| h.0).unwrap_or(text.len());
        let content = COLUMN_HEADER_RE.replace_all(&text[end..section_end], "");
        let content = LEGEND_RE.replace_all(&content, "");
        for caps in ROW_RE.captures_iter(&content) {
            if let Some(rating) = build_row(category, &caps) {
                ratings.push(rating);
            }
        }
    }
    ratings
}

fn build_row(category: &str, caps: &Captures) -> Option<Rating> {
    Some(Rating {
        category: category.to_string(),
        question: caps[1].trim().to_string(),
        response_count: caps[2].parse().ok()?,
        response_rate: caps[3].to_string(),
        course_mean: caps[4].parse().ok()?,
        dept_mean: caps[5].parse().ok()?,
        univ_mean: caps[6].parse().ok()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_row_under_heading() {
        let text = "Instructor Related Clarity of objectives 42 85% 4.20 4.10 4.05";
        let ratings = extract(text);
        assert_eq!(ratings.len(), 1);
        let r = &ratings[0];
        assert_eq!(r.category, "Instructor Related");
        assert_eq!(r.question, "Clarity of objectives");
        assert_eq!(r.response_count, 42);
        assert_eq!(r.response_rate, "85%");
        assert_eq!(r.course_mean, 4.20);
        assert_eq!(r.dept_mean, 4.10);
        assert_eq!(r.univ_mean, 4.05);
    }

    #[test]
    fn rows_split_across_sections() {
        let text = "Course Related The course was well organized 40 80% 4.00 3.90 3.85 \
                    Learning Related I learned a great deal 41 82% 4.10 4.00 3.95";
        let ratings = extract(text);
        assert_eq!(ratings.len(), 2);
        assert_eq!(ratings[0].category, "Course Related");
        assert_eq!(ratings[1].category, "Learning Related");
        assert_eq!(ratings[1].question, "I learned a great deal");
    }

    #[test]
    fn coercion_failure_drops_only_that_row() {
        let text = "Instructor Related \
                    Clarity of objectives 42 85% 4.20 4.10 4.05 \
                    Availability outside class 41 82% 4.2.0 4.05 4.01 \
                    Quality of feedback 40 80% 4.00 3.95 3.90";
        let ratings = extract(text);
        assert_eq!(ratings.len(), 2);
        assert_eq!(ratings[0].question, "Clarity of objectives");
        assert_eq!(ratings[1].question, "Quality of feedback");
    }

    #[test]
    fn column_headers_do_not_pollute_questions() {
        let text = "Instructor Related Question Number of Responses Response Rate \
                    Course Mean Dept. Mean Univ. Mean \
                    Clarity of objectives 42 85% 4.20 4.10 4.05";
        let ratings = extract(text);
        assert_eq!(ratings.len(), 1);
        assert_eq!(ratings[0].question, "Clarity of objectives");
    }

    #[test]
    fn legend_is_ignored() {
        let text = "Course Related Note: 5: Strongly Agree, 1: Strongly Disagree; \
                    The course was well organized 40 80% 4.00 3.90 3.85";
        let ratings = extract(text);
        assert_eq!(ratings.len(), 1);
        assert_eq!(ratings[0].question, "The course was well organized");
    }

    #[test]
    fn no_heading_no_rows() {
        assert!(extract("Clarity of objectives 42 85% 4.20 4.10 4.05").is_empty());
        assert!(extract("").is_empty());
    }

    #[test]
    fn malformed_rows_ignored() {
        let text = "Instructor Related Clarity of objectives 42 eighty-five 4.20 4.10 4.05";
        assert!(extract(text).is_empty());
    }
}

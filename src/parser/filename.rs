use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

// <Last>_<First>_<Digits>_<Semester>-<Year4>_<CourseCode>_<ReportType>.pdf
const FILENAME_PATTERN: &str =
    r"^([A-Za-z]+)_([A-Za-z]+)_(\d+)_([A-Za-z]+)-(\d{4})_([A-Za-z0-9]+)_([A-Za-z-]+)\.pdf$";

static FILENAME_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(FILENAME_PATTERN).unwrap());

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilenameMetadata {
    pub instructor_last_name: String,
    pub instructor_first_name: String,
    pub instructor_id: String,
    pub semester: String,
    pub year: String,
    pub course_code: String,
    pub report_type: String,
}

/// Parse the standardized report filename, e.g.
/// `Parikh_Tejas_000937178_Spring-2024_CSYE622503Lecture_Instructor-Report.pdf`.
/// All seven fields or nothing: a non-conforming name returns `None`.
pub fn extract_metadata(filename: &str) -> Option<FilenameMetadata> {
    let caps = FILENAME_RE.captures(filename)?;
    Some(FilenameMetadata {
        instructor_last_name: caps[1].to_string(),
        instructor_first_name: caps[2].to_string(),
        instructor_id: caps[3].to_string(),
        semester: caps[4].to_string(),
        year: caps[5].to_string(),
        course_code: caps[6].to_string(),
        report_type: caps[7].replace('-', " "),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_match() {
        let meta = extract_metadata(
            "Parikh_Tejas_000937178_Spring-2024_CSYE622503Lecture_Instructor-Report.pdf",
        )
        .unwrap();
        assert_eq!(meta.instructor_last_name, "Parikh");
        assert_eq!(meta.instructor_first_name, "Tejas");
        assert_eq!(meta.instructor_id, "000937178");
        assert_eq!(meta.semester, "Spring");
        assert_eq!(meta.year, "2024");
        assert_eq!(meta.course_code, "CSYE622503Lecture");
        assert_eq!(meta.report_type, "Instructor Report");
    }

    #[test]
    fn non_conforming_name() {
        assert_eq!(extract_metadata("not_a_valid_name.pdf"), None);
    }

    #[test]
    fn no_partial_population() {
        // Six groups present, report type missing entirely
        assert_eq!(
            extract_metadata("Parikh_Tejas_000937178_Spring-2024_CSYE6225.pdf"),
            None
        );
        assert_eq!(extract_metadata(""), None);
    }

    #[test]
    fn wrong_extension() {
        assert_eq!(
            extract_metadata("Parikh_Tejas_000937178_Spring-2024_CSYE6225_Instructor-Report.txt"),
            None
        );
    }
}

use anyhow::Result;
use rusqlite::Connection;
use serde::Serialize;

use crate::db::{self, ChunkRow};
use crate::parser::extract::Comment;

/// One semantic-search record: the document summary or a single student
/// comment, tagged with the professor name for retrieval filtering.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chunk {
    pub id: String,
    pub text: String,
    pub chunk_type: &'static str,
    pub professor: String,
}

/// Build the chunk set for one document: a summary chunk over the sanitized
/// narrative, then one chunk per comment keyed by its printed number.
pub fn build_chunks(
    document_id: i64,
    full_text: &str,
    comments: &[Comment],
    professor: &str,
) -> Vec<Chunk> {
    let mut chunks = Vec::with_capacity(comments.len() + 1);

    chunks.push(Chunk {
        id: format!("{}_summary", document_id),
        text: full_text.to_string(),
        chunk_type: "summary",
        professor: professor.to_string(),
    });

    for comment in comments {
        chunks.push(Chunk {
            id: format!("{}_comment_{}", document_id, comment.comment_number),
            text: format!("Q: {}\nA: {}", comment.question, comment.text),
            chunk_type: "student_comment",
            professor: professor.to_string(),
        });
    }

    chunks
}

/// Generate chunk rows for every stored document that has none yet.
/// Returns the number of chunks inserted.
pub fn chunk_documents(conn: &Connection) -> Result<usize> {
    let documents = db::fetch_unchunked_documents(conn)?;
    if documents.is_empty() {
        return Ok(0);
    }

    let mut comments_by_doc: std::collections::HashMap<i64, Vec<Comment>> =
        std::collections::HashMap::new();
    for (document_id, category, number, text) in db::fetch_comments_by_document(conn)? {
        comments_by_doc.entry(document_id).or_default().push(Comment {
            question: category,
            comment_number: number,
            text,
        });
    }

    let mut rows = Vec::new();
    for (document_id, full_text, professor) in &documents {
        let comments = comments_by_doc.remove(document_id).unwrap_or_default();
        for chunk in build_chunks(*document_id, full_text, &comments, professor) {
            rows.push(ChunkRow {
                id: chunk.id,
                document_id: *document_id,
                chunk_type: chunk.chunk_type.to_string(),
                professor: chunk.professor,
                text: chunk.text,
            });
        }
    }

    db::insert_chunks(conn, &rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comment(number: i64, text: &str) -> Comment {
        Comment {
            question: "strengths".into(),
            comment_number: number,
            text: text.into(),
        }
    }

    #[test]
    fn summary_chunk_first() {
        let chunks = build_chunks(7, "the narrative", &[], "Tejas Parikh");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].id, "7_summary");
        assert_eq!(chunks[0].chunk_type, "summary");
        assert_eq!(chunks[0].text, "the narrative");
        assert_eq!(chunks[0].professor, "Tejas Parikh");
    }

    #[test]
    fn one_chunk_per_comment() {
        let comments = [comment(1, "Great labs"), comment(2, "Loved it")];
        let chunks = build_chunks(7, "n", &comments, "Tejas Parikh");
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[1].id, "7_comment_1");
        assert_eq!(chunks[1].chunk_type, "student_comment");
        assert_eq!(chunks[1].text, "Q: strengths\nA: Great labs");
        assert_eq!(chunks[2].id, "7_comment_2");
    }

    #[test]
    fn db_driven_chunking_is_idempotent() {
        use crate::db::{ParsedReport, TextRow};
        use crate::parser::extract::{CourseInfo, ParsedDocument};

        let conn = rusqlite::Connection::open_in_memory().unwrap();
        db::init_schema(&conn).unwrap();
        db::insert_reports(&conn, &[("data/reports/a.pdf".into(), "a.pdf".into())]).unwrap();
        db::save_texts(
            &conn,
            &[TextRow {
                report_id: 1,
                file_name: "a.pdf".into(),
                text: Some("raw".into()),
                error: None,
                latency_ms: None,
            }],
        )
        .unwrap();
        db::save_parsed(
            &conn,
            &[ParsedReport {
                report_text_id: 1,
                file_name: "a.pdf".into(),
                document: ParsedDocument {
                    full_text: "narrative".into(),
                    course_info: CourseInfo {
                        instructor: Some("Jane Smith".into()),
                        ..Default::default()
                    },
                    ratings: vec![],
                    comments: vec![comment(1, "Great labs")],
                },
                filename_meta: None,
            }],
        )
        .unwrap();

        assert_eq!(chunk_documents(&conn).unwrap(), 2);
        assert_eq!(chunk_documents(&conn).unwrap(), 0);

        let pending = db::fetch_pending_chunks(&conn, None).unwrap();
        assert_eq!(pending.len(), 2);
        assert!(pending.iter().any(|c| c.id.ends_with("_summary")));
        assert!(pending.iter().all(|c| c.professor == "Jane Smith"));
    }
}

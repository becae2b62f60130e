use anyhow::Result;
use rusqlite::Connection;

use crate::parser::extract::{CourseInfo, ParsedDocument};
use crate::parser::filename::FilenameMetadata;

const DB_PATH: &str = "data/trace.sqlite";

pub fn connect() -> Result<Connection> {
    if let Some(parent) = std::path::Path::new(DB_PATH).parent() {
        std::fs::create_dir_all(parent)?;
    }
    let conn = Connection::open(DB_PATH)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS reports (
            id         INTEGER PRIMARY KEY,
            path       TEXT UNIQUE NOT NULL,
            file_name  TEXT NOT NULL,
            visited    BOOLEAN NOT NULL DEFAULT 0,
            visited_at TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_reports_visited ON reports(visited);

        CREATE TABLE IF NOT EXISTS report_texts (
            id           INTEGER PRIMARY KEY,
            report_id    INTEGER NOT NULL REFERENCES reports(id),
            file_name    TEXT NOT NULL,
            text         TEXT,
            error        TEXT,
            latency_ms   INTEGER,
            extracted_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_report_texts_file ON report_texts(file_name);

        CREATE TABLE IF NOT EXISTS documents (
            id             INTEGER PRIMARY KEY,
            report_text_id INTEGER UNIQUE NOT NULL REFERENCES report_texts(id),
            document_name  TEXT NOT NULL,
            document_type  TEXT NOT NULL DEFAULT 'course_evaluation',
            full_text      TEXT NOT NULL,
            processed_at   TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_documents_name ON documents(document_name);

        CREATE TABLE IF NOT EXISTS course_info (
            id               INTEGER PRIMARY KEY,
            document_id      INTEGER UNIQUE NOT NULL REFERENCES documents(id),
            course_name      TEXT,
            course_number    TEXT,
            section          TEXT,
            subject          TEXT,
            semester         TEXT,
            year             INTEGER,
            instructor_name  TEXT,
            instructor_id    TEXT,
            course_code      TEXT,
            report_type      TEXT,
            enrollment_count INTEGER,
            response_count   INTEGER,
            declines_count   INTEGER
        );

        CREATE TABLE IF NOT EXISTS course_ratings (
            id             INTEGER PRIMARY KEY,
            document_id    INTEGER NOT NULL REFERENCES documents(id),
            category       TEXT NOT NULL,
            question       TEXT NOT NULL,
            response_count INTEGER NOT NULL,
            response_rate  TEXT NOT NULL,
            course_mean    REAL NOT NULL,
            dept_mean      REAL NOT NULL,
            univ_mean      REAL NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_ratings_document ON course_ratings(document_id);

        CREATE TABLE IF NOT EXISTS student_comments (
            id                INTEGER PRIMARY KEY,
            document_id       INTEGER NOT NULL REFERENCES documents(id),
            question_category TEXT NOT NULL,
            comment_number    INTEGER NOT NULL,
            comment_text      TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_comments_document ON student_comments(document_id);

        CREATE TABLE IF NOT EXISTS chunks (
            id          TEXT PRIMARY KEY,
            document_id INTEGER NOT NULL REFERENCES documents(id),
            chunk_type  TEXT NOT NULL CHECK(chunk_type IN ('summary','student_comment')),
            professor   TEXT NOT NULL,
            text        TEXT NOT NULL,
            uploaded    BOOLEAN NOT NULL DEFAULT 0,
            uploaded_at TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_chunks_document ON chunks(document_id);
        CREATE INDEX IF NOT EXISTS idx_chunks_uploaded ON chunks(uploaded);
        ",
    )?;
    Ok(())
}

// ── Ingest queue ──

pub fn insert_reports(conn: &Connection, files: &[(String, String)]) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let mut count = 0;
    {
        let mut stmt =
            tx.prepare("INSERT OR IGNORE INTO reports (path, file_name) VALUES (?1, ?2)")?;
        for (path, file_name) in files {
            count += stmt.execute(rusqlite::params![path, file_name])?;
        }
    }
    tx.commit()?;
    Ok(count)
}

pub fn fetch_unvisited(
    conn: &Connection,
    limit: Option<usize>,
) -> Result<Vec<(i64, String, String)>> {
    let sql = match limit {
        Some(n) => format!(
            "SELECT id, path, file_name FROM reports WHERE visited = 0 ORDER BY id LIMIT {}",
            n
        ),
        None => "SELECT id, path, file_name FROM reports WHERE visited = 0 ORDER BY id".to_string(),
    };
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub struct TextRow {
    pub report_id: i64,
    pub file_name: String,
    pub text: Option<String>,
    pub error: Option<String>,
    pub latency_ms: Option<i64>,
}

pub fn save_texts(conn: &Connection, rows: &[TextRow]) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    {
        let mut insert = tx.prepare(
            "INSERT INTO report_texts (report_id, file_name, text, error, latency_ms)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        let mut update = tx
            .prepare("UPDATE reports SET visited = 1, visited_at = datetime('now') WHERE id = ?1")?;
        for r in rows {
            insert.execute(rusqlite::params![
                r.report_id, r.file_name, r.text, r.error, r.latency_ms,
            ])?;
            update.execute(rusqlite::params![r.report_id])?;
        }
    }
    tx.commit()?;
    Ok(())
}

// ── Parsing ──

pub struct ReportText {
    pub report_text_id: i64,
    pub file_name: String,
    pub text: String,
}

pub fn fetch_unparsed(conn: &Connection, limit: Option<usize>) -> Result<Vec<ReportText>> {
    let sql = format!(
        "SELECT rt.id, rt.file_name, rt.text
         FROM report_texts rt
         LEFT JOIN documents d ON d.report_text_id = rt.id
         WHERE rt.text IS NOT NULL AND d.id IS NULL
         ORDER BY rt.id{}",
        match limit {
            Some(n) => format!(" LIMIT {}", n),
            None => String::new(),
        }
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], |row| {
            Ok(ReportText {
                report_text_id: row.get(0)?,
                file_name: row.get(1)?,
                text: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub struct ParsedReport {
    pub report_text_id: i64,
    pub file_name: String,
    pub document: ParsedDocument,
    pub filename_meta: Option<FilenameMetadata>,
}

#[derive(Default)]
pub struct SaveCounts {
    pub documents: usize,
    pub ratings: usize,
    pub comments: usize,
}

pub fn save_parsed(conn: &Connection, batch: &[ParsedReport]) -> Result<SaveCounts> {
    let tx = conn.unchecked_transaction()?;
    let mut counts = SaveCounts::default();
    {
        let mut doc_stmt = tx.prepare(
            "INSERT INTO documents (report_text_id, document_name, full_text)
             VALUES (?1, ?2, ?3)",
        )?;
        let mut info_stmt = tx.prepare(
            "INSERT INTO course_info
             (document_id, course_name, course_number, section, subject, semester, year,
              instructor_name, instructor_id, course_code, report_type,
              enrollment_count, response_count, declines_count)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14)",
        )?;
        let mut rating_stmt = tx.prepare(
            "INSERT INTO course_ratings
             (document_id, category, question, response_count, response_rate,
              course_mean, dept_mean, univ_mean)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )?;
        let mut comment_stmt = tx.prepare(
            "INSERT INTO student_comments
             (document_id, question_category, comment_number, comment_text)
             VALUES (?1, ?2, ?3, ?4)",
        )?;

        for r in batch {
            doc_stmt.execute(rusqlite::params![
                r.report_text_id,
                r.file_name,
                r.document.full_text,
            ])?;
            let document_id = tx.last_insert_rowid();
            counts.documents += 1;

            let info = &r.document.course_info;
            let meta = r.filename_meta.as_ref();
            let (course_number, section) = course_identity(info);
            let instructor = info.instructor.clone().or_else(|| {
                meta.map(|m| format!("{} {}", m.instructor_first_name, m.instructor_last_name))
            });
            info_stmt.execute(rusqlite::params![
                document_id,
                info.course_name,
                course_number,
                section,
                info.subject,
                meta.map(|m| m.semester.as_str()),
                meta.and_then(|m| m.year.parse::<i64>().ok()),
                instructor,
                meta.map(|m| m.instructor_id.as_str()),
                meta.map(|m| m.course_code.as_str()),
                meta.map(|m| m.report_type.as_str()),
                info.enrollment,
                info.responses,
                info.declines,
            ])?;

            for rating in &r.document.ratings {
                rating_stmt.execute(rusqlite::params![
                    document_id,
                    rating.category,
                    rating.question,
                    rating.response_count,
                    rating.response_rate,
                    rating.course_mean,
                    rating.dept_mean,
                    rating.univ_mean,
                ])?;
                counts.ratings += 1;
            }

            for comment in &r.document.comments {
                comment_stmt.execute(rusqlite::params![
                    document_id,
                    comment.question,
                    comment.comment_number,
                    comment.text,
                ])?;
                counts.comments += 1;
            }
        }
    }
    tx.commit()?;
    Ok(counts)
}

/// Course number and section derived from subject + catalog_section, e.g.
/// subject "CSYE" + "6225 03" → ("CSYE 6225", "03").
fn course_identity(info: &CourseInfo) -> (Option<String>, Option<String>) {
    let Some(catalog) = info.catalog_section.as_deref() else {
        return (None, None);
    };
    let mut tokens = catalog.split_whitespace();
    let number = tokens.next().map(|code| match info.subject.as_deref() {
        Some(subject) => format!("{} {}", subject, code),
        None => code.to_string(),
    });
    (number, tokens.next().map(str::to_string))
}

// ── Chunks ──

pub struct ChunkRow {
    pub id: String,
    pub document_id: i64,
    pub chunk_type: String,
    pub professor: String,
    pub text: String,
}

pub fn insert_chunks(conn: &Connection, rows: &[ChunkRow]) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let mut count = 0;
    {
        let mut stmt = tx.prepare(
            "INSERT OR IGNORE INTO chunks (id, document_id, chunk_type, professor, text)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        for r in rows {
            count += stmt.execute(rusqlite::params![
                r.id, r.document_id, r.chunk_type, r.professor, r.text,
            ])?;
        }
    }
    tx.commit()?;
    Ok(count)
}

/// Documents that have no chunks yet, with the professor tag resolved from
/// course_info ("Unknown" when absent).
pub fn fetch_unchunked_documents(conn: &Connection) -> Result<Vec<(i64, String, String)>> {
    let mut stmt = conn.prepare(
        "SELECT d.id, d.full_text, COALESCE(ci.instructor_name, 'Unknown')
         FROM documents d
         LEFT JOIN course_info ci ON ci.document_id = d.id
         WHERE NOT EXISTS (SELECT 1 FROM chunks c WHERE c.document_id = d.id)
         ORDER BY d.id",
    )?;
    let rows = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// (document_id, category, comment_number, text) ordered by document then
/// printed number.
pub fn fetch_comments_by_document(conn: &Connection) -> Result<Vec<(i64, String, i64, String)>> {
    let mut stmt = conn.prepare(
        "SELECT document_id, question_category, comment_number, comment_text
         FROM student_comments
         ORDER BY document_id, comment_number",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn fetch_pending_chunks(conn: &Connection, limit: Option<usize>) -> Result<Vec<ChunkRow>> {
    let sql = format!(
        "SELECT id, document_id, chunk_type, professor, text
         FROM chunks WHERE uploaded = 0 ORDER BY document_id, id{}",
        match limit {
            Some(n) => format!(" LIMIT {}", n),
            None => String::new(),
        }
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], |row| {
            Ok(ChunkRow {
                id: row.get(0)?,
                document_id: row.get(1)?,
                chunk_type: row.get(2)?,
                professor: row.get(3)?,
                text: row.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ── Overview ──

pub struct OverviewRow {
    pub document_name: String,
    pub course_name: String,
    pub course_number: String,
    pub section: String,
    pub semester: String,
    pub year: Option<i64>,
    pub instructor: String,
    pub enrollment: Option<i64>,
    pub responses: Option<i64>,
    pub comment_count: i64,
    pub rating_count: i64,
}

pub fn fetch_overview(
    conn: &Connection,
    semester: Option<&str>,
    year: Option<i64>,
    limit: usize,
) -> Result<Vec<OverviewRow>> {
    let mut conditions = Vec::new();
    let mut params: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

    if let Some(s) = semester {
        conditions.push(format!("ci.semester = ?{}", params.len() + 1));
        params.push(Box::new(s.to_string()));
    }
    if let Some(y) = year {
        conditions.push(format!("ci.year = ?{}", params.len() + 1));
        params.push(Box::new(y));
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conditions.join(" AND "))
    };

    let sql = format!(
        "SELECT d.document_name, COALESCE(ci.course_name,''), COALESCE(ci.course_number,''),
                COALESCE(ci.section,''), COALESCE(ci.semester,''), ci.year,
                COALESCE(ci.instructor_name,''), ci.enrollment_count, ci.response_count,
                (SELECT COUNT(*) FROM student_comments sc WHERE sc.document_id = d.id),
                (SELECT COUNT(*) FROM course_ratings cr WHERE cr.document_id = d.id)
         FROM documents d
         LEFT JOIN course_info ci ON ci.document_id = d.id{}
         ORDER BY ci.year DESC, d.document_name
         LIMIT {}",
        where_clause, limit
    );

    let mut stmt = conn.prepare(&sql)?;
    let param_refs: Vec<&dyn rusqlite::types::ToSql> = params.iter().map(|p| p.as_ref()).collect();
    let rows = stmt
        .query_map(param_refs.as_slice(), |row| {
            Ok(OverviewRow {
                document_name: row.get(0)?,
                course_name: row.get(1)?,
                course_number: row.get(2)?,
                section: row.get(3)?,
                semester: row.get(4)?,
                year: row.get(5)?,
                instructor: row.get(6)?,
                enrollment: row.get(7)?,
                responses: row.get(8)?,
                comment_count: row.get(9)?,
                rating_count: row.get(10)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ── Stats ──

pub struct Stats {
    pub total: usize,
    pub visited: usize,
    pub unvisited: usize,
    pub extracted: usize,
    pub errors: usize,
    pub parsed: usize,
    pub chunks_pending: usize,
    pub chunks_uploaded: usize,
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let total: usize = conn.query_row("SELECT COUNT(*) FROM reports", [], |r| r.get(0))?;
    let visited: usize =
        conn.query_row("SELECT COUNT(*) FROM reports WHERE visited = 1", [], |r| r.get(0))?;
    let extracted: usize =
        conn.query_row("SELECT COUNT(*) FROM report_texts", [], |r| r.get(0))?;
    let errors: usize = conn.query_row(
        "SELECT COUNT(*) FROM report_texts WHERE error IS NOT NULL",
        [],
        |r| r.get(0),
    )?;
    let parsed: usize = conn.query_row("SELECT COUNT(*) FROM documents", [], |r| r.get(0))?;
    let chunks_pending: usize =
        conn.query_row("SELECT COUNT(*) FROM chunks WHERE uploaded = 0", [], |r| r.get(0))?;
    let chunks_uploaded: usize =
        conn.query_row("SELECT COUNT(*) FROM chunks WHERE uploaded = 1", [], |r| r.get(0))?;
    Ok(Stats {
        total,
        visited,
        unvisited: total - visited,
        extracted,
        errors,
        parsed,
        chunks_pending,
        chunks_uploaded,
    })
}

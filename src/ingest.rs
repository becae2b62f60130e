use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use rusqlite::Connection;
use tracing::{info, warn};

use crate::db::{self, TextRow};

const BATCH_SIZE: usize = 64;

/// Extraction stats returned after completion.
pub struct ExtractStats {
    pub total: usize,
    pub ok: usize,
    pub errors: usize,
}

/// Walk the report drop directory and enqueue every PDF not seen before.
/// Returns (inserted, total found).
pub fn discover_reports(conn: &Connection, dir: &Path) -> Result<(usize, usize)> {
    info!("Scanning report directory: {}", dir.display());
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read report directory {}", dir.display()))?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let is_pdf = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("pdf"));
        if !is_pdf {
            continue;
        }
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        files.push((path.display().to_string(), file_name.to_string()));
    }
    files.sort();

    let inserted = db::insert_reports(conn, &files)?;
    Ok((inserted, files.len()))
}

/// Extract text from queued PDFs in parallel batches, saving each batch as
/// it completes. A file that fails to extract records an error row and the
/// batch moves on.
pub fn extract_texts(
    conn: &Connection,
    reports: Vec<(i64, String, String)>,
) -> Result<ExtractStats> {
    let total = reports.len();
    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")?
            .progress_chars("=> "),
    );

    let mut ok = 0usize;
    let mut errors = 0usize;

    for chunk in reports.chunks(BATCH_SIZE) {
        let rows: Vec<TextRow> = chunk
            .par_iter()
            .map(|(report_id, path, file_name)| extract_one(*report_id, path, file_name))
            .collect();

        for row in &rows {
            if row.error.is_some() {
                errors += 1;
            } else {
                ok += 1;
            }
        }

        db::save_texts(conn, &rows)?;
        pb.inc(chunk.len() as u64);
    }

    pb.finish_and_clear();
    info!("Extracted {} reports ({} ok, {} errors)", total, ok, errors);

    Ok(ExtractStats { total, ok, errors })
}

/// Extract one PDF's text: pages concatenated in reading order.
fn extract_one(report_id: i64, path: &str, file_name: &str) -> TextRow {
    let start = Instant::now();
    let result = pdf_extract::extract_text(path);
    let elapsed = start.elapsed().as_millis() as i64;

    match result {
        Ok(text) => TextRow {
            report_id,
            file_name: file_name.to_string(),
            text: Some(text),
            error: None,
            latency_ms: Some(elapsed),
        },
        Err(e) => {
            warn!("Text extraction failed for {}: {}", file_name, e);
            TextRow {
                report_id,
                file_name: file_name.to_string(),
                text: None,
                error: Some(e.to_string()),
                latency_ms: Some(elapsed),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discover_skips_non_pdfs() {
        let dir = std::env::temp_dir().join("trace_parser_discover_test");
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("a.pdf"), b"%PDF-1.4").unwrap();
        std::fs::write(dir.join("b.PDF"), b"%PDF-1.4").unwrap();
        std::fs::write(dir.join("notes.txt"), b"skip me").unwrap();

        let conn = rusqlite::Connection::open_in_memory().unwrap();
        db::init_schema(&conn).unwrap();
        let (inserted, found) = discover_reports(&conn, &dir).unwrap();
        assert_eq!(found, 2);
        assert_eq!(inserted, 2);

        // Second scan finds the same files but inserts nothing new
        let (inserted, found) = discover_reports(&conn, &dir).unwrap();
        assert_eq!(found, 2);
        assert_eq!(inserted, 0);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn unreadable_pdf_records_error_row() {
        let dir = std::env::temp_dir().join("trace_parser_extract_test");
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("broken.pdf"), b"not a pdf at all").unwrap();

        let conn = rusqlite::Connection::open_in_memory().unwrap();
        db::init_schema(&conn).unwrap();
        discover_reports(&conn, &dir).unwrap();
        let queued = db::fetch_unvisited(&conn, None).unwrap();
        let stats = extract_texts(&conn, queued).unwrap();
        assert_eq!(stats.total, 1);
        assert_eq!(stats.errors, 1);

        let s = db::get_stats(&conn).unwrap();
        assert_eq!(s.errors, 1);
        assert_eq!(s.visited, 1);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}

mod chunker;
mod db;
mod embedder;
mod ingest;
mod parser;

use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, Subcommand};

use parser::sanitize::BoilerplateScope;

const DEFAULT_REPORTS_DIR: &str = "data/reports";

#[derive(Parser)]
#[command(name = "trace_parser", about = "Course evaluation report parser and indexing pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan the report directory and populate the ingest queue
    Init {
        /// Report PDF directory (default: REPORTS_DIR env or data/reports)
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },
    /// Extract text from queued report PDFs
    Extract {
        /// Max reports to extract (default: all queued)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Parse extracted report text into structured documents
    Process {
        /// Max reports to process (default: all unprocessed)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
        /// Boilerplate-stripping scope for the stored narrative
        #[arg(long, value_enum, default_value = "course-header")]
        strip: BoilerplateScope,
    },
    /// Extract + process in one pipeline
    Run {
        /// Max reports to extract+process
        #[arg(short = 'n', long)]
        limit: Option<usize>,
        /// Boilerplate-stripping scope for the stored narrative
        #[arg(long, value_enum, default_value = "course-header")]
        strip: BoilerplateScope,
    },
    /// Chunk parsed documents and upload embeddings to the vector index
    Embed {
        /// Max chunks to upload (default: all pending)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Show pipeline statistics
    Stats,
    /// Parsed course overview table
    Overview {
        /// Filter by semester (e.g. "Spring")
        #[arg(short, long)]
        semester: Option<String>,
        /// Filter by year (e.g. 2024)
        #[arg(short, long)]
        year: Option<i64>,
        /// Max rows to display
        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init { dir } => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            let dir = dir.unwrap_or_else(|| {
                std::env::var("REPORTS_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from(DEFAULT_REPORTS_DIR))
            });
            let (inserted, found) = ingest::discover_reports(&conn, &dir)?;
            println!("Queued {} new report PDFs ({} total found)", inserted, found);
            Ok(())
        }
        Commands::Extract { limit } => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            let reports = db::fetch_unvisited(&conn, limit)?;
            if reports.is_empty() {
                println!("No queued reports. Run 'init' first or all reports are extracted.");
                return Ok(());
            }
            println!("Extracting text from {} reports...", reports.len());
            let stats = ingest::extract_texts(&conn, reports)?;
            println!(
                "Done: {} extracted ({} ok, {} errors).",
                stats.total, stats.ok, stats.errors
            );
            Ok(())
        }
        Commands::Process { limit, strip } => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            let texts = db::fetch_unparsed(&conn, limit)?;
            if texts.is_empty() {
                println!("No unprocessed reports. Run 'extract' first.");
                return Ok(());
            }
            println!("Processing {} reports...", texts.len());
            let counts = process_reports(&conn, texts, strip)?;
            counts.print();
            Ok(())
        }
        Commands::Run { limit, strip } => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            let reports = db::fetch_unvisited(&conn, limit)?;
            if reports.is_empty() {
                println!("No queued reports. Run 'init' first.");
                return Ok(());
            }

            // Phase 1: Extract text
            let t_extract = Instant::now();
            println!("Pipeline: extracting text from {} reports...", reports.len());
            let stats = ingest::extract_texts(&conn, reports)?;
            println!(
                "Extracted {} reports ({} ok, {} errors) in {:.1}s",
                stats.total, stats.ok, stats.errors, t_extract.elapsed().as_secs_f64()
            );

            // Phase 2: Parse
            let t_process = Instant::now();
            let texts = db::fetch_unparsed(&conn, None)?;
            if texts.is_empty() {
                println!("Nothing to process (all extractions failed).");
                return Ok(());
            }
            println!("Processing {} reports...", texts.len());
            let counts = process_reports(&conn, texts, strip)?;
            println!("Processed in {:.1}s", t_process.elapsed().as_secs_f64());
            counts.print();
            Ok(())
        }
        Commands::Embed { limit } => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            let generated = chunker::chunk_documents(&conn)?;
            if generated > 0 {
                println!("Generated {} new chunks.", generated);
            }
            let pending = db::fetch_pending_chunks(&conn, limit)?;
            if pending.is_empty() {
                println!("No pending chunks. Run 'process' first.");
                return Ok(());
            }
            println!("Uploading {} chunks to the vector index...", pending.len());
            let stats = embedder::upload_pending_chunks(&conn, pending).await?;
            println!(
                "Done: {} uploaded ({} ok, {} errors).",
                stats.total, stats.ok, stats.errors
            );
            Ok(())
        }
        Commands::Overview { semester, year, limit } => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            let rows = db::fetch_overview(&conn, semester.as_deref(), year, limit)?;
            if rows.is_empty() {
                println!("No parsed documents found.");
                return Ok(());
            }

            // Compact, readable table
            println!(
                "{:>3} | {:<28} | {:<10} | {:<4} | {:<11} | {:<20} | {:>4} | {:>4} | {:>4}",
                "#", "Course", "Number", "Sec", "Term", "Instructor", "Enr", "Cmts", "Rtgs"
            );
            println!("{}", "-".repeat(108));

            for (i, r) in rows.iter().enumerate() {
                let course = truncate(&r.course_name, 28);
                let instructor = truncate(&r.instructor, 20);
                let term = match r.year {
                    Some(y) => format!("{} {}", r.semester, y),
                    None => r.semester.clone(),
                };
                let enrollment = r
                    .enrollment
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "-".into());

                println!(
                    "{:>3} | {:<28} | {:<10} | {:<4} | {:<11} | {:<20} | {:>4} | {:>4} | {:>4}",
                    i + 1,
                    course,
                    r.course_number,
                    r.section,
                    term.trim(),
                    instructor,
                    enrollment,
                    r.comment_count,
                    r.rating_count
                );
            }

            println!("\n{} documents", rows.len());
            Ok(())
        }
        Commands::Stats => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            let s = db::get_stats(&conn)?;
            println!("Queued:    {}", s.total);
            println!("Visited:   {}", s.visited);
            println!("Unvisited: {}", s.unvisited);
            println!("Extracted: {}", s.extracted);
            println!("Errors:    {}", s.errors);
            println!("Parsed:    {}", s.parsed);
            println!("Chunks:    {} pending, {} uploaded", s.chunks_pending, s.chunks_uploaded);
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

struct ProcessCounts {
    documents: usize,
    ratings: usize,
    comments: usize,
}

impl ProcessCounts {
    fn print(&self) {
        println!(
            "Saved {} documents, {} ratings, {} comments.",
            self.documents, self.ratings, self.comments,
        );
    }
}

fn process_reports(
    conn: &rusqlite::Connection,
    texts: Vec<db::ReportText>,
    strip: BoilerplateScope,
) -> anyhow::Result<ProcessCounts> {
    use indicatif::{ProgressBar, ProgressStyle};
    use rayon::prelude::*;

    let pb = ProgressBar::new(texts.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")
            .unwrap()
            .progress_chars("#>-"),
    );

    let mut counts = ProcessCounts {
        documents: 0,
        ratings: 0,
        comments: 0,
    };

    for chunk in texts.chunks(200) {
        let parsed: Vec<db::ParsedReport> = chunk
            .par_iter()
            .map(|t| db::ParsedReport {
                report_text_id: t.report_text_id,
                file_name: t.file_name.clone(),
                document: parser::process_report(&t.text, strip),
                filename_meta: parser::filename::extract_metadata(&t.file_name),
            })
            .collect();

        let saved = db::save_parsed(conn, &parsed)?;
        counts.documents += saved.documents;
        counts.ratings += saved.ratings;
        counts.comments += saved.comments;
        pb.inc(chunk.len() as u64);
    }

    pb.finish_and_clear();
    Ok(counts)
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

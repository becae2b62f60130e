use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use indicatif::{ProgressBar, ProgressStyle};
use rusqlite::Connection;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::db::ChunkRow;

const EMBEDDING_MODEL: &str = "text-embedding-3-small";
const DEFAULT_EMBEDDING_URL: &str = "https://api.openai.com/v1/embeddings";
const CONCURRENCY: usize = 8;
const MAX_RETRIES: u32 = 3;
const BASE_BACKOFF_MS: u64 = 2000;

/// Upload stats returned after completion.
pub struct UploadStats {
    pub total: usize,
    pub ok: usize,
    pub errors: usize,
}

struct Endpoints {
    embedding_url: String,
    embedding_key: String,
    index_url: String,
    index_key: String,
}

impl Endpoints {
    fn from_env() -> Result<Self> {
        Ok(Endpoints {
            embedding_url: std::env::var("EMBEDDING_API_URL")
                .unwrap_or_else(|_| DEFAULT_EMBEDDING_URL.to_string()),
            embedding_key: std::env::var("EMBEDDING_API_KEY")
                .map_err(|_| anyhow!("EMBEDDING_API_KEY environment variable must be set"))?,
            index_url: std::env::var("VECTOR_INDEX_URL")
                .map_err(|_| anyhow!("VECTOR_INDEX_URL environment variable must be set"))?,
            index_key: std::env::var("VECTOR_API_KEY")
                .map_err(|_| anyhow!("VECTOR_API_KEY environment variable must be set"))?,
        })
    }
}

/// Embed pending chunks and upsert them into the vector index, marking each
/// chunk uploaded in the DB as its result arrives. A chunk that keeps
/// failing is logged and left pending for the next run.
pub async fn upload_pending_chunks(
    conn: &Connection,
    chunks: Vec<ChunkRow>,
) -> Result<UploadStats> {
    let endpoints = Arc::new(Endpoints::from_env()?);
    let client = reqwest::Client::new();
    let semaphore = Arc::new(Semaphore::new(CONCURRENCY));
    let total = chunks.len();

    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")?
            .progress_chars("=> "),
    );

    // Channel: workers send per-chunk results, main loop marks rows uploaded
    let (tx, mut rx) = tokio::sync::mpsc::channel::<(String, Option<String>)>(CONCURRENCY * 2);

    for chunk in chunks {
        let endpoints = Arc::clone(&endpoints);
        let client = client.clone();
        let sem = Arc::clone(&semaphore);
        let tx = tx.clone();

        tokio::spawn(async move {
            let _permit = sem.acquire().await.unwrap();
            let id = chunk.id.clone();
            let result = upload_with_retry(&client, &endpoints, &chunk).await;
            let _ = tx.send((id, result.err().map(|e| e.to_string()))).await;
        });
    }

    // Drop our copy of tx so rx closes when all spawned tasks finish
    drop(tx);

    let mut ok = 0usize;
    let mut errors = 0usize;
    let mut mark_stmt =
        conn.prepare("UPDATE chunks SET uploaded = 1, uploaded_at = ?1 WHERE id = ?2")?;

    while let Some((id, error)) = rx.recv().await {
        match error {
            None => {
                mark_stmt.execute(rusqlite::params![
                    chrono::Utc::now().to_rfc3339(),
                    id,
                ])?;
                ok += 1;
            }
            Some(e) => {
                warn!("Upload failed for chunk {}: {}", id, e);
                errors += 1;
            }
        }
        pb.inc(1);
    }

    pb.finish_and_clear();
    info!("Uploaded {} chunks ({} ok, {} errors)", total, ok, errors);

    Ok(UploadStats { total, ok, errors })
}

async fn upload_with_retry(
    client: &reqwest::Client,
    endpoints: &Endpoints,
    chunk: &ChunkRow,
) -> Result<()> {
    for attempt in 0..MAX_RETRIES {
        match upload_one(client, endpoints, chunk).await {
            Ok(()) => return Ok(()),
            Err(e) => {
                let msg = e.to_string();
                let should_retry = msg.contains("429")
                    || msg.contains("500")
                    || msg.contains("502")
                    || msg.contains("503");
                if !should_retry {
                    return Err(e);
                }
                let backoff = Duration::from_millis(BASE_BACKOFF_MS * 2u64.pow(attempt));
                warn!(
                    "Rate limited on chunk {} (attempt {}/{}), backing off {:.1}s",
                    chunk.id,
                    attempt + 1,
                    MAX_RETRIES,
                    backoff.as_secs_f64()
                );
                tokio::time::sleep(backoff).await;
            }
        }
    }

    upload_one(client, endpoints, chunk).await
}

async fn upload_one(
    client: &reqwest::Client,
    endpoints: &Endpoints,
    chunk: &ChunkRow,
) -> Result<()> {
    let vector = embed_text(client, endpoints, &chunk.text).await?;

    let payload = serde_json::json!({
        "vectors": [{
            "id": chunk.id,
            "values": vector,
            "metadata": {
                "professor": chunk.professor,
                "chunk_type": chunk.chunk_type,
                "text": chunk.text,
            },
        }],
    });

    let response = client
        .post(format!("{}/vectors/upsert", endpoints.index_url.trim_end_matches('/')))
        .header("Api-Key", &endpoints.index_key)
        .json(&payload)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        return Err(anyhow!("vector upsert failed with status {}", status));
    }
    Ok(())
}

async fn embed_text(
    client: &reqwest::Client,
    endpoints: &Endpoints,
    text: &str,
) -> Result<Vec<f32>> {
    let payload = serde_json::json!({
        "input": [text],
        "model": EMBEDDING_MODEL,
    });

    let response = client
        .post(&endpoints.embedding_url)
        .bearer_auth(&endpoints.embedding_key)
        .json(&payload)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        return Err(anyhow!("embedding request failed with status {}", status));
    }

    let body: serde_json::Value = response.json().await?;
    let values = body
        .get("data")
        .and_then(|d| d.get(0))
        .and_then(|e| e.get("embedding"))
        .and_then(|v| v.as_array())
        .ok_or_else(|| anyhow!("no embedding in response"))?;

    values
        .iter()
        .map(|v| v.as_f64().map(|f| f as f32).ok_or_else(|| anyhow!("non-numeric embedding value")))
        .collect()
}

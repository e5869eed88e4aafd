use crate::error::ErrorCode;
use anyhow::Context;
use rusqlite::{Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::Path;

pub const DB_FILE_NAME: &str = "scoreboard.sqlite3";
pub const CHARTS_KEY: &str = "reportData_charts";
pub const SCORES_KEY: &str = "reportData_scores";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)
        .with_context(|| format!("create workspace {}", workspace.display()))?;
    let db_path = workspace.join(DB_FILE_NAME);
    let conn = Connection::open(&db_path)
        .with_context(|| format!("open database {}", db_path.display()))?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS handoff(
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            checksum TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    Ok(conn)
}

#[derive(Debug, thiserror::Error)]
pub enum HandoffError {
    #[error("report data not found: {0}")]
    Missing(String),
    #[error("report data is corrupt: {key} ({reason})")]
    Corrupt { key: String, reason: String },
    #[error("failed to serialize report data")]
    Encode(#[from] serde_json::Error),
    #[error("report store query failed")]
    Query(#[from] rusqlite::Error),
}

impl ErrorCode for HandoffError {
    fn code(&self) -> &'static str {
        match self {
            HandoffError::Missing(_) => "handoff_missing",
            HandoffError::Corrupt { .. } => "handoff_corrupt",
            HandoffError::Encode(_) => "handoff_encode_failed",
            HandoffError::Query(_) => "db_query_failed",
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            HandoffError::Missing(key) => Some(serde_json::json!({ "key": key })),
            HandoffError::Corrupt { key, reason } => {
                Some(serde_json::json!({ "key": key, "reason": reason }))
            }
            HandoffError::Query(e) => Some(serde_json::json!({ "error": e.to_string() })),
            HandoffError::Encode(_) => None,
        }
    }
}

pub fn checksum(payload: &str) -> String {
    hex::encode(Sha256::digest(payload.as_bytes()))
}

pub fn store_payload<T: Serialize>(
    conn: &Connection,
    key: &str,
    value: &T,
    stamp: &str,
) -> Result<usize, HandoffError> {
    let payload = serde_json::to_string(value)?;
    conn.execute(
        "INSERT INTO handoff(key, value, checksum, updated_at) VALUES(?, ?, ?, ?)
         ON CONFLICT(key) DO UPDATE SET
           value = excluded.value,
           checksum = excluded.checksum,
           updated_at = excluded.updated_at",
        (key, &payload, checksum(&payload), stamp),
    )?;
    Ok(payload.len())
}

pub fn load_payload<T: DeserializeOwned>(conn: &Connection, key: &str) -> Result<T, HandoffError> {
    let row: Option<(String, String)> = conn
        .query_row(
            "SELECT value, checksum FROM handoff WHERE key = ?",
            [key],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .optional()?;
    let Some((payload, stored)) = row else {
        return Err(HandoffError::Missing(key.to_string()));
    };
    if checksum(&payload) != stored {
        return Err(HandoffError::Corrupt {
            key: key.to_string(),
            reason: "checksum mismatch".to_string(),
        });
    }
    serde_json::from_str(&payload).map_err(|e| HandoffError::Corrupt {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

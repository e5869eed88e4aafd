use std::path::PathBuf;
use std::sync::Arc;

use rusqlite::Connection;
use serde::Deserialize;

use crate::calc::{AttemptSelection, Dataset, DatasetCache};
use crate::config::Config;
use crate::entry::EntrySheet;
use crate::ipc::error::HandlerErr;
use crate::review::ReviewSession;
use crate::roster::RosterStore;
use crate::scores::ScoreStore;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Everything the session owns. Stores are replaced wholesale on update.
pub struct AppState {
    pub config: Config,
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    pub roster: RosterStore,
    pub scores: ScoreStore,
    pub review: ReviewSession,
    pub entry: Option<EntrySheet>,
    pub selection: AttemptSelection,
    pub dataset_cache: DatasetCache,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            workspace: None,
            db: None,
            roster: RosterStore::default(),
            scores: ScoreStore::default(),
            review: ReviewSession::default(),
            entry: None,
            selection: AttemptSelection::default(),
            dataset_cache: DatasetCache::default(),
        }
    }

    pub fn dataset(&mut self) -> Arc<Dataset> {
        self.dataset_cache.get(&self.scores)
    }

    pub fn db(&self) -> Result<&Connection, HandlerErr> {
        self.db
            .as_ref()
            .ok_or_else(|| HandlerErr::new("no_workspace", "select a workspace first"))
    }
}

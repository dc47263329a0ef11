// Recent-search history, persisted as a small JSON file
use crate::client::SearchParams;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

pub const MAX_HISTORY_ITEMS: usize = 5;
pub const DEFAULT_HISTORY_FILE: &str = "flight_search_history.json";

#[derive(Error, Debug)]
enum HistoryError {
    #[error("History file I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("History file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHistoryItem {
    pub id: String,
    // Unix epoch milliseconds
    pub timestamp: i64,
    #[serde(flatten)]
    pub params: SearchParams,
}

impl SearchHistoryItem {
    fn same_search(&self, params: &SearchParams) -> bool {
        self.params.origin == params.origin
            && self.params.destination == params.destination
            && self.params.departure_date == params.departure_date
    }
}

pub struct SearchHistory {
    path: Option<PathBuf>,
    items: Mutex<Vec<SearchHistoryItem>>,
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn new_id() -> String {
    format!("{:016x}", rand::random::<u64>())
}

impl SearchHistory {
    // History that is never written to disk
    pub fn in_memory() -> Self {
        Self {
            path: None,
            items: Mutex::new(Vec::new()),
        }
    }

    // Loads the file at `path`; a missing or unreadable file gives an empty history
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let items = match load(&path) {
            Ok(items) => items,
            Err(HistoryError::Io(e)) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                warn!("Ignoring search history at {}: {}", path.display(), e);
                Vec::new()
            }
        };
        debug!("Loaded {} search history items", items.len());

        Self {
            path: Some(path),
            items: Mutex::new(items),
        }
    }

    pub fn items(&self) -> Vec<SearchHistoryItem> {
        self.items.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    // Records a search at the front. Repeating an earlier route and date moves
    // that entry up instead of adding a new one.
    pub fn add(&self, params: &SearchParams) -> SearchHistoryItem {
        let mut items = self.items.lock();

        let item = match items.iter().position(|item| item.same_search(params)) {
            Some(index) => {
                let mut existing = items.remove(index);
                existing.params = params.clone();
                existing.timestamp = now_millis();
                existing
            }
            None => SearchHistoryItem {
                id: new_id(),
                timestamp: now_millis(),
                params: params.clone(),
            },
        };

        items.insert(0, item.clone());
        items.truncate(MAX_HISTORY_ITEMS);
        self.persist(&items);
        item
    }

    pub fn remove(&self, id: &str) -> bool {
        let mut items = self.items.lock();
        let before = items.len();
        items.retain(|item| item.id != id);

        let removed = items.len() != before;
        if removed {
            self.persist(&items);
        }
        removed
    }

    pub fn clear(&self) {
        self.items.lock().clear();

        if let Some(path) = &self.path {
            match fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!("Failed to remove search history {}: {}", path.display(), e),
            }
        }
    }

    fn persist(&self, items: &[SearchHistoryItem]) {
        if let Some(path) = &self.path {
            if let Err(e) = save(path, items) {
                warn!("Failed to save search history {}: {}", path.display(), e);
            }
        }
    }
}

fn load(path: &Path) -> Result<Vec<SearchHistoryItem>, HistoryError> {
    let contents = fs::read_to_string(path)?;
    let mut items: Vec<SearchHistoryItem> = serde_json::from_str(&contents)?;
    items.truncate(MAX_HISTORY_ITEMS);
    Ok(items)
}

fn save(path: &Path, items: &[SearchHistoryItem]) -> Result<(), HistoryError> {
    let json = serde_json::to_string_pretty(items)?;
    fs::write(path, json)?;
    Ok(())
}

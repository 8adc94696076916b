use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Arc,
};

use async_trait::async_trait;
use serde_json::Value;
use shared::domain::Board;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

mod validate;

pub use validate::{validate_board, BoardValidationError};

pub const SETTINGS_DOCUMENT: &str = "settings";
pub const AUTH_DOCUMENT: &str = "auth";
pub const CONTROLS_DIR: &str = "controls";
pub const LAST_BOARD_PATH: &str = "/interactive/lastBoard";
pub const ACCESS_TOKEN_PATH: &str = "/streamer/accessToken";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no active board selected")]
    NoActiveBoard,
    #[error("invalid board name '{0}'")]
    InvalidBoardName(String),
    #[error("document '{document}' not found")]
    MissingDocument { document: String },
    #[error("path '{path}' not found in document '{document}'")]
    MissingPath { document: String, path: String },
    #[error("path '{path}' in document '{document}' is not a string")]
    NotAString { document: String, path: String },
    #[error("failed to read document '{document}': {source}")]
    Io {
        document: String,
        source: std::io::Error,
    },
    #[error("failed to parse document '{document}': {source}")]
    Parse {
        document: String,
        source: serde_json::Error,
    },
    #[error("board '{board}' is invalid: {source}")]
    Invalid {
        board: String,
        source: BoardValidationError,
    },
}

/// Read-only accessor over the locally authored board configuration.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn active_board_name(&self) -> Result<String, ConfigError>;
    async fn board(&self, name: &str) -> Result<Arc<Board>, ConfigError>;
    async fn auth_token(&self) -> Result<String, ConfigError>;

    async fn active_board(&self) -> Result<Arc<Board>, ConfigError> {
        let name = self.active_board_name().await?;
        self.board(&name).await
    }
}

/// JSON documents on disk, addressed by document name plus a JSON pointer
/// path such as `/interactive/lastBoard`.
#[derive(Debug, Clone)]
pub struct DocumentStore {
    root: PathBuf,
}

impl DocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn read_document(&self, document: &str) -> Result<Value, ConfigError> {
        let path = self.root.join(format!("{document}.json"));
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
                return Err(ConfigError::MissingDocument {
                    document: document.to_string(),
                })
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    document: document.to_string(),
                    source,
                })
            }
        };
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            document: document.to_string(),
            source,
        })
    }

    pub async fn get(&self, document: &str, path: &str) -> Result<Value, ConfigError> {
        let value = self.read_document(document).await?;
        value
            .pointer(path)
            .cloned()
            .ok_or_else(|| ConfigError::MissingPath {
                document: document.to_string(),
                path: path.to_string(),
            })
    }

    pub async fn get_string(&self, document: &str, path: &str) -> Result<String, ConfigError> {
        match self.get(document, path).await? {
            Value::String(value) => Ok(value),
            _ => Err(ConfigError::NotAString {
                document: document.to_string(),
                path: path.to_string(),
            }),
        }
    }
}

/// Typed boards over a [`DocumentStore`]. Every lookup re-reads and
/// re-validates the board document, so edits on disk apply to the next
/// connect.
pub struct DocumentConfigStore {
    documents: DocumentStore,
}

impl DocumentConfigStore {
    pub fn new(documents: DocumentStore) -> Self {
        Self { documents }
    }

    pub fn open(root: impl Into<PathBuf>) -> Self {
        Self::new(DocumentStore::new(root))
    }

    pub fn documents(&self) -> &DocumentStore {
        &self.documents
    }

    async fn load_board(&self, name: &str) -> Result<Board, ConfigError> {
        if !is_valid_board_name(name) {
            return Err(ConfigError::InvalidBoardName(name.to_string()));
        }

        let document = format!("{CONTROLS_DIR}/{name}");
        let value = self.documents.read_document(&document).await?;
        let mut board: Board =
            serde_json::from_value(value).map_err(|source| ConfigError::Parse {
                document: document.clone(),
                source,
            })?;
        board.name = name.to_string();

        validate_board(&board).map_err(|source| ConfigError::Invalid {
            board: name.to_string(),
            source,
        })?;

        debug!(
            board = name,
            version_id = board.version_id,
            scenes = board.scenes.len(),
            "config: loaded board"
        );
        Ok(board)
    }
}

#[async_trait]
impl ConfigStore for DocumentConfigStore {
    async fn active_board_name(&self) -> Result<String, ConfigError> {
        match self
            .documents
            .get_string(SETTINGS_DOCUMENT, LAST_BOARD_PATH)
            .await
        {
            Ok(name) if !name.trim().is_empty() => Ok(name),
            Ok(_) | Err(ConfigError::MissingDocument { .. } | ConfigError::MissingPath { .. }) => {
                Err(ConfigError::NoActiveBoard)
            }
            Err(err) => Err(err),
        }
    }

    async fn board(&self, name: &str) -> Result<Arc<Board>, ConfigError> {
        self.load_board(name).await.map(Arc::new)
    }

    async fn auth_token(&self) -> Result<String, ConfigError> {
        self.documents
            .get_string(AUTH_DOCUMENT, ACCESS_TOKEN_PATH)
            .await
    }
}

/// Boards held in memory, mainly for embedding and tests.
#[derive(Default)]
pub struct InMemoryConfigStore {
    active_board: RwLock<Option<String>>,
    boards: RwLock<HashMap<String, Arc<Board>>>,
    auth_token: RwLock<Option<String>>,
}

impl InMemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_board(&self, board: Board) -> Result<(), ConfigError> {
        if !is_valid_board_name(&board.name) {
            return Err(ConfigError::InvalidBoardName(board.name));
        }
        validate_board(&board).map_err(|source| ConfigError::Invalid {
            board: board.name.clone(),
            source,
        })?;
        let name = board.name.clone();
        self.boards.write().await.insert(name, Arc::new(board));
        Ok(())
    }

    pub async fn set_active_board(&self, name: Option<&str>) {
        *self.active_board.write().await = name.map(str::to_string);
    }

    pub async fn set_auth_token(&self, token: impl Into<String>) {
        *self.auth_token.write().await = Some(token.into());
    }
}

#[async_trait]
impl ConfigStore for InMemoryConfigStore {
    async fn active_board_name(&self) -> Result<String, ConfigError> {
        self.active_board
            .read()
            .await
            .clone()
            .ok_or(ConfigError::NoActiveBoard)
    }

    async fn board(&self, name: &str) -> Result<Arc<Board>, ConfigError> {
        self.boards
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigError::MissingDocument {
                document: format!("{CONTROLS_DIR}/{name}"),
            })
    }

    async fn auth_token(&self) -> Result<String, ConfigError> {
        self.auth_token
            .read()
            .await
            .clone()
            .ok_or_else(|| ConfigError::MissingPath {
                document: AUTH_DOCUMENT.to_string(),
                path: ACCESS_TOKEN_PATH.to_string(),
            })
    }
}

fn is_valid_board_name(name: &str) -> bool {
    !name.trim().is_empty()
        && !name.contains(['/', '\\'])
        && name != "."
        && name != ".."
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;

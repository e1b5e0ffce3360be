use crate::services::object_store::ObjectStore;
use std::{path::PathBuf, sync::Arc};

/// Shared state handed to every handler.
///
/// Built once at startup; the store handle is immutable and safe for
/// concurrent reuse.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ObjectStore>,
    /// Directory for upload spool files; the system temp dir when unset.
    pub spool_dir: Option<PathBuf>,
}

impl AppState {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            spool_dir: None,
        }
    }

    pub fn with_spool_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.spool_dir = Some(dir.into());
        self
    }
}

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use crate::utils::file::CATEGORIES;

/// Marks cached renderings of a logical path as stale.
pub trait ViewInvalidator: Send + Sync {
    fn revalidate_path(&self, path: &str);
}

/// Keeps a version counter per listing view; every revalidation bumps it.
///
/// Only the root view and the category views are tracked, so the map never
/// holds more than one entry per view whatever paths clients send.
#[derive(Debug, Default)]
pub struct RevalidationLog {
    versions: RwLock<HashMap<String, u64>>,
}

/// Maps a client path onto the listing view it renders in, if any.
fn view_for(path: &str) -> Option<String> {
    let first = path.trim().trim_start_matches('/').split('/').next().unwrap_or("");
    if first.is_empty() {
        Some("/".to_string())
    } else if CATEGORIES.contains(&first) {
        Some(format!("/{}", first))
    } else {
        None
    }
}

impl RevalidationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn version(&self, path: &str) -> u64 {
        let Some(view) = view_for(path) else {
            return 0;
        };
        self.versions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&view)
            .copied()
            .unwrap_or(0)
    }
}

impl ViewInvalidator for RevalidationLog {
    fn revalidate_path(&self, path: &str) {
        let Some(path) = view_for(path) else {
            tracing::debug!(path, "Ignoring revalidation of an unknown view");
            return;
        };
        let mut versions = self.versions.write().unwrap_or_else(PoisonError::into_inner);
        let version = versions.entry(path.clone()).or_insert(0);
        *version += 1;
        tracing::debug!(path = %path, version = *version, "Revalidated path");
    }
}

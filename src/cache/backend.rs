//! Backend Selection
//!
//! The storage strategy behind every namespace cache, chosen once.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::cache::LocalStore;
use crate::clock::Clock;
use crate::store::KvStore;

/// Where cache entries live.
#[derive(Clone)]
pub enum Backend {
    /// Process-private map; entries die with the process
    Local(Arc<LocalStore>),
    /// Distributed store shared by every process using the same prefix
    Remote(Arc<dyn KvStore>),
}

impl Backend {
    /// Picks the remote backend when a store is available, the local map
    /// otherwise.
    pub fn select(store: Option<Arc<dyn KvStore>>, clock: Arc<dyn Clock>) -> Self {
        match store {
            Some(store) => Backend::Remote(store),
            None => Backend::Local(Arc::new(LocalStore::new(clock))),
        }
    }

    pub fn kind(&self) -> BackendKind {
        match self {
            Backend::Local(_) => BackendKind::Local,
            Backend::Remote(_) => BackendKind::Remote,
        }
    }
}

impl fmt::Debug for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Local(local) => f.debug_tuple("Local").field(&local.len()).finish(),
            Backend::Remote(store) => f.debug_tuple("Remote").field(&store.name()).finish(),
        }
    }
}

/// Backend discriminant, reported by the stats endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Local,
    Remote,
}

//! On-demand library loader
//!
//! Each library name maps to one shared load future for the lifetime of the
//! loader. Concurrent requests await the same future, so a library is
//! fetched at most once. Dependencies are loaded (in parallel) before the
//! library itself, and a library is appended to the document head only after
//! its fetch completes, which keeps every dependency ahead of its dependents.
//!
//! A failed load stays in the table: later requests observe the same error
//! until a new loader is built.

use super::catalog::LibraryCatalog;
use super::fetcher::LibraryFetcher;
use crate::config::{LibraryConfig, LibraryDefinition, LibraryKind};
use crate::error::{Error, Result};
use futures::future::{join_all, BoxFuture, FutureExt, Shared};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::RwLock;

type LoadFuture = Shared<BoxFuture<'static, std::result::Result<(), String>>>;

/// A library injected into the document head
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeadEntry {
    pub name: String,
    pub version: String,
    pub url: String,
    pub kind: LibraryKind,
    /// Size of the fetched body in bytes
    pub size: usize,
}

impl HeadEntry {
    /// Markup that injects this library
    pub fn to_tag(&self) -> String {
        library_tag(&self.url, self.kind)
    }
}

/// Markup that injects a library by URL
pub fn library_tag(url: &str, kind: LibraryKind) -> String {
    let url = crate::render::escape_attr(url);
    match kind {
        LibraryKind::Js => format!(r#"<script src="{}"></script>"#, url),
        LibraryKind::Css => format!(r#"<link rel="stylesheet" href="{}">"#, url),
    }
}

/// Load status of a library
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadStatus {
    NotRequested,
    Loading,
    Loaded,
    Failed(String),
}

/// Deduplicating, dependency-ordered library loader
#[derive(Clone)]
pub struct LibraryLoader {
    inner: Arc<LoaderInner>,
}

struct LoaderInner {
    catalog: LibraryCatalog,
    fetcher: Arc<dyn LibraryFetcher>,
    timeout: Duration,
    loads: Mutex<HashMap<String, LoadFuture>>,
    head: RwLock<Vec<HeadEntry>>,
}

impl LibraryLoader {
    /// Create a loader over the configured catalog.
    pub fn new(config: &LibraryConfig, fetcher: Arc<dyn LibraryFetcher>) -> Result<Self> {
        let catalog = LibraryCatalog::new(config.catalog.clone())?;
        tracing::debug!(
            libraries = catalog.names().len(),
            fetcher = fetcher.name(),
            "Library loader ready"
        );

        Ok(Self {
            inner: Arc::new(LoaderInner {
                catalog,
                fetcher,
                timeout: Duration::from_secs(config.timeout_secs),
                loads: Mutex::new(HashMap::new()),
                head: RwLock::new(Vec::new()),
            }),
        })
    }

    /// Load a library and its dependencies.
    pub async fn load_library(&self, name: &str) -> Result<()> {
        let load = self.load_future(name)?;
        load.await.map_err(|reason| Error::LibraryLoadFailed {
            name: name.to_string(),
            reason,
        })
    }

    /// Load several libraries, each once, and return their definitions
    /// (dependencies included) in head order.
    pub async fn load_all(&self, names: &[String]) -> Result<Vec<LibraryDefinition>> {
        let ordered = self.inner.catalog.resolve(names)?;

        let mut unique = Vec::new();
        let mut seen = HashSet::new();
        for name in names {
            if seen.insert(name.as_str()) {
                unique.push(name.as_str());
            }
        }

        let results = join_all(unique.iter().map(|name| self.load_library(name))).await;
        for result in results {
            result?;
        }

        Ok(ordered)
    }

    fn load_future(&self, name: &str) -> Result<LoadFuture> {
        let def = self
            .inner
            .catalog
            .get(name)
            .cloned()
            .ok_or_else(|| Error::LibraryLoadFailed {
                name: name.to_string(),
                reason: "not in catalog".to_string(),
            })?;

        let mut loads = self
            .inner
            .loads
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = loads.get(name) {
            return Ok(existing.clone());
        }

        let load = self.clone().fetch_with_dependencies(def).boxed().shared();
        loads.insert(name.to_string(), load.clone());
        Ok(load)
    }

    async fn fetch_with_dependencies(
        self,
        def: LibraryDefinition,
    ) -> std::result::Result<(), String> {
        let results = join_all(def.dependencies.iter().map(|dep| self.load_library(dep))).await;
        for (dep, result) in def.dependencies.iter().zip(results) {
            if let Err(e) = result {
                return Err(format!("dependency {} unavailable: {}", dep, e));
            }
        }

        tracing::debug!(library = %def.name, url = %def.url, "Fetching library");
        let body = match tokio::time::timeout(self.inner.timeout, self.inner.fetcher.fetch(&def))
            .await
        {
            Ok(Ok(body)) => body,
            Ok(Err(reason)) => {
                tracing::warn!(library = %def.name, reason = %reason, "Library fetch failed");
                return Err(reason);
            }
            Err(_) => {
                tracing::warn!(library = %def.name, "Library fetch timed out");
                return Err(format!("timed out after {:?}", self.inner.timeout));
            }
        };

        self.inner.head.write().await.push(HeadEntry {
            name: def.name.clone(),
            version: def.version.clone(),
            url: def.url.clone(),
            kind: def.kind,
            size: body.len(),
        });
        tracing::info!(library = %def.name, version = %def.version, "Library loaded");
        Ok(())
    }

    /// Libraries injected so far, in injection order
    pub async fn head_entries(&self) -> Vec<HeadEntry> {
        self.inner.head.read().await.clone()
    }

    /// Current load status of a library
    pub fn status(&self, name: &str) -> LoadStatus {
        let loads = self
            .inner
            .loads
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match loads.get(name).map(|f| f.peek().cloned()) {
            None => LoadStatus::NotRequested,
            Some(None) => LoadStatus::Loading,
            Some(Some(Ok(()))) => LoadStatus::Loaded,
            Some(Some(Err(reason))) => LoadStatus::Failed(reason),
        }
    }

    /// Whether a library finished loading successfully
    pub fn is_loaded(&self, name: &str) -> bool {
        self.status(name) == LoadStatus::Loaded
    }

    /// Catalog definition of a library
    pub fn definition(&self, name: &str) -> Option<&LibraryDefinition> {
        self.inner.catalog.get(name)
    }

    /// The validated catalog
    pub fn catalog(&self) -> &LibraryCatalog {
        &self.inner.catalog
    }
}

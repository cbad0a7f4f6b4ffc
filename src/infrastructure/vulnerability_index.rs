//! In-memory index from package name to known advisories

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::api_clients::AdvisoryFeed;
use crate::application::errors::IndexError;
use crate::domain::{AdvisoryEntry, Reference, cve_reference_url};

/// Read-only snapshot of the advisory feed.
///
/// Keys are lower-cased package names; each value keeps the feed's advisory
/// order so the first matching entry wins.
#[derive(Debug, Default, Clone)]
pub struct VulnerabilityIndex {
    packages: HashMap<String, Vec<AdvisoryEntry>>,
}

impl VulnerabilityIndex {
    pub fn from_entries(
        entries: impl IntoIterator<Item = (String, Vec<AdvisoryEntry>)>,
    ) -> Self {
        let mut packages: HashMap<String, Vec<AdvisoryEntry>> = HashMap::new();
        for (package, advisories) in entries {
            packages
                .entry(package.trim().to_lowercase())
                .or_default()
                .extend(advisories);
        }
        Self { packages }
    }

    /// Build an index from the feed document.
    ///
    /// The document maps package names to advisory lists. Metadata keys
    /// (`$meta`) and advisories without an id are skipped.
    pub fn from_feed_document(document: Value) -> Result<Self, IndexError> {
        let Value::Object(map) = document else {
            return Err(IndexError::Format {
                message: "expected a JSON object keyed by package name".to_string(),
            });
        };

        let mut skipped = 0usize;
        let mut entries = Vec::with_capacity(map.len());

        for (package, advisories) in map {
            if package.starts_with('$') {
                continue;
            }
            let Value::Array(items) = advisories else {
                skipped += 1;
                continue;
            };

            let parsed: Vec<AdvisoryEntry> = items.iter().filter_map(advisory_entry).collect();
            skipped += items.len() - parsed.len();
            if !parsed.is_empty() {
                entries.push((package, parsed));
            }
        }

        let index = Self::from_entries(entries);
        if index.is_empty() {
            return Err(IndexError::Empty);
        }

        if skipped > 0 {
            debug!(skipped, "Skipped malformed feed entries");
        }
        Ok(index)
    }

    /// Fetch the feed and build a fresh snapshot
    pub async fn load(feed: &dyn AdvisoryFeed) -> Result<Self, IndexError> {
        let document = feed.fetch().await?;
        let index = Self::from_feed_document(document)?;

        info!(
            packages = index.package_count(),
            advisories = index.advisory_count(),
            "Vulnerability index built"
        );
        Ok(index)
    }

    pub fn lookup(&self, package_name: &str) -> Option<&[AdvisoryEntry]> {
        self.packages
            .get(&package_name.trim().to_lowercase())
            .map(Vec::as_slice)
    }

    /// Resolve a scanner-internal advisory id to its canonical reference.
    ///
    /// Falls back to the raw id with no URL when the package or advisory is
    /// unknown, or when the matching advisory has no CVE.
    pub fn resolve(&self, package_name: &str, internal_id: &str) -> Reference {
        let cve_id = self
            .lookup(package_name)
            .and_then(|advisories| advisories.iter().find(|entry| entry.matches(internal_id)))
            .map(|entry| entry.cve_id.trim())
            .filter(|cve| !cve.is_empty());

        match cve_id {
            Some(cve) => Reference::new(cve, cve_reference_url(cve).unwrap_or_default()),
            None => Reference::unlinked(internal_id.trim()),
        }
    }

    pub fn package_count(&self) -> usize {
        self.packages.len()
    }

    pub fn advisory_count(&self) -> usize {
        self.packages.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

fn advisory_entry(item: &Value) -> Option<AdvisoryEntry> {
    let id = item.get("id")?.as_str()?;
    let cve = item.get("cve").and_then(Value::as_str).unwrap_or_default();
    Some(AdvisoryEntry::new(id, cve))
}

/// Shared pointer to the current index snapshot.
///
/// Readers take an `Arc` and keep it for the whole request; a refresh swaps
/// in a new snapshot without touching the old one.
#[derive(Debug, Clone)]
pub struct IndexHandle {
    current: Arc<RwLock<Arc<VulnerabilityIndex>>>,
}

impl IndexHandle {
    pub fn new(index: VulnerabilityIndex) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(index))),
        }
    }

    pub fn snapshot(&self) -> Arc<VulnerabilityIndex> {
        match self.current.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn replace(&self, index: VulnerabilityIndex) {
        let next = Arc::new(index);
        match self.current.write() {
            Ok(mut guard) => *guard = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
    }

    /// Rebuild from the feed; a failed rebuild keeps the current snapshot
    pub async fn refresh(&self, feed: &dyn AdvisoryFeed) -> Result<(), IndexError> {
        let index = VulnerabilityIndex::load(feed).await?;
        self.replace(index);
        Ok(())
    }

    /// Spawn a task refreshing the index every `interval`
    pub fn spawn_refresh(&self, feed: Arc<dyn AdvisoryFeed>, interval: Duration) -> JoinHandle<()> {
        let handle = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately; startup already loaded the feed
            ticker.tick().await;

            loop {
                ticker.tick().await;
                if let Err(e) = handle.refresh(feed.as_ref()).await {
                    warn!(error = %e, "Vulnerability index refresh failed, keeping previous snapshot");
                }
            }
        })
    }
}

//! In-memory workspace for tests.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use super::{WorkspaceEntry, WorkspaceFiles};

#[derive(Default)]
pub struct MemoryWorkspace {
    files: Mutex<BTreeMap<String, String>>,
    failing: Mutex<HashSet<String>>,
    write_delay: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MemoryWorkspace {
    pub fn with_files(files: &[(&str, &str)]) -> Self {
        let workspace = Self::default();
        {
            let mut map = workspace.files.lock().unwrap();
            for (path, content) in files {
                map.insert(path.to_string(), content.to_string());
            }
        }
        workspace
    }

    pub fn with_write_delay(mut self, delay: Duration) -> Self {
        self.write_delay = Some(delay);
        self
    }

    /// Make writes and deletes of `path` fail.
    pub fn fail_on(&self, path: &str) {
        self.failing.lock().unwrap().insert(path.to_string());
    }

    pub fn get(&self, path: &str) -> Option<String> {
        self.files.lock().unwrap().get(path).cloned()
    }

    pub fn set(&self, path: &str, content: &str) {
        self.files
            .lock()
            .unwrap()
            .insert(path.to_string(), content.to_string());
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn check(&self, path: &str) -> Result<()> {
        if self.failing.lock().unwrap().contains(path) {
            Err(anyhow!("simulated failure for {}", path))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl WorkspaceFiles for MemoryWorkspace {
    async fn list(&self, _path: Option<&str>, _depth: usize) -> Result<Vec<WorkspaceEntry>> {
        Ok(self
            .files
            .lock()
            .unwrap()
            .iter()
            .map(|(path, content)| WorkspaceEntry::file(path.clone(), Some(content.len() as u64)))
            .collect())
    }

    async fn read(&self, path: &str) -> Result<Option<String>> {
        Ok(self.get(path))
    }

    async fn write(&self, path: &str, content: &str) -> Result<()> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.write_delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        self.check(path)?;
        self.set(path, content);
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.check(path)?;
        self.files.lock().unwrap().remove(path);
        Ok(())
    }
}

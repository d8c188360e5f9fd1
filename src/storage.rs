//! Persistent state: collections, environments, history and tool scratch
//!
//! Every mutation is written through to the backend immediately; the
//! in-memory copy stays authoritative when a write fails.

pub mod backend;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};

use crate::collections::CollectionTree;
use crate::constants::{
    KEY_COLLECTIONS, KEY_ENVIRONMENTS, KEY_HISTORY, KEY_PENDING_IMPORT, MAX_HISTORY,
};
use crate::models::{Collection, Environment, RequestHistory};

pub use backend::{FileBackend, MemoryBackend, StorageBackend};

/// Manages request history, collections and environments
pub struct Storage {
    backend: Box<dyn StorageBackend>,
    tree: CollectionTree,
    environments: Vec<Environment>,
    history: VecDeque<RequestHistory>,
    load_error: Option<anyhow::Error>,
}

impl Storage {
    /// Open a store and load whatever it already holds
    pub fn open(backend: Box<dyn StorageBackend>) -> Self {
        let mut storage = Storage {
            backend,
            tree: CollectionTree::default(),
            environments: Vec::new(),
            history: VecDeque::with_capacity(MAX_HISTORY),
            load_error: None,
        };

        if let Err(e) = storage.load_all() {
            tracing::warn!(error = %e, "Failed to load saved data");
            storage.load_error = Some(e);
        }
        storage
    }

    /// The error from the initial load, handed out once
    pub fn take_load_error(&mut self) -> Option<anyhow::Error> {
        self.load_error.take()
    }

    pub fn in_memory() -> Self {
        Self::open(Box::new(MemoryBackend::new()))
    }

    fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.backend.read(key)? {
            Some(content) => {
                let value = serde_json::from_str(&content)
                    .with_context(|| format!("parsing stored '{}'", key))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    fn write_json<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) -> Result<()> {
        let content = serde_json::to_string(value)?;
        self.backend.write(key, &content)
    }

    /// Read a key at startup, copying unparseable content to `<key>.bak`
    ///
    /// The backup is written before anything can overwrite the key.
    fn load_json<T: DeserializeOwned>(&mut self, key: &str) -> Result<Option<T>> {
        let Some(content) = self.backend.read(key)? else {
            return Ok(None);
        };
        match serde_json::from_str(&content) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                let backup = format!("{}.bak", key);
                self.backend
                    .write(&backup, &content)
                    .with_context(|| format!("backing up unreadable '{}'", key))?;
                tracing::warn!(key, backup = %backup, error = %e, "Moved unreadable data aside");
                Err(anyhow::Error::new(e).context(format!(
                    "parsing stored '{}' (original kept in '{}')",
                    key, backup
                )))
            }
        }
    }

    /// Load all collections, environments and history
    ///
    /// Keys are loaded independently; the first failure is returned after
    /// the remaining keys have been tried.
    pub fn load_all(&mut self) -> Result<()> {
        let mut first_error = None;

        match self.load_json::<Vec<Collection>>(KEY_COLLECTIONS) {
            Ok(collections) => self.tree = CollectionTree::new(collections.unwrap_or_default()),
            Err(e) => first_error = first_error.or(Some(e)),
        }

        match self.load_json::<Vec<Environment>>(KEY_ENVIRONMENTS) {
            Ok(environments) => self.environments = environments.unwrap_or_default(),
            Err(e) => first_error = first_error.or(Some(e)),
        }

        match self.load_json::<VecDeque<RequestHistory>>(KEY_HISTORY) {
            Ok(history) => {
                let mut history = history.unwrap_or_default();
                history.truncate(MAX_HISTORY);
                self.history = history;
            }
            Err(e) => first_error = first_error.or(Some(e)),
        }

        tracing::debug!(
            collections = self.tree.collections().len(),
            environments = self.environments.len(),
            history = self.history.len(),
            "Loaded saved data"
        );

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    // ========================
    // Collections
    // ========================

    pub fn tree(&self) -> &CollectionTree {
        &self.tree
    }

    /// Apply a structural edit and persist the result
    pub fn update_collections<R>(&mut self, edit: impl FnOnce(&mut CollectionTree) -> R) -> Result<R> {
        let result = edit(&mut self.tree);
        self.save_collections()?;
        Ok(result)
    }

    pub fn save_collections(&mut self) -> Result<()> {
        let collections = self.tree.collections().to_vec();
        self.write_json(KEY_COLLECTIONS, &collections)
    }

    // ========================
    // Environments
    // ========================

    pub fn environments(&self) -> &[Environment] {
        &self.environments
    }

    /// Get the active environment, if any
    pub fn current_environment(&self) -> Option<&Environment> {
        self.environments.iter().find(|e| e.is_active)
    }

    pub fn save_environments(&mut self) -> Result<()> {
        let environments = self.environments.clone();
        self.write_json(KEY_ENVIRONMENTS, &environments)
    }

    /// Insert or replace an environment by id
    pub fn upsert_environment(&mut self, environment: Environment) -> Result<()> {
        if environment.is_active {
            for env in self.environments.iter_mut() {
                env.is_active = false;
            }
        }
        match self.environments.iter_mut().find(|e| e.id == environment.id) {
            Some(existing) => *existing = environment,
            None => self.environments.push(environment),
        }
        self.save_environments()
    }

    pub fn delete_environment(&mut self, id: &str) -> Result<bool> {
        let before = self.environments.len();
        self.environments.retain(|e| e.id != id);
        if self.environments.len() == before {
            return Ok(false);
        }
        self.save_environments()?;
        Ok(true)
    }

    /// Activate one environment (or none); at most one is ever active
    ///
    /// An unknown id leaves the current selection unchanged.
    pub fn set_active_environment(&mut self, id: Option<&str>) -> Result<bool> {
        if let Some(id) = id {
            if !self.environments.iter().any(|e| e.id == id) {
                return Ok(false);
            }
        }
        for env in self.environments.iter_mut() {
            env.is_active = Some(env.id.as_str()) == id;
        }
        self.save_environments()?;
        Ok(true)
    }

    /// Step to the next environment: none -> first -> ... -> last -> none
    pub fn cycle_environment(&mut self) -> Result<Option<String>> {
        let current = self.environments.iter().position(|e| e.is_active);
        let next = match current {
            None => self.environments.first(),
            Some(i) => self.environments.get(i + 1),
        }
        .map(|e| e.id.clone());

        self.set_active_environment(next.as_deref())?;
        Ok(self.current_environment().map(|e| e.name.clone()))
    }

    /// Replace or merge variables of the active environment
    ///
    /// Creates and activates a `Default` environment when none is active.
    pub fn update_variables(&mut self, changes: &HashMap<String, Option<String>>, replace: bool) -> Result<()> {
        if self.current_environment().is_none() {
            let mut env = Environment::new("Default");
            env.is_active = true;
            for other in self.environments.iter_mut() {
                other.is_active = false;
            }
            self.environments.push(env);
        }

        if let Some(env) = self.environments.iter_mut().find(|e| e.is_active) {
            if replace {
                env.variables.clear();
            }
            for (key, value) in changes {
                match value {
                    Some(v) => {
                        env.variables.insert(key.clone(), v.clone());
                    }
                    None => {
                        env.variables.remove(key);
                    }
                }
            }
        }
        self.save_environments()
    }

    // ========================
    // History
    // ========================

    /// Add entry to history, newest first
    pub fn add_to_history(&mut self, entry: RequestHistory) -> Result<()> {
        if self.history.len() >= MAX_HISTORY {
            self.history.pop_back();
        }
        self.history.push_front(entry);
        let history = self.history.clone();
        self.write_json(KEY_HISTORY, &history)
    }

    pub fn history(&self) -> &VecDeque<RequestHistory> {
        &self.history
    }

    /// Get history item by index (0 = most recent)
    pub fn get_history(&self, index: usize) -> Option<&RequestHistory> {
        self.history.get(index)
    }

    /// History length
    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn clear_history(&mut self) -> Result<()> {
        self.history.clear();
        self.backend.remove(KEY_HISTORY)
    }

    // ========================
    // Import hand-off
    // ========================

    /// Leave a collection for the next consumer of the pending-import key
    pub fn stage_import(&mut self, collection: &Collection) -> Result<()> {
        self.write_json(KEY_PENDING_IMPORT, collection)
    }

    /// Consume a staged import once, appending it to the tree
    ///
    /// Returns the imported collection's name.
    pub fn take_pending_import(&mut self) -> Result<Option<String>> {
        let staged: Option<Collection> = self.read_json(KEY_PENDING_IMPORT)?;
        self.backend.remove(KEY_PENDING_IMPORT)?;

        match staged {
            Some(collection) => {
                let name = collection.name.clone();
                tracing::info!(name = %name, requests = collection.requests.len(), "Consumed pending import");
                self.update_collections(|tree| tree.push(collection))?;
                Ok(Some(name))
            }
            None => Ok(None),
        }
    }

    // ========================
    // Per-tool scratch state
    // ========================

    pub fn read_scratch<T: DeserializeOwned>(&self, tool: &str) -> Option<T> {
        match self.read_json(&format!("scratch_{}", tool)) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(tool, error = %e, "Ignoring unreadable scratch state");
                None
            }
        }
    }

    pub fn write_scratch<T: Serialize>(&mut self, tool: &str, value: &T) -> Result<()> {
        self.write_json(&format!("scratch_{}", tool), value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Request, Response};

    fn entry(n: usize) -> RequestHistory {
        let request = Request {
            url: format!("https://example.com/{}", n),
            ..Request::default()
        };
        RequestHistory::new(request, Response::default())
    }

    #[test]
    fn test_history_cap_evicts_oldest() {
        let mut storage = Storage::in_memory();
        for i in 0..51 {
            storage.add_to_history(entry(i)).unwrap();
        }
        assert_eq!(storage.history_len(), MAX_HISTORY);
        assert_eq!(storage.get_history(0).unwrap().request.url, "https://example.com/50");
        assert_eq!(storage.get_history(49).unwrap().request.url, "https://example.com/1");
        assert!(storage
            .history()
            .iter()
            .all(|h| h.request.url != "https://example.com/0"));
    }

    #[test]
    fn test_state_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = Storage::open(Box::new(FileBackend::new(dir.path())));
        let id = storage
            .update_collections(|tree| tree.add_collection("Saved"))
            .unwrap();
        storage.add_to_history(entry(1)).unwrap();
        let mut env = Environment::new("dev");
        env.set("host", "api.test");
        env.is_active = true;
        storage.upsert_environment(env).unwrap();

        let reopened = Storage::open(Box::new(FileBackend::new(dir.path())));
        assert_eq!(reopened.tree().get(&id).unwrap().name, "Saved");
        assert_eq!(reopened.history_len(), 1);
        assert_eq!(
            reopened.current_environment().unwrap().get("host").map(String::as_str),
            Some("api.test")
        );
    }

    #[test]
    fn test_corrupt_data_loads_empty() {
        let mut backend = MemoryBackend::new();
        backend.write(KEY_COLLECTIONS, "{not json").unwrap();
        let mut storage = Storage::open(Box::new(backend));
        assert!(storage.tree().collections().is_empty());
        assert!(storage.take_load_error().is_some());
        assert!(storage.take_load_error().is_none());
    }

    #[test]
    fn test_unreadable_collections_kept_after_save() {
        let dir = tempfile::tempdir().unwrap();
        let original = r#"[{"id":"c1","name":"Precious","requests":[],"created_at":"yesterday"}]"#;
        std::fs::write(dir.path().join("collections.json"), original).unwrap();

        let mut storage = Storage::open(Box::new(FileBackend::new(dir.path())));
        let err = storage.take_load_error().unwrap();
        assert!(format!("{:#}", err).contains("collections"));

        storage
            .update_collections(|tree| tree.add_collection("new"))
            .unwrap();

        let backup = std::fs::read_to_string(dir.path().join("collections.bak.json")).unwrap();
        assert_eq!(backup, original);
        assert!(backup.contains("Precious"));
        let saved = std::fs::read_to_string(dir.path().join("collections.json")).unwrap();
        assert!(saved.contains("new"));
    }

    #[test]
    fn test_clean_load_has_no_error() {
        let mut storage = Storage::in_memory();
        assert!(storage.take_load_error().is_none());
    }

    #[test]
    fn test_single_active_environment() {
        let mut storage = Storage::in_memory();
        let dev = Environment::new("dev");
        let prod = Environment::new("prod");
        let (dev_id, prod_id) = (dev.id.clone(), prod.id.clone());
        storage.upsert_environment(dev).unwrap();
        storage.upsert_environment(prod).unwrap();

        assert!(storage.set_active_environment(Some(&dev_id)).unwrap());
        assert!(storage.set_active_environment(Some(&prod_id)).unwrap());
        assert_eq!(storage.environments().iter().filter(|e| e.is_active).count(), 1);
        assert_eq!(storage.current_environment().unwrap().id, prod_id);

        assert!(!storage.set_active_environment(Some("missing")).unwrap());
        assert_eq!(storage.current_environment().unwrap().id, prod_id);
    }

    #[test]
    fn test_cycle_environment_wraps_to_none() {
        let mut storage = Storage::in_memory();
        storage.upsert_environment(Environment::new("dev")).unwrap();
        storage.upsert_environment(Environment::new("prod")).unwrap();

        assert_eq!(storage.cycle_environment().unwrap().as_deref(), Some("dev"));
        assert_eq!(storage.cycle_environment().unwrap().as_deref(), Some("prod"));
        assert_eq!(storage.cycle_environment().unwrap(), None);
    }

    #[test]
    fn test_update_variables_creates_default() {
        let mut storage = Storage::in_memory();
        let mut changes = HashMap::new();
        changes.insert("token".to_string(), Some("t1".to_string()));
        storage.update_variables(&changes, false).unwrap();

        let env = storage.current_environment().unwrap();
        assert_eq!(env.name, "Default");
        assert_eq!(env.get("token").map(String::as_str), Some("t1"));

        changes.insert("token".to_string(), None);
        storage.update_variables(&changes, false).unwrap();
        assert!(storage.current_environment().unwrap().get("token").is_none());
    }

    #[test]
    fn test_pending_import_consumed_once() {
        let mut storage = Storage::in_memory();
        let mut collection = Collection::new("Petstore");
        collection.requests.push(Request::folder("pets"));
        storage.stage_import(&collection).unwrap();

        assert_eq!(storage.take_pending_import().unwrap().as_deref(), Some("Petstore"));
        assert_eq!(storage.take_pending_import().unwrap(), None);
        assert_eq!(storage.tree().collections().len(), 1);
    }

    #[test]
    fn test_scratch_roundtrip() {
        let mut storage = Storage::in_memory();
        storage.write_scratch("tools", &"last input".to_string()).unwrap();
        let value: Option<String> = storage.read_scratch("tools");
        assert_eq!(value.as_deref(), Some("last input"));
        let missing: Option<String> = storage.read_scratch("other");
        assert!(missing.is_none());
    }
}

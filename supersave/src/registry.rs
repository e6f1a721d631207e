use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use supersave_core::{BaseEntity, ConfigError, Result};

use crate::relations::RelationSource;
use crate::repository::Repository;

/// Per-`SuperSave` instance registry of repositories keyed by `(namespace,
/// name)` full name. Owned by the entity manager; cloned handles are
/// threaded into each repository so relation expansion can resolve sibling
/// collections without the registry being a true process global.
///
/// Mutated only during `addEntity`, a setup-phase operation — a
/// `std::sync::RwLock` is enough; no await is ever held across the lock.
#[derive(Clone, Default)]
pub struct Registry {
    repositories: Arc<RwLock<HashMap<String, Arc<dyn Repository>>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a repository under `full_name`. Re-registration of the
    /// same key is the entity manager's job to reject before calling this —
    /// additional repositories for the same entity are illegal.
    pub fn insert(&self, full_name: String, repository: Arc<dyn Repository>) {
        self.repositories.write().expect("registry lock poisoned").insert(full_name, repository);
    }

    pub fn contains(&self, full_name: &str) -> bool {
        self.repositories.read().expect("registry lock poisoned").contains_key(full_name)
    }

    pub fn get(&self, full_name: &str) -> Option<Arc<dyn Repository>> {
        self.repositories.read().expect("registry lock poisoned").get(full_name).cloned()
    }

    pub fn get_or_err(&self, full_name: &str) -> std::result::Result<Arc<dyn Repository>, ConfigError> {
        self.get(full_name).ok_or_else(|| ConfigError::UnknownRepository {
            full_name: full_name.to_owned(),
            known: self.known_names(),
        })
    }

    pub fn known_names(&self) -> Vec<String> {
        let mut names: Vec<String> =
            self.repositories.read().expect("registry lock poisoned").keys().cloned().collect();
        names.sort();
        names
    }
}

#[async_trait]
impl RelationSource for Registry {
    async fn get_by_id(&self, full_name: &str, id: &str) -> Result<Option<BaseEntity>> {
        match self.get(full_name) {
            Some(repo) => repo.get_by_id(id).await,
            None => Ok(None),
        }
    }

    async fn get_by_ids(&self, full_name: &str, ids: &[String]) -> Result<Vec<BaseEntity>> {
        match self.get(full_name) {
            Some(repo) => repo.get_by_ids(ids).await,
            None => Ok(Vec::new()),
        }
    }
}

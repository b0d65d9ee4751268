//! Collaborator ports used by the splitter, plus in-memory implementations.

use crate::model::{AlgorithmDefinition, Medium, Track};
use anyhow::{Result, anyhow};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

pub trait AlgorithmCatalog {
    /// `None` is not an error; the algorithm simply contributes no defaults.
    fn algorithm(&self, name: &str) -> Option<AlgorithmDefinition>;
}

/// Job/medium state shared with the rest of the workflow. Implementations are
/// responsible for their own synchronization.
pub trait MediumStateStore {
    fn prior_tracks(
        &self,
        job_id: u64,
        medium_id: u64,
        stage_index: usize,
    ) -> Result<BTreeSet<Track>>;

    /// Idempotent upsert of the medium, including its property overrides.
    fn persist_medium(&self, job_id: u64, medium: &Medium) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    algorithms: BTreeMap<String, AlgorithmDefinition>,
}

impl InMemoryCatalog {
    pub fn new(algorithms: impl IntoIterator<Item = AlgorithmDefinition>) -> Self {
        Self {
            algorithms: algorithms.into_iter().map(|a| (a.name.clone(), a)).collect(),
        }
    }
}

impl AlgorithmCatalog for InMemoryCatalog {
    fn algorithm(&self, name: &str) -> Option<AlgorithmDefinition> {
        self.algorithms.get(name).cloned()
    }
}

type TrackKey = (u64, u64, usize);

#[derive(Debug, Default)]
pub struct InMemoryStore {
    tracks: Mutex<BTreeMap<TrackKey, BTreeSet<Track>>>,
    media: Mutex<BTreeMap<(u64, u64), Medium>>,
    persist_calls: Mutex<Vec<(u64, u64)>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tracks(tracks: impl IntoIterator<Item = Track>) -> Self {
        let store = Self::default();
        {
            let mut map = store.tracks.lock().unwrap_or_else(|e| e.into_inner());
            for t in tracks {
                map.entry((t.job_id, t.medium_id, t.stage_index))
                    .or_default()
                    .insert(t);
            }
        }
        store
    }

    /// Last persisted copy of a medium.
    pub fn medium(&self, job_id: u64, medium_id: u64) -> Option<Medium> {
        self.media.lock().ok()?.get(&(job_id, medium_id)).cloned()
    }

    /// `(job_id, medium_id)` for every persist call, in call order.
    pub fn persist_calls(&self) -> Vec<(u64, u64)> {
        self.persist_calls
            .lock()
            .map(|c| c.clone())
            .unwrap_or_default()
    }
}

impl MediumStateStore for InMemoryStore {
    fn prior_tracks(
        &self,
        job_id: u64,
        medium_id: u64,
        stage_index: usize,
    ) -> Result<BTreeSet<Track>> {
        let map = self.tracks.lock().map_err(|_| anyhow!("track store lock poisoned"))?;
        Ok(map
            .get(&(job_id, medium_id, stage_index))
            .cloned()
            .unwrap_or_default())
    }

    fn persist_medium(&self, job_id: u64, medium: &Medium) -> Result<()> {
        self.media
            .lock()
            .map_err(|_| anyhow!("media store lock poisoned"))?
            .insert((job_id, medium.id), medium.clone());
        self.persist_calls
            .lock()
            .map_err(|_| anyhow!("media store lock poisoned"))?
            .push((job_id, medium.id));
        Ok(())
    }
}

impl<T: AlgorithmCatalog + ?Sized> AlgorithmCatalog for &T {
    fn algorithm(&self, name: &str) -> Option<AlgorithmDefinition> {
        (**self).algorithm(name)
    }
}

impl<T: MediumStateStore + ?Sized> MediumStateStore for &T {
    fn prior_tracks(
        &self,
        job_id: u64,
        medium_id: u64,
        stage_index: usize,
    ) -> Result<BTreeSet<Track>> {
        (**self).prior_tracks(job_id, medium_id, stage_index)
    }

    fn persist_medium(&self, job_id: u64, medium: &Medium) -> Result<()> {
        (**self).persist_medium(job_id, medium)
    }
}

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::core::distance::is_known_site;
use crate::models::{Donor, Profile, Recipient};

/// Errors that can occur when loading profiles
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Read access to donor and recipient profiles
pub trait ProfileStore: Send + Sync {
    fn get_by_id(&self, id: &str) -> Option<Profile>;

    fn list_donors(&self) -> Vec<Donor>;

    fn list_recipients(&self) -> Vec<Recipient>;

    /// Every profile, in load order
    fn list_all(&self) -> Vec<Profile>;
}

/// Profiles held in memory, indexed by id
///
/// Later records with a duplicate id replace earlier ones in the index but
/// keep the slot of the first occurrence, so listing order is stable.
#[derive(Debug, Default, Clone)]
pub struct InMemoryProfileStore {
    profiles: Vec<Profile>,
    index: HashMap<String, usize>,
}

impl InMemoryProfileStore {
    pub fn from_profiles(profiles: Vec<Profile>) -> Self {
        let mut store = Self::default();
        for profile in profiles {
            store.insert(profile);
        }
        store
    }

    /// Load a JSON array of profile records
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)?;
        let store = Self::from_json_str(&raw)?;

        tracing::info!(
            "Loaded {} profiles from {} ({} donors, {} recipients)",
            store.len(),
            path.display(),
            store.list_donors().len(),
            store.list_recipients().len()
        );

        let unknown = store.unknown_site_count();
        if unknown > 0 {
            tracing::warn!(
                "{} profiles have a location outside the site table and will be placed at the origin",
                unknown
            );
        }

        Ok(store)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, StoreError> {
        let profiles: Vec<Profile> = serde_json::from_str(raw)?;
        Ok(Self::from_profiles(profiles))
    }

    pub fn insert(&mut self, profile: Profile) {
        match self.index.get(profile.id()) {
            Some(&slot) => {
                tracing::debug!("Replacing duplicate profile {}", profile.id());
                self.profiles[slot] = profile;
            }
            None => {
                self.index.insert(profile.id().to_string(), self.profiles.len());
                self.profiles.push(profile);
            }
        }
    }

    /// Profiles whose location is not in the site table
    pub fn unknown_site_count(&self) -> usize {
        self.profiles
            .iter()
            .filter(|p| !is_known_site(p.location()))
            .count()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

impl ProfileStore for InMemoryProfileStore {
    fn get_by_id(&self, id: &str) -> Option<Profile> {
        self.index.get(id).map(|&slot| self.profiles[slot].clone())
    }

    fn list_donors(&self) -> Vec<Donor> {
        self.profiles
            .iter()
            .filter_map(|p| p.as_donor().cloned())
            .collect()
    }

    fn list_recipients(&self) -> Vec<Recipient> {
        self.profiles
            .iter()
            .filter_map(|p| p.as_recipient().cloned())
            .collect()
    }

    fn list_all(&self) -> Vec<Profile> {
        self.profiles.clone()
    }
}

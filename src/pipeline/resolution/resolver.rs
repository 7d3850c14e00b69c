use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

use super::rules::merge_into;
use crate::models::{Correlation, Identity, IdentityKey, Observation, Roster, Sighting};

/// Folds observations into one [`Identity`] per key.
///
/// Deletion is sticky: once a key is tombstoned, its identity is dropped and
/// every later observation for that key is ignored for the lifetime of the
/// resolver. Nothing here can fail.
#[derive(Debug, Default)]
pub struct Resolver {
    identities: HashMap<IdentityKey, Identity>,
    tombstones: HashSet<IdentityKey>,
}

impl Resolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, observation: Observation, correlation: Correlation) {
        if observation.role.is_deletion() {
            self.mark_deleted(observation.key);
            return;
        }
        self.absorb(observation.into_identity(correlation));
    }

    pub fn observe_all(&mut self, sightings: impl IntoIterator<Item = Sighting>) {
        for sighting in sightings {
            self.observe(sighting.observation, sighting.correlation);
        }
    }

    /// Merge an already-resolved identity, e.g. one replayed from another
    /// resolver.
    pub fn absorb(&mut self, identity: Identity) {
        if self.tombstones.contains(&identity.key) {
            tracing::trace!(key = %identity.key, "Ignoring observation of deleted identity");
            return;
        }

        match self.identities.entry(identity.key) {
            Entry::Occupied(mut entry) => merge_into(entry.get_mut(), identity),
            Entry::Vacant(entry) => {
                entry.insert(identity);
            }
        }
    }

    pub fn mark_deleted(&mut self, key: IdentityKey) {
        if self.identities.remove(&key).is_some() {
            tracing::debug!(key = %key, "Identity deleted");
        }
        self.tombstones.insert(key);
    }

    pub fn is_deleted(&self, key: &IdentityKey) -> bool {
        self.tombstones.contains(key)
    }

    pub fn len(&self) -> usize {
        self.identities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }

    /// Current identities, ordered by key.
    pub fn unique_identities(&self) -> Vec<Identity> {
        let mut identities: Vec<Identity> = self.identities.values().cloned().collect();
        identities.sort_by_key(|identity| identity.key);
        identities
    }

    /// Deleted keys, ordered.
    pub fn tombstones(&self) -> Vec<IdentityKey> {
        let mut keys: Vec<IdentityKey> = self.tombstones.iter().copied().collect();
        keys.sort_unstable();
        keys
    }

    /// Replay everything this resolver knows into `target`: deletions first,
    /// then the surviving identities.
    pub fn replay_into(self, target: &mut Resolver) {
        for key in self.tombstones {
            target.mark_deleted(key);
        }
        for identity in self.identities.into_values() {
            target.absorb(identity);
        }
    }

    pub fn snapshot(&self) -> Roster {
        self.identities.values().cloned().collect()
    }

    pub fn into_roster(self) -> Roster {
        self.identities.into_values().collect()
    }
}

use std::collections::HashMap;

use serde::{Serialize, Serializer};

use super::identity::{Identity, IdentityKey};

/// The resolved set of identities for a batch. Iteration order is not
/// meaningful; use [`Roster::into_sorted_vec`] for stable presentation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Roster {
    identities: HashMap<IdentityKey, Identity>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.identities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }

    pub fn get(&self, key: &IdentityKey) -> Option<&Identity> {
        self.identities.get(key)
    }

    pub fn contains(&self, key: &IdentityKey) -> bool {
        self.identities.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Identity> {
        self.identities.values()
    }

    /// Identities ordered by key: authoritative ids first, then synthesized.
    pub fn into_sorted_vec(self) -> Vec<Identity> {
        let mut identities: Vec<Identity> = self.identities.into_values().collect();
        identities.sort_by_key(|identity| identity.key);
        identities
    }

    /// Split into (participants, channel holders). Channel holders are
    /// identities whose profile positively links a channel; unknown counts
    /// as a participant.
    pub fn partition_by_channel(self) -> (Vec<Identity>, Vec<Identity>) {
        self.into_sorted_vec()
            .into_iter()
            .partition(|identity| identity.has_channel != Some(true))
    }
}

impl FromIterator<Identity> for Roster {
    /// Later identities with a duplicate key replace earlier ones. Use the
    /// resolver when the records need merging.
    fn from_iter<I: IntoIterator<Item = Identity>>(iter: I) -> Self {
        Self {
            identities: iter
                .into_iter()
                .map(|identity| (identity.key, identity))
                .collect(),
        }
    }
}

impl IntoIterator for Roster {
    type Item = Identity;
    type IntoIter = std::collections::hash_map::IntoValues<IdentityKey, Identity>;

    fn into_iter(self) -> Self::IntoIter {
        self.identities.into_values()
    }
}

impl Serialize for Roster {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut identities: Vec<&Identity> = self.identities.values().collect();
        identities.sort_by_key(|identity| identity.key);
        identities.serialize(serializer)
    }
}

//! Raw sightings of a participant, as produced by the extractors.

use serde::Serialize;

use super::identity::{Identity, IdentityKey, MessageStamp, ReactionStamp};

/// How the participant showed up in the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Authored a message.
    Author,
    /// Reacted to a message.
    Reactor,
    /// Referenced only (mention entity or free-text `@handle`).
    Mention,
    /// The export's deleted-account representation.
    Tombstone,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Author => "author",
            Self::Reactor => "reactor",
            Self::Mention => "mention",
            Self::Tombstone => "tombstone",
        }
    }

    pub fn is_mention_only(&self) -> bool {
        matches!(self, Self::Mention)
    }

    pub fn is_deletion(&self) -> bool {
        matches!(self, Self::Tombstone)
    }
}

/// One sighting of a participant. Every optional field means "not present in
/// this record", never "known to be empty".
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Observation {
    pub key: IdentityKey,
    pub role: Role,
    pub handle: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub bio: Option<String>,
    pub mention: Option<String>,
    pub is_bot: bool,
    pub has_channel: Option<bool>,
}

impl Observation {
    pub fn new(key: IdentityKey, role: Role) -> Self {
        Self {
            key,
            role,
            handle: None,
            first_name: None,
            last_name: None,
            phone: None,
            bio: None,
            mention: None,
            is_bot: false,
            has_channel: None,
        }
    }

    pub fn tombstone(key: IdentityKey) -> Self {
        Self::new(key, Role::Tombstone)
    }

    /// Split a display name on its first whitespace run into given/family
    /// parts. Blank names leave both parts unset.
    pub fn with_display_name(mut self, display_name: &str) -> Self {
        let trimmed = display_name.trim();
        if trimmed.is_empty() {
            return self;
        }
        match trimmed.split_once(char::is_whitespace) {
            Some((first, rest)) => {
                self.first_name = Some(first.to_string());
                self.last_name = non_empty(rest.trim_start());
            }
            None => self.first_name = Some(trimmed.to_string()),
        }
        self
    }

    pub fn with_handle(mut self, handle: Option<&str>) -> Self {
        self.handle = handle.and_then(non_empty);
        self
    }

    /// Lift this sighting into a single-observation identity, stamping the
    /// correlation data on it.
    pub fn into_identity(self, correlation: Correlation) -> Identity {
        let mut identity = Identity::blank(self.key);
        identity.handle = self.handle;
        identity.first_name = self.first_name;
        identity.last_name = self.last_name;
        identity.phone = self.phone;
        identity.bio = self.bio;
        identity.mention = self.mention;
        identity.is_bot = self.is_bot;
        identity.is_mention_only = self.role.is_mention_only();
        identity.has_channel = self.has_channel;
        identity.first_message = correlation.message;
        identity.first_reaction = correlation.reaction;
        identity
    }
}

/// Out-of-band data that travels next to an observation. Mentions carry
/// neither stamp: they are not authored events.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Correlation {
    pub message: Option<MessageStamp>,
    pub reaction: Option<ReactionStamp>,
}

impl Correlation {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn message(stamp: Option<MessageStamp>) -> Self {
        Self {
            message: stamp,
            reaction: None,
        }
    }

    pub fn reaction(stamp: Option<ReactionStamp>) -> Self {
        Self {
            message: None,
            reaction: stamp,
        }
    }
}

/// An observation paired with its correlation data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Sighting {
    pub observation: Observation,
    pub correlation: Correlation,
}

impl Sighting {
    pub fn new(observation: Observation, correlation: Correlation) -> Self {
        Self {
            observation,
            correlation,
        }
    }

    pub fn key(&self) -> IdentityKey {
        self.observation.key
    }
}

pub(crate) fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

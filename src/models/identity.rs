//! Resolved participant records and the keys that identify them.
//!
//! Two key spaces exist and never mix: `Authoritative` ids come straight from
//! the export, `Synthesized` keys are derived from a display name, handle or
//! unrecognized identifier string. A participant seen with a numeric id in one
//! export and only by display name in another therefore yields two identities.

use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

// ═══════════════════════════════════════════
// Identity key
// ═══════════════════════════════════════════

/// Canonical merge key for an identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum IdentityKey {
    Authoritative(i64),
    Synthesized(u64),
}

/// What a synthesized key was derived from. Each source hashes in its own
/// namespace so a display name never collides with an identical handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    Name,
    Handle,
    Reference,
}

impl KeySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Handle => "handle",
            Self::Reference => "ref",
        }
    }
}

impl IdentityKey {
    /// Derive a fallback key: the first 8 bytes (big-endian) of
    /// SHA-256 over `"<namespace>:<normalized text>"`.
    ///
    /// Names are whitespace-collapsed, handles are lowercased and stripped of
    /// a leading `@`. Stable across runs and machines.
    pub fn synthesize(source: KeySource, text: &str) -> Self {
        let normalized = match source {
            KeySource::Name => collapse_whitespace(text),
            KeySource::Handle => text.trim().trim_start_matches('@').to_lowercase(),
            KeySource::Reference => text.trim().to_string(),
        };

        let mut hasher = Sha256::new();
        hasher.update(source.as_str().as_bytes());
        hasher.update(b":");
        hasher.update(normalized.as_bytes());
        let digest = hasher.finalize();

        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&digest[..8]);
        Self::Synthesized(u64::from_be_bytes(prefix))
    }

    pub fn from_name(name: &str) -> Self {
        Self::synthesize(KeySource::Name, name)
    }

    pub fn from_handle(handle: &str) -> Self {
        Self::synthesize(KeySource::Handle, handle)
    }

    pub fn from_reference(reference: &str) -> Self {
        Self::synthesize(KeySource::Reference, reference)
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Authoritative(id) => write!(f, "{id}"),
            Self::Synthesized(hash) => write!(f, "~{hash:016x}"),
        }
    }
}

pub(crate) fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ═══════════════════════════════════════════
// First-occurrence stamps
// ═══════════════════════════════════════════

/// When (and in which message) an identity authored content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageStamp {
    pub at: NaiveDateTime,
    pub id: Option<i64>,
}

impl MessageStamp {
    pub fn new(at: NaiveDateTime, id: Option<i64>) -> Self {
        Self { at, id }
    }

    /// Strictly earlier than `other`. Equal instants fall back to the smaller
    /// message id so the winner does not depend on arrival order.
    pub fn precedes(&self, other: &MessageStamp) -> bool {
        match self.at.cmp(&other.at) {
            std::cmp::Ordering::Less => true,
            std::cmp::Ordering::Greater => false,
            std::cmp::Ordering::Equal => match (self.id, other.id) {
                (Some(a), Some(b)) => a < b,
                (Some(_), None) => true,
                _ => false,
            },
        }
    }
}

/// When (and with which symbol) an identity first reacted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionStamp {
    pub at: NaiveDateTime,
    pub symbol: Option<String>,
}

impl ReactionStamp {
    pub fn new(at: NaiveDateTime, symbol: Option<String>) -> Self {
        Self { at, symbol }
    }

    /// Same tie-break policy as [`MessageStamp::precedes`], on the symbol.
    pub fn precedes(&self, other: &ReactionStamp) -> bool {
        match self.at.cmp(&other.at) {
            std::cmp::Ordering::Less => true,
            std::cmp::Ordering::Greater => false,
            std::cmp::Ordering::Equal => match (&self.symbol, &other.symbol) {
                (Some(a), Some(b)) => a < b,
                (Some(_), None) => true,
                _ => false,
            },
        }
    }
}

// ═══════════════════════════════════════════
// Identity
// ═══════════════════════════════════════════

/// A resolved, deduplicated participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub key: IdentityKey,
    pub handle: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub bio: Option<String>,
    /// Literal reference text (e.g. `@alice_w`) when the identity was
    /// reached through a mention.
    pub mention: Option<String>,
    pub is_bot: bool,
    /// Only ever referenced, never seen authoring or reacting.
    pub is_mention_only: bool,
    /// Profile links to a channel. `None` = no signal either way.
    pub has_channel: Option<bool>,
    pub first_message: Option<MessageStamp>,
    pub first_reaction: Option<ReactionStamp>,
}

impl Identity {
    /// Empty record for `key`, as if nothing had been observed yet.
    pub fn blank(key: IdentityKey) -> Self {
        Self {
            key,
            handle: None,
            first_name: None,
            last_name: None,
            phone: None,
            bio: None,
            mention: None,
            is_bot: false,
            is_mention_only: false,
            has_channel: None,
            first_message: None,
            first_reaction: None,
        }
    }

    /// Joined name parts, or "Unknown".
    pub fn full_name(&self) -> String {
        let parts: Vec<&str> = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .filter(|p| !p.is_empty())
            .collect();
        if parts.is_empty() {
            "Unknown".to_string()
        } else {
            parts.join(" ")
        }
    }

    /// `@handle` when known, otherwise the full name.
    pub fn display_name(&self) -> String {
        match &self.handle {
            Some(handle) => format!("@{handle}"),
            None => self.full_name(),
        }
    }
}

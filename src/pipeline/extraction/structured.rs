//! Structured-record (JSON) exports.
//!
//! Records come in two author shapes:
//! - `"from": "Display Name"` with a secondary `"from_id": "user123"`;
//! - `"from": { "id": 123, "username": ..., ... }` (embedded user object).
//!
//! Besides the author, every message can reference participants through
//! mention entities, `text_mention` entities with an embedded user, free-text
//! `@handle`s, and reaction lists. Each of these becomes its own sighting.

use serde_json::{Map, Value};

use super::{strip_bom, ExportExtractor, FormatError, PassCounters};
use crate::models::observation::non_empty;
use crate::models::{
    Correlation, IdentityKey, MessageStamp, Observation, ReactionStamp, Role, Sighting,
};
use crate::pipeline::normalize::{normalize_value, parse_epoch_text, scan_mentions};

/// Id value the export writes for accounts that no longer exist.
pub const DELETED_ACCOUNT_ID: &str = "deleted_account";

/// Profile substrings that point at a channel.
const CHANNEL_LINK_MARKERS: &[&str] = &["t.me/", "telegram.me/"];

pub struct StructuredExtractor;

impl ExportExtractor for StructuredExtractor {
    fn extract(&self, bytes: &[u8]) -> Result<Vec<Sighting>, FormatError> {
        let root: Value = serde_json::from_slice(strip_bom(bytes))
            .map_err(|e| FormatError::InvalidJson(e.to_string()))?;

        let root = root.as_object().ok_or_else(|| {
            FormatError::UnexpectedShape("top-level value is not an object".into())
        })?;

        let mut pass = StructuredPass::default();
        for message in message_records(root) {
            pass.message(message);
        }

        tracing::debug!(
            records = pass.counters.records,
            skipped = pass.counters.skipped,
            sightings = pass.sightings.len(),
            "Structured export walked"
        );

        Ok(pass.sightings)
    }
}

/// Messages of a single-chat export (`messages`) plus, for full-account
/// exports, every chat under `chats.list[*].messages`.
fn message_records(root: &Map<String, Value>) -> Vec<&Value> {
    let mut records: Vec<&Value> = Vec::new();

    if let Some(messages) = root.get("messages").and_then(Value::as_array) {
        records.extend(messages);
    }

    let chats = root
        .get("chats")
        .and_then(|c| c.get("list"))
        .and_then(Value::as_array);
    for chat in chats.into_iter().flatten() {
        if let Some(messages) = chat.get("messages").and_then(Value::as_array) {
            records.extend(messages);
        }
    }

    records
}

// ═══════════════════════════════════════════
// Per-file pass
// ═══════════════════════════════════════════

#[derive(Default)]
struct StructuredPass {
    sightings: Vec<Sighting>,
    counters: PassCounters,
}

impl StructuredPass {
    fn push(&mut self, observation: Observation, correlation: Correlation) {
        // Tombstones carry no first-occurrence data.
        let correlation = if observation.role.is_deletion() {
            Correlation::none()
        } else {
            correlation
        };
        self.sightings.push(Sighting::new(observation, correlation));
    }

    fn message(&mut self, message: &Value) {
        self.counters.records += 1;

        let Some(record) = message.as_object() else {
            self.skip("message is not an object");
            return;
        };

        let stamp = message_timestamp(record)
            .map(|at| MessageStamp::new(at, record.get("id").and_then(Value::as_i64)));
        let text = flatten_text(record.get("text"));

        if record.contains_key("from") {
            match resolve_sender(record, Role::Author) {
                SenderLookup::Found(mut observation) => {
                    if !observation.role.is_deletion() && observation.phone.is_none() {
                        observation.phone = message_phone(record);
                    }
                    self.push(observation, Correlation::message(stamp));
                }
                SenderLookup::Channel => {
                    tracing::trace!("Channel-authored message, author not a participant");
                }
                SenderLookup::Unusable => self.skip("author field has no usable shape"),
            }
        }

        for observation in entity_mentions(record, &text) {
            self.push(observation, Correlation::none());
        }

        for handle in scan_mentions(Some(&text)) {
            self.push(mention_observation(&handle), Correlation::none());
        }

        self.reactions(record);
    }

    fn reactions(&mut self, record: &Map<String, Value>) {
        let Some(reactions) = record.get("reactions").and_then(Value::as_array) else {
            return;
        };

        for reaction in reactions {
            let symbol = reaction_symbol(reaction);
            let Some(reactors) = reaction.get("recent").and_then(Value::as_array) else {
                continue;
            };

            for reactor in reactors {
                let Some(reactor) = reactor.as_object() else {
                    self.skip("reactor is not an object");
                    continue;
                };

                match resolve_sender(reactor, Role::Reactor) {
                    SenderLookup::Found(observation) => {
                        let stamp = reactor
                            .get("date")
                            .and_then(normalize_value)
                            .map(|at| ReactionStamp::new(at, symbol.clone()));
                        self.push(observation, Correlation::reaction(stamp));
                    }
                    SenderLookup::Channel => {}
                    SenderLookup::Unusable => self.skip("reactor has no usable shape"),
                }
            }
        }
    }

    fn skip(&mut self, reason: &'static str) {
        self.counters.skipped += 1;
        tracing::debug!(reason, "Record skipped");
    }
}

// ═══════════════════════════════════════════
// Sender resolution (authors and reactors)
// ═══════════════════════════════════════════

enum SenderLookup {
    Found(Observation),
    /// Channels post and react too, but are not participants.
    Channel,
    Unusable,
}

/// Decoded secondary identifier (`from_id`).
#[derive(Debug, PartialEq, Eq)]
enum SenderRef {
    User(i64),
    Channel,
    Other(String),
    Missing,
}

fn decode_sender_ref(value: Option<&Value>) -> SenderRef {
    match value {
        Some(Value::String(raw)) => decode_sender_text(raw),
        Some(Value::Number(number)) => number.as_i64().map_or(SenderRef::Missing, SenderRef::User),
        _ => SenderRef::Missing,
    }
}

fn decode_sender_text(raw: &str) -> SenderRef {
    let raw = raw.trim();
    if raw.is_empty() {
        return SenderRef::Missing;
    }
    if let Some(id) = raw.strip_prefix("user").and_then(|d| d.parse::<i64>().ok()) {
        return SenderRef::User(id);
    }
    if raw
        .strip_prefix("channel")
        .is_some_and(|d| !d.is_empty() && d.bytes().all(|b| b.is_ascii_digit()))
    {
        return SenderRef::Channel;
    }
    SenderRef::Other(raw.to_string())
}

/// Shared by message authors and reactors: both carry `from` (string, object
/// or null) and optionally `from_id`.
fn resolve_sender(record: &Map<String, Value>, role: Role) -> SenderLookup {
    match record.get("from") {
        Some(Value::String(name)) => from_display_name(name, record.get("from_id"), role),
        Some(Value::Object(user)) => from_user_object(user, role),
        Some(Value::Null) => match decode_sender_ref(record.get("from_id")) {
            // Deleted accounts keep their id but lose their name.
            SenderRef::User(id) => {
                SenderLookup::Found(Observation::tombstone(IdentityKey::Authoritative(id)))
            }
            SenderRef::Channel => SenderLookup::Channel,
            _ => SenderLookup::Unusable,
        },
        // No `from` at all is a partial record, not a deletion.
        None => match decode_sender_ref(record.get("from_id")) {
            SenderRef::User(id) => {
                SenderLookup::Found(Observation::new(IdentityKey::Authoritative(id), role))
            }
            SenderRef::Channel => SenderLookup::Channel,
            SenderRef::Other(reference) => SenderLookup::Found(Observation::new(
                IdentityKey::from_reference(&reference),
                role,
            )),
            SenderRef::Missing => SenderLookup::Unusable,
        },
        Some(_) => SenderLookup::Unusable,
    }
}

fn from_display_name(name: &str, from_id: Option<&Value>, role: Role) -> SenderLookup {
    let key = match decode_sender_ref(from_id) {
        SenderRef::User(id) => IdentityKey::Authoritative(id),
        SenderRef::Channel => return SenderLookup::Channel,
        SenderRef::Other(reference) => IdentityKey::from_reference(&reference),
        SenderRef::Missing if name.trim().is_empty() => return SenderLookup::Unusable,
        SenderRef::Missing => IdentityKey::from_name(name),
    };

    SenderLookup::Found(Observation::new(key, role).with_display_name(name))
}

/// Embedded user object, as found in `from` and in `text_mention` entities.
fn from_user_object(user: &Map<String, Value>, role: Role) -> SenderLookup {
    let key = match user.get("id") {
        Some(Value::String(id)) if id == DELETED_ACCOUNT_ID => {
            return SenderLookup::Found(Observation::tombstone(IdentityKey::from_reference(id)));
        }
        Some(Value::Number(id)) => id.as_i64().map(IdentityKey::Authoritative),
        Some(Value::String(id)) => match id.trim().parse::<i64>() {
            Ok(id) => Some(IdentityKey::Authoritative(id)),
            Err(_) => match decode_sender_text(id) {
                SenderRef::User(id) => Some(IdentityKey::Authoritative(id)),
                SenderRef::Channel => return SenderLookup::Channel,
                SenderRef::Other(reference) => Some(IdentityKey::from_reference(&reference)),
                SenderRef::Missing => None,
            },
        },
        _ => None,
    };

    let handle = string_field(user, "username");
    let first_name = string_field(user, "first_name");
    let last_name = string_field(user, "last_name");

    // Without an id, fall back to whatever names the object carries.
    let key = match key {
        Some(key) => key,
        None => match (&handle, &first_name) {
            (Some(handle), _) => IdentityKey::from_handle(handle),
            (None, Some(first)) => {
                let full = match &last_name {
                    Some(last) => format!("{first} {last}"),
                    None => first.clone(),
                };
                IdentityKey::from_name(&full)
            }
            (None, None) => return SenderLookup::Unusable,
        },
    };

    let bio = string_field(user, "bio");
    let mut observation = Observation::new(key, role);
    observation.has_channel = detect_channel(bio.as_deref());
    observation.handle = handle;
    observation.first_name = first_name;
    observation.last_name = last_name;
    observation.bio = bio;
    observation.phone = user.get("phone_number").and_then(value_as_text);
    observation.is_bot = user.get("is_bot").and_then(Value::as_bool).unwrap_or(false);

    SenderLookup::Found(observation)
}

/// A profile text that links a channel is a positive signal; anything else
/// says nothing either way.
fn detect_channel(bio: Option<&str>) -> Option<bool> {
    let bio = bio?.to_lowercase();
    if CHANNEL_LINK_MARKERS.iter().any(|marker| bio.contains(marker)) {
        Some(true)
    } else {
        None
    }
}

// ═══════════════════════════════════════════
// Mentions
// ═══════════════════════════════════════════

fn mention_observation(handle: &str) -> Observation {
    let mut observation =
        Observation::new(IdentityKey::from_handle(handle), Role::Mention).with_handle(Some(handle));
    observation.mention = Some(format!("@{handle}"));
    observation
}

/// Mentions declared through entity annotations. Uses `entities`, or
/// `text_entities` when the former is absent or empty.
fn entity_mentions(record: &Map<String, Value>, text: &str) -> Vec<Observation> {
    let entities = match record.get("entities").and_then(Value::as_array) {
        Some(entities) if !entities.is_empty() => Some(entities),
        _ => record.get("text_entities").and_then(Value::as_array),
    };

    let mut observations = Vec::new();
    for entity in entities.into_iter().flatten() {
        let Some(entity) = entity.as_object() else {
            continue;
        };

        match entity.get("type").and_then(Value::as_str) {
            Some("mention") => {
                if let Some(handle) = mention_entity_handle(entity, text) {
                    observations.push(mention_observation(&handle));
                }
            }
            Some("text_mention") => {
                let user = entity.get("user").and_then(Value::as_object);
                if let Some(SenderLookup::Found(observation)) =
                    user.map(|user| from_user_object(user, Role::Mention))
                {
                    observations.push(observation);
                }
            }
            Some("mention_name") => {
                let Some(user_id) = entity.get("user_id").and_then(Value::as_i64) else {
                    continue;
                };
                let name = entity.get("text").and_then(Value::as_str).unwrap_or("");
                observations.push(
                    Observation::new(IdentityKey::Authoritative(user_id), Role::Mention)
                        .with_display_name(name),
                );
            }
            _ => {}
        }
    }
    observations
}

/// Slice the message text by the entity's `offset`/`length` (in characters),
/// or use the entity's own `text` when no span is declared.
fn mention_entity_handle(entity: &Map<String, Value>, text: &str) -> Option<String> {
    let offset = entity.get("offset").and_then(Value::as_u64);
    let length = entity.get("length").and_then(Value::as_u64);

    let literal: String = match (offset, length) {
        (Some(offset), Some(length)) => text
            .chars()
            .skip(offset as usize)
            .take(length as usize)
            .collect(),
        _ => entity.get("text").and_then(Value::as_str)?.to_string(),
    };

    let handle = literal.trim().strip_prefix('@')?;
    non_empty(handle)
}

// ═══════════════════════════════════════════
// Message fields
// ═══════════════════════════════════════════

/// `date` through the normalizer, else the `date_unixtime` epoch string.
fn message_timestamp(record: &Map<String, Value>) -> Option<chrono::NaiveDateTime> {
    record
        .get("date")
        .and_then(normalize_value)
        .or_else(|| match record.get("date_unixtime") {
            Some(Value::String(text)) => parse_epoch_text(text),
            Some(value @ Value::Number(_)) => normalize_value(value),
            _ => None,
        })
}

/// Message text is either a plain string or an array of plain strings and
/// typed segments (`{"type": "mention", "text": "@alice_w"}`); segments are
/// concatenated in order.
fn flatten_text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Array(parts)) => parts
            .iter()
            .filter_map(|part| match part {
                Value::String(text) => Some(text.as_str()),
                Value::Object(segment) => segment.get("text").and_then(Value::as_str),
                _ => None,
            })
            .collect(),
        _ => String::new(),
    }
}

/// Phone number shared in the message (contact cards, phone entities).
fn message_phone(record: &Map<String, Value>) -> Option<String> {
    if let Some(phone) = record.get("phone_number").and_then(value_as_text) {
        return Some(phone);
    }

    if let Some(parts) = record.get("text").and_then(Value::as_array) {
        let phone = parts
            .iter()
            .filter_map(Value::as_object)
            .filter(|segment| segment.get("type").and_then(Value::as_str) == Some("phone"))
            .find_map(|segment| segment.get("text").and_then(value_as_text));
        if phone.is_some() {
            return phone;
        }
    }

    ["contact_info", "contact", "media"].iter().find_map(|field| {
        record
            .get(*field)
            .and_then(Value::as_object)
            .and_then(|card| card.get("phone_number"))
            .and_then(value_as_text)
    })
}

/// Reaction symbol: the emoji, or `custom_emoji:<document>` for custom ones.
fn reaction_symbol(reaction: &Value) -> Option<String> {
    if let Some(emoji) = reaction.get("emoji").and_then(Value::as_str).and_then(non_empty) {
        return Some(emoji);
    }
    reaction
        .get("document_id")
        .and_then(value_as_text)
        .map(|document| format!("custom_emoji:{document}"))
}

fn string_field(object: &Map<String, Value>, field: &str) -> Option<String> {
    object.get(field).and_then(Value::as_str).and_then(non_empty)
}

fn value_as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => non_empty(text),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

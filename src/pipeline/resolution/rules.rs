//! Per-field merge rules.
//!
//! Every field of [`Identity`] is governed by exactly one rule in
//! [`FIELD_RULES`]. [`merge_into`] walks the table, so changing how a field
//! merges means changing one row.

use crate::models::{Identity, MessageStamp, ReactionStamp};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Handle,
    FirstName,
    LastName,
    Phone,
    Bio,
    Mention,
    IsBot,
    IsMentionOnly,
    HasChannel,
    FirstMessage,
    FirstReaction,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Handle => "handle",
            Self::FirstName => "first_name",
            Self::LastName => "last_name",
            Self::Phone => "phone",
            Self::Bio => "bio",
            Self::Mention => "mention",
            Self::IsBot => "is_bot",
            Self::IsMentionOnly => "is_mention_only",
            Self::HasChannel => "has_channel",
            Self::FirstMessage => "first_message",
            Self::FirstReaction => "first_reaction",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeRule {
    /// A present incoming value replaces the stored one.
    LatestWins,
    /// The stored value is kept once set.
    FirstWins,
    /// Once true, stays true.
    Latch,
    /// Starts true, cleared by the first false; never set again.
    ClearOnce,
    /// Keeps the strongest signal: `None < Some(false) < Some(true)`.
    Strongest,
    /// Keeps the earliest stamp; ties go to the smaller tie-break value.
    Earliest,
}

pub const FIELD_RULES: &[(Field, MergeRule)] = &[
    (Field::Handle, MergeRule::LatestWins),
    (Field::FirstName, MergeRule::FirstWins),
    (Field::LastName, MergeRule::FirstWins),
    (Field::Phone, MergeRule::FirstWins),
    (Field::Bio, MergeRule::FirstWins),
    (Field::Mention, MergeRule::FirstWins),
    (Field::IsBot, MergeRule::Latch),
    (Field::IsMentionOnly, MergeRule::ClearOnce),
    (Field::HasChannel, MergeRule::Strongest),
    (Field::FirstMessage, MergeRule::Earliest),
    (Field::FirstReaction, MergeRule::Earliest),
];

/// Fold `incoming` into `existing`. Both must share a key.
pub fn merge_into(existing: &mut Identity, incoming: Identity) {
    debug_assert_eq!(existing.key, incoming.key);

    let Identity {
        key: _,
        handle,
        first_name,
        last_name,
        phone,
        bio,
        mention,
        is_bot,
        is_mention_only,
        has_channel,
        first_message,
        first_reaction,
    } = incoming;

    for &(field, rule) in FIELD_RULES {
        match field {
            Field::Handle => merge_text(rule, &mut existing.handle, handle.clone()),
            Field::FirstName => merge_text(rule, &mut existing.first_name, first_name.clone()),
            Field::LastName => merge_text(rule, &mut existing.last_name, last_name.clone()),
            Field::Phone => merge_text(rule, &mut existing.phone, phone.clone()),
            Field::Bio => merge_text(rule, &mut existing.bio, bio.clone()),
            Field::Mention => merge_text(rule, &mut existing.mention, mention.clone()),
            Field::IsBot => merge_flag(rule, &mut existing.is_bot, is_bot),
            Field::IsMentionOnly => {
                merge_flag(rule, &mut existing.is_mention_only, is_mention_only)
            }
            Field::HasChannel => merge_signal(rule, &mut existing.has_channel, has_channel),
            Field::FirstMessage => merge_stamp(
                rule,
                &mut existing.first_message,
                first_message.clone(),
                MessageStamp::precedes,
            ),
            Field::FirstReaction => merge_stamp(
                rule,
                &mut existing.first_reaction,
                first_reaction.clone(),
                ReactionStamp::precedes,
            ),
        }
    }
}

fn merge_text(rule: MergeRule, slot: &mut Option<String>, incoming: Option<String>) {
    let Some(value) = incoming else {
        return;
    };
    match rule {
        MergeRule::LatestWins => *slot = Some(value),
        MergeRule::FirstWins if slot.is_none() => *slot = Some(value),
        MergeRule::FirstWins => {}
        other => tracing::warn!(rule = ?other, "Rule not applicable to text field"),
    }
}

fn merge_flag(rule: MergeRule, slot: &mut bool, incoming: bool) {
    match rule {
        MergeRule::Latch => *slot |= incoming,
        MergeRule::ClearOnce => *slot &= incoming,
        MergeRule::LatestWins => *slot = incoming,
        other => tracing::warn!(rule = ?other, "Rule not applicable to flag field"),
    }
}

fn merge_signal(rule: MergeRule, slot: &mut Option<bool>, incoming: Option<bool>) {
    match rule {
        // Option<bool> orders None < Some(false) < Some(true).
        MergeRule::Strongest => *slot = (*slot).max(incoming),
        MergeRule::LatestWins if incoming.is_some() => *slot = incoming,
        MergeRule::FirstWins if slot.is_none() => *slot = incoming,
        MergeRule::LatestWins | MergeRule::FirstWins => {}
        other => tracing::warn!(rule = ?other, "Rule not applicable to signal field"),
    }
}

fn merge_stamp<T>(
    rule: MergeRule,
    slot: &mut Option<T>,
    incoming: Option<T>,
    precedes: fn(&T, &T) -> bool,
) {
    let Some(candidate) = incoming else {
        return;
    };
    match rule {
        MergeRule::Earliest => {
            let replace = match slot.as_ref() {
                Some(current) => precedes(&candidate, current),
                None => true,
            };
            if replace {
                *slot = Some(candidate);
            }
        }
        MergeRule::LatestWins => *slot = Some(candidate),
        MergeRule::FirstWins if slot.is_none() => *slot = Some(candidate),
        MergeRule::FirstWins => {}
        other => tracing::warn!(rule = ?other, "Rule not applicable to stamp field"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::IdentityKey;
    use chrono::{NaiveDate, NaiveDateTime};

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn blank() -> Identity {
        Identity::blank(IdentityKey::Authoritative(1))
    }

    #[test]
    fn every_field_has_exactly_one_rule() {
        let fields = [
            Field::Handle,
            Field::FirstName,
            Field::LastName,
            Field::Phone,
            Field::Bio,
            Field::Mention,
            Field::IsBot,
            Field::IsMentionOnly,
            Field::HasChannel,
            Field::FirstMessage,
            Field::FirstReaction,
        ];
        assert_eq!(FIELD_RULES.len(), fields.len());
        for field in fields {
            let count = FIELD_RULES.iter().filter(|(f, _)| *f == field).count();
            assert_eq!(count, 1, "{}", field.as_str());
        }
    }

    #[test]
    fn rule_lookup() {
        let rule = |field: Field| FIELD_RULES.iter().find(|(f, _)| *f == field).map(|(_, r)| *r);
        assert_eq!(rule(Field::Handle), Some(MergeRule::LatestWins));
        assert_eq!(rule(Field::Bio), Some(MergeRule::FirstWins));
        assert_eq!(rule(Field::FirstMessage), Some(MergeRule::Earliest));
    }

    #[test]
    fn handle_latest_wins_but_absent_does_not_erase() {
        let mut existing = blank();
        existing.handle = Some("old".into());

        let mut incoming = blank();
        incoming.handle = Some("new".into());
        merge_into(&mut existing, incoming);
        assert_eq!(existing.handle.as_deref(), Some("new"));

        merge_into(&mut existing, blank());
        assert_eq!(existing.handle.as_deref(), Some("new"));
    }

    #[test]
    fn names_first_wins() {
        let mut existing = blank();
        existing.first_name = Some("Ann".into());

        let mut incoming = blank();
        incoming.first_name = Some("Anna".into());
        incoming.last_name = Some("Lee".into());
        merge_into(&mut existing, incoming);

        assert_eq!(existing.first_name.as_deref(), Some("Ann"));
        assert_eq!(existing.last_name.as_deref(), Some("Lee"));
    }

    #[test]
    fn bot_flag_latches() {
        let mut existing = blank();
        let mut incoming = blank();
        incoming.is_bot = true;
        merge_into(&mut existing, incoming);
        merge_into(&mut existing, blank());
        assert!(existing.is_bot);
    }

    #[test]
    fn mention_only_clears_once() {
        let mut existing = blank();
        existing.is_mention_only = true;

        let mut mention = blank();
        mention.is_mention_only = true;
        merge_into(&mut existing, mention.clone());
        assert!(existing.is_mention_only);

        merge_into(&mut existing, blank());
        assert!(!existing.is_mention_only);

        merge_into(&mut existing, mention);
        assert!(!existing.is_mention_only);
    }

    #[test]
    fn channel_signal_keeps_strongest() {
        let mut existing = blank();
        let mut negative = blank();
        negative.has_channel = Some(false);
        let mut positive = blank();
        positive.has_channel = Some(true);

        merge_into(&mut existing, negative.clone());
        assert_eq!(existing.has_channel, Some(false));
        merge_into(&mut existing, positive);
        assert_eq!(existing.has_channel, Some(true));
        merge_into(&mut existing, negative);
        merge_into(&mut existing, blank());
        assert_eq!(existing.has_channel, Some(true));
    }

    #[test]
    fn earliest_reaction_keeps_its_symbol() {
        let mut existing = blank();
        existing.first_reaction = Some(ReactionStamp::new(at(12, 0), Some("❤".into())));

        let mut earlier = blank();
        earlier.first_reaction = Some(ReactionStamp::new(at(9, 0), Some("👍".into())));
        merge_into(&mut existing, earlier);

        let mut later = blank();
        later.first_reaction = Some(ReactionStamp::new(at(15, 0), Some("🔥".into())));
        merge_into(&mut existing, later);

        assert_eq!(
            existing.first_reaction,
            Some(ReactionStamp::new(at(9, 0), Some("👍".into())))
        );
    }

    #[test]
    fn earliest_message_tie_goes_to_smaller_id() {
        let mut existing = blank();
        existing.first_message = Some(MessageStamp::new(at(9, 0), Some(8)));

        let mut tie = blank();
        tie.first_message = Some(MessageStamp::new(at(9, 0), Some(3)));
        merge_into(&mut existing, tie);

        assert_eq!(existing.first_message, Some(MessageStamp::new(at(9, 0), Some(3))));
    }
}

//! Markup (HTML) exports.
//!
//! Each message is a `div.message` block with optional `div.date`,
//! `div.from_name` and `div.text` children. Consecutive messages by the same
//! author are written as "joined" blocks without a `div.from_name`; those
//! inherit the author of the preceding block. Service blocks (joins, pins,
//! title changes) break the chain.
//!
//! Markup carries no numeric ids, so every key here is synthesized.

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

use super::{strip_bom, ExportExtractor, FormatError, PassCounters};
use crate::models::identity::collapse_whitespace;
use crate::models::{Correlation, IdentityKey, MessageStamp, Observation, Role, Sighting};
use crate::pipeline::normalize::{parse_markup_timestamp, scan_mentions};

static MESSAGE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("div.message").unwrap());
static DATE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("div.date").unwrap());
static FROM_NAME: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.from_name").unwrap());
static TEXT: LazyLock<Selector> = LazyLock::new(|| Selector::parse("div.text").unwrap());

pub struct MarkupExtractor;

impl ExportExtractor for MarkupExtractor {
    fn extract(&self, bytes: &[u8]) -> Result<Vec<Sighting>, FormatError> {
        let source = std::str::from_utf8(strip_bom(bytes))
            .map_err(|e| FormatError::Encoding(e.to_string()))?;

        let document = Html::parse_document(source);
        let mut counters = PassCounters::default();
        let mut sightings = Vec::new();
        let mut last_author: Option<String> = None;

        for block in document.select(&MESSAGE) {
            counters.records += 1;

            if has_class(block, "service") {
                last_author = None;
                continue;
            }

            let stamp = block_timestamp(block).map(|at| MessageStamp::new(at, block_id(block)));

            let author = match block_author(block) {
                Some(name) => {
                    last_author = Some(name.clone());
                    Some(name)
                }
                None if has_class(block, "joined") => last_author.clone(),
                None => None,
            };

            match author {
                Some(name) => {
                    let observation = Observation::new(IdentityKey::from_name(&name), Role::Author)
                        .with_display_name(&name);
                    sightings.push(Sighting::new(observation, Correlation::message(stamp)));
                }
                None => {
                    counters.skipped += 1;
                    tracing::debug!("Message block without author");
                }
            }

            let text = block
                .select(&TEXT)
                .next()
                .map(|element| element.text().collect::<String>());
            for handle in scan_mentions(text.as_deref()) {
                let mut observation =
                    Observation::new(IdentityKey::from_handle(&handle), Role::Mention)
                        .with_handle(Some(&handle));
                observation.mention = Some(format!("@{handle}"));
                sightings.push(Sighting::new(observation, Correlation::none()));
            }
        }

        tracing::debug!(
            records = counters.records,
            skipped = counters.skipped,
            sightings = sightings.len(),
            "Markup export walked"
        );

        Ok(sightings)
    }
}

fn has_class(element: ElementRef<'_>, class: &str) -> bool {
    element.value().classes().any(|c| c == class)
}

/// `title` attribute when present and non-empty, otherwise the element text.
fn block_timestamp(block: ElementRef<'_>) -> Option<chrono::NaiveDateTime> {
    let date = block.select(&DATE).next()?;
    match date.value().attr("title").map(str::trim) {
        Some(title) if !title.is_empty() => parse_markup_timestamp(title),
        _ => parse_markup_timestamp(&date.text().collect::<String>()),
    }
}

/// `id="message123"` → 123.
fn block_id(block: ElementRef<'_>) -> Option<i64> {
    block
        .value()
        .id()?
        .strip_prefix("message")?
        .parse()
        .ok()
}

/// Author display name. Only the element's own text nodes count, so nested
/// annotations (bot "via @x" markers, dates of forwarded content) stay out of
/// the name; falls back to the full text when there are no direct nodes.
fn block_author(block: ElementRef<'_>) -> Option<String> {
    let from = block.select(&FROM_NAME).next()?;

    let direct: String = from
        .children()
        .filter_map(|node| node.value().as_text())
        .map(|text| &**text)
        .collect();
    let name = match collapse_whitespace(&direct) {
        name if !name.is_empty() => name,
        _ => collapse_whitespace(&from.text().collect::<String>()),
    };

    (!name.is_empty()).then_some(name)
}

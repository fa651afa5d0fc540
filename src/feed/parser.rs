use chrono::DateTime;
use thiserror::Error;

use super::atom;
use super::model::{
    AlbumRecord, Funding, ParsedFeed, PublisherInfo, PublisherRecord, RemoteItem, Track,
    ValueBlock, ValueRecipient,
};
use super::xml::{self, Element};
use crate::util::clean_text;

pub(crate) const UNKNOWN_ARTIST: &str = "Unknown Artist";

/// Errors that make a feed document unusable.
#[derive(Debug, Error)]
pub enum ParseError {
    /// Not well-formed XML
    #[error("Invalid XML: {0}")]
    InvalidXml(String),
    /// SEC-003: nesting beyond the safety limit
    #[error("XML nesting depth exceeds maximum of {0} levels")]
    TooDeep(usize),
    /// Well-formed XML that is neither RSS nor Atom
    #[error("Not a feed: unexpected root element <{0}>")]
    NotAFeed(String),
    /// A field every record needs is absent
    #[error("Missing required field: {0}")]
    MissingField(&'static str),
    /// An album feed without a single playable item
    #[error("Album has no tracks with an enclosure")]
    NoTracks,
    /// Atom document rejected by feed-rs
    #[error("Atom parse error: {0}")]
    Atom(String),
}

impl ParseError {
    pub fn kind(&self) -> &'static str {
        match self {
            ParseError::InvalidXml(_) | ParseError::TooDeep(_) | ParseError::Atom(_) => {
                "invalid_xml"
            }
            ParseError::NotAFeed(_) => "not_a_feed",
            ParseError::MissingField(_) | ParseError::NoTracks => "missing_field",
        }
    }
}

/// Parse a raw feed document into an album or publisher record.
///
/// RSS 2.0 documents are mapped with iTunes and Podcasting 2.0 fallbacks;
/// Atom documents are handed to feed-rs. The function is pure: the same
/// bytes always produce the same record.
///
/// # Errors
///
/// - [`ParseError::InvalidXml`] / [`ParseError::TooDeep`] for malformed input
/// - [`ParseError::NotAFeed`] when the root is neither `<rss>` nor `<feed>`
/// - [`ParseError::MissingField`] when the title is missing
/// - [`ParseError::NoTracks`] for album feeds without any enclosure
pub fn parse_feed(bytes: &[u8]) -> Result<ParsedFeed, ParseError> {
    let root = xml::parse_document(bytes)?;

    match root.name.as_str() {
        "rss" => {
            let channel = root
                .child("channel")
                .ok_or(ParseError::MissingField("channel"))?;
            parse_channel(channel)
        }
        "feed" => atom::parse_atom(bytes).map(ParsedFeed::Album),
        other => Err(ParseError::NotAFeed(other.to_string())),
    }
}

fn parse_channel(channel: &Element) -> Result<ParsedFeed, ParseError> {
    if is_publisher_channel(channel) {
        return parse_publisher(channel).map(ParsedFeed::Publisher);
    }
    parse_album(channel).map(ParsedFeed::Album)
}

/// Publisher feeds declare `<podcast:medium>publisher</podcast:medium>` or
/// list the feeds they publish as channel-level remote items.
fn is_publisher_channel(channel: &Element) -> bool {
    let medium = channel.child_text("podcast:medium");
    if medium.is_some_and(|m| m.eq_ignore_ascii_case("publisher")) {
        return true;
    }
    medium.is_none() && channel.child("podcast:remoteItem").is_some()
}

fn parse_album(channel: &Element) -> Result<AlbumRecord, ParseError> {
    let title = channel_title(channel)?;
    let explicit = channel.child_text("itunes:explicit").is_some_and(parse_explicit);

    let mut tracks: Vec<Track> = Vec::new();
    let mut explicit_numbers = true;
    for (position, item) in channel.children_named("item").enumerate() {
        let number = explicit_track_number(item);
        explicit_numbers &= number.is_some();
        match parse_track(item, number.unwrap_or(position as u32 + 1), explicit) {
            Some(track) => tracks.push(track),
            None => tracing::debug!(position = position, "Skipping item without enclosure"),
        }
    }

    if tracks.is_empty() {
        return Err(ParseError::NoTracks);
    }
    // Explicit numbering wins over document order only when every item has one
    if explicit_numbers {
        tracks.sort_by_key(|t| t.track_number);
    }

    let cover_art = podcast_images(channel)
        .or_else(|| itunes_image(channel))
        .or_else(|| channel.children_named("item").find_map(item_image))
        .or_else(|| {
            channel
                .child("image")
                .and_then(|i| i.child_text("url"))
                .map(owned)
        });

    Ok(AlbumRecord {
        title,
        artist: channel_artist(channel),
        description: channel_description(channel),
        cover_art,
        link: channel.child_text("link").map(owned),
        language: channel.child_text("language").map(owned),
        explicit,
        podcast_guid: channel.child_text("podcast:guid").map(owned),
        medium: channel.child_text("podcast:medium").map(owned),
        tracks,
        podroll: channel
            .child("podcast:podroll")
            .map(|p| remote_items(p).collect())
            .unwrap_or_default(),
        publisher: channel
            .child("podcast:publisher")
            .and_then(|p| remote_items(p).next()),
        funding: channel.children_named("podcast:funding").filter_map(funding).collect(),
        value: channel.child("podcast:value").and_then(value_block),
    })
}

fn parse_publisher(channel: &Element) -> Result<PublisherRecord, ParseError> {
    let title = channel_title(channel)?;

    let mut items = Vec::new();
    for element in channel.children_named("podcast:remoteItem") {
        match remote_item(element) {
            Some(item) => items.push(item),
            None => tracing::debug!(publisher = %title, "Skipping remote item without feedGuid"),
        }
    }

    Ok(PublisherRecord {
        info: PublisherInfo {
            artist: channel_artist(channel),
            description: channel_description(channel),
            cover_art: podcast_images(channel).or_else(|| itunes_image(channel)),
            link: channel.child_text("link").map(owned),
            podcast_guid: channel.child_text("podcast:guid").map(owned),
            title,
        },
        items,
    })
}

// ============================================================================
// Channel fields
// ============================================================================

fn channel_title(channel: &Element) -> Result<String, ParseError> {
    channel
        .child_text("title")
        .or_else(|| channel.child_text("itunes:title"))
        .map(owned)
        .ok_or(ParseError::MissingField("title"))
}

fn channel_artist(channel: &Element) -> String {
    channel
        .child_text("itunes:author")
        .or_else(|| channel.child_text("author"))
        .or_else(|| channel.child_text("managingEditor"))
        .or_else(|| channel.child_text("podcast:person"))
        .map(owned)
        .unwrap_or_else(|| UNKNOWN_ARTIST.to_string())
}

fn channel_description(channel: &Element) -> String {
    channel
        .child_text("description")
        .or_else(|| channel.child_text("itunes:summary"))
        .or_else(|| channel.child_text("itunes:subtitle"))
        .map(owned)
        .unwrap_or_default()
}

/// Picks the widest candidate of a `srcset`-style `<podcast:images>` tag,
/// falling back to the first candidate when no width descriptors are given.
fn podcast_images(element: &Element) -> Option<String> {
    let srcset = element.child("podcast:images")?.attr("srcset")?;

    let candidates: Vec<(&str, Option<u32>)> = srcset
        .split(',')
        .filter_map(|candidate| {
            let mut parts = candidate.split_whitespace();
            let url = parts.next()?;
            let width = parts
                .next()
                .and_then(|d| d.strip_suffix('w'))
                .and_then(|w| w.parse().ok());
            Some((url, width))
        })
        .collect();

    let mut best: Option<(&str, u32)> = None;
    for &(url, width) in &candidates {
        if let Some(w) = width {
            if best.map_or(true, |(_, b)| w > b) {
                best = Some((url, w));
            }
        }
    }

    best.map(|(url, _)| url)
        .or_else(|| candidates.first().map(|(url, _)| *url))
        .map(owned)
}

fn itunes_image(element: &Element) -> Option<String> {
    element
        .child("itunes:image")
        .and_then(|i| i.attr("href").or_else(|| i.text()))
        .map(owned)
}

/// Same precedence as the channel: `podcast:images` before `itunes:image`.
fn item_image(item: &Element) -> Option<String> {
    podcast_images(item).or_else(|| itunes_image(item))
}

// ============================================================================
// Items
// ============================================================================

fn parse_track(item: &Element, track_number: u32, channel_explicit: bool) -> Option<Track> {
    let url = item.child("enclosure").and_then(|e| e.attr("url"))?;

    let title = item
        .child_text("title")
        .or_else(|| item.child_text("itunes:title"))
        .map(owned)
        .unwrap_or_else(|| format!("Track {track_number}"));

    Some(Track {
        title,
        duration: item
            .child_text("itunes:duration")
            .and_then(parse_duration)
            .unwrap_or(0),
        url: url.to_string(),
        track_number,
        subtitle: item.child_text("itunes:subtitle").map(owned),
        summary: item
            .child_text("itunes:summary")
            .or_else(|| item.child_text("description"))
            .map(owned),
        image: item_image(item),
        explicit: item
            .child_text("itunes:explicit")
            .map_or(channel_explicit, parse_explicit),
        keywords: item
            .child_text("itunes:keywords")
            .map(split_keywords)
            .unwrap_or_default(),
        guid: item.child_text("guid").map(owned),
        published: item
            .child_text("pubDate")
            .and_then(|d| DateTime::parse_from_rfc2822(d).ok())
            .map(|d| d.to_rfc3339()),
    })
}

fn explicit_track_number(item: &Element) -> Option<u32> {
    item.child_text("podcast:episode")
        .or_else(|| item.child_text("itunes:episode"))
        .and_then(|n| n.parse::<f64>().ok())
        .filter(|n| n.is_finite() && *n >= 1.0 && *n <= u32::MAX as f64)
        .map(|n| n as u32)
}

/// Parses `HH:MM:SS`, `MM:SS` or plain seconds (fractions are truncated).
pub(crate) fn parse_duration(raw: &str) -> Option<u64> {
    let parts: Vec<&str> = raw.trim().split(':').collect();
    if parts.len() > 3 {
        return None;
    }

    let mut total: f64 = 0.0;
    for part in &parts {
        let value: f64 = part.trim().parse().ok()?;
        if !value.is_finite() || value < 0.0 {
            return None;
        }
        total = total * 60.0 + value;
    }
    Some(total as u64)
}

pub(crate) fn parse_explicit(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "yes" | "true" | "explicit"
    )
}

fn split_keywords(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(owned)
        .collect()
}

// ============================================================================
// Podcasting 2.0 extensions
// ============================================================================

fn remote_items(parent: &Element) -> impl Iterator<Item = RemoteItem> + '_ {
    parent
        .children_named("podcast:remoteItem")
        .filter_map(remote_item)
}

/// A remote item is only usable with a `feedGuid`.
fn remote_item(element: &Element) -> Option<RemoteItem> {
    Some(RemoteItem {
        feed_guid: element.attr("feedGuid")?.to_string(),
        feed_url: element.attr("feedUrl").map(owned),
        item_guid: element.attr("itemGuid").map(owned),
        medium: element.attr("medium").map(owned),
        title: element.attr("title").or_else(|| element.text()).map(owned),
    })
}

fn funding(element: &Element) -> Option<Funding> {
    let url = element.attr("url")?;
    Some(Funding {
        url: url.to_string(),
        message: element.text().map(owned).unwrap_or_else(|| "Support".to_string()),
    })
}

fn value_block(element: &Element) -> Option<ValueBlock> {
    let recipients: Vec<ValueRecipient> = element
        .children_named("podcast:valueRecipient")
        .filter_map(|r| {
            Some(ValueRecipient {
                name: r.attr("name").map(owned),
                recipient_type: r.attr("type")?.to_string(),
                address: r.attr("address")?.to_string(),
                split: r.attr("split").and_then(|s| s.parse().ok()).unwrap_or(0),
                fee: r.attr("fee").is_some_and(|f| f.eq_ignore_ascii_case("true")),
            })
        })
        .collect();

    if recipients.is_empty() {
        return None;
    }

    Some(ValueBlock {
        value_type: element.attr("type").unwrap_or("lightning").to_string(),
        method: element.attr("method").unwrap_or("keysend").to_string(),
        suggested: element.attr("suggested").map(owned),
        recipients,
    })
}

fn owned(s: &str) -> String {
    clean_text(s).into_owned()
}

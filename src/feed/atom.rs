//! Atom documents, mapped through feed-rs onto the album model.

use feed_rs::model::{Entry, Text};
use feed_rs::parser;

use super::model::{AlbumRecord, Track};
use super::parser::{ParseError, UNKNOWN_ARTIST};
use crate::util::clean_text;

pub(crate) fn parse_atom(bytes: &[u8]) -> Result<AlbumRecord, ParseError> {
    let feed = parser::parse(bytes).map_err(|e| ParseError::Atom(e.to_string()))?;

    let title = feed
        .title
        .as_ref()
        .and_then(text)
        .ok_or(ParseError::MissingField("title"))?;

    let tracks: Vec<Track> = feed
        .entries
        .iter()
        .enumerate()
        .filter_map(|(i, entry)| entry_track(entry, i as u32 + 1))
        .collect();

    if tracks.is_empty() {
        return Err(ParseError::NoTracks);
    }

    let cover_art = feed
        .logo
        .as_ref()
        .or(feed.icon.as_ref())
        .map(|img| img.uri.clone())
        .or_else(|| tracks.iter().find_map(|t| t.image.clone()));

    Ok(AlbumRecord {
        title,
        artist: feed
            .authors
            .first()
            .map(|p| clean_text(&p.name).into_owned())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| UNKNOWN_ARTIST.to_string()),
        description: feed
            .description
            .as_ref()
            .and_then(text)
            .unwrap_or_default(),
        cover_art,
        link: feed
            .links
            .iter()
            .find(|l| l.rel.as_deref().map_or(true, |r| r == "alternate"))
            .map(|l| l.href.clone()),
        language: feed.language.clone(),
        explicit: false,
        podcast_guid: None,
        medium: None,
        tracks,
        podroll: Vec::new(),
        publisher: None,
        funding: Vec::new(),
        value: None,
    })
}

/// An entry is playable when it links an enclosure or carries media content.
fn entry_track(entry: &Entry, track_number: u32) -> Option<Track> {
    let enclosure = entry
        .links
        .iter()
        .find(|l| l.rel.as_deref() == Some("enclosure"))
        .map(|l| l.href.clone());
    let media_url = || {
        entry
            .media
            .iter()
            .flat_map(|m| m.content.iter())
            .find_map(|c| c.url.as_ref().map(|u| u.to_string()))
    };
    let url = enclosure.or_else(media_url)?;

    let duration = entry
        .media
        .iter()
        .find_map(|m| {
            m.duration
                .or_else(|| m.content.iter().find_map(|c| c.duration))
        })
        .map(|d| d.as_secs())
        .unwrap_or(0);

    let image = entry
        .media
        .iter()
        .flat_map(|m| m.thumbnails.iter())
        .map(|t| t.image.uri.clone())
        .next();

    let title = entry
        .title
        .as_ref()
        .and_then(text)
        .unwrap_or_else(|| format!("Track {track_number}"));

    Some(Track {
        title,
        duration,
        url,
        track_number,
        subtitle: None,
        summary: entry.summary.as_ref().and_then(text),
        image,
        explicit: false,
        keywords: entry
            .categories
            .iter()
            .map(|c| c.term.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect(),
        guid: Some(entry.id.trim().to_string()).filter(|id| !id.is_empty()),
        published: entry.published.or(entry.updated).map(|d| d.to_rfc3339()),
    })
}

fn text(t: &Text) -> Option<String> {
    Some(clean_text(&t.content).into_owned()).filter(|s| !s.is_empty())
}

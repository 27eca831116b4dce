//! Normalized track and playlist metadata.
//!
//! A [`TrackMetadata`] is created once per resolution and not changed
//! afterwards. Whether it can be played directly depends on
//! [`TrackInfo::stream_url`]: providers that only serve metadata leave it
//! empty, and the track needs a [`MirrorBinding`] before playback.

use std::{fmt, time::Duration};

use url::Url;

use crate::error::Error;

/// Base fields of a track.
///
/// These are the fields an enclosing track container stores itself; the
/// track state codec only writes the [`TrackExtension`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TrackInfo {
    pub title: String,
    pub artist: String,

    /// Never negative by construction. Records whose duration cannot be
    /// parsed are dropped instead.
    pub duration: Duration,

    /// Provider-local identifier, such as a Tidal track id.
    pub identifier: String,

    /// Source of truth for re-resolution and deduplication.
    pub canonical_url: Url,

    /// Directly playable stream. `None` means mirror resolution is needed.
    pub stream_url: Option<Url>,

    pub artwork_url: Option<Url>,

    /// Name of the provider that produced this track.
    pub source: String,
}

/// Provider-specific fields beyond the base record.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct TrackExtension {
    pub album_name: Option<String>,
    pub album_url: Option<Url>,
    pub artist_url: Option<Url>,
    pub artist_artwork_url: Option<Url>,
    pub preview_url: Option<Url>,
    pub is_preview: bool,
    pub isrc: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TrackMetadata {
    pub info: TrackInfo,
    pub extension: TrackExtension,
}

impl TrackMetadata {
    #[must_use]
    pub fn new(info: TrackInfo, extension: TrackExtension) -> Self {
        Self { info, extension }
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.info.title
    }

    #[must_use]
    pub fn artist(&self) -> &str {
        &self.info.artist
    }

    #[must_use]
    pub fn duration(&self) -> Duration {
        self.info.duration
    }

    /// Duration in whole milliseconds.
    ///
    /// Always `Some` for parsed tracks. `None` if a hand-built duration
    /// exceeds `u64` milliseconds.
    #[must_use]
    pub fn duration_millis(&self) -> Option<u64> {
        u64::try_from(self.info.duration.as_millis()).ok()
    }

    #[must_use]
    pub fn canonical_url(&self) -> &Url {
        &self.info.canonical_url
    }

    #[must_use]
    pub fn stream_url(&self) -> Option<&Url> {
        self.info.stream_url.as_ref()
    }

    #[must_use]
    pub fn artwork_url(&self) -> Option<&Url> {
        self.info.artwork_url.as_ref()
    }

    #[must_use]
    pub fn album_name(&self) -> Option<&str> {
        self.extension.album_name.as_deref()
    }

    #[must_use]
    pub fn is_preview(&self) -> bool {
        self.extension.is_preview
    }

    #[must_use]
    pub fn source(&self) -> &str {
        &self.info.source
    }

    /// Whether the track can be played without mirror resolution.
    #[must_use]
    pub fn is_playable(&self) -> bool {
        self.info.stream_url.is_some()
    }
}

impl fmt::Display for TrackMetadata {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}: \"{} - {}\"",
            self.info.source, self.info.artist, self.info.title
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PlaylistMetadata {
    pub name: String,

    /// In provider response order.
    pub tracks: Vec<TrackMetadata>,

    /// `None` if the sum does not fit in a [`Duration`].
    pub total_duration: Option<Duration>,
    pub is_search_result: bool,
}

impl PlaylistMetadata {
    #[must_use]
    pub fn new(name: impl Into<String>, tracks: Vec<TrackMetadata>, is_search_result: bool) -> Self {
        let total_duration = tracks
            .iter()
            .try_fold(Duration::ZERO, |total, track| total.checked_add(track.duration()));
        Self {
            name: name.into(),
            tracks,
            total_duration,
            is_search_result,
        }
    }
}

/// Outcome of resolving one identifier.
///
/// `NotFound` is a legitimate result: empty responses, unparsable records
/// and exhausted timeouts all end up here. `Error` is reserved for failures
/// a caller may want to react to, such as protocol violations.
#[derive(Debug)]
pub enum ResolvedItem {
    SingleTrack(TrackMetadata),
    Playlist(PlaylistMetadata),
    NotFound,
    Error(Error),
}

impl ResolvedItem {
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }

    /// Tracks in this item, in order. Empty for `NotFound` and `Error`.
    #[must_use]
    pub fn tracks(&self) -> &[TrackMetadata] {
        match self {
            Self::SingleTrack(track) => std::slice::from_ref(track),
            Self::Playlist(playlist) => &playlist.tracks,
            Self::NotFound | Self::Error(_) => &[],
        }
    }
}

impl fmt::Display for ResolvedItem {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::SingleTrack(track) => write!(f, "track {track}"),
            Self::Playlist(playlist) => write!(
                f,
                "playlist \"{}\" with {} tracks",
                playlist.name,
                playlist.tracks.len()
            ),
            Self::NotFound => write!(f, "no result"),
            Self::Error(e) => write!(f, "error: {e}"),
        }
    }
}

/// A metadata-only track bound to a stream from a mirror provider.
///
/// Lives only as long as the playback session that created it. The
/// original's canonical URL stays the identity of the track.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MirrorBinding {
    pub original: TrackMetadata,
    pub stream_url: Url,
    pub mirror_provider: String,
}

impl fmt::Display for MirrorBinding {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} via {} ({})",
            self.original, self.mirror_provider, self.stream_url
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(seconds: u64) -> TrackMetadata {
        TrackMetadata::new(
            TrackInfo {
                title: "Title".to_owned(),
                artist: "Artist".to_owned(),
                duration: Duration::from_secs(seconds),
                identifier: "1".to_owned(),
                canonical_url: Url::parse("https://example.com/1").unwrap(),
                stream_url: None,
                artwork_url: None,
                source: "test".to_owned(),
            },
            TrackExtension::default(),
        )
    }

    #[test]
    fn playlist_total_duration_is_summed() {
        let playlist = PlaylistMetadata::new("p", vec![track(60), track(90)], false);
        assert_eq!(playlist.total_duration, Some(Duration::from_secs(150)));
    }

    #[test]
    fn tracks_view_per_variant() {
        assert_eq!(ResolvedItem::SingleTrack(track(1)).tracks().len(), 1);
        assert!(ResolvedItem::NotFound.tracks().is_empty());
        assert!(ResolvedItem::Error(Error::unknown("x")).tracks().is_empty());
    }

    #[test]
    fn display_uses_artist_and_title() {
        assert_eq!(track(1).to_string(), "test: \"Artist - Title\"");
        assert_eq!(track(1).duration_millis(), Some(1_000));
    }

    #[test]
    fn overflowing_total_duration_is_unknown() {
        let playlist = PlaylistMetadata::new("p", vec![track(u64::MAX), track(u64::MAX)], true);
        assert_eq!(playlist.tracks.len(), 2);
        assert_eq!(playlist.total_duration, None);
        assert_eq!(playlist.tracks[0].duration_millis(), None);
    }
}

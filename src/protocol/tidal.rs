//! Tidal catalogue records.
//!
//! Tracks are served by `tracks/<id>`, collections by
//! `<albums|playlists>/<id>/tracks` (list under `items`) and search by
//! `search` (list under `tracks.items`). Streams are not available without
//! a subscription, so Tidal tracks are metadata only.

use serde::Deserialize;
use serde_with::{serde_as, DefaultOnError, DisplayFromStr, PickFirst};
use url::Url;

use crate::{
    error::Result,
    parser::IntoMetadata,
    track::{TrackExtension, TrackInfo, TrackMetadata},
    util,
};

/// Provider name.
pub const SOURCE: &str = "tidal";

/// Cover art size requested from the image service.
const COVER_SIZE: &str = "1280x1280";

#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Track {
    #[serde(deserialize_with = "super::string_or_number")]
    pub id: String,

    pub title: String,

    /// Length in seconds.
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub duration: u64,

    #[serde(default)]
    pub url: Option<String>,

    #[serde(default)]
    #[serde_as(deserialize_as = "DefaultOnError")]
    pub artists: Vec<Artist>,

    #[serde(default)]
    #[serde_as(deserialize_as = "DefaultOnError")]
    pub album: Option<Album>,

    #[serde(default)]
    pub isrc: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Artist {
    #[serde(default, deserialize_with = "optional_id")]
    pub id: Option<String>,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Album {
    #[serde(default, deserialize_with = "optional_id")]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub cover: Option<String>,
}

fn optional_id<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    super::string_or_number(deserializer).map(Some)
}

/// Builds the image URL for a cover identifier like `ab12-cd34-...`.
#[must_use]
pub fn cover_url(cover: &str) -> Option<Url> {
    if cover.is_empty() {
        return None;
    }
    Url::parse(&format!(
        "https://resources.tidal.com/images/{}/{COVER_SIZE}.jpg",
        cover.replace('-', "/")
    ))
    .ok()
}

fn browse_url(kind: &str, id: &str) -> Option<Url> {
    Url::parse(&format!("https://tidal.com/browse/{kind}/{id}")).ok()
}

impl IntoMetadata for Track {
    fn into_metadata(self, _host: &Url) -> Result<TrackMetadata> {
        let canonical_url = match self.url.as_deref().map(Url::parse) {
            Some(Ok(url)) => url,
            _ => Url::parse(&format!("https://tidal.com/browse/track/{}", self.id))?,
        };

        let artist = self
            .artists
            .iter()
            .map(|artist| artist.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");

        let album = self.album.as_ref();
        let extension = TrackExtension {
            album_name: album.and_then(|album| util::non_empty(album.title.clone())),
            album_url: album
                .and_then(|album| album.id.as_deref())
                .and_then(|id| browse_url("album", id)),
            artist_url: self
                .artists
                .first()
                .and_then(|artist| artist.id.as_deref())
                .and_then(|id| browse_url("artist", id)),
            isrc: util::non_empty(self.isrc),
            ..Default::default()
        };

        let info = TrackInfo {
            title: self.title,
            artist,
            duration: super::duration_from_secs(self.duration)?,
            identifier: self.id,
            canonical_url,
            stream_url: None,
            artwork_url: album
                .and_then(|album| album.cover.as_deref())
                .and_then(cover_url),
            source: SOURCE.to_owned(),
        };

        Ok(TrackMetadata::new(info, extension))
    }
}

//! Last.fm track records.
//!
//! `track.getinfo` returns a single record under `track`, while
//! `track.search` returns a list under `results.trackmatches.track`. Both
//! share the record layout below, except that the artist is a plain string
//! in search results and an object in `track.getinfo`.
//!
//! Errors are reported in-band with a successful status:
//!
//! ```json
//! { "error": 6, "message": "Track not found" }
//! ```

use serde::Deserialize;
use serde_json::Value;
use serde_with::{serde_as, DefaultOnError, DisplayFromStr, PickFirst};
use url::Url;

use crate::{
    error::{Error, Result},
    parser::IntoMetadata,
    track::{TrackExtension, TrackInfo, TrackMetadata},
    util,
};

/// Provider name.
pub const SOURCE: &str = "lastfm";

/// Index of the "extralarge" image in image arrays.
const ARTWORK_INDEX: usize = 3;

/// A track from `track.getinfo` or `track.search`.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Track {
    pub name: String,
    pub artist: Artist,
    pub url: Url,

    /// Length in seconds, as a number or a numeric string.
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub duration: u64,

    #[serde(default)]
    #[serde_as(deserialize_as = "DefaultOnError")]
    pub album: Option<Album>,

    #[serde(default)]
    #[serde_as(deserialize_as = "DefaultOnError")]
    pub image: Vec<Image>,
}

/// Artist as sent by search results (a name) or `track.getinfo` (an object).
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Artist {
    Name(String),
    Object {
        name: String,
        #[serde(default)]
        url: Option<String>,
    },
}

impl Artist {
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Name(name) | Self::Object { name, .. } => name,
        }
    }

    #[must_use]
    pub fn url(&self) -> Option<Url> {
        match self {
            Self::Name(_) => None,
            Self::Object { url, .. } => url.as_deref().and_then(|url| Url::parse(url).ok()),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Album {
    pub title: Option<String>,
    pub url: Option<String>,
    pub image: Vec<Image>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Image {
    #[serde(rename = "#text")]
    pub url: String,
    pub size: String,
}

/// Picks the artwork image from an image array.
fn artwork(images: &[Image]) -> Option<Url> {
    images
        .get(ARTWORK_INDEX)
        .filter(|image| !image.url.is_empty())
        .and_then(|image| Url::parse(&image.url).ok())
}

impl IntoMetadata for Track {
    fn into_metadata(self, _host: &Url) -> Result<TrackMetadata> {
        let artwork_url = artwork(&self.image).or_else(|| {
            self.album
                .as_ref()
                .and_then(|album| artwork(&album.image))
        });

        let extension = TrackExtension {
            album_name: self
                .album
                .as_ref()
                .and_then(|album| util::non_empty(album.title.clone())),
            album_url: self
                .album
                .as_ref()
                .and_then(|album| album.url.as_deref())
                .and_then(|url| Url::parse(url).ok()),
            artist_url: self.artist.url(),
            ..Default::default()
        };

        let info = TrackInfo {
            title: self.name,
            artist: self.artist.name().to_owned(),
            duration: super::duration_from_secs(self.duration)?,
            identifier: self.url.to_string(),
            canonical_url: self.url,
            stream_url: None,
            artwork_url,
            source: SOURCE.to_owned(),
        };

        Ok(TrackMetadata::new(info, extension))
    }
}

/// Maps an in-band Last.fm error to an [`Error`].
///
/// Error 6 ("not found") passes: the missing result node resolves to no
/// result further down.
///
/// # Errors
///
/// * `PermissionDenied` for invalid or suspended API keys
/// * `ResourceExhausted` when rate limited
/// * `FailedPrecondition` for any other error code
pub fn check_error(root: &Value) -> Result<()> {
    let Some(code) = root.get("error").and_then(Value::as_u64) else {
        return Ok(());
    };

    let message = root
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("unknown error");

    match code {
        6 => Ok(()),
        10 | 26 => Err(Error::permission_denied(format!(
            "{SOURCE} error {code}: {message}"
        ))),
        29 => Err(Error::resource_exhausted(format!(
            "{SOURCE} error {code}: {message}"
        ))),
        _ => Err(Error::failed_precondition(format!(
            "{SOURCE} error {code}: {message}"
        ))),
    }
}

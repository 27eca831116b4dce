//! Slider.kz search results.
//!
//! Search results carry a direct download link, which makes Slider.kz the
//! default mirror provider.
//!
//! # Wire Format
//!
//! ```json
//! {
//!     "audios": {
//!         "": [
//!             {
//!                 "id": "371745443_456289486",
//!                 "duration": 234,
//!                 "tit_art": "Ed Sheeran - Shape of You",
//!                 "url": "download/371745443_456289486/234/Ed Sheeran - Shape of You.mp3"
//!             }
//!         ]
//!     }
//! }
//! ```

use serde::Deserialize;
use serde_with::{serde_as, DisplayFromStr, PickFirst};
use url::Url;

use crate::{
    error::{Error, Result},
    parser::IntoMetadata,
    track::{TrackExtension, TrackInfo, TrackMetadata},
    util,
};

/// Provider name.
pub const SOURCE: &str = "sliderkz";

/// Size substituted into templated cover URLs.
const COVER_SIZE: &str = "400x400";

/// Separator between artist and title in `tit_art`.
const TITLE_ARTIST_SEPARATOR: &str = " - ";

/// A single search result.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Audio {
    #[serde(deserialize_with = "super::string_or_number")]
    pub id: String,

    /// Length in seconds, as a number or a numeric string.
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub duration: u64,

    /// Artist and title, joined by `" - "`.
    pub tit_art: String,

    /// Download path, usually relative to the provider host.
    pub url: String,

    /// Cover URL template with `%%` in place of the size, without scheme.
    #[serde(default)]
    pub cover: Option<String>,
}

impl Audio {
    /// Splits `tit_art` on its first separator into artist and title.
    ///
    /// Without a separator the whole string is used for both.
    #[must_use]
    pub fn artist_and_title(&self) -> (&str, &str) {
        self.tit_art
            .split_once(TITLE_ARTIST_SEPARATOR)
            .map_or((self.tit_art.as_str(), self.tit_art.as_str()), |(artist, title)| {
                (artist.trim(), title.trim())
            })
    }

    /// Expands the cover template, if any.
    #[must_use]
    pub fn cover_url(&self) -> Option<Url> {
        let template = util::non_empty(self.cover.clone())?;
        let cover = template.replace("%%", COVER_SIZE);
        if cover.starts_with("https://") || cover.starts_with("http://") {
            Url::parse(&cover).ok()
        } else {
            Url::parse(&format!("https://{}", cover.trim_start_matches('/'))).ok()
        }
    }
}

impl IntoMetadata for Audio {
    fn into_metadata(self, host: &Url) -> Result<TrackMetadata> {
        let stream_url = util::absolute_url(host, &self.url).ok_or_else(|| {
            Error::invalid_argument(format!("track {} has no usable url", self.id))
        })?;

        let (artist, title) = self.artist_and_title();
        let info = TrackInfo {
            title: title.to_owned(),
            artist: artist.to_owned(),
            duration: super::duration_from_secs(self.duration)?,
            artwork_url: self.cover_url(),
            identifier: self.id,
            canonical_url: stream_url.clone(),
            stream_url: Some(stream_url),
            source: SOURCE.to_owned(),
        };

        Ok(TrackMetadata::new(info, TrackExtension::default()))
    }
}

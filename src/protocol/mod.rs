//! Wire types for the provider APIs.
//!
//! Each submodule describes one provider's JSON records with `serde` and
//! `serde_with`, absorbing that provider's quirks (numbers sent as strings,
//! artists as either strings or objects, templated image URLs):
//!
//! * [`lastfm`] - Last.fm `track.getinfo` and `track.search`
//! * [`sliderkz`] - Slider.kz search results with direct download links
//! * [`tidal`] - Tidal tracks, albums, playlists and search
//!
//! Records are deserialized one at a time from the response tree, so that a
//! single malformed record can be dropped without failing its batch.

pub mod lastfm;
pub mod sliderkz;
pub mod tidal;

use crate::error::{Error, Result};
use serde::Deserialize;
use std::{fmt::Debug, time::Duration};

/// Parses and logs JSON responses from provider APIs.
///
/// # Arguments
///
/// * `body` - Response body text to parse
/// * `origin` - Description of API endpoint for logging
///
/// # Errors
///
/// Returns a `FailedPrecondition` error if the body is not valid JSON or
/// its structure doesn't match type `T`.
///
/// # Logging
///
/// * Success: Logs parsed structure at TRACE level
/// * Parse Error: Logs raw JSON at TRACE level if valid JSON
/// * Invalid JSON: Logs error and raw text at ERROR level
pub fn json<T>(body: &str, origin: &str) -> Result<T>
where
    T: for<'de> Deserialize<'de> + Debug,
{
    match serde_json::from_str(body) {
        Ok(result) => {
            trace!("{}: {result:#?}", origin);
            Ok(result)
        }
        Err(e) => {
            if let Ok(json) = serde_json::from_str::<serde_json::Value>(body) {
                trace!("{}: {json:#?}", origin);
            } else {
                error!("{}: failed parsing response ({e:?})", origin);
                trace!("{body}");
            }
            Err(e.into())
        }
    }
}

/// Deserializes identifiers that providers send either as JSON strings or
/// as JSON numbers.
pub(crate) fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        String(String),
        Number(serde_json::Number),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::String(id) => id,
        Id::Number(id) => id.to_string(),
    })
}

/// Converts a record duration in seconds.
///
/// # Errors
///
/// Returns `InvalidArgument` if the duration does not fit in a `u64` of
/// milliseconds, so that every parsed track has a representable
/// [`TrackMetadata::duration_millis`](crate::track::TrackMetadata::duration_millis).
pub(crate) fn duration_from_secs(secs: u64) -> Result<Duration> {
    secs.checked_mul(1000)
        .map(Duration::from_millis)
        .ok_or_else(|| Error::invalid_argument(format!("duration of {secs}s is out of range")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn durations_beyond_millisecond_range_are_invalid() {
        assert_eq!(duration_from_secs(234).unwrap(), Duration::from_secs(234));
        assert_eq!(
            duration_from_secs(u64::MAX / 1000).unwrap(),
            Duration::from_millis(u64::MAX / 1000 * 1000)
        );
        let error = duration_from_secs(u64::MAX / 1000 + 1).unwrap_err();
        assert_eq!(error.kind, ErrorKind::InvalidArgument);
    }
}

//! Binary track state.
//!
//! A persisted track is a base record followed by an extension block:
//!
//! ```text
//! record    := version:u8 title artist duration_ms:u64 identifier
//!              canonical_url is_stream:u8 ?stream_url ?artwork_url source
//!              extension
//! extension := version:u8 ?album_name ?album_url ?artist_url
//!              ?artist_artwork_url ?preview_url is_preview:u8 ?isrc
//!              [fields of newer versions]
//! string    := length:u16 utf8-bytes
//! ?value    := 0 | 1 value
//! ```
//!
//! Integers are big-endian. Absent optional values are written as an
//! explicit `0` marker, never omitted. Decoders read the fields they know
//! and ignore anything after them, so blocks written by newer versions
//! still decode. A truncated or otherwise malformed sequence fails with a
//! `DataLoss` error.
//!
//! The extension block can also be used on its own, next to a container
//! format that stores the base fields itself; see [`encode`] and
//! [`decode`].

use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use url::Url;

use crate::{
    error::{Error, Result},
    track::{TrackExtension, TrackInfo, TrackMetadata},
};

/// Version of the base record layout.
const RECORD_VERSION: u8 = 1;

/// Version of the extension block layout.
const EXTENSION_VERSION: u8 = 1;

const ABSENT: u8 = 0;
const PRESENT: u8 = 1;

/// Encodes the extension block of `track`.
///
/// # Errors
///
/// Returns `InvalidArgument` if a string exceeds 65,535 bytes.
pub fn encode(track: &TrackMetadata) -> Result<Vec<u8>> {
    let mut writer = Writer::default();
    writer.extension(&track.extension)?;
    Ok(writer.finish())
}

/// Decodes an extension block and joins it with base fields stored
/// elsewhere.
///
/// # Errors
///
/// Returns `DataLoss` if `bytes` is truncated or malformed.
pub fn decode(bytes: &[u8], info: TrackInfo) -> Result<TrackMetadata> {
    let extension = Reader::new(bytes).extension()?;
    Ok(TrackMetadata::new(info, extension))
}

/// Encodes the base record and extension block of `track`.
///
/// # Errors
///
/// Returns `InvalidArgument` if a string exceeds 65,535 bytes or the
/// duration exceeds `u64` milliseconds.
pub fn encode_record(track: &TrackMetadata) -> Result<Vec<u8>> {
    let info = &track.info;
    let mut writer = Writer::default();

    writer.u8(RECORD_VERSION);
    writer.string(&info.title)?;
    writer.string(&info.artist)?;
    let duration_ms = track.duration_millis().ok_or_else(|| {
        Error::invalid_argument(format!("duration of {track} is out of range"))
    })?;
    writer.u64(duration_ms);
    writer.string(&info.identifier)?;
    writer.string(info.canonical_url.as_str())?;
    writer.bool(info.stream_url.is_some());
    writer.optional(info.stream_url.as_ref().map(Url::as_str))?;
    writer.optional(info.artwork_url.as_ref().map(Url::as_str))?;
    writer.string(&info.source)?;
    writer.extension(&track.extension)?;

    Ok(writer.finish())
}

/// Decodes a record written by [`encode_record`].
///
/// # Errors
///
/// Returns `DataLoss` if `bytes` is truncated or malformed, or was written
/// with an unknown record version.
pub fn decode_record(bytes: &[u8]) -> Result<TrackMetadata> {
    let mut reader = Reader::new(bytes);

    let version = reader.u8()?;
    if version != RECORD_VERSION {
        return Err(Error::data_loss(format!(
            "unsupported record version {version}"
        )));
    }

    let title = reader.string()?;
    let artist = reader.string()?;
    let duration = Duration::from_millis(reader.u64()?);
    let identifier = reader.string()?;
    let canonical_url = reader.url()?;
    let is_stream = reader.bool()?;
    let stream_url = reader.optional_url()?;
    if is_stream != stream_url.is_some() {
        return Err(Error::data_loss("stream flag disagrees with stream url"));
    }
    let artwork_url = reader.optional_url()?;
    let source = reader.string()?;

    let info = TrackInfo {
        title,
        artist,
        duration,
        identifier,
        canonical_url,
        stream_url,
        artwork_url,
        source,
    };

    Ok(TrackMetadata::new(info, reader.extension()?))
}

/// Encodes a full record as standard base64.
///
/// # Errors
///
/// Returns `InvalidArgument` if a string exceeds 65,535 bytes.
pub fn encode_base64(track: &TrackMetadata) -> Result<String> {
    encode_record(track).map(|bytes| STANDARD.encode(bytes))
}

/// Decodes a record from [`encode_base64`] output.
///
/// # Errors
///
/// Returns `DataLoss` if `encoded` is not base64 or not a valid record.
pub fn decode_base64(encoded: &str) -> Result<TrackMetadata> {
    let bytes = STANDARD.decode(encoded.trim())?;
    decode_record(&bytes)
}

#[derive(Default)]
struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    fn finish(self) -> Vec<u8> {
        self.buf
    }

    fn u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    fn u64(&mut self, value: u64) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    fn bool(&mut self, value: bool) {
        self.u8(u8::from(value));
    }

    fn string(&mut self, value: &str) -> Result<()> {
        let len = u16::try_from(value.len()).map_err(|_| {
            Error::invalid_argument(format!("string of {} bytes is too long", value.len()))
        })?;
        self.buf.extend_from_slice(&len.to_be_bytes());
        self.buf.extend_from_slice(value.as_bytes());
        Ok(())
    }

    fn optional(&mut self, value: Option<&str>) -> Result<()> {
        match value {
            Some(value) => {
                self.u8(PRESENT);
                self.string(value)
            }
            None => {
                self.u8(ABSENT);
                Ok(())
            }
        }
    }

    fn extension(&mut self, extension: &TrackExtension) -> Result<()> {
        self.u8(EXTENSION_VERSION);
        self.optional(extension.album_name.as_deref())?;
        self.optional(extension.album_url.as_ref().map(Url::as_str))?;
        self.optional(extension.artist_url.as_ref().map(Url::as_str))?;
        self.optional(extension.artist_artwork_url.as_ref().map(Url::as_str))?;
        self.optional(extension.preview_url.as_ref().map(Url::as_str))?;
        self.bool(extension.is_preview);
        self.optional(extension.isrc.as_deref())
    }
}

struct Reader<'a> {
    buf: &'a [u8],
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.buf.len() < len {
            return Err(Error::data_loss(format!(
                "truncated track state: needed {len} bytes, {} left",
                self.buf.len()
            )));
        }
        let (head, tail) = self.buf.split_at(len);
        self.buf = tail;
        Ok(head)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16> {
        let mut bytes = [0; 2];
        bytes.copy_from_slice(self.take(2)?);
        Ok(u16::from_be_bytes(bytes))
    }

    fn u64(&mut self) -> Result<u64> {
        let mut bytes = [0; 8];
        bytes.copy_from_slice(self.take(8)?);
        Ok(u64::from_be_bytes(bytes))
    }

    fn bool(&mut self) -> Result<bool> {
        match self.u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(Error::data_loss(format!("invalid boolean {other}"))),
        }
    }

    fn string(&mut self) -> Result<String> {
        let len = self.u16()?;
        let bytes = self.take(usize::from(len))?;
        Ok(String::from_utf8(bytes.to_vec())?)
    }

    fn url(&mut self) -> Result<Url> {
        let url = self.string()?;
        Url::parse(&url).map_err(|e| Error::data_loss(format!("invalid url {url}: {e}")))
    }

    fn optional(&mut self) -> Result<Option<String>> {
        match self.u8()? {
            ABSENT => Ok(None),
            PRESENT => self.string().map(Some),
            other => Err(Error::data_loss(format!("invalid presence marker {other}"))),
        }
    }

    fn optional_url(&mut self) -> Result<Option<Url>> {
        match self.optional()? {
            Some(url) => Url::parse(&url)
                .map(Some)
                .map_err(|e| Error::data_loss(format!("invalid url {url}: {e}"))),
            None => Ok(None),
        }
    }

    /// Reads an extension block of any version. Fields added by later
    /// versions follow the known ones and are skipped.
    fn extension(&mut self) -> Result<TrackExtension> {
        let version = self.u8()?;
        if version == 0 {
            return Err(Error::data_loss("invalid extension version 0"));
        }

        let extension = TrackExtension {
            album_name: self.optional()?,
            album_url: self.optional_url()?,
            artist_url: self.optional_url()?,
            artist_artwork_url: self.optional_url()?,
            preview_url: self.optional_url()?,
            is_preview: self.bool()?,
            isrc: self.optional()?,
        };

        if !self.buf.is_empty() {
            trace!(
                "ignoring {} bytes of extension version {version}",
                self.buf.len()
            );
        }

        Ok(extension)
    }
}

//! Mapping of provider response trees to normalized metadata.
//!
//! Every provider record type implements [`IntoMetadata`]. A [`Parser`]
//! binds one such type to the provider's host, so the resolution engine
//! can parse any provider's records without knowing their layout.
//!
//! Parsing is lenient per record and strict per field: a record that fails
//! to deserialize, or whose duration is not a number of seconds, is dropped
//! and logged, while the remaining records of the batch are returned.

use std::fmt::{self, Debug};

use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use crate::{
    error::{Error, Result},
    track::TrackMetadata,
};

/// A provider record that can be turned into [`TrackMetadata`].
pub trait IntoMetadata: DeserializeOwned + Debug {
    /// Converts the record.
    ///
    /// `host` is the provider's known base URL, against which relative
    /// media paths are made absolute.
    ///
    /// # Errors
    ///
    /// Returns an `InvalidArgument` error if the record lacks what is needed
    /// to describe a track.
    fn into_metadata(self, host: &Url) -> Result<TrackMetadata>;
}

/// Parses a single record, returning `None` if it is null or malformed.
pub fn parse<T: IntoMetadata>(node: &Value, host: &Url) -> Option<TrackMetadata> {
    if node.is_null() {
        return None;
    }

    let result = T::deserialize(node)
        .map_err(Error::from)
        .and_then(|record| record.into_metadata(host));

    match result {
        Ok(track) => Some(track),
        Err(e) => {
            debug!("dropping malformed record: {e}");
            trace!("{node}");
            None
        }
    }
}

/// Record parser for one provider.
#[derive(Clone)]
pub struct Parser {
    host: Url,
    parse: fn(&Value, &Url) -> Option<TrackMetadata>,
}

impl Parser {
    /// Creates a parser for records of type `T` from `host`.
    #[must_use]
    pub fn new<T: IntoMetadata>(host: Url) -> Self {
        Self {
            host,
            parse: parse::<T>,
        }
    }

    /// Parses one record.
    #[must_use]
    pub fn parse(&self, node: &Value) -> Option<TrackMetadata> {
        (self.parse)(node, &self.host)
    }

    /// Parses every record in `node`, skipping malformed ones.
    ///
    /// Output order matches input order. An object is taken as a list of one
    /// record: some providers collapse single-element arrays that way.
    /// Anything else yields no records.
    #[must_use]
    pub fn parse_list(&self, node: &Value) -> Vec<TrackMetadata> {
        match node {
            Value::Array(records) => records
                .iter()
                .filter_map(|record| self.parse(record))
                .collect(),
            Value::Object(_) => self.parse(node).into_iter().collect(),
            _ => Vec::new(),
        }
    }
}

impl Debug for Parser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parser")
            .field("host", &self.host.as_str())
            .finish_non_exhaustive()
    }
}

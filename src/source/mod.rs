//! Provider capability table.
//!
//! Every metadata provider is described by a [`ProviderDescriptor`]: the
//! URL pattern and search prefix it answers to, how to build its requests,
//! how to check its responses for in-band errors, and which record parser
//! applies. The resolver walks the [`Providers`] table instead of
//! dispatching on provider types.
//!
//! Built-in providers:
//! * [`lastfm`] - metadata only, URL lookup and search
//! * [`sliderkz`] - search only, with direct streams
//! * [`tidal`] - metadata only, track, album and playlist lookup and search

pub mod lastfm;
pub mod sliderkz;
pub mod tidal;

use std::{collections::BTreeMap, fmt, sync::Arc};

use regex_lite::Regex;
use serde_json::Value;

use crate::{
    config::Config,
    error::{Error, Result},
    http::ApiRequest,
    parser::Parser,
};

/// Named captures of a matched URL pattern.
pub type Captures = BTreeMap<String, String>;

/// Builds the request for a direct URL from its captures.
pub type LookupFn = Box<dyn Fn(&Captures) -> Result<Lookup> + Send + Sync>;

/// Builds the request for a search query.
pub type SearchFn = Box<dyn Fn(&str) -> Result<Lookup> + Send + Sync>;

/// Inspects a response root for in-band provider errors.
pub type CheckFn = fn(&Value) -> Result<()>;

/// A request together with where to find records in its response.
#[derive(Debug)]
pub struct Lookup {
    pub request: ApiRequest,
    pub shape: Shape,
}

/// Where records live in a response and what they resolve to.
///
/// Pointers are JSON pointers into the response root.
#[derive(Debug)]
pub enum Shape {
    /// A single track.
    Track { pointer: &'static str },

    /// Search results, resolving to a playlist flagged as a search result.
    Search { pointer: &'static str, name: String },

    /// An album or playlist. The collection title is fetched separately
    /// from the `/title` node of `title`'s response.
    Collection {
        pointer: &'static str,
        title: Option<ApiRequest>,
    },
}

/// Capabilities of one metadata provider.
pub struct ProviderDescriptor {
    /// Unique provider name, also used as the track source.
    pub name: &'static str,

    /// Anchored pattern for direct URLs, with named capture groups.
    pub url_pattern: Option<Regex>,

    /// Search prefix including its colon, like `lfmsearch:`.
    pub search_prefix: Option<&'static str>,

    /// Whether this provider may serve as a mirror: its records carry
    /// playable streams.
    pub mirror_eligible: bool,

    pub parser: Parser,

    pub lookup: Option<LookupFn>,
    pub search: SearchFn,
    pub check: CheckFn,
}

impl ProviderDescriptor {
    /// Builds the request for a direct URL.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if this provider has no URL lookup or the
    /// captures are incomplete.
    pub fn lookup(&self, captures: &Captures) -> Result<Lookup> {
        let lookup = self.lookup.as_ref().ok_or_else(|| {
            Error::invalid_argument(format!("{} does not resolve urls", self.name))
        })?;
        lookup(captures)
    }

    /// Builds the request for a search query.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the query cannot be put in a request.
    pub fn search(&self, text: &str) -> Result<Lookup> {
        (self.search)(text)
    }

    /// Checks a response root for in-band errors.
    ///
    /// # Errors
    ///
    /// Returns the error the provider reported.
    pub fn check(&self, root: &Value) -> Result<()> {
        (self.check)(root)
    }
}

impl fmt::Debug for ProviderDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderDescriptor")
            .field("name", &self.name)
            .field("url_pattern", &self.url_pattern.as_ref().map(Regex::as_str))
            .field("search_prefix", &self.search_prefix)
            .field("mirror_eligible", &self.mirror_eligible)
            .field("parser", &self.parser)
            .finish_non_exhaustive()
    }
}

/// Responses without in-band errors.
///
/// # Errors
///
/// Never fails.
pub fn no_check(_root: &Value) -> Result<()> {
    Ok(())
}

/// Fetches a named capture.
///
/// # Errors
///
/// Returns `InvalidArgument` if the capture is missing or empty.
pub fn capture<'a>(captures: &'a Captures, name: &str) -> Result<&'a str> {
    captures
        .get(name)
        .map(String::as_str)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| Error::invalid_argument(format!("url lacks {name}")))
}

/// Ordered table of providers.
///
/// Provider names and search prefixes are unique. URL patterns are expected
/// to be disjoint; the first provider whose pattern matches handles a URL.
#[derive(Clone, Debug)]
pub struct Providers {
    providers: Arc<Vec<ProviderDescriptor>>,
}

impl Providers {
    /// Creates a table from `providers`, in priority order.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` on duplicate names or search prefixes.
    pub fn new(providers: Vec<ProviderDescriptor>) -> Result<Self> {
        for (i, provider) in providers.iter().enumerate() {
            for other in &providers[..i] {
                if provider.name == other.name {
                    return Err(Error::invalid_argument(format!(
                        "provider {} registered twice",
                        provider.name
                    )));
                }
                if provider.search_prefix.is_some() && provider.search_prefix == other.search_prefix
                {
                    return Err(Error::invalid_argument(format!(
                        "{} and {} share a search prefix",
                        other.name, provider.name
                    )));
                }
            }
        }

        Ok(Self {
            providers: Arc::new(providers),
        })
    }

    /// The built-in providers, configured from `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if a provider cannot be configured, for example when
    /// a configured base URL is invalid.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(vec![
            lastfm::descriptor(config)?,
            tidal::descriptor(config)?,
            sliderkz::descriptor(config)?,
        ])
    }

    #[must_use]
    pub fn by_name(&self, name: &str) -> Option<&ProviderDescriptor> {
        self.providers.iter().find(|provider| provider.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProviderDescriptor> {
        self.providers.iter()
    }
}

//! Classification of track identifiers.
//!
//! An identifier is either a provider URL, a `<prefix>:<query>` search, or
//! something no registered provider handles. URL patterns are tried before
//! search prefixes, so a URL is never mistaken for a search.

use std::fmt;

use crate::source::{Captures, Providers};

/// A classified identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Identifier {
    /// A URL matching `provider`'s pattern, with its named captures.
    DirectUrl {
        provider: &'static str,
        captures: Captures,
    },

    /// A search on `provider`, with the prefix removed from `text`.
    SearchQuery {
        provider: &'static str,
        text: String,
    },

    Unrecognized,
}

impl Identifier {
    /// Classifies `input` against `providers`, in table order.
    #[must_use]
    pub fn classify(input: &str, providers: &Providers) -> Self {
        let input = input.trim();

        for provider in providers.iter() {
            let Some(pattern) = &provider.url_pattern else {
                continue;
            };

            if let Some(matched) = pattern.captures(input) {
                let captures = pattern
                    .capture_names()
                    .flatten()
                    .filter_map(|name| {
                        matched
                            .name(name)
                            .map(|value| (name.to_owned(), value.as_str().to_owned()))
                    })
                    .collect();

                return Self::DirectUrl {
                    provider: provider.name,
                    captures,
                };
            }
        }

        for provider in providers.iter() {
            let Some(prefix) = provider.search_prefix else {
                continue;
            };

            if let Some(text) = input.strip_prefix(prefix) {
                return Self::SearchQuery {
                    provider: provider.name,
                    text: text.trim().to_owned(),
                };
            }
        }

        Self::Unrecognized
    }

    /// Provider handling this identifier, if any.
    #[must_use]
    pub fn provider(&self) -> Option<&'static str> {
        match self {
            Self::DirectUrl { provider, .. } | Self::SearchQuery { provider, .. } => {
                Some(*provider)
            }
            Self::Unrecognized => None,
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::DirectUrl { provider, captures } => {
                write!(f, "{provider} url")?;
                for (name, value) in captures {
                    write!(f, " {name}={value}")?;
                }
                Ok(())
            }
            Self::SearchQuery { provider, text } => write!(f, "{provider} search \"{text}\""),
            Self::Unrecognized => write!(f, "unrecognized identifier"),
        }
    }
}

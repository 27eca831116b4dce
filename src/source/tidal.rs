//! Tidal metadata provider.
//!
//! Resolves track, album and playlist URLs and `tdsearch:` queries. Album
//! and playlist titles come from a second request; tracks are metadata only.

use regex_lite::Regex;
use reqwest::header::{HeaderName, USER_AGENT};
use url::Url;

use super::{capture, no_check, Captures, Lookup, ProviderDescriptor, Shape};
use crate::{
    config::Config,
    error::{Error, Result},
    http::ApiRequest,
    parser::Parser,
    protocol::tidal::{Track, SOURCE},
};

pub const SEARCH_PREFIX: &str = "tdsearch:";

const API_BASE: &str = "https://api.tidal.com/v1/";
const CLIENT_USER_AGENT: &str = "TIDAL/3704 CFNetwork/1220.1 Darwin/20.3.0";
const TOKEN_HEADER: &str = "x-tidal-token";

const ALBUM_MAX_PAGE_ITEMS: u32 = 120;
const PLAYLIST_MAX_PAGE_ITEMS: u32 = 750;

const URL_PATTERN: &str = r"^https?://(?:(?:listen|www)\.)?tidal\.com/(?:browse/)?(?P<type>album|track|playlist)/(?P<id>[a-zA-Z0-9\-]+)/?(?:\?.*)?$";

/// Shared request settings.
#[derive(Clone)]
struct Api {
    base: Url,
    token: String,
    country_code: String,
}

impl Api {
    fn request(&self, path: &str, params: &[(&str, &str)]) -> Result<ApiRequest> {
        let mut url = self.base.join(path)?;
        url.query_pairs_mut()
            .append_pair("countryCode", &self.country_code)
            .extend_pairs(params);

        ApiRequest::new(SOURCE, url)
            .with_header(USER_AGENT, CLIENT_USER_AGENT)?
            .with_header(HeaderName::from_static(TOKEN_HEADER), &self.token)
    }

    fn lookup(&self, captures: &Captures) -> Result<Lookup> {
        let id = capture(captures, "id")?;
        match capture(captures, "type")? {
            "track" => Ok(Lookup {
                request: self.request(&format!("tracks/{id}"), &[])?,
                shape: Shape::Track { pointer: "" },
            }),
            kind @ ("album" | "playlist") => {
                let limit = if kind == "album" {
                    ALBUM_MAX_PAGE_ITEMS
                } else {
                    PLAYLIST_MAX_PAGE_ITEMS
                };
                Ok(Lookup {
                    request: self.request(
                        &format!("{kind}s/{id}/tracks"),
                        &[("limit", &limit.to_string())],
                    )?,
                    shape: Shape::Collection {
                        pointer: "/items",
                        title: Some(self.request(&format!("{kind}s/{id}"), &[])?),
                    },
                })
            }
            kind => Err(Error::invalid_argument(format!(
                "unsupported {SOURCE} item type {kind}"
            ))),
        }
    }

    fn search(&self, text: &str, limit: &str) -> Result<Lookup> {
        Ok(Lookup {
            request: self.request(
                "search",
                &[("query", text), ("offset", "0"), ("limit", limit)],
            )?,
            shape: Shape::Search {
                pointer: "/tracks/items",
                name: format!("Tidal Music Search: {text}"),
            },
        })
    }
}

/// Describes Tidal with the token and country from `config`.
///
/// # Errors
///
/// Fails only if the built-in URL pattern or endpoint are invalid.
pub fn descriptor(config: &Config) -> Result<ProviderDescriptor> {
    let api = Api {
        base: Url::parse(API_BASE)?,
        token: config.tidal.token.clone(),
        country_code: config.tidal.country_code.clone(),
    };
    let search_limit = config.tidal.search_limit.to_string();

    let lookup = {
        let api = api.clone();
        move |captures: &Captures| api.lookup(captures)
    };
    let parser = Parser::new::<Track>(api.base.clone());
    let search = move |text: &str| api.search(text, &search_limit);

    Ok(ProviderDescriptor {
        name: SOURCE,
        url_pattern: Some(Regex::new(URL_PATTERN)?),
        search_prefix: Some(SEARCH_PREFIX),
        mirror_eligible: false,
        parser,
        lookup: Some(Box::new(lookup)),
        search: Box::new(search),
        check: no_check,
    })
}

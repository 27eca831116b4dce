//! Last.fm metadata provider.
//!
//! Resolves `last.fm/music/<artist>/_/<track>` URLs through `track.getinfo`
//! and `lfmsearch:` queries through `track.search`. Last.fm serves no audio,
//! so its tracks always need a mirror before playback.

use regex_lite::Regex;
use reqwest::header::{HeaderName, USER_AGENT};
use url::Url;

use super::{capture, Captures, Lookup, ProviderDescriptor, Shape};
use crate::{
    config::Config,
    error::Result,
    http::ApiRequest,
    parser::Parser,
    protocol::lastfm::{self, SOURCE},
    util,
};

pub const SEARCH_PREFIX: &str = "lfmsearch:";

const API_BASE: &str = "https://ws.audioscrobbler.com/2.0/";
const CLIENT_USER_AGENT: &str = "Last.fm/1.0";

const URL_PATTERN: &str = r"^https?://(?:(?:www|m)\.)?last\.?fm(?:\.com)?/(?:music|track)/(?P<artist>[^/?#]+)/(?:_/)?(?P<track>[^/?#]+)/?(?:\?.*)?$";

/// Builds an API request with the method parameters in `params`.
fn request(base: &Url, api_key: &str, params: &[(&str, &str)]) -> Result<ApiRequest> {
    let mut url = base.clone();
    url.query_pairs_mut()
        .extend_pairs(params)
        .append_pair("api_key", api_key)
        .append_pair("format", "json");

    ApiRequest::new(SOURCE, url)
        .with_header(USER_AGENT, CLIENT_USER_AGENT)?
        .with_header(HeaderName::from_static("api_key"), api_key)
}

/// Describes Last.fm with the key and limits from `config`.
///
/// # Errors
///
/// Fails only if the built-in URL pattern or endpoint are invalid.
pub fn descriptor(config: &Config) -> Result<ProviderDescriptor> {
    let base = Url::parse(API_BASE)?;
    let api_key = config.lastfm.api_key.clone();
    let search_limit = config.lastfm.search_limit.to_string();

    let lookup = {
        let base = base.clone();
        let api_key = api_key.clone();
        move |captures: &Captures| -> Result<Lookup> {
            let artist = util::decode_slug(capture(captures, "artist")?);
            let track = util::decode_slug(capture(captures, "track")?);
            let request = request(
                &base,
                &api_key,
                &[
                    ("method", "track.getinfo"),
                    ("artist", &artist),
                    ("track", &track),
                ],
            )?;

            Ok(Lookup {
                request,
                shape: Shape::Track { pointer: "/track" },
            })
        }
    };

    let search = {
        let base = base.clone();
        move |text: &str| -> Result<Lookup> {
            let request = request(
                &base,
                &api_key,
                &[
                    ("method", "track.search"),
                    ("track", text),
                    ("limit", &search_limit),
                ],
            )?;

            Ok(Lookup {
                request,
                shape: Shape::Search {
                    pointer: "/results/trackmatches/track",
                    name: format!("Last.fm Music Search: {text}"),
                },
            })
        }
    };

    Ok(ProviderDescriptor {
        name: SOURCE,
        url_pattern: Some(Regex::new(URL_PATTERN)?),
        search_prefix: Some(SEARCH_PREFIX),
        mirror_eligible: false,
        parser: Parser::new::<lastfm::Track>(base),
        lookup: Some(Box::new(lookup)),
        search: Box::new(search),
        check: lastfm::check_error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(request: &ApiRequest) -> Vec<(String, String)> {
        request.url.query_pairs().into_owned().collect()
    }

    #[test]
    fn getinfo_request_decodes_slugs() {
        let provider = descriptor(&Config::default()).unwrap();
        let captures = Captures::from([
            ("artist".to_owned(), "Guns+N%27+Roses".to_owned()),
            ("track".to_owned(), "Patience".to_owned()),
        ]);

        let lookup = provider.lookup(&captures).unwrap();
        let pairs = query(&lookup.request);
        assert!(pairs.contains(&("method".to_owned(), "track.getinfo".to_owned())));
        assert!(pairs.contains(&("artist".to_owned(), "Guns N' Roses".to_owned())));
        assert!(pairs.contains(&("format".to_owned(), "json".to_owned())));
        assert_eq!(
            lookup.request.headers.get(USER_AGENT).unwrap(),
            CLIENT_USER_AGENT
        );
        assert!(matches!(lookup.shape, Shape::Track { pointer: "/track" }));
    }

    #[test]
    fn search_request_is_limited() {
        let provider = descriptor(&Config::default()).unwrap();
        let lookup = provider.search("shape of you").unwrap();
        let pairs = query(&lookup.request);
        assert!(pairs.contains(&("track".to_owned(), "shape of you".to_owned())));
        assert!(pairs.contains(&("limit".to_owned(), "6".to_owned())));
        match lookup.shape {
            Shape::Search { name, .. } => assert_eq!(name, "Last.fm Music Search: shape of you"),
            other => panic!("unexpected shape {other:?}"),
        }
    }

    #[test]
    fn url_pattern() {
        let pattern = Regex::new(URL_PATTERN).unwrap();
        let caps = pattern
            .captures("https://www.last.fm/music/Cher/_/Believe")
            .unwrap();
        assert_eq!(&caps["artist"], "Cher");
        assert_eq!(&caps["track"], "Believe");

        assert!(pattern.is_match("https://lastfm.com/track/Cher/Believe?x=1"));
        assert!(!pattern.is_match("https://www.last.fm/music/Cher"));
        assert!(!pattern.is_match("https://tidal.com/track/1"));
    }
}

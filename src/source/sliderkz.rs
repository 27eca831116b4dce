//! Slider.kz search provider, the default mirror.

use reqwest::header::ACCEPT;
use url::Url;

use super::{no_check, Lookup, ProviderDescriptor, Shape};
use crate::{
    config::Config,
    error::Result,
    http::ApiRequest,
    parser::Parser,
    protocol::sliderkz::{Audio, SOURCE},
};

pub const SEARCH_PREFIX: &str = "sksearch:";

/// Describes Slider.kz on the host from `config`.
///
/// # Errors
///
/// Returns `InvalidArgument` if the configured base URL is invalid.
pub fn descriptor(config: &Config) -> Result<ProviderDescriptor> {
    let host = Url::parse(&config.sliderkz.base_url)?;
    let endpoint = host.join("vk_auth.php")?;

    let search = move |text: &str| -> Result<Lookup> {
        let mut url = endpoint.clone();
        url.query_pairs_mut().append_pair("q", text);

        Ok(Lookup {
            request: ApiRequest::new(SOURCE, url).with_header(ACCEPT, "application/json")?,
            shape: Shape::Search {
                pointer: "/audios/",
                name: format!("SliderKz Music Search: {text}"),
            },
        })
    };

    Ok(ProviderDescriptor {
        name: SOURCE,
        url_pattern: None,
        search_prefix: Some(SEARCH_PREFIX),
        mirror_eligible: true,
        parser: Parser::new::<Audio>(host),
        lookup: None,
        search: Box::new(search),
        check: no_check,
    })
}

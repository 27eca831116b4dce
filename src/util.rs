//! Small string helpers shared by the parsers and the mirror resolver.

use url::Url;

/// Rewrites a media path to an absolute URL against `base`.
///
/// Paths that already carry an `http` or `https` scheme are returned
/// unchanged, which makes this idempotent. Relative and protocol-relative
/// paths have spaces replaced by `+` and angle brackets removed before they
/// are joined to `base`.
///
/// Returns `None` when the result is not a valid URL.
///
/// # Examples
///
/// ```rust
/// let base = Url::parse("https://example.com/").unwrap();
/// let url = absolute_url(&base, "download/a b<c>.mp3").unwrap();
/// assert_eq!(url.as_str(), "https://example.com/download/a+bc.mp3");
/// ```
#[must_use]
pub fn absolute_url(base: &Url, path: &str) -> Option<Url> {
    let path = path.trim();
    if path.is_empty() {
        return None;
    }

    if path.starts_with("https://") || path.starts_with("http://") {
        return Url::parse(path).ok();
    }

    let cleaned: String = path
        .chars()
        .filter(|chr| *chr != '<' && *chr != '>')
        .map(|chr| if chr == ' ' { '+' } else { chr })
        .collect();

    if let Some(host_relative) = cleaned.strip_prefix("//") {
        return Url::parse(&format!("{}://{host_relative}", base.scheme())).ok();
    }

    base.join(cleaned.trim_start_matches('/')).ok()
}

/// Normalizes a title or artist for comparison: lowercase, alphanumerics
/// only, whitespace runs collapsed to one space.
///
/// # Examples
///
/// ```rust
/// assert_eq!(normalize_text("  Shape of You (feat. X)!"), "shape of you feat x");
/// ```
#[must_use]
pub fn normalize_text(text: &str) -> String {
    let kept: String = text
        .chars()
        .flat_map(char::to_lowercase)
        .map(|chr| if chr.is_alphanumeric() { chr } else { ' ' })
        .collect();

    kept.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Returns `None` for empty or whitespace-only strings.
#[must_use]
pub fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

/// Decodes a URL path segment such as `Guns+N%27+Roses` to plain text.
#[must_use]
pub fn decode_slug(slug: &str) -> String {
    // Escape pair separators so the whole segment decodes as one key.
    let escaped = slug.replace('&', "%26").replace('=', "%3D");
    url::form_urlencoded::parse(escaped.as_bytes())
        .next()
        .map_or_else(String::new, |(key, _)| key.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://hayqbhgr.slider.kz/").unwrap()
    }

    #[test]
    fn relative_paths_become_absolute() {
        let url = absolute_url(&base(), "download/123/Ed Sheeran - <Shape>.mp3").unwrap();
        assert_eq!(
            url.as_str(),
            "https://hayqbhgr.slider.kz/download/123/Ed+Sheeran+-+Shape.mp3"
        );
    }

    #[test]
    fn normalization_is_idempotent() {
        let once = absolute_url(&base(), "/download/a b.mp3").unwrap();
        let twice = absolute_url(&base(), once.as_str()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn absolute_urls_are_untouched() {
        let url = absolute_url(&base(), "http://cdn.example.org/x.mp3").unwrap();
        assert_eq!(url.as_str(), "http://cdn.example.org/x.mp3");
    }

    #[test]
    fn protocol_relative_paths_take_base_scheme() {
        let url = absolute_url(&base(), "//cdn.example.org/x.mp3").unwrap();
        assert_eq!(url.as_str(), "https://cdn.example.org/x.mp3");
    }

    #[test]
    fn empty_path_is_rejected() {
        assert!(absolute_url(&base(), "  ").is_none());
    }

    #[test]
    fn text_normalization() {
        assert_eq!(normalize_text("Ed  Sheeran"), "ed sheeran");
        assert_eq!(normalize_text("Shape Of You!"), "shape of you");
        assert_eq!(normalize_text("Beyoncé"), "beyoncé");
    }

    #[test]
    fn slugs_are_decoded() {
        assert_eq!(decode_slug("Guns+N%27+Roses"), "Guns N' Roses");
        assert_eq!(decode_slug("Simon+&+Garfunkel"), "Simon & Garfunkel");
        assert_eq!(decode_slug("a=b"), "a=b");
    }
}

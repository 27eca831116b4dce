//! Resolution engine.
//!
//! Turns identifiers into [`ResolvedItem`]s:
//!
//! 1. classify the identifier against the provider table
//! 2. build the provider's lookup or search request
//! 3. fetch the response under the timeout-only [`RetryPolicy`]
//! 4. locate and parse the records
//!
//! Missing results are not failures. An exhausted retry budget, a provider
//! `NotFound`, a missing result node and a batch of unparsable records all
//! resolve to [`ResolvedItem::NotFound`]. Only protocol violations and
//! non-timeout transport failures surface as [`ResolvedItem::Error`].
//!
//! # Example
//!
//! ```rust
//! let resolver = Resolver::new(client, Providers::from_config(&config)?, policy);
//! match resolver.resolve("lfmsearch:shape of you").await {
//!     Some(item) => println!("{item}"),
//!     None => println!("not a supported identifier"),
//! }
//! ```

use std::sync::Arc;

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::{
    error::{Error, ErrorKind, Result},
    events::EventSender,
    http::{ApiRequest, Transport},
    identifier::Identifier,
    retry::RetryPolicy,
    source::{Lookup, ProviderDescriptor, Providers, Shape},
    track::{PlaylistMetadata, ResolvedItem, TrackMetadata},
};

/// Resolves identifiers against a provider table.
///
/// Cloning is cheap: the transport and the provider table are shared.
pub struct Resolver<T> {
    transport: Arc<T>,
    providers: Providers,
    retry: RetryPolicy,
    events: Option<EventSender>,
}

impl<T> Clone for Resolver<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            providers: self.providers.clone(),
            retry: self.retry,
            events: self.events.clone(),
        }
    }
}

impl<T: Transport> Resolver<T> {
    #[must_use]
    pub fn new(transport: T, providers: Providers, retry: RetryPolicy) -> Self {
        Self {
            transport: Arc::new(transport),
            providers,
            retry,
            events: None,
        }
    }

    /// Reports retries to `events`.
    #[must_use]
    pub fn with_events(mut self, events: EventSender) -> Self {
        self.events = Some(events);
        self
    }

    #[must_use]
    pub fn providers(&self) -> &Providers {
        &self.providers
    }

    #[must_use]
    pub(crate) fn events(&self) -> Option<&EventSender> {
        self.events.as_ref()
    }

    /// Resolves `identifier`.
    ///
    /// Returns `None` if no provider handles the identifier, so that the
    /// caller can try another resolver.
    pub async fn resolve(&self, identifier: &str) -> Option<ResolvedItem> {
        self.resolve_with_cancel(identifier, &CancellationToken::new())
            .await
    }

    /// Resolves `identifier`, aborting when `cancel` fires.
    ///
    /// A cancelled resolution yields [`ResolvedItem::Error`] of kind
    /// `Cancelled`.
    pub async fn resolve_with_cancel(
        &self,
        identifier: &str,
        cancel: &CancellationToken,
    ) -> Option<ResolvedItem> {
        let identifier = Identifier::classify(identifier, &self.providers);
        let provider = self.providers.by_name(identifier.provider()?)?;

        let lookup = match &identifier {
            Identifier::DirectUrl { captures, .. } => provider.lookup(captures),
            Identifier::SearchQuery { text, .. } if text.is_empty() => {
                debug!("{}: empty search query", provider.name);
                return Some(ResolvedItem::NotFound);
            }
            Identifier::SearchQuery { text, .. } => provider.search(text),
            Identifier::Unrecognized => return None,
        };

        debug!("resolving {identifier}");
        let result = match lookup {
            Ok(lookup) => self.fetch(provider, lookup, cancel).await,
            Err(e) => Err(e),
        };

        Some(into_item(provider.name, result))
    }

    /// Performs `lookup` on `provider` and interprets the response.
    ///
    /// # Errors
    ///
    /// * `Cancelled` if `cancel` fires first
    /// * `FailedPrecondition` if the response root is neither an object nor
    ///   `null`
    /// * in-band provider errors and non-timeout transport failures
    pub(crate) async fn fetch(
        &self,
        provider: &ProviderDescriptor,
        lookup: Lookup,
        cancel: &CancellationToken,
    ) -> Result<ResolvedItem> {
        let Some(root) = self.get(provider, &lookup.request, cancel).await? else {
            return Ok(ResolvedItem::NotFound);
        };

        if root.is_null() {
            debug!("{}: empty response", provider.name);
            return Ok(ResolvedItem::NotFound);
        }

        provider.check(&root)?;
        if !root.is_object() {
            return Err(Error::failed_precondition(format!(
                "{}: expected a JSON object, got {}",
                provider.name,
                kind_of(&root)
            )));
        }

        let item = match lookup.shape {
            Shape::Track { pointer } => root
                .pointer(pointer)
                .and_then(|node| provider.parser.parse(node))
                .map_or(ResolvedItem::NotFound, ResolvedItem::SingleTrack),

            Shape::Search { pointer, name } => {
                let tracks = records(provider, &root, pointer);
                if tracks.is_empty() {
                    ResolvedItem::NotFound
                } else {
                    ResolvedItem::Playlist(PlaylistMetadata::new(name, tracks, true))
                }
            }

            Shape::Collection { pointer, title } => {
                let tracks = records(provider, &root, pointer);
                if tracks.is_empty() {
                    ResolvedItem::NotFound
                } else {
                    let title = match title {
                        Some(request) => self.title(provider, &request, cancel).await?,
                        None => String::new(),
                    };
                    ResolvedItem::Playlist(PlaylistMetadata::new(title, tracks, false))
                }
            }
        };

        Ok(item)
    }

    /// Fetches `request` under the retry policy. `None` when retries ran out.
    async fn get(
        &self,
        provider: &ProviderDescriptor,
        request: &ApiRequest,
        cancel: &CancellationToken,
    ) -> Result<Option<Value>> {
        self.retry
            .run(provider.name, self.events.as_ref(), cancel, || {
                self.transport.get_json(request.clone())
            })
            .await
    }

    /// Fetches a collection title. Failures other than cancellation give an
    /// empty title.
    async fn title(
        &self,
        provider: &ProviderDescriptor,
        request: &ApiRequest,
        cancel: &CancellationToken,
    ) -> Result<String> {
        match self.get(provider, request, cancel).await {
            Ok(root) => Ok(root
                .as_ref()
                .and_then(|root| root.get("title"))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_owned()),
            Err(e) if e.kind == ErrorKind::Cancelled => Err(e),
            Err(e) => {
                debug!("{}: no collection title: {e}", provider.name);
                Ok(String::new())
            }
        }
    }
}

#[cfg(test)]
impl Resolver<crate::test_utils::MockTransport> {
    pub(crate) fn transport_requests(&self) -> Vec<ApiRequest> {
        self.transport.requests()
    }
}

fn records(provider: &ProviderDescriptor, root: &Value, pointer: &str) -> Vec<TrackMetadata> {
    root.pointer(pointer)
        .map(|node| provider.parser.parse_list(node))
        .unwrap_or_default()
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Folds a fetch result into an item. A provider `NotFound` is a result,
/// not an error.
fn into_item(source: &str, result: Result<ResolvedItem>) -> ResolvedItem {
    match result {
        Ok(item) => {
            debug!("{source}: {item}");
            item
        }
        Err(e) if e.kind == ErrorKind::NotFound => {
            debug!("{source}: {e}");
            ResolvedItem::NotFound
        }
        Err(e) => {
            warn!("{source}: {e}");
            ResolvedItem::Error(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use tokio::sync::mpsc;

    use super::*;
    use crate::{
        config::Config,
        events::Event,
        test_utils::{timeout, MockTransport},
    };

    fn resolver(responses: Vec<Result<Value>>) -> Resolver<MockTransport> {
        let policy = RetryPolicy {
            max_retries: 2,
            min_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        };
        Resolver::new(
            MockTransport::new(responses),
            Providers::from_config(&Config::default()).unwrap(),
            policy,
        )
    }

    fn lastfm_track(name: &str, duration: &str) -> Value {
        json!({
            "name": name,
            "artist": "Ed Sheeran",
            "url": format!("https://www.last.fm/music/Ed+Sheeran/_/{name}"),
            "duration": duration,
        })
    }

    #[tokio::test]
    async fn unrecognized_identifiers_are_not_handled() {
        let resolver = resolver(vec![]);
        assert!(resolver.resolve("ytsearch:anything").await.is_none());
        assert!(resolver.transport.requests().is_empty());
    }

    #[tokio::test]
    async fn empty_query_skips_the_network() {
        let resolver = resolver(vec![]);
        let item = resolver.resolve("lfmsearch:").await.unwrap();
        assert!(item.is_not_found());
        assert!(resolver.transport.requests().is_empty());
    }

    #[tokio::test]
    async fn search_keeps_valid_records_in_order() {
        let resolver = resolver(vec![Ok(json!({
            "results": {"trackmatches": {"track": [
                lastfm_track("Shape+of+You", "233"),
                lastfm_track("Perfect", "n/a"),
                lastfm_track("Photograph", "258"),
            ]}}
        }))]);

        let Some(ResolvedItem::Playlist(playlist)) =
            resolver.resolve("lfmsearch:ed sheeran").await
        else {
            panic!("expected a playlist");
        };
        assert!(playlist.is_search_result);
        assert_eq!(playlist.name, "Last.fm Music Search: ed sheeran");
        let titles: Vec<_> = playlist.tracks.iter().map(TrackMetadata::title).collect();
        assert_eq!(titles, ["Shape+of+You", "Photograph"]);
        assert_eq!(playlist.total_duration, Some(Duration::from_secs(491)));
    }

    #[tokio::test]
    async fn missing_node_is_not_found() {
        let resolver = resolver(vec![Ok(json!({"error": 6, "message": "Track not found"}))]);
        let item = resolver
            .resolve("https://www.last.fm/music/Cher/_/Nope")
            .await
            .unwrap();
        assert!(item.is_not_found());
    }

    #[tokio::test]
    async fn non_object_root_is_a_protocol_error() {
        let resolver = resolver(vec![Ok(json!([1, 2, 3]))]);
        let item = resolver.resolve("sksearch:anything").await.unwrap();
        let ResolvedItem::Error(e) = item else {
            panic!("expected an error, got {item}");
        };
        assert_eq!(e.kind, ErrorKind::FailedPrecondition);
    }

    #[tokio::test]
    async fn null_root_is_not_found() {
        let resolver = resolver(vec![Ok(Value::Null)]);
        let item = resolver.resolve("sksearch:anything").await.unwrap();
        assert!(item.is_not_found(), "got {item}");
    }

    #[tokio::test]
    async fn huge_durations_do_not_panic() {
        let audio = |id: &str, duration: u64| {
            json!({
                "id": id,
                "duration": duration,
                "tit_art": "Artist - Title",
                "url": format!("download/{id}.mp3"),
            })
        };

        let out_of_range = resolver(vec![Ok(json!({
            "audios": {"": [audio("1", u64::MAX), audio("2", u64::MAX)]}
        }))]);
        let item = out_of_range.resolve("sksearch:anything").await.unwrap();
        assert!(item.is_not_found(), "got {item}");

        let longest = u64::MAX / 1000;
        let in_range = resolver(vec![Ok(json!({
            "audios": {"": [audio("1", longest), audio("2", longest)]}
        }))]);
        let Some(ResolvedItem::Playlist(playlist)) = in_range.resolve("sksearch:anything").await
        else {
            panic!("expected a playlist");
        };
        assert_eq!(playlist.tracks.len(), 2);
        assert_eq!(
            playlist.total_duration,
            Some(Duration::from_millis(longest * 1000) * 2)
        );
    }

    #[tokio::test]
    async fn in_band_errors_surface() {
        let resolver = resolver(vec![Ok(json!({"error": 10, "message": "Invalid API key"}))]);
        let item = resolver.resolve("lfmsearch:x").await.unwrap();
        assert!(matches!(item, ResolvedItem::Error(ref e) if e.kind == ErrorKind::PermissionDenied));
    }

    #[tokio::test]
    async fn provider_not_found_is_a_result() {
        let resolver = resolver(vec![Err(Error::not_found("404"))]);
        let item = resolver.resolve("https://tidal.com/browse/track/1").await.unwrap();
        assert!(item.is_not_found());
    }

    #[tokio::test]
    async fn exhausted_retries_are_not_found() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let resolver = resolver(vec![timeout(), timeout(), timeout()]).with_events(tx);

        let item = resolver.resolve("sksearch:anything").await.unwrap();
        assert!(item.is_not_found());
        assert_eq!(resolver.transport.requests().len(), 3);

        drop(resolver);
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        assert_eq!(
            events.last(),
            Some(&Event::RetriesExhausted {
                source: "sliderkz".to_owned()
            })
        );
    }

    #[tokio::test]
    async fn collections_fetch_their_title() {
        let track = json!({
            "id": 1,
            "title": "Get Lucky",
            "duration": 369,
            "artists": [{"name": "Daft Punk"}],
        });
        let resolver = resolver(vec![
            Ok(json!({"items": [track]})),
            Ok(json!({"title": "Random Access Memories"})),
        ]);

        let Some(ResolvedItem::Playlist(playlist)) =
            resolver.resolve("https://tidal.com/browse/album/77646164").await
        else {
            panic!("expected a playlist");
        };
        assert_eq!(playlist.name, "Random Access Memories");
        assert!(!playlist.is_search_result);
        assert_eq!(playlist.tracks.len(), 1);
    }

    #[tokio::test]
    async fn failed_title_fetch_gives_empty_title() {
        let track = json!({
            "id": 1,
            "title": "Get Lucky",
            "duration": 369,
            "artists": [{"name": "Daft Punk"}],
        });
        let resolver = resolver(vec![
            Ok(json!({"items": [track]})),
            Err(Error::unavailable("connection reset")),
        ]);

        let Some(ResolvedItem::Playlist(playlist)) =
            resolver.resolve("https://tidal.com/browse/playlist/abc").await
        else {
            panic!("expected a playlist");
        };
        assert_eq!(playlist.name, "");
    }
}

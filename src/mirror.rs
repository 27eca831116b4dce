//! Mirror resolution for metadata-only tracks.
//!
//! Some providers describe tracks without serving audio. Before such a track
//! can be played, [`MirrorResolver`] searches the configured mirror
//! providers, in order, for a candidate that matches the original's title,
//! artist and duration, and binds the candidate's stream to the original
//! metadata.
//!
//! A binding lives in a [`PlaybackSession`] and is never persisted: mirror
//! streams go stale and may be geo-restricted, so the original's canonical
//! URL stays the identity of the track.
//!
//! Every mirror provider gets its own retry budget. A provider that fails
//! with anything other than cancellation is skipped in favor of the next.

use std::time::Duration;

use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::{
    config::{Config, MatchPolicy},
    error::{Error, ErrorKind, Result},
    events::{self, Event},
    http::Transport,
    resolver::Resolver,
    track::{MirrorBinding, TrackMetadata},
    util::normalize_text,
};

/// Finds playable streams for metadata-only tracks.
pub struct MirrorResolver<T> {
    resolver: Resolver<T>,
    mirrors: Vec<&'static str>,
    tolerance: Duration,
    matching: MatchPolicy,
}

impl<T> Clone for MirrorResolver<T> {
    fn clone(&self) -> Self {
        Self {
            resolver: self.resolver.clone(),
            mirrors: self.mirrors.clone(),
            tolerance: self.tolerance,
            matching: self.matching,
        }
    }
}

impl<T: Transport> MirrorResolver<T> {
    /// Creates a mirror resolver searching the mirror providers named in
    /// `config`, through `resolver`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if a configured mirror is unknown or its
    /// records carry no streams.
    pub fn new(resolver: Resolver<T>, config: &Config) -> Result<Self> {
        let mirrors = config
            .mirror
            .providers
            .iter()
            .map(|name| match resolver.providers().by_name(name) {
                Some(provider) if provider.mirror_eligible => Ok(provider.name),
                Some(_) => Err(Error::invalid_argument(format!(
                    "{name} cannot serve as a mirror"
                ))),
                None => Err(Error::invalid_argument(format!(
                    "unknown mirror provider {name}"
                ))),
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            resolver,
            mirrors,
            tolerance: config.mirror.duration_tolerance,
            matching: config.mirror.matching,
        })
    }

    /// Searches the mirror providers for a stream matching `track`.
    ///
    /// Returns `Ok(None)` if no provider had a matching candidate; the track
    /// then has valid metadata but no playable audio.
    ///
    /// # Errors
    ///
    /// * `FailedPrecondition` if `track` already has a stream
    /// * `Cancelled` if `cancel` fires before a binding is found
    pub async fn resolve_mirror(
        &self,
        track: &TrackMetadata,
        cancel: &CancellationToken,
    ) -> Result<Option<MirrorBinding>> {
        if track.is_playable() {
            return Err(Error::failed_precondition(format!(
                "{track} is playable without a mirror"
            )));
        }

        let query = format!("{} {}", track.artist(), track.title());
        for name in &self.mirrors {
            let Some(provider) = self.resolver.providers().by_name(name) else {
                continue;
            };

            debug!("{name}: searching mirror for {track}");
            let result = match provider.search(&query) {
                Ok(lookup) => self.resolver.fetch(provider, lookup, cancel).await,
                Err(e) => Err(e),
            };

            match result {
                Ok(item) => {
                    if let Some((candidate, stream_url)) = item
                        .tracks()
                        .iter()
                        .find_map(|candidate| self.accept(track, candidate).map(|url| (candidate, url)))
                    {
                        debug!("{name}: matched {candidate}");
                        info!("streaming {track} from {name}");
                        events::emit(
                            self.resolver.events(),
                            Event::MirrorBound {
                                source: track.source().to_owned(),
                                mirror: (*name).to_owned(),
                            },
                        );
                        return Ok(Some(MirrorBinding {
                            original: track.clone(),
                            stream_url: stream_url.clone(),
                            mirror_provider: (*name).to_owned(),
                        }));
                    }
                    debug!("{name}: no candidate matches {track}");
                }
                Err(e) if e.kind == ErrorKind::Cancelled => return Err(e),
                Err(e) if e.kind == ErrorKind::NotFound => {
                    debug!("{name}: {e}");
                }
                Err(e) => warn!("{name}: skipping mirror: {e}"),
            }
        }

        info!("no mirror found for {track}");
        events::emit(
            self.resolver.events(),
            Event::MirrorMissed {
                source: track.source().to_owned(),
            },
        );
        Ok(None)
    }

    /// Starts a playback session for `track`.
    #[must_use]
    pub fn session(&self, track: TrackMetadata) -> PlaybackSession<T> {
        PlaybackSession::new(self.clone(), track)
    }

    /// Returns the candidate's stream if it matches `original`.
    fn accept<'a>(&self, original: &TrackMetadata, candidate: &'a TrackMetadata) -> Option<&'a Url> {
        let stream_url = candidate.stream_url()?;
        let within_tolerance =
            original.duration().abs_diff(candidate.duration()) <= self.tolerance;

        (within_tolerance
            && self.agree(original.title(), candidate.title())
            && self.agree(original.artist(), candidate.artist()))
        .then_some(stream_url)
    }

    fn agree(&self, original: &str, candidate: &str) -> bool {
        let original = normalize_text(original);
        let candidate = normalize_text(candidate);
        match self.matching {
            MatchPolicy::Exact => original == candidate,
            MatchPolicy::Loose => {
                !original.is_empty()
                    && !candidate.is_empty()
                    && (candidate.contains(&original) || original.contains(&candidate))
            }
        }
    }
}

/// Playback of one track.
///
/// The mirror binding is resolved on the first request for a stream and
/// cached for the lifetime of the session, including a miss.
pub struct PlaybackSession<T> {
    mirror: MirrorResolver<T>,
    track: TrackMetadata,
    binding: OnceCell<Option<MirrorBinding>>,
    cancel: CancellationToken,
}

impl<T: Transport> PlaybackSession<T> {
    #[must_use]
    pub fn new(mirror: MirrorResolver<T>, track: TrackMetadata) -> Self {
        Self {
            mirror,
            track,
            binding: OnceCell::new(),
            cancel: CancellationToken::new(),
        }
    }

    #[must_use]
    pub fn track(&self) -> &TrackMetadata {
        &self.track
    }

    /// The mirror binding, if one was resolved.
    #[must_use]
    pub fn binding(&self) -> Option<&MirrorBinding> {
        self.binding.get().and_then(Option::as_ref)
    }

    /// Aborts an in-flight mirror search.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Token that aborts the mirror search when cancelled.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// The URL to stream this track from.
    ///
    /// A track with its own stream is returned without any request. For
    /// other tracks the first call resolves a mirror; `None` means no mirror
    /// matched.
    ///
    /// # Errors
    ///
    /// * `Cancelled` if the session was cancelled during the search
    /// * errors from the mirror resolver; a failed search is retried on the
    ///   next call
    pub async fn stream_url(&self) -> Result<Option<Url>> {
        if let Some(url) = self.track.stream_url() {
            return Ok(Some(url.clone()));
        }

        let binding = self
            .binding
            .get_or_try_init(|| self.mirror.resolve_mirror(&self.track, &self.cancel))
            .await?;

        Ok(binding.as_ref().map(|binding| binding.stream_url.clone()))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};
    use tokio::sync::mpsc;

    use super::*;
    use crate::{
        retry::RetryPolicy,
        source::{sliderkz, Providers},
        test_utils::{timeout, MockTransport},
        track::{TrackExtension, TrackInfo},
    };

    fn config() -> Config {
        let mut config = Config::default();
        config.retry_delay = Duration::from_millis(1);
        config.retry_max_delay = Duration::from_millis(2);
        config
    }

    fn mirror_with(config: &Config, responses: Vec<Result<Value>>) -> MirrorResolver<MockTransport> {
        let resolver = Resolver::new(
            MockTransport::new(responses),
            Providers::from_config(config).unwrap(),
            RetryPolicy::from_config(config),
        );
        MirrorResolver::new(resolver, config).unwrap()
    }

    fn mirror(responses: Vec<Result<Value>>) -> MirrorResolver<MockTransport> {
        mirror_with(&config(), responses)
    }

    fn original(seconds: u64) -> TrackMetadata {
        TrackMetadata::new(
            TrackInfo {
                title: "Shape of You".to_owned(),
                artist: "Ed Sheeran".to_owned(),
                duration: Duration::from_secs(seconds),
                identifier: "https://www.last.fm/music/Ed+Sheeran/_/Shape+of+You".to_owned(),
                canonical_url: Url::parse("https://www.last.fm/music/Ed+Sheeran/_/Shape+of+You")
                    .unwrap(),
                stream_url: None,
                artwork_url: None,
                source: "lastfm".to_owned(),
            },
            TrackExtension::default(),
        )
    }

    fn candidates(entries: &[(&str, u64)]) -> Result<Value> {
        let audios: Vec<_> = entries
            .iter()
            .enumerate()
            .map(|(i, (tit_art, duration))| {
                json!({
                    "id": i.to_string(),
                    "duration": duration,
                    "tit_art": tit_art,
                    "url": format!("download/{i}.mp3"),
                })
            })
            .collect();
        Ok(json!({"audios": {"": audios}}))
    }

    #[tokio::test]
    async fn binds_first_matching_candidate() {
        let mirror = mirror(vec![candidates(&[
            ("Ed Sheeran - Shape of You (Remix)", 234),
            ("Ed Sheeran - Shape Of You", 235),
            ("Ed Sheeran - Shape of You", 234),
        ])]);

        let binding = mirror
            .resolve_mirror(&original(234), &CancellationToken::new())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(binding.mirror_provider, "sliderkz");
        assert_eq!(
            binding.stream_url.as_str(),
            "https://hayqbhgr.slider.kz/download/1.mp3"
        );
        assert_eq!(binding.original, original(234));
    }

    #[tokio::test]
    async fn duration_outside_tolerance_is_rejected() {
        let mirror = mirror(vec![candidates(&[("Ed Sheeran - Shape of You", 244)])]);
        let binding = mirror
            .resolve_mirror(&original(234), &CancellationToken::new())
            .await
            .unwrap();
        assert!(binding.is_none());
    }

    #[tokio::test]
    async fn loose_matching_accepts_decorated_titles() {
        let mut config = config();
        config.mirror.matching = MatchPolicy::Loose;
        let mirror = mirror_with(
            &config,
            vec![candidates(&[("Ed Sheeran - Shape of You (Official Audio)", 234)])],
        );

        let binding = mirror
            .resolve_mirror(&original(234), &CancellationToken::new())
            .await
            .unwrap();
        assert!(binding.is_some());
    }

    #[tokio::test]
    async fn exhausted_mirror_is_a_miss() {
        let mirror = mirror(vec![timeout(), timeout(), timeout()]);
        let binding = mirror
            .resolve_mirror(&original(234), &CancellationToken::new())
            .await
            .unwrap();
        assert!(binding.is_none());
    }

    #[tokio::test]
    async fn playable_tracks_need_no_mirror() {
        let mirror = mirror(vec![]);
        let mut track = original(234);
        track.info.stream_url = Some(Url::parse("https://cdn.example.org/a.mp3").unwrap());

        let error = mirror
            .resolve_mirror(&track, &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(error.kind, ErrorKind::FailedPrecondition);

        let session = mirror.session(track);
        assert_eq!(
            session.stream_url().await.unwrap().unwrap().as_str(),
            "https://cdn.example.org/a.mp3"
        );
        assert!(mirror.resolver.transport_requests().is_empty());
    }

    #[tokio::test]
    async fn session_caches_the_binding() {
        let mirror = mirror(vec![candidates(&[("Ed Sheeran - Shape of You", 233)])]);
        let session = mirror.session(original(234));

        let first = session.stream_url().await.unwrap();
        let second = session.stream_url().await.unwrap();
        assert_eq!(first, second);
        assert!(first.is_some());
        assert_eq!(session.binding().unwrap().mirror_provider, "sliderkz");
        assert_eq!(mirror.resolver.transport_requests().len(), 1);
    }

    #[tokio::test]
    async fn cancelled_session_fails() {
        let mirror = mirror(vec![candidates(&[("Ed Sheeran - Shape of You", 234)])]);
        let session = mirror.session(original(234));
        session.cancel();

        let error = session.stream_url().await.unwrap_err();
        assert_eq!(error.kind, ErrorKind::Cancelled);
        assert!(session.binding().is_none());
    }

    #[tokio::test]
    async fn mirrors_are_tried_in_order_with_separate_budgets() {
        let mut config = config();
        config.mirror.providers = vec!["primary".to_owned(), "fallback".to_owned()];

        let mut primary = sliderkz::descriptor(&config).unwrap();
        primary.name = "primary";
        primary.search_prefix = Some("primary:");
        let mut fallback = sliderkz::descriptor(&config).unwrap();
        fallback.name = "fallback";
        fallback.search_prefix = Some("fallback:");

        let (tx, mut rx) = mpsc::unbounded_channel();
        let resolver = Resolver::new(
            MockTransport::new(vec![
                timeout(),
                timeout(),
                timeout(),
                candidates(&[("Ed Sheeran - Shape of You", 234)]),
            ]),
            Providers::new(vec![primary, fallback]).unwrap(),
            RetryPolicy::from_config(&config),
        )
        .with_events(tx);
        let mirror = MirrorResolver::new(resolver, &config).unwrap();

        let binding = mirror
            .resolve_mirror(&original(234), &CancellationToken::new())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(binding.mirror_provider, "fallback");
        assert_eq!(mirror.resolver.transport_requests().len(), 4);

        drop(mirror);
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        let exhausted = events
            .iter()
            .position(|event| {
                *event
                    == Event::RetriesExhausted {
                        source: "primary".to_owned(),
                    }
            })
            .unwrap();
        let bound = events
            .iter()
            .position(|event| {
                *event
                    == Event::MirrorBound {
                        source: "lastfm".to_owned(),
                        mirror: "fallback".to_owned(),
                    }
            })
            .unwrap();
        assert!(exhausted < bound);
        assert!(!events.contains(&Event::RetriesExhausted {
            source: "fallback".to_owned()
        }));
    }

    #[test]
    fn non_mirror_providers_are_rejected() {
        let mut config = config();
        config.mirror.providers = vec!["lastfm".to_owned()];
        let resolver = Resolver::new(
            MockTransport::default(),
            Providers::from_config(&config).unwrap(),
            RetryPolicy::from_config(&config),
        );
        let error = MirrorResolver::new(resolver, &config).err().unwrap();
        assert_eq!(error.kind, ErrorKind::InvalidArgument);
    }
}

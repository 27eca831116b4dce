//! Events emitted while resolving tracks and binding mirrors.
//!
//! Events are delivered over an optional unbounded channel so that hosts can
//! observe retries and mirror decisions without parsing log output.
//!
//! # Example
//!
//! ```rust
//! use mirrorsrc::events::Event;
//!
//! fn handle_event(event: Event) {
//!     match event {
//!         Event::Retry { source, attempt } => println!("{source}: retry {attempt}"),
//!         Event::MirrorBound { mirror, .. } => println!("streaming from {mirror}"),
//!         _ => {}
//!     }
//! }
//! ```

use tokio::sync::mpsc;

/// Events that can be emitted by the resolver or the mirror resolver.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Event {
    /// A request to `source` timed out and is tried again.
    ///
    /// `attempt` is the number of the upcoming attempt, so the first retry
    /// reports attempt 2.
    Retry { source: String, attempt: u32 },

    /// All attempts to `source` timed out; the result degrades to no result.
    RetriesExhausted { source: String },

    /// A track from `source` was bound to a stream from `mirror`.
    MirrorBound { source: String, mirror: String },

    /// No mirror provider had a matching candidate for a track from `source`.
    MirrorMissed { source: String },
}

/// Sending half handed to the resolver components.
pub type EventSender = mpsc::UnboundedSender<Event>;

/// Sends `event` if anyone is listening.
///
/// A closed channel is not an error: the host simply stopped observing.
pub(crate) fn emit(sender: Option<&EventSender>, event: Event) {
    if let Some(sender) = sender {
        if sender.send(event).is_err() {
            trace!("event receiver dropped");
        }
    }
}

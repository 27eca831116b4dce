//! Timeout-only retry policy.
//!
//! Provider calls that time out are retried with exponential backoff, up to
//! a configured number of additional attempts. Any other failure is final.
//! Running out of attempts is not an error: [`RetryPolicy::run`] then
//! returns `Ok(None)`, which callers treat as "no result".
//!
//! Every attempt and every backoff sleep races the caller's cancellation
//! token. Cancelling drops the in-flight request future, which releases its
//! connection.

use std::{future::Future, time::Duration};

use exponential_backoff::Backoff;
use tokio_util::sync::CancellationToken;

use crate::{
    config::Config,
    error::{Error, Result},
    events::{self, Event, EventSender},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts after the first.
    pub max_retries: u32,

    /// First backoff delay.
    pub min_delay: Duration,

    /// Upper bound for any backoff delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_retries: config.max_retries,
            min_delay: config.retry_delay,
            max_delay: config.retry_max_delay.max(config.retry_delay),
        }
    }

    /// Runs `operation` until it succeeds, fails for a reason other than a
    /// timeout, or has timed out `max_retries + 1` times.
    ///
    /// `source` names the provider in logs and events. A [`Event::Retry`] is
    /// emitted before every retry and [`Event::RetriesExhausted`] when giving
    /// up.
    ///
    /// # Errors
    ///
    /// * `Cancelled` if `cancel` fires first
    /// * the operation's error if it is not a timeout
    pub async fn run<T, F, Fut>(
        &self,
        source: &str,
        events: Option<&EventSender>,
        cancel: &CancellationToken,
        mut operation: F,
    ) -> Result<Option<T>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_attempts = self.max_retries.saturating_add(1);
        let backoff = Backoff::new(max_attempts, self.min_delay, self.max_delay);
        let mut delays = (&backoff).into_iter();
        let mut attempt = 1;

        loop {
            let result = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(cancelled(source)),
                result = operation() => result,
            };

            match result {
                Ok(value) => return Ok(Some(value)),
                Err(e) if e.is_transient() => {
                    if attempt >= max_attempts {
                        info!("{source}: giving up after {attempt} attempts: {e}");
                        events::emit(
                            events,
                            Event::RetriesExhausted {
                                source: source.to_owned(),
                            },
                        );
                        return Ok(None);
                    }

                    let delay = delays.next().flatten().unwrap_or(self.min_delay);
                    attempt += 1;
                    warn!(
                        "{source}: {e}; retrying in {}ms (attempt {attempt} of {max_attempts})",
                        delay.as_millis()
                    );
                    events::emit(
                        events,
                        Event::Retry {
                            source: source.to_owned(),
                            attempt,
                        },
                    );

                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => return Err(cancelled(source)),
                        () = tokio::time::sleep(delay) => {}
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn cancelled(source: &str) -> Error {
    Error::cancelled(format!("{source}: request cancelled"))
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    };

    use tokio::sync::mpsc;

    use super::*;
    use crate::error::ErrorKind;

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 2,
            min_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        }
    }

    /// Fails with `errors` in order, then succeeds with the attempt count.
    async fn scripted(calls: Arc<AtomicU32>, errors: Vec<ErrorKind>) -> Result<u32> {
        let call = calls.fetch_add(1, Ordering::SeqCst);
        match errors.get(call as usize) {
            Some(kind) => Err(Error::new(*kind, "scripted failure")),
            None => Ok(call + 1),
        }
    }

    #[tokio::test]
    async fn timeouts_are_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let errors = vec![ErrorKind::DeadlineExceeded, ErrorKind::DeadlineExceeded];

        let result = policy()
            .run("test", Some(&tx), &CancellationToken::new(), || {
                scripted(Arc::clone(&calls), errors.clone())
            })
            .await
            .unwrap();

        assert_eq!(result, Some(3));
        drop(tx);
        let mut retries = Vec::new();
        while let Some(event) = rx.recv().await {
            retries.push(event);
        }
        assert_eq!(
            retries,
            [
                Event::Retry {
                    source: "test".to_owned(),
                    attempt: 2
                },
                Event::Retry {
                    source: "test".to_owned(),
                    attempt: 3
                },
            ]
        );
    }

    #[tokio::test]
    async fn exhaustion_is_no_result() {
        let calls = Arc::new(AtomicU32::new(0));
        let errors = vec![ErrorKind::DeadlineExceeded; 3];

        let result = policy()
            .run("test", None, &CancellationToken::new(), || {
                scripted(Arc::clone(&calls), errors.clone())
            })
            .await
            .unwrap();

        assert_eq!(result, None);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn other_errors_are_final() {
        let calls = Arc::new(AtomicU32::new(0));
        let errors = vec![ErrorKind::Unavailable];

        let result = policy()
            .run("test", None, &CancellationToken::new(), || {
                scripted(Arc::clone(&calls), errors.clone())
            })
            .await;

        assert_eq!(result.unwrap_err().kind, ErrorKind::Unavailable);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancellation_aborts() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = policy()
            .run("test", None, &cancel, || std::future::pending::<Result<()>>())
            .await;

        assert_eq!(result.unwrap_err().kind, ErrorKind::Cancelled);
    }
}

//! Debounced saves.
//!
//! Rapid edits collapse into one write: each call bumps a version and starts
//! an idle timer, and only the timer whose version is still current saves.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::error::Result;

/// Idle period after the last edit before content is saved.
pub const SAVE_IDLE_WINDOW: Duration = Duration::from_millis(1000);

type SaveFuture = Pin<Box<dyn Future<Output = Result<()>> + Send>>;
type SaveFn<T> = Arc<dyn Fn(T) -> SaveFuture + Send + Sync>;

struct PendingSave<T> {
    version: u64,
    value: Option<T>,
}

/// Runs `save` with the latest value once calls stop for `delay`.
pub struct Debouncer<T> {
    state: Arc<Mutex<PendingSave<T>>>,
    save: SaveFn<T>,
    delay: Duration,
}

impl<T> Clone for Debouncer<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            save: Arc::clone(&self.save),
            delay: self.delay,
        }
    }
}

impl<T: Send + 'static> Debouncer<T> {
    pub fn new<F, Fut>(delay: Duration, save: F) -> Self
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        Self {
            state: Arc::new(Mutex::new(PendingSave {
                version: 0,
                value: None,
            })),
            save: Arc::new(move |value| Box::pin(save(value))),
            delay,
        }
    }

    /// Store `value` as the latest and restart the idle window.
    ///
    /// Must be called from within a tokio runtime.
    pub fn call(&self, value: T) {
        let version = {
            let mut state = self.lock();
            state.version += 1;
            state.value = Some(value);
            state.version
        };

        let debouncer = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(debouncer.delay).await;

            let value = {
                let mut state = debouncer.lock();
                if state.version != version {
                    return;
                }
                state.value.take()
            };
            if let Some(value) = value {
                if let Err(error) = (debouncer.save)(value).await {
                    tracing::error!("Failed to save: {}", error);
                }
            }
        });
    }

    /// Drop the pending value; its timer will not save.
    pub fn cancel(&self) {
        let mut state = self.lock();
        state.version += 1;
        state.value = None;
    }

    /// Save the pending value now, if there is one.
    pub async fn flush(&self) -> Result<()> {
        let value = {
            let mut state = self.lock();
            state.version += 1;
            state.value.take()
        };
        match value {
            Some(value) => (self.save)(value).await,
            None => Ok(()),
        }
    }

    pub fn has_pending(&self) -> bool {
        self.lock().value.is_some()
    }

    fn lock(&self) -> MutexGuard<'_, PendingSave<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use pretty_assertions::assert_eq;

    fn recording_debouncer() -> (Debouncer<String>, Arc<Mutex<Vec<String>>>) {
        let saved = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&saved);
        let debouncer = Debouncer::new(SAVE_IDLE_WINDOW, move |value: String| {
            let sink = Arc::clone(&sink);
            async move {
                sink.lock().unwrap().push(value);
                Ok(())
            }
        });
        (debouncer, saved)
    }

    async fn sleep_ms(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
        tokio::task::yield_now().await;
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_calls_save_latest_value_once() {
        let (debouncer, saved) = recording_debouncer();

        debouncer.call("a".to_string());
        sleep_ms(300).await;
        debouncer.call("ab".to_string());
        sleep_ms(300).await;
        debouncer.call("abc".to_string());

        sleep_ms(999).await;
        assert!(saved.lock().unwrap().is_empty());
        assert!(debouncer.has_pending());

        sleep_ms(2).await;
        assert_eq!(*saved.lock().unwrap(), vec!["abc".to_string()]);
        assert!(!debouncer.has_pending());

        sleep_ms(5_000).await;
        assert_eq!(saved.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn separate_bursts_save_separately() {
        let (debouncer, saved) = recording_debouncer();

        debouncer.call("first".to_string());
        sleep_ms(1_100).await;
        debouncer.call("second".to_string());
        sleep_ms(1_100).await;

        assert_eq!(
            *saved.lock().unwrap(),
            vec!["first".to_string(), "second".to_string()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_drops_pending_value() {
        let (debouncer, saved) = recording_debouncer();

        debouncer.call("draft".to_string());
        debouncer.cancel();
        sleep_ms(2_000).await;

        assert!(saved.lock().unwrap().is_empty());
        assert!(!debouncer.has_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn flush_saves_immediately_and_disarms_timer() {
        let (debouncer, saved) = recording_debouncer();

        debouncer.call("now".to_string());
        debouncer.flush().await.unwrap();
        assert_eq!(*saved.lock().unwrap(), vec!["now".to_string()]);

        sleep_ms(2_000).await;
        assert_eq!(saved.lock().unwrap().len(), 1);

        debouncer.flush().await.unwrap();
        assert_eq!(saved.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_save_is_reported_by_flush_and_logged_by_timer() {
        let debouncer = Debouncer::new(SAVE_IDLE_WINDOW, |_: u32| async {
            Err(Error::Store("offline".to_string()))
        });

        debouncer.call(1);
        assert!(debouncer.flush().await.is_err());

        debouncer.call(2);
        sleep_ms(1_500).await;
        assert!(!debouncer.has_pending());
    }
}

//! 🚦 Readiness: "can we write yet?", asked before every batch.
//!
//! The indexer consults a [`Readiness`] predicate before each bulk request. The
//! lifecycle controller owns a [`ReadySignal`] that provisioning resolves exactly
//! once (true on success, false on failure); its predicate waits for that first
//! answer and then keeps giving it. 🦆

use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::watch;

/// 🚦 Async predicate: may the indexer write right now?
pub type Readiness = Arc<dyn Fn() -> BoxFuture<'static, bool> + Send + Sync>;

/// ✅ A predicate that always says yes. For tests and for stores that need no provisioning.
pub fn always_ready() -> Readiness {
    readiness_fn(|| async { true })
}

/// 🔧 Lift an async closure into a [`Readiness`].
pub fn readiness_fn<F, Fut>(predicate: F) -> Readiness
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = bool> + Send + 'static,
{
    Arc::new(move || predicate().boxed())
}

/// 📣 A one-shot boolean that many can await. First signal wins; later signals are ignored.
#[derive(Debug, Clone)]
pub struct ReadySignal {
    tx: Arc<watch::Sender<Option<bool>>>,
}

impl Default for ReadySignal {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadySignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// 📣 Resolve the signal. Returns whether this call was the one that resolved it.
    pub fn signal(&self, ready: bool) -> bool {
        self.tx.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(ready);
            true
        })
    }

    /// 👀 The answer, if there is one yet.
    pub fn peek(&self) -> Option<bool> {
        *self.tx.borrow()
    }

    /// ⏳ Wait for the answer.
    pub async fn wait(&self) -> bool {
        let mut rx = self.tx.subscribe();
        match rx.wait_for(Option::is_some).await {
            Ok(answer) => answer.unwrap_or(false),
            // -- the sender lives in self, so this only happens mid-teardown
            Err(_) => false,
        }
    }

    /// 🚦 A [`Readiness`] predicate backed by this signal.
    pub fn as_readiness(&self) -> Readiness {
        let signal = self.clone();
        readiness_fn(move || {
            let signal = signal.clone();
            async move { signal.wait().await }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn the_one_where_the_first_answer_is_the_only_answer() {
        let signal = ReadySignal::new();
        assert_eq!(signal.peek(), None);
        assert!(signal.signal(false));
        assert!(!signal.signal(true));
        assert!(!signal.wait().await);
        assert!(!(signal.as_readiness())().await);
    }

    #[tokio::test(start_paused = true)]
    async fn the_one_where_waiters_wait_for_provisioning() {
        let signal = ReadySignal::new();
        let readiness = signal.as_readiness();
        let waiter = tokio::spawn(async move { readiness().await });

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(!waiter.is_finished());

        signal.signal(true);
        assert!(waiter.await.unwrap());
    }

    #[tokio::test]
    async fn the_one_where_always_ready_is_always_ready() {
        assert!((always_ready())().await);
    }
}

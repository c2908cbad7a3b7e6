//! External invalidation signals.
//!
//! A cache can listen to any number of [`InvalidationSource`]s. Every signal
//! received is counted and turned into one `invalidate_all` call; the
//! aggregator then decides when the reload actually runs.

use async_trait::async_trait;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

/// A stream of "the dataset changed" signals.
///
/// Implement it over the transport that carries change notifications, for
/// example a message broker subscription.
///
/// # Example
///
/// ```ignore
/// use reservoir_core::InvalidationSource;
///
/// struct BrokerTopic { subscription: broker::Subscription }
///
/// #[async_trait]
/// impl InvalidationSource for BrokerTopic {
///     fn name(&self) -> &str {
///         "codes.changed"
///     }
///
///     async fn recv(&mut self) -> Option<()> {
///         self.subscription.next().await.map(|_| ())
///     }
/// }
/// ```
#[async_trait]
pub trait InvalidationSource: Send + 'static {
    /// Returns the name of this source, used for logging.
    fn name(&self) -> &str;

    /// Waits for the next signal. `None` means the source is closed for good.
    async fn recv(&mut self) -> Option<()>;
}

/// In-process publish/subscribe channel of invalidation signals.
///
/// Every [`subscribe`](Self::subscribe)d cache reacts to each
/// [`publish`](Self::publish). Subscribers that fall behind see the missed
/// signals as a single one, which is enough since a reload covers them all.
#[derive(Debug, Clone)]
pub struct InvalidationBus {
    name: String,
    tx: broadcast::Sender<()>,
}

impl InvalidationBus {
    const CAPACITY: usize = 16;

    pub fn new(name: impl Into<String>) -> Self {
        let (tx, _) = broadcast::channel(Self::CAPACITY);
        Self {
            name: name.into(),
            tx,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Publishes one signal, returning the number of subscribers reached.
    pub fn publish(&self) -> usize {
        let receivers = self.tx.send(()).unwrap_or(0);
        trace!(bus = %self.name, receivers, "Invalidation published");
        receivers
    }

    /// Creates a new source that receives signals published from now on.
    pub fn subscribe(&self) -> BusSubscription {
        BusSubscription {
            name: self.name.clone(),
            rx: self.tx.subscribe(),
        }
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// Receiving end of an [`InvalidationBus`].
#[derive(Debug)]
pub struct BusSubscription {
    name: String,
    rx: broadcast::Receiver<()>,
}

#[async_trait]
impl InvalidationSource for BusSubscription {
    fn name(&self) -> &str {
        &self.name
    }

    async fn recv(&mut self) -> Option<()> {
        match self.rx.recv().await {
            Ok(()) => Some(()),
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                debug!(bus = %self.name, missed, "Subscriber lagged, missed signals folded into one");
                Some(())
            },
            Err(broadcast::error::RecvError::Closed) => None,
        }
    }
}

/// Boxed source, as stored in the cache parameters.
pub type BoxedSource = Box<dyn InvalidationSource>;

/// Forwards every signal of `source` to `on_signal` until the source closes
/// or `cancel` fires.
pub(crate) fn spawn_listener<F>(
    cache: String,
    mut source: BoxedSource,
    cancel: CancellationToken,
    on_signal: F,
) -> JoinHandle<()>
where
    F: Fn() + Send + 'static,
{
    tokio::spawn(async move {
        debug!(cache = %cache, source = %source.name(), "Listening for invalidations");

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(cache = %cache, source = %source.name(), "Invalidation listener stopped");
                    return;
                },
                signal = source.recv() => match signal {
                    Some(()) => {
                        trace!(cache = %cache, source = %source.name(), "Invalidation received");
                        on_signal();
                    },
                    None => {
                        warn!(cache = %cache, source = %source.name(), "Invalidation source closed");
                        return;
                    },
                },
            }
        }
    })
}

use std::future::Future;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::error::FetchError;

/// Handed to a background request; identifies it when it reports back.
#[derive(Debug, Clone)]
pub struct Ticket {
    pub generation: u64,
    pub token: CancellationToken,
}

/// Single-flight slot for one logical target (the story list, the open
/// thread). Starting a request cancels the one before it, and only the
/// newest generation may publish its result.
#[derive(Debug, Default)]
pub struct RequestSlot {
    generation: u64,
    token: Option<CancellationToken>,
    pending: bool,
}

impl RequestSlot {
    pub fn begin(&mut self) -> Ticket {
        if let Some(previous) = self.token.take() {
            previous.cancel();
        }

        self.generation += 1;
        self.pending = true;
        let token = CancellationToken::new();
        self.token = Some(token.clone());
        Ticket {
            generation: self.generation,
            token,
        }
    }

    // Follow-up work (expanding a reply) dies with the request that owns it
    pub fn child(&self) -> Option<Ticket> {
        self.token.as_ref().map(|token| Ticket {
            generation: self.generation,
            token: token.child_token(),
        })
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.token.is_some() && self.generation == generation
    }

    /// Mark the request as done. Returns false for stale completions,
    /// which must be discarded.
    pub fn finish(&mut self, generation: u64) -> bool {
        if !self.is_current(generation) {
            return false;
        }
        self.pending = false;
        true
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    pub fn cancel(&mut self) {
        if let Some(token) = self.token.take() {
            token.cancel();
        }
        self.pending = false;
    }
}

/// Run `fut` unless the ticket is cancelled first.
pub async fn run_cancellable<T, F>(token: &CancellationToken, fut: F) -> Result<T, FetchError>
where
    F: Future<Output = Result<T, FetchError>>,
{
    tokio::select! {
        _ = token.cancelled() => Err(FetchError::Cancelled),
        result = fut => result,
    }
}

/// Interval timer bound to the lifetime of a view. Dropping it stops it.
pub struct RefreshTimer {
    token: CancellationToken,
}

impl RefreshTimer {
    // The first tick fires one full period after start; mounting already loads
    pub fn start<F>(handle: &Handle, period: Duration, mut on_tick: F) -> Self
    where
        F: FnMut() -> bool + Send + 'static,
    {
        let token = CancellationToken::new();
        let cancelled = token.clone();

        handle.spawn(async move {
            let start = tokio::time::Instant::now() + period;
            let mut interval = tokio::time::interval_at(start, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = cancelled.cancelled() => break,
                    _ = interval.tick() => {
                        tracing::debug!("refresh timer fired");
                        if !on_tick() {
                            break;
                        }
                    }
                }
            }
        });

        Self { token }
    }

    pub fn stop(&self) {
        self.token.cancel();
    }
}

impl Drop for RefreshTimer {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

//! Weighted semaphore tracking bytes currently in flight for block
//! requests. Unlike `tokio::sync::Semaphore`, capacity can grow or shrink at
//! runtime (§4.9 byte-semaphore), which is why this is hand-rolled over a
//! `Mutex` + `Notify` rather than reusing the stock primitive.

use std::future::Future;
use std::sync::Mutex;

use tokio::sync::Notify;

struct Inner {
    available: u64,
    max: u64,
}

pub struct ByteSemaphore {
    inner: Mutex<Inner>,
    notify: Notify,
}

/// Returned by [`ByteSemaphore::take_with_cancel`] when the cancellation
/// future resolved before enough bytes became available.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

impl ByteSemaphore {
    pub fn new(max: u64) -> Self {
        Self {
            inner: Mutex::new(Inner {
                available: max,
                max,
            }),
            notify: Notify::new(),
        }
    }

    pub fn available(&self) -> u64 {
        self.inner.lock().unwrap().available
    }

    pub fn max(&self) -> u64 {
        self.inner.lock().unwrap().max
    }

    /// Blocks until `min(n, max)` bytes are available, then reserves them.
    /// `n` larger than the configured capacity is clamped so this never
    /// deadlocks against a fixed max.
    pub async fn take(&self, n: u64) {
        loop {
            // Register interest before inspecting state so a concurrent
            // `give`/`set_capacity` can't be missed between the check and
            // the await below.
            let notified = self.notify.notified();
            {
                let mut inner = self.inner.lock().unwrap();
                let want = n.min(inner.max);
                if inner.available >= want {
                    inner.available -= want;
                    return;
                }
            }
            notified.await;
        }
    }

    /// As [`Self::take`], but returns early with [`Cancelled`] if `cancel`
    /// resolves first.
    pub async fn take_with_cancel<F>(&self, n: u64, mut cancel: F) -> Result<(), Cancelled>
    where
        F: Future<Output = ()> + Unpin,
    {
        loop {
            let notified = self.notify.notified();
            {
                let mut inner = self.inner.lock().unwrap();
                let want = n.min(inner.max);
                if inner.available >= want {
                    inner.available -= want;
                    return Ok(());
                }
            }
            tokio::select! {
                _ = notified => {}
                _ = &mut cancel => return Err(Cancelled),
            }
        }
    }

    /// Returns `n` bytes to the pool, clamped so `available` never exceeds
    /// `max`, and wakes every blocked waiter to re-check its condition.
    pub fn give(&self, n: u64) {
        let mut inner = self.inner.lock().unwrap();
        inner.available = (inner.available + n).min(inner.max);
        drop(inner);
        self.notify.notify_waiters();
    }

    /// Adjusts capacity, shifting `available` by the same delta (clamped to
    /// `0..=cap`), and wakes every blocked waiter.
    pub fn set_capacity(&self, cap: u64) {
        let mut inner = self.inner.lock().unwrap();
        let delta = cap as i128 - inner.max as i128;
        inner.max = cap;
        let new_available = (inner.available as i128 + delta).clamp(0, cap as i128);
        inner.available = new_available as u64;
        drop(inner);
        self.notify.notify_waiters();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn take_then_give_roundtrips() {
        let s = ByteSemaphore::new(100);
        s.take(75).await;
        assert_eq!(s.available(), 25);
        s.give(75);
        assert_eq!(s.available(), 100);
    }

    #[tokio::test]
    async fn take_clamps_to_max() {
        let s = ByteSemaphore::new(10);
        s.take(1_000).await;
        assert_eq!(s.available(), 0);
    }

    #[tokio::test]
    async fn max_zero_never_blocks() {
        let s = ByteSemaphore::new(0);
        s.take(50).await;
        assert_eq!(s.available(), 0);
        s.give(50);
        assert_eq!(s.available(), 0);
    }

    #[tokio::test]
    async fn set_capacity_raise_unblocks_waiter() {
        // S3: s=new(100); take(75) -> available=25; concurrent take(75)
        // blocks; set_capacity(150) unblocks the waiter, available=0.
        let s = Arc::new(ByteSemaphore::new(100));
        s.take(75).await;
        assert_eq!(s.available(), 25);

        let s2 = s.clone();
        let waiter = tokio::spawn(async move {
            s2.take(75).await;
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        s.set_capacity(150);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should unblock")
            .unwrap();

        assert_eq!(s.available(), 0);
        assert_eq!(s.max(), 150);
    }

    #[tokio::test]
    async fn take_with_cancel_returns_early() {
        let s = ByteSemaphore::new(10);
        s.take(10).await; // drain
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let cancel = async move {
            let _ = rx.await;
        };
        tokio::pin!(cancel);
        let fut = s.take_with_cancel(5, cancel);
        tokio::pin!(fut);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            let _ = tx.send(());
        });
        let result = fut.await;
        assert_eq!(result, Err(Cancelled));
        handle.await.unwrap();
    }
}

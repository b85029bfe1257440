use std::sync::atomic::{AtomicBool, Ordering};

/// A tokio semaphore that can be switched off entirely.
///
/// While disabled (the initial state, or after `setup(0)`) every acquire returns immediately.
pub struct Semaphore {
    enabled: AtomicBool,
    sem: tokio::sync::Semaphore,
}

impl Semaphore {
    pub fn new() -> Self {
        Self {
            enabled: AtomicBool::new(false),
            sem: tokio::sync::Semaphore::const_new(0),
        }
    }

    pub fn setup(&self, value: usize) {
        let value = value.min(tokio::sync::Semaphore::MAX_PERMITS);
        self.enabled.store(value > 0, Ordering::Release);
        if value == 0 {
            return;
        }
        self.sem.forget_permits(self.sem.available_permits());
        self.sem.add_permits(value);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Returns a permit released on drop, or `None` when the limit is disabled.
    pub async fn acquire(&self) -> Option<tokio::sync::SemaphorePermit<'_>> {
        if !self.is_enabled() {
            return None;
        }
        // the semaphore is never closed so acquire cannot fail
        self.sem.acquire().await.ok()
    }

    /// Takes one token for good; tokens come back only through replenishment.
    pub async fn consume(&self) {
        if !self.is_enabled() {
            return;
        }
        if let Ok(permit) = self.sem.acquire().await {
            permit.forget();
        }
    }

    #[cfg(test)]
    pub fn available(&self) -> usize {
        self.sem.available_permits()
    }

    pub async fn run_replenish_thread(&self, replenish: usize, interval: std::time::Duration) {
        if !self.is_enabled() {
            return;
        }
        loop {
            tokio::time::sleep(interval).await;
            let curr_permits = self.sem.available_permits();
            if curr_permits >= replenish {
                continue;
            }
            self.sem.add_permits(replenish - curr_permits);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disabled_never_waits() {
        let sem = Semaphore::new();
        let first = sem.acquire().await;
        let second = sem.acquire().await;
        assert!(first.is_none());
        assert!(second.is_none());
        sem.consume().await;
    }

    #[tokio::test]
    async fn permits_bound_concurrency() {
        let sem = Semaphore::new();
        sem.setup(2);
        let _a = sem.acquire().await;
        let b = sem.acquire().await;
        assert!(b.is_some());
        assert_eq!(sem.available(), 0);
        let third =
            tokio::time::timeout(std::time::Duration::from_millis(50), sem.acquire()).await;
        assert!(third.is_err(), "third permit must wait while two are held");
        drop(b);
        assert_eq!(sem.available(), 1);
        assert!(sem.acquire().await.is_some());
    }

    #[tokio::test]
    async fn setup_resets_permit_count() {
        let sem = Semaphore::new();
        sem.setup(5);
        sem.consume().await;
        assert_eq!(sem.available(), 4);
        sem.setup(3);
        assert_eq!(sem.available(), 3);
        sem.setup(0);
        assert!(!sem.is_enabled());
    }

    #[tokio::test(start_paused = true)]
    async fn replenish_refills_consumed_tokens() {
        let sem = std::sync::Arc::new(Semaphore::new());
        sem.setup(2);
        sem.consume().await;
        sem.consume().await;
        assert_eq!(sem.available(), 0);
        let replenish = {
            let sem = sem.clone();
            tokio::spawn(async move {
                sem.run_replenish_thread(2, std::time::Duration::from_millis(100))
                    .await
            })
        };
        tokio::time::sleep(std::time::Duration::from_millis(150)).await;
        assert_eq!(sem.available(), 2);
        replenish.abort();
    }
}

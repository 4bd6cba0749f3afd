//! Pool borné pour les appels bloquants à l'extracteur
//!
//! Chaque appel attend un permis (au plus `admission_timeout`), puis tourne
//! sur un thread bloquant de tokio. Le permis voyage avec la closure et n'est
//! rendu qu'à la fin réelle du travail, même si l'appelant a abandonné après
//! `call_timeout` : le nombre d'extractions simultanées reste borné par la
//! taille du pool.

use crate::error::{ResolutionError, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    size: usize,
    admission_timeout: Duration,
    call_timeout: Duration,
}

impl WorkerPool {
    pub fn new(size: usize, admission_timeout: Duration, call_timeout: Duration) -> Self {
        let size = size.max(1);
        Self {
            permits: Arc::new(Semaphore::new(size)),
            size,
            admission_timeout,
            call_timeout,
        }
    }

    /// Exécute `job` hors du contexte asynchrone
    ///
    /// - pool saturé au-delà de `admission_timeout` : `Unavailable`
    /// - travail plus long que `call_timeout` : `Timeout`
    pub async fn run<F, T>(&self, job: F) -> Result<T>
    where
        F: FnOnce() -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let permit = match timeout(self.admission_timeout, self.permits.clone().acquire_owned()).await
        {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => {
                return Err(ResolutionError::Unavailable("worker pool closed".into()));
            }
            Err(_) => {
                warn!(
                    size = self.size,
                    "Worker pool saturated for {:?}", self.admission_timeout
                );
                return Err(ResolutionError::Unavailable("worker pool saturated".into()));
            }
        };

        debug!(in_flight = self.in_flight(), "Worker admitted");

        let handle = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            job()
        });

        match timeout(self.call_timeout, handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(ResolutionError::Unavailable(format!(
                "extraction task failed: {}",
                e
            ))),
            Err(_) => Err(ResolutionError::Timeout(self.call_timeout)),
        }
    }

    /// Taille du pool
    pub fn size(&self) -> usize {
        self.size
    }

    /// Nombre de travaux en cours
    pub fn in_flight(&self) -> usize {
        self.size - self.permits.available_permits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn test_runs_job_off_thread() {
        let pool = WorkerPool::new(2, Duration::from_secs(1), Duration::from_secs(1));
        let value = pool.run(|| Ok(21 * 2)).await.unwrap();
        assert_eq!(value, 42);
        assert_eq!(pool.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_job_error_is_propagated() {
        let pool = WorkerPool::new(1, Duration::from_secs(1), Duration::from_secs(1));
        let err = pool
            .run(|| Err::<(), _>(ResolutionError::NotFound("abc".into())))
            .await
            .unwrap_err();
        assert_eq!(err, ResolutionError::NotFound("abc".into()));
    }

    #[tokio::test]
    async fn test_call_timeout() {
        let pool = WorkerPool::new(1, Duration::from_secs(1), Duration::from_millis(50));
        let err = pool
            .run(|| {
                std::thread::sleep(Duration::from_millis(300));
                Ok(())
            })
            .await
            .unwrap_err();
        assert_eq!(err, ResolutionError::Timeout(Duration::from_millis(50)));
    }

    #[tokio::test]
    async fn test_saturation_is_rejected_after_admission_timeout() {
        let pool = WorkerPool::new(1, Duration::from_millis(50), Duration::from_secs(5));

        let busy = pool.clone();
        let first = tokio::spawn(async move {
            busy.run(|| {
                std::thread::sleep(Duration::from_millis(400));
                Ok(())
            })
            .await
        });

        // Laisse le premier travail prendre le permis
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(pool.in_flight(), 1);

        let started = Instant::now();
        let err = pool.run(|| Ok(())).await.unwrap_err();
        assert!(matches!(err, ResolutionError::Unavailable(_)));
        assert!(started.elapsed() < Duration::from_millis(300));

        first.await.unwrap().unwrap();
        assert_eq!(pool.in_flight(), 0);
    }
}

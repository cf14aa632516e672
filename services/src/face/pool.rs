use std::sync::Arc;

use tokio::sync::Semaphore;

use super::FaceError;
use super::detector::{FaceDetector, extract_embedding};
use super::matcher::{MatchDecision, decide};

/// Fixed-size pool for embedding extraction and matching.
///
/// Each job holds a permit for as long as its blocking thread runs, including
/// after the awaiting caller has given up, so at most `size` inferences are ever
/// in flight. Callers beyond that queue on the semaphore.
#[derive(Clone)]
pub struct FaceWorkerPool {
    detector: Arc<dyn FaceDetector>,
    permits: Arc<Semaphore>,
    size: usize,
}

impl FaceWorkerPool {
    pub fn new(detector: Arc<dyn FaceDetector>, size: usize) -> Self {
        let size = size.max(1);
        Self {
            detector,
            permits: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Permits not currently held by a running job.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Runs `job` on a blocking thread once a permit is free.
    pub async fn run<T, F>(&self, job: F) -> Result<T, FaceError>
    where
        T: Send + 'static,
        F: FnOnce(&dyn FaceDetector) -> Result<T, FaceError> + Send + 'static,
    {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| FaceError::PoolClosed)?;
        let detector = self.detector.clone();

        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            job(detector.as_ref())
        })
        .await
        .map_err(|e| FaceError::Model(format!("Face worker failed: {e}")))?
    }

    pub async fn extract(&self, image: Vec<u8>) -> Result<Vec<f32>, FaceError> {
        self.run(move |detector| extract_embedding(detector, &image)).await
    }

    /// Extracts the sample from `image` and decides it against `enrolled`.
    pub async fn verify(
        &self,
        image: Vec<u8>,
        enrolled: Vec<Vec<f32>>,
        threshold: f32,
    ) -> Result<MatchDecision, FaceError> {
        self.run(move |detector| {
            let sample = extract_embedding(detector, &image)?;
            decide(&enrolled, &sample, threshold)
        })
        .await
    }

    /// Rejects queued and future jobs. Running jobs finish.
    pub fn close(&self) {
        self.permits.close();
    }
}

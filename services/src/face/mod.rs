//! Biometric matching: embedding extraction behind a detector seam, multi-template
//! cosine matching, and the bounded worker pool that keeps both off the async
//! request threads.

pub mod detector;
pub mod image;
pub mod matcher;
pub mod pool;

pub use detector::{BoundingBox, DetectedFace, FaceDetector, RemoteFaceDetector, extract_embedding};
pub use matcher::{MatchDecision, compare, decide, normalize};
pub use pool::FaceWorkerPool;

#[derive(Debug, thiserror::Error)]
pub enum FaceError {
    #[error("No face detected in the image")]
    NoFaceDetected,

    #[error("No enrolled face embeddings")]
    NoEnrollment,

    #[error("{0}")]
    InvalidImage(String),

    #[error("Embedding dimension mismatch: enrolled {enrolled}, sample {sample}")]
    DimensionMismatch { enrolled: usize, sample: usize },

    #[error("Face model error: {0}")]
    Model(String),

    #[error("Face worker pool is closed")]
    PoolClosed,
}

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use tokio::runtime::Handle;

use super::FaceError;
use super::matcher::normalize;

/// `[x1, y1, x2, y2]` in image pixels.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(from = "[f32; 4]")]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl From<[f32; 4]> for BoundingBox {
    fn from([x1, y1, x2, y2]: [f32; 4]) -> Self {
        Self { x1, y1, x2, y2 }
    }
}

impl BoundingBox {
    pub fn area(&self) -> f32 {
        (self.x2 - self.x1).max(0.0) * (self.y2 - self.y1).max(0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DetectedFace {
    pub bbox: BoundingBox,
    pub embedding: Vec<f32>,
}

/// Model inference boundary. Implementations are blocking and CPU or I/O bound;
/// they are only ever called from [`super::FaceWorkerPool`] threads.
pub trait FaceDetector: Send + Sync {
    fn detect(&self, image: &[u8]) -> Result<Vec<DetectedFace>, FaceError>;
}

/// Runs detection and returns the L2-normalised embedding of the largest face.
///
/// Ties on area keep the first face reported by the detector.
pub fn extract_embedding(detector: &dyn FaceDetector, image: &[u8]) -> Result<Vec<f32>, FaceError> {
    let faces = detector.detect(image)?;
    let largest = faces
        .into_iter()
        .reduce(|best, face| {
            if face.bbox.area() > best.bbox.area() {
                face
            } else {
                best
            }
        })
        .ok_or(FaceError::NoFaceDetected)?;

    normalize(&largest.embedding)
}

#[derive(Deserialize)]
struct DetectResponse {
    faces: Vec<DetectedFace>,
}

/// Posts raw image bytes to an embedding service and parses
/// `{"faces": [{"bbox": [x1, y1, x2, y2], "embedding": [..]}]}`.
pub struct RemoteFaceDetector {
    client: Client,
    url: String,
    runtime: Handle,
}

impl RemoteFaceDetector {
    /// Must be called from within a Tokio runtime; requests are driven on it.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, FaceError> {
        let client = Client::builder()
            .timeout(timeout)
            .gzip(true)
            .build()
            .map_err(|e| FaceError::Model(format!("Failed to build HTTP client: {e}")))?;
        let runtime = Handle::try_current()
            .map_err(|e| FaceError::Model(format!("No async runtime for face detector: {e}")))?;

        Ok(Self {
            client,
            url: url.into(),
            runtime,
        })
    }

    async fn fetch(&self, image: Vec<u8>) -> Result<Vec<DetectedFace>, FaceError> {
        let response = self
            .client
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(image)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| FaceError::Model(format!("Face service request failed: {e}")))?;

        let body: DetectResponse = response
            .json()
            .await
            .map_err(|e| FaceError::Model(format!("Malformed face service response: {e}")))?;

        Ok(body.faces)
    }
}

impl FaceDetector for RemoteFaceDetector {
    fn detect(&self, image: &[u8]) -> Result<Vec<DetectedFace>, FaceError> {
        self.runtime.block_on(self.fetch(image.to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Vec<DetectedFace>);

    impl FaceDetector for Fixed {
        fn detect(&self, _image: &[u8]) -> Result<Vec<DetectedFace>, FaceError> {
            Ok(self.0.clone())
        }
    }

    fn face(bbox: [f32; 4], embedding: Vec<f32>) -> DetectedFace {
        DetectedFace {
            bbox: bbox.into(),
            embedding,
        }
    }

    #[test]
    fn picks_largest_face_and_normalises() {
        let detector = Fixed(vec![
            face([0.0, 0.0, 10.0, 10.0], vec![1.0, 0.0]),
            face([5.0, 5.0, 55.0, 65.0], vec![0.0, 2.0]),
            face([0.0, 0.0, 20.0, 20.0], vec![3.0, 4.0]),
        ]);
        assert_eq!(extract_embedding(&detector, b"img").unwrap(), vec![0.0, 1.0]);
    }

    #[test]
    fn no_faces_is_an_error() {
        let detector = Fixed(vec![]);
        assert!(matches!(
            extract_embedding(&detector, b"img"),
            Err(FaceError::NoFaceDetected)
        ));
    }

    #[test]
    fn parses_service_payload() {
        let body = r#"{"faces":[{"bbox":[1,2,11,22],"embedding":[0.1,0.2]}]}"#;
        let parsed: DetectResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.faces.len(), 1);
        assert_eq!(parsed.faces[0].bbox.area(), 200.0);
    }
}

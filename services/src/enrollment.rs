use std::time::Duration;

use db::models::face_embedding;
use futures::future::try_join_all;
use sea_orm::DatabaseConnection;

use crate::error::AttendanceError;
use crate::face::FaceWorkerPool;
use crate::face::image::decode_base64_image;

/// Registers and replaces users' face templates.
#[derive(Clone)]
pub struct FaceEnrollmentService {
    db: DatabaseConnection,
    faces: FaceWorkerPool,
    request_timeout: Duration,
}

impl FaceEnrollmentService {
    pub fn new(db: DatabaseConnection, faces: FaceWorkerPool, request_timeout: Duration) -> Self {
        Self {
            db,
            faces,
            request_timeout,
        }
    }

    pub async fn register_face(
        &self,
        user_id: i64,
        images: &[String],
    ) -> Result<face_embedding::Model, AttendanceError> {
        if face_embedding::Model::find_by_user(&self.db, user_id).await?.is_some() {
            return Err(AttendanceError::conflict(
                "Face already registered. Use overwrite to replace it.",
            ));
        }
        let vectors = self.embed_all(images).await?;
        let set = face_embedding::Model::create(&self.db, user_id, &vectors).await?;
        tracing::info!(user_id, templates = vectors.len(), "Face registered");
        Ok(set)
    }

    pub async fn overwrite_face(
        &self,
        user_id: i64,
        images: &[String],
    ) -> Result<face_embedding::Model, AttendanceError> {
        let existing = face_embedding::Model::find_by_user(&self.db, user_id)
            .await?
            .ok_or_else(|| AttendanceError::not_found("No registered face to overwrite"))?;
        let vectors = self.embed_all(images).await?;
        let set = face_embedding::Model::replace(&self.db, existing.id, &vectors).await?;
        tracing::info!(user_id, templates = vectors.len(), "Face overwritten");
        Ok(set)
    }

    /// Id of the user's embedding set, if any.
    pub async fn is_face_registered(&self, user_id: i64) -> Result<Option<i64>, AttendanceError> {
        Ok(face_embedding::Model::find_by_user(&self.db, user_id)
            .await?
            .map(|set| set.id))
    }

    /// One embedding per image, in input order. Any failing image fails the batch.
    async fn embed_all(&self, images: &[String]) -> Result<Vec<Vec<f32>>, AttendanceError> {
        if images.is_empty() {
            return Err(AttendanceError::validation("At least one image is required"));
        }
        let decoded = images
            .iter()
            .map(|img| decode_base64_image(img))
            .collect::<Result<Vec<_>, _>>()?;

        let jobs = decoded.into_iter().map(|bytes| self.faces.extract(bytes));
        let vectors = tokio::time::timeout(self.request_timeout, try_join_all(jobs))
            .await
            .map_err(|_| AttendanceError::Timeout)??;

        let dim = vectors[0].len();
        if vectors.iter().any(|v| v.len() != dim) {
            return Err(AttendanceError::Internal(
                "Face model returned embeddings of different sizes".into(),
            ));
        }
        Ok(vectors)
    }
}

use chrono::{DateTime, Utc};
use sea_orm::ActiveValue::Set;
use sea_orm::entity::prelude::*;
use serde::Serialize;

/// A user's enrolled face templates: an ordered list of unit-normalised vectors,
/// one per enrollment image. Each vector is compared on its own at scan time.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "face_embeddings")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(unique)]
    pub user_id: i64,
    /// JSON array of arrays of floats.
    #[serde(skip_serializing)]
    pub embeddings: Json,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    User,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub async fn find_by_user<C: ConnectionTrait>(
        db: &C,
        user_id: i64,
    ) -> Result<Option<Model>, DbErr> {
        Entity::find()
            .filter(Column::UserId.eq(user_id))
            .one(db)
            .await
    }

    pub async fn create(db: &DbConn, user_id: i64, vectors: &[Vec<f32>]) -> Result<Model, DbErr> {
        let now = Utc::now();
        ActiveModel {
            user_id: Set(user_id),
            embeddings: Set(encode(vectors)?),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await
    }

    /// Replaces the stored vectors of an existing set.
    pub async fn replace(db: &DbConn, id: i64, vectors: &[Vec<f32>]) -> Result<Model, DbErr> {
        ActiveModel {
            id: Set(id),
            embeddings: Set(encode(vectors)?),
            updated_at: Set(Utc::now()),
            ..Default::default()
        }
        .update(db)
        .await
    }

    /// Decodes the stored vectors in enrollment order.
    pub fn vectors(&self) -> Result<Vec<Vec<f32>>, DbErr> {
        serde_json::from_value(self.embeddings.clone()).map_err(|e| {
            DbErr::Custom(format!(
                "Corrupt face embeddings for user {}: {e}",
                self.user_id
            ))
        })
    }
}

fn encode(vectors: &[Vec<f32>]) -> Result<Json, DbErr> {
    serde_json::to_value(vectors)
        .map_err(|e| DbErr::Custom(format!("Failed to encode face embeddings: {e}")))
}

use chrono::{DateTime, Utc};
use sea_orm::ActiveValue::Set;
use sea_orm::entity::prelude::*;
use serde::Serialize;

/// A class session container. Owned by a teacher, joined by students.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "rooms")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// The teacher who owns the room and receives attendance notifications.
    pub owner_id: i64,
    pub class_name: String,
    pub section: String,
    pub description: Option<String>,
    /// Scans must come from inside the room's geofence.
    pub geofence_required: bool,
    /// Scans must carry a face image matching the student's enrollment.
    pub face_auth_required: bool,
    pub geofence_id: Option<i64>,
    /// Archived rooms accept no new attendance actions.
    pub archived: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::OwnerId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    Owner,
    #[sea_orm(
        belongs_to = "super::geofence::Entity",
        from = "Column::GeofenceId",
        to = "super::geofence::Column::Id"
    )]
    Geofence,
    #[sea_orm(has_many = "super::attendance_schedule::Entity")]
    Schedules,
    #[sea_orm(has_many = "super::room_user::Entity")]
    Members,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Owner.def()
    }
}

impl Related<super::geofence::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Geofence.def()
    }
}

impl Related<super::attendance_schedule::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Schedules.def()
    }
}

impl Related<super::room_user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Members.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    #[allow(clippy::too_many_arguments)]
    pub async fn create(
        db: &DbConn,
        owner_id: i64,
        class_name: &str,
        section: &str,
        description: Option<&str>,
        geofence_required: bool,
        face_auth_required: bool,
        geofence_id: Option<i64>,
    ) -> Result<Model, DbErr> {
        ActiveModel {
            owner_id: Set(owner_id),
            class_name: Set(class_name.to_owned()),
            section: Set(section.to_owned()),
            description: Set(description.map(|d| d.to_owned())),
            geofence_required: Set(geofence_required),
            face_auth_required: Set(face_auth_required),
            geofence_id: Set(geofence_id),
            archived: Set(false),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(db)
        .await
    }

    pub async fn set_archived(db: &DbConn, id: i64, archived: bool) -> Result<Model, DbErr> {
        ActiveModel {
            id: Set(id),
            archived: Set(archived),
            ..Default::default()
        }
        .update(db)
        .await
    }

    pub fn is_owner(&self, user_id: i64) -> bool {
        self.owner_id == user_id
    }
}

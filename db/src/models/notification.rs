use chrono::{DateTime, Utc};
use sea_orm::ActiveValue::Set;
use sea_orm::entity::prelude::*;
use sea_orm::sea_query::Expr;
use sea_orm::{PaginatorTrait, QueryOrder};
use serde::Serialize;

/// In-app notification.
///
/// Unread rows double as the reconciliation sweep's de-duplication ledger: a row
/// with the same `(user_id, room_id, schedule_id, subject_user_id, kind)` that is
/// still unread suppresses a new one. Once read, the same event may fire again.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "notifications")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Recipient.
    pub user_id: i64,
    pub title: String,
    pub message: String,
    pub room_id: Option<i64>,
    #[serde(skip_serializing)]
    pub schedule_id: Option<i64>,
    /// The student the notification is about, when the recipient is a teacher.
    #[serde(skip_serializing)]
    pub subject_user_id: Option<i64>,
    #[serde(skip_serializing)]
    pub kind: Option<String>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
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

/// Structured identity of a notification, used for de-duplication.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DedupKey {
    pub room_id: Option<i64>,
    pub schedule_id: Option<i64>,
    pub subject_user_id: Option<i64>,
    pub kind: Option<String>,
}

impl Model {
    pub async fn create<C: ConnectionTrait>(
        db: &C,
        user_id: i64,
        title: &str,
        message: &str,
        key: &DedupKey,
    ) -> Result<Model, DbErr> {
        ActiveModel {
            user_id: Set(user_id),
            title: Set(title.to_owned()),
            message: Set(message.to_owned()),
            room_id: Set(key.room_id),
            schedule_id: Set(key.schedule_id),
            subject_user_id: Set(key.subject_user_id),
            kind: Set(key.kind.clone()),
            is_read: Set(false),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(db)
        .await
    }

    /// Whether `user_id` already holds an unread notification matching `key`.
    pub async fn unread_exists<C: ConnectionTrait>(
        db: &C,
        user_id: i64,
        key: &DedupKey,
    ) -> Result<bool, DbErr> {
        let mut query = Entity::find()
            .filter(Column::UserId.eq(user_id))
            .filter(Column::IsRead.eq(false));

        query = match key.room_id {
            Some(id) => query.filter(Column::RoomId.eq(id)),
            None => query.filter(Column::RoomId.is_null()),
        };
        query = match key.schedule_id {
            Some(id) => query.filter(Column::ScheduleId.eq(id)),
            None => query.filter(Column::ScheduleId.is_null()),
        };
        query = match key.subject_user_id {
            Some(id) => query.filter(Column::SubjectUserId.eq(id)),
            None => query.filter(Column::SubjectUserId.is_null()),
        };
        query = match &key.kind {
            Some(kind) => query.filter(Column::Kind.eq(kind.as_str())),
            None => query.filter(Column::Kind.is_null()),
        };

        Ok(query.count(db).await? > 0)
    }

    /// All notifications for a user, newest first.
    pub async fn list_for_user(db: &DbConn, user_id: i64) -> Result<Vec<Model>, DbErr> {
        Entity::find()
            .filter(Column::UserId.eq(user_id))
            .order_by_desc(Column::CreatedAt)
            .order_by_desc(Column::Id)
            .all(db)
            .await
    }

    /// Marks one of the user's notifications as read. `false` if it does not exist
    /// or belongs to someone else.
    pub async fn mark_read(db: &DbConn, user_id: i64, id: i64) -> Result<bool, DbErr> {
        let res = Entity::update_many()
            .col_expr(Column::IsRead, Expr::value(true))
            .filter(Column::Id.eq(id))
            .filter(Column::UserId.eq(user_id))
            .exec(db)
            .await?;
        Ok(res.rows_affected > 0)
    }

    /// Returns the number of rows flipped to read.
    pub async fn mark_all_read(db: &DbConn, user_id: i64) -> Result<u64, DbErr> {
        let res = Entity::update_many()
            .col_expr(Column::IsRead, Expr::value(true))
            .filter(Column::UserId.eq(user_id))
            .filter(Column::IsRead.eq(false))
            .exec(db)
            .await?;
        Ok(res.rows_affected)
    }
}

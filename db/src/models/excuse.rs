use chrono::{DateTime, Utc};
use sea_orm::ActiveValue::Set;
use sea_orm::entity::prelude::*;
use sea_orm::sea_query::OnConflict;
use serde::Serialize;

/// A teacher-recorded excuse. At most one per `(user_id, schedule_id)`.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "excuses")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub user_id: i64,
    pub schedule_id: i64,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::attendance_schedule::Entity",
        from = "Column::ScheduleId",
        to = "super::attendance_schedule::Column::Id",
        on_delete = "Cascade"
    )]
    Schedule,
}

impl Related<super::attendance_schedule::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Schedule.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Returns `true` if this call recorded the excuse.
    pub async fn insert_if_absent<C: ConnectionTrait>(
        db: &C,
        user_id: i64,
        schedule_id: i64,
        reason: Option<&str>,
    ) -> Result<bool, DbErr> {
        let excuse = ActiveModel {
            user_id: Set(user_id),
            schedule_id: Set(schedule_id),
            reason: Set(reason.map(|r| r.to_owned())),
            created_at: Set(Utc::now()),
            ..Default::default()
        };

        let inserted = Entity::insert(excuse)
            .on_conflict(
                OnConflict::columns([Column::UserId, Column::ScheduleId])
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(db)
            .await?;

        Ok(inserted > 0)
    }

    pub async fn find<C: ConnectionTrait>(
        db: &C,
        user_id: i64,
        schedule_id: i64,
    ) -> Result<Option<Model>, DbErr> {
        Entity::find()
            .filter(Column::UserId.eq(user_id))
            .filter(Column::ScheduleId.eq(schedule_id))
            .one(db)
            .await
    }
}

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sea_orm::ActiveValue::Set;
use sea_orm::entity::prelude::*;
use sea_orm::{Condition, QueryOrder};
use serde::Serialize;

/// A time-boxed window during which attendance may be taken for a room.
///
/// Windows never span midnight: `start_time < end_time` on `date`.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "attendance_schedules")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub room_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    /// Archived windows are ignored by overlap checks, scans and the sweep.
    pub archived: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::room::Entity",
        from = "Column::RoomId",
        to = "super::room::Column::Id",
        on_delete = "Cascade"
    )]
    Room,
    #[sea_orm(has_many = "super::attendance_record::Entity")]
    Records,
}

impl Related<super::room::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Room.def()
    }
}

impl Related<super::attendance_record::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Records.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub async fn create<C: ConnectionTrait>(
        db: &C,
        room_id: i64,
        name: &str,
        description: Option<&str>,
        date: NaiveDate,
        start_time: NaiveTime,
        end_time: NaiveTime,
    ) -> Result<Model, DbErr> {
        ActiveModel {
            room_id: Set(room_id),
            name: Set(name.to_owned()),
            description: Set(description.map(|d| d.to_owned())),
            date: Set(date),
            start_time: Set(start_time),
            end_time: Set(end_time),
            archived: Set(false),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(db)
        .await
    }

    /// Finds a schedule by id, scoped to the room it must belong to.
    pub async fn find_in_room<C: ConnectionTrait>(
        db: &C,
        room_id: i64,
        schedule_id: i64,
    ) -> Result<Option<Model>, DbErr> {
        Entity::find_by_id(schedule_id)
            .filter(Column::RoomId.eq(room_id))
            .one(db)
            .await
    }

    pub async fn list_for_room(db: &DbConn, room_id: i64) -> Result<Vec<Model>, DbErr> {
        Entity::find()
            .filter(Column::RoomId.eq(room_id))
            .order_by_asc(Column::Date)
            .order_by_asc(Column::StartTime)
            .all(db)
            .await
    }

    /// Non-archived windows of `room_id` on `date` whose `[start, end)` intersects
    /// the given interval. `exclude_id` skips the schedule being updated.
    pub async fn find_overlapping<C: ConnectionTrait>(
        db: &C,
        room_id: i64,
        date: NaiveDate,
        start_time: NaiveTime,
        end_time: NaiveTime,
        exclude_id: Option<i64>,
    ) -> Result<Vec<Model>, DbErr> {
        let mut cond = Condition::all()
            .add(Column::RoomId.eq(room_id))
            .add(Column::Date.eq(date))
            .add(Column::Archived.eq(false))
            .add(Column::StartTime.lt(end_time))
            .add(Column::EndTime.gt(start_time));

        if let Some(id) = exclude_id {
            cond = cond.add(Column::Id.ne(id));
        }

        Entity::find().filter(cond).all(db).await
    }

    /// Non-archived windows of `room_id` scheduled for `date`, earliest first.
    pub async fn for_room_on<C: ConnectionTrait>(
        db: &C,
        room_id: i64,
        date: NaiveDate,
    ) -> Result<Vec<Model>, DbErr> {
        Entity::find()
            .filter(Column::RoomId.eq(room_id))
            .filter(Column::Date.eq(date))
            .filter(Column::Archived.eq(false))
            .order_by_asc(Column::StartTime)
            .all(db)
            .await
    }

    /// Non-archived windows dated on or before `today`, across every room.
    ///
    /// Callers still filter on the exact end instant; this only narrows the scan.
    pub async fn ended_candidates<C: ConnectionTrait>(
        db: &C,
        today: NaiveDate,
    ) -> Result<Vec<Model>, DbErr> {
        Entity::find()
            .filter(Column::Date.lte(today))
            .filter(Column::Archived.eq(false))
            .order_by_asc(Column::Id)
            .all(db)
            .await
    }

    pub fn starts_at(&self) -> NaiveDateTime {
        self.date.and_time(self.start_time)
    }

    pub fn ends_at(&self) -> NaiveDateTime {
        self.date.and_time(self.end_time)
    }
}

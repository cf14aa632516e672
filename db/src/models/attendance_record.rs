use chrono::NaiveDateTime;
use sea_orm::ActiveValue::Set;
use sea_orm::entity::prelude::*;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{ActiveEnum, QueryOrder, QuerySelect};
use serde::{Deserialize, Serialize};

/// One student's attendance for one schedule window.
///
/// `(room_id, user_id, schedule_id)` is unique at the storage layer. Every write in
/// this module is either a conflict-aware insert or a compare-and-set update, so
/// concurrent scans and sweeps never produce two rows for the same key.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "attendance_records")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub room_id: i64,
    pub user_id: i64,
    pub schedule_id: i64,
    pub status: AttendanceStatus,
    pub taken_at: Option<NaiveDateTime>,
    pub qr_id: Option<i64>,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    EnumIter,
    DeriveActiveEnum,
    strum::Display,
    strum::EnumString,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum AttendanceStatus {
    #[default]
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "present")]
    Present,
    #[sea_orm(string_value = "late")]
    Late,
    #[sea_orm(string_value = "absent")]
    Absent,
    #[sea_orm(string_value = "excused")]
    Excused,
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
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    User,
}

impl Related<super::attendance_schedule::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Schedule.def()
    }
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// The identity of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordKey {
    pub room_id: i64,
    pub user_id: i64,
    pub schedule_id: i64,
}

impl RecordKey {
    pub fn new(room_id: i64, user_id: i64, schedule_id: i64) -> Self {
        Self {
            room_id,
            user_id,
            schedule_id,
        }
    }
}

impl Model {
    pub fn key(&self) -> RecordKey {
        RecordKey::new(self.room_id, self.user_id, self.schedule_id)
    }

    pub async fn find_by_key<C: ConnectionTrait>(
        db: &C,
        key: RecordKey,
    ) -> Result<Option<Model>, DbErr> {
        Entity::find()
            .filter(Column::RoomId.eq(key.room_id))
            .filter(Column::UserId.eq(key.user_id))
            .filter(Column::ScheduleId.eq(key.schedule_id))
            .one(db)
            .await
    }

    /// Inserts a record unless one already exists for `key`.
    ///
    /// Returns `true` when this call created the row. Relies on the unique index
    /// (`INSERT .. ON CONFLICT DO NOTHING`), never on a prior read.
    pub async fn insert_if_absent<C: ConnectionTrait>(
        db: &C,
        key: RecordKey,
        status: AttendanceStatus,
        taken_at: Option<NaiveDateTime>,
    ) -> Result<bool, DbErr> {
        let record = ActiveModel {
            room_id: Set(key.room_id),
            user_id: Set(key.user_id),
            schedule_id: Set(key.schedule_id),
            status: Set(status),
            taken_at: Set(taken_at),
            ..Default::default()
        };

        let inserted = Entity::insert(record)
            .on_conflict(
                OnConflict::columns([Column::RoomId, Column::UserId, Column::ScheduleId])
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(db)
            .await?;

        Ok(inserted > 0)
    }

    /// Moves the record for `key` to `to`, but only while its current status is one
    /// of `from`. Returns `true` when a row changed.
    pub async fn compare_and_set<C: ConnectionTrait>(
        db: &C,
        key: RecordKey,
        from: &[AttendanceStatus],
        to: AttendanceStatus,
        taken_at: Option<NaiveDateTime>,
    ) -> Result<bool, DbErr> {
        let mut update = Entity::update_many()
            .col_expr(Column::Status, Expr::value(to.to_value()))
            .filter(Column::RoomId.eq(key.room_id))
            .filter(Column::UserId.eq(key.user_id))
            .filter(Column::ScheduleId.eq(key.schedule_id))
            .filter(Column::Status.is_in(from.iter().map(|s| s.to_value())));

        if let Some(at) = taken_at {
            update = update.col_expr(Column::TakenAt, Expr::value(at));
        }

        let res = update.exec(db).await?;
        Ok(res.rows_affected > 0)
    }

    /// `pending -> to` for a live scan.
    pub async fn transition_from_pending<C: ConnectionTrait>(
        db: &C,
        key: RecordKey,
        to: AttendanceStatus,
        taken_at: NaiveDateTime,
    ) -> Result<bool, DbErr> {
        Self::compare_and_set(db, key, &[AttendanceStatus::Pending], to, Some(taken_at)).await
    }

    /// `pending -> absent` for a single row, used by the reconciliation sweep.
    pub async fn finalize_pending<C: ConnectionTrait>(
        db: &C,
        id: i64,
        taken_at: NaiveDateTime,
    ) -> Result<bool, DbErr> {
        let res = Entity::update_many()
            .col_expr(Column::Status, Expr::value(AttendanceStatus::Absent.to_value()))
            .col_expr(Column::TakenAt, Expr::value(taken_at))
            .filter(Column::Id.eq(id))
            .filter(Column::Status.eq(AttendanceStatus::Pending))
            .exec(db)
            .await?;

        Ok(res.rows_affected > 0)
    }

    /// One page of `pending` records belonging to `schedule_ids`, keyed by id.
    ///
    /// Pass the last id of the previous page as `after_id` (0 for the first page).
    pub async fn pending_for_schedules<C: ConnectionTrait>(
        db: &C,
        schedule_ids: &[i64],
        after_id: i64,
        limit: u64,
    ) -> Result<Vec<Model>, DbErr> {
        if schedule_ids.is_empty() {
            return Ok(Vec::new());
        }

        Entity::find()
            .filter(Column::ScheduleId.is_in(schedule_ids.iter().copied()))
            .filter(Column::Status.eq(AttendanceStatus::Pending))
            .filter(Column::Id.gt(after_id))
            .order_by_asc(Column::Id)
            .limit(limit)
            .all(db)
            .await
    }

    pub async fn list_for_schedule<C: ConnectionTrait>(
        db: &C,
        schedule_id: i64,
    ) -> Result<Vec<Model>, DbErr> {
        Entity::find()
            .filter(Column::ScheduleId.eq(schedule_id))
            .order_by_asc(Column::UserId)
            .all(db)
            .await
    }

    /// Every record of `room_id`, optionally narrowed to one user.
    pub async fn list_for_room<C: ConnectionTrait>(
        db: &C,
        room_id: i64,
        user_id: Option<i64>,
    ) -> Result<Vec<Model>, DbErr> {
        let mut query = Entity::find().filter(Column::RoomId.eq(room_id));
        if let Some(user_id) = user_id {
            query = query.filter(Column::UserId.eq(user_id));
        }
        query.order_by_asc(Column::Id).all(db).await
    }

    /// Users that already have a record for `schedule_id`, whatever its status.
    pub async fn existing_user_ids<C: ConnectionTrait>(
        db: &C,
        schedule_id: i64,
    ) -> Result<Vec<i64>, DbErr> {
        Entity::find()
            .select_only()
            .column(Column::UserId)
            .filter(Column::ScheduleId.eq(schedule_id))
            .into_tuple::<i64>()
            .all(db)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{attendance_schedule, room, user};
    use crate::test_utils::setup_test_db;
    use chrono::{NaiveDate, NaiveTime};
    use sea_orm::{DatabaseConnection, PaginatorTrait};

    async fn fixture(db: &DatabaseConnection) -> RecordKey {
        let teacher = user::Model::create(db, "t", "t@test.com", "x", "T", "One", user::UserRole::Teacher)
            .await
            .unwrap();
        let student = user::Model::create(db, "s", "s@test.com", "x", "S", "One", user::UserRole::Student)
            .await
            .unwrap();
        let room = room::Model::create(db, teacher.id, "COS 301", "A", None, false, false, None)
            .await
            .unwrap();
        let schedule = attendance_schedule::Model::create(
            db,
            room.id,
            "Lecture",
            None,
            NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(11, 0, 0).unwrap(),
        )
        .await
        .unwrap();
        RecordKey::new(room.id, student.id, schedule.id)
    }

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 2)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[tokio::test]
    async fn second_insert_for_same_key_is_a_no_op() {
        let db = setup_test_db().await;
        let key = fixture(&db).await;

        assert!(Model::insert_if_absent(&db, key, AttendanceStatus::Present, Some(at(10, 5))).await.unwrap());
        assert!(!Model::insert_if_absent(&db, key, AttendanceStatus::Late, Some(at(10, 30))).await.unwrap());

        let count = Entity::find().count(&db).await.unwrap();
        assert_eq!(count, 1);
        let row = Model::find_by_key(&db, key).await.unwrap().unwrap();
        assert_eq!(row.status, AttendanceStatus::Present);
    }

    #[tokio::test]
    async fn transition_only_moves_pending_rows() {
        let db = setup_test_db().await;
        let key = fixture(&db).await;
        Model::insert_if_absent(&db, key, AttendanceStatus::Pending, None).await.unwrap();

        assert!(Model::transition_from_pending(&db, key, AttendanceStatus::Late, at(10, 20)).await.unwrap());
        assert!(!Model::transition_from_pending(&db, key, AttendanceStatus::Present, at(10, 21)).await.unwrap());

        let row = Model::find_by_key(&db, key).await.unwrap().unwrap();
        assert_eq!(row.status, AttendanceStatus::Late);
        assert_eq!(row.taken_at, Some(at(10, 20)));
    }

    #[tokio::test]
    async fn pending_pages_are_keyset_ordered() {
        let db = setup_test_db().await;
        let key = fixture(&db).await;
        Model::insert_if_absent(&db, key, AttendanceStatus::Pending, None).await.unwrap();

        let page = Model::pending_for_schedules(&db, &[key.schedule_id], 0, 10).await.unwrap();
        assert_eq!(page.len(), 1);
        let next = Model::pending_for_schedules(&db, &[key.schedule_id], page[0].id, 10).await.unwrap();
        assert!(next.is_empty());

        assert!(Model::finalize_pending(&db, page[0].id, at(11, 5)).await.unwrap());
        assert!(!Model::finalize_pending(&db, page[0].id, at(11, 10)).await.unwrap());
    }
}

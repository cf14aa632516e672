use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use db::models::attendance_record::{self, AttendanceStatus, RecordKey};
use db::models::{attendance_schedule, room, room_user};
use sea_orm::ActiveValue::Set;
use sea_orm::{ActiveModelTrait, ConnectionTrait, DatabaseConnection, EntityTrait, TransactionTrait};
use serde::Deserialize;
use std::collections::HashSet;

use crate::error::AttendanceError;
use crate::notification::{KIND_NEW_SCHEDULE, Notice, NotificationEmitter};
use crate::schedule_window::ScheduleWindow;
use crate::sweeper::ReconciliationSweeper;

#[derive(Debug, Clone, Deserialize)]
pub struct NewSchedule {
    pub name: String,
    pub description: Option<String>,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

/// Fields left as `None` keep their stored value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SchedulePatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub date: Option<NaiveDate>,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
}

#[derive(Clone)]
pub struct ScheduleService {
    db: DatabaseConnection,
    sweeper: ReconciliationSweeper,
}

impl ScheduleService {
    pub fn new(db: DatabaseConnection, sweeper: ReconciliationSweeper) -> Self {
        Self { db, sweeper }
    }

    pub async fn create_schedule(
        &self,
        owner_id: i64,
        room_id: i64,
        input: NewSchedule,
        now: NaiveDateTime,
    ) -> Result<attendance_schedule::Model, AttendanceError> {
        let room = self.owned_open_room(owner_id, room_id).await?;
        let name = validated_name(&input.name)?;

        // Overlap check and insert commit together.
        let txn = self.db.begin().await?;
        let window = validate_window(
            &txn,
            room.id,
            input.date,
            input.start_time,
            input.end_time,
            None,
            now,
        )
        .await?;
        let schedule = attendance_schedule::Model::create(
            &txn,
            room.id,
            &name,
            input.description.as_deref(),
            window.date(),
            window.start(),
            window.end(),
        )
        .await?;
        txn.commit().await?;

        tracing::info!(
            room_id = room.id,
            schedule_id = schedule.id,
            date = %schedule.date,
            start = %schedule.start_time,
            end = %schedule.end_time,
            "Attendance schedule created"
        );

        let members = room_user::Model::accepted_user_ids(&self.db, room.id).await?;
        if !window.has_ended(now) {
            for &user_id in &members {
                let key = RecordKey::new(room.id, user_id, schedule.id);
                attendance_record::Model::insert_if_absent(&self.db, key, AttendanceStatus::Pending, None)
                    .await?;
            }
        }

        for &user_id in &members {
            let notice = Notice::new(
                user_id,
                format!("{}: New Attendance Schedule", room.class_name),
                format!(
                    "{} is scheduled on {} from {} to {}.",
                    schedule.name,
                    schedule.date,
                    schedule.start_time.format("%H:%M"),
                    schedule.end_time.format("%H:%M")
                ),
            )
            .about(room.id, Some(schedule.id), KIND_NEW_SCHEDULE);
            if let Err(e) = NotificationEmitter::emit(&self.db, &notice).await {
                tracing::warn!(user_id, schedule_id = schedule.id, error = %e, "Failed to notify member");
            }
        }

        Ok(schedule)
    }

    pub async fn update_schedule(
        &self,
        owner_id: i64,
        room_id: i64,
        schedule_id: i64,
        patch: SchedulePatch,
        now: NaiveDateTime,
    ) -> Result<attendance_schedule::Model, AttendanceError> {
        let room = self.owned_open_room(owner_id, room_id).await?;
        let current = attendance_schedule::Model::find_in_room(&self.db, room.id, schedule_id)
            .await?
            .ok_or_else(|| AttendanceError::not_found("Schedule not found"))?;

        let name = match &patch.name {
            Some(n) => validated_name(n)?,
            None => current.name.clone(),
        };
        let txn = self.db.begin().await?;
        let window = validate_window(
            &txn,
            room.id,
            patch.date.unwrap_or(current.date),
            patch.start_time.unwrap_or(current.start_time),
            patch.end_time.unwrap_or(current.end_time),
            Some(current.id),
            now,
        )
        .await?;

        let mut active: attendance_schedule::ActiveModel = current.into();
        active.name = Set(name);
        if let Some(description) = patch.description {
            active.description = Set(Some(description));
        }
        active.date = Set(window.date());
        active.start_time = Set(window.start());
        active.end_time = Set(window.end());

        let updated = active.update(&txn).await?;
        txn.commit().await?;
        tracing::info!(room_id, schedule_id, "Attendance schedule updated");
        Ok(updated)
    }

    /// Visible to the owner and accepted members.
    pub async fn list_schedules(
        &self,
        requester_id: i64,
        room_id: i64,
    ) -> Result<Vec<attendance_schedule::Model>, AttendanceError> {
        let room = room::Entity::find_by_id(room_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| AttendanceError::not_found("Room not found"))?;
        if !room.is_owner(requester_id) {
            let member = room_user::Model::find_membership(&self.db, room_id, requester_id)
                .await?
                .is_some_and(|m| m.is_accepted());
            if !member {
                return Err(AttendanceError::forbidden(
                    "You are not an accepted member of this room",
                ));
            }
        }
        Ok(attendance_schedule::Model::list_for_room(&self.db, room_id).await?)
    }

    /// Makes sure every accepted member has a record for the schedule, then
    /// returns all of them.
    ///
    /// While the window is still open or upcoming, missing members get `pending`.
    /// Once it has ended, the schedule is reconciled exactly as the periodic sweep
    /// would do it, notifications included.
    pub async fn initialize_records(
        &self,
        owner_id: i64,
        room_id: i64,
        schedule_id: i64,
        now: NaiveDateTime,
    ) -> Result<Vec<attendance_record::Model>, AttendanceError> {
        let room = self.owned_room(owner_id, room_id).await?;
        let schedule = attendance_schedule::Model::find_in_room(&self.db, room.id, schedule_id)
            .await?
            .ok_or_else(|| AttendanceError::not_found("Schedule not found"))?;
        let window = ScheduleWindow::try_from(&schedule)?;

        if window.has_ended(now) {
            let report = self.sweeper.reconcile_schedule(&schedule, now).await;
            tracing::debug!(schedule_id, finalized = report.finalized, "Reconciled ended schedule");
        } else {
            let existing: HashSet<i64> =
                attendance_record::Model::existing_user_ids(&self.db, schedule.id)
                    .await?
                    .into_iter()
                    .collect();
            let members = room_user::Model::accepted_user_ids(&self.db, room.id).await?;
            for user_id in members.into_iter().filter(|id| !existing.contains(id)) {
                let key = RecordKey::new(room.id, user_id, schedule.id);
                attendance_record::Model::insert_if_absent(&self.db, key, AttendanceStatus::Pending, None)
                    .await?;
            }
        }

        Ok(attendance_record::Model::list_for_schedule(&self.db, schedule.id).await?)
    }

    async fn owned_room(&self, owner_id: i64, room_id: i64) -> Result<room::Model, AttendanceError> {
        let room = room::Entity::find_by_id(room_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| AttendanceError::not_found("Room not found"))?;
        if !room.is_owner(owner_id) {
            return Err(AttendanceError::forbidden(
                "Only the room owner can manage attendance schedules",
            ));
        }
        Ok(room)
    }

    async fn owned_open_room(&self, owner_id: i64, room_id: i64) -> Result<room::Model, AttendanceError> {
        let room = self.owned_room(owner_id, room_id).await?;
        if room.archived {
            return Err(AttendanceError::conflict("This room is archived"));
        }
        Ok(room)
    }
}

/// Checks the window shape and date, then looks for a clash on `conn`. Callers
/// pass the transaction that will also write the schedule.
async fn validate_window<C: ConnectionTrait>(
    conn: &C,
    room_id: i64,
    date: NaiveDate,
    start: NaiveTime,
    end: NaiveTime,
    exclude_id: Option<i64>,
    now: NaiveDateTime,
) -> Result<ScheduleWindow, AttendanceError> {
    let window = ScheduleWindow::new(date, start, end)?;
    if date < now.date() {
        return Err(AttendanceError::validation("Schedule date cannot be in the past"));
    }

    let clashes =
        attendance_schedule::Model::find_overlapping(conn, room_id, date, start, end, exclude_id).await?;
    if let Some(other) = clashes.first() {
        return Err(AttendanceError::conflict(format!(
            "Schedule overlaps with '{}' ({} - {})",
            other.name,
            other.start_time.format("%H:%M"),
            other.end_time.format("%H:%M")
        )));
    }
    Ok(window)
}

fn validated_name(name: &str) -> Result<String, AttendanceError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(AttendanceError::validation("Schedule name is required"));
    }
    Ok(trimmed.to_owned())
}

//! Read-only views over a room's attendance history.
//!
//! Only sessions whose window has ended count towards rates. Present and late
//! both count as attended.

use std::collections::{BTreeMap, HashMap};

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use db::models::attendance_record::{self, AttendanceStatus};
use db::models::{attendance_schedule, room, room_user, user};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use serde::Serialize;

use crate::error::AttendanceError;
use crate::schedule_window::ScheduleWindow;

/// One schedule as seen by a single student.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduleStatus {
    pub schedule_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    /// The stored status, or `pending`/`absent` derived from the window when the
    /// student has no record yet.
    pub status: AttendanceStatus,
    pub taken_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct AttendanceSummary {
    /// Ended, non-archived sessions.
    pub sessions: usize,
    /// Accepted members.
    pub students: usize,
    pub attended: usize,
    /// `attended / (sessions * students)` as a percentage.
    pub overall_percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentRate {
    pub user_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub attended: usize,
    pub sessions: usize,
    pub attendance_rate: f64,
}

/// Per-day status counts over ended sessions.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub present: usize,
    pub late: usize,
    pub absent: usize,
    pub excused: usize,
}

#[inline]
fn to_pct(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    ((part as f64 / whole as f64) * 10_000.0).round() / 100.0
}

fn attended(status: AttendanceStatus) -> bool {
    matches!(status, AttendanceStatus::Present | AttendanceStatus::Late)
}

#[derive(Clone)]
pub struct ReportService {
    db: DatabaseConnection,
}

impl ReportService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// The caller's own status for every live schedule of the room, earliest first.
    ///
    /// Open to the owner and to accepted members.
    pub async fn student_status(
        &self,
        user_id: i64,
        room_id: i64,
        now: NaiveDateTime,
    ) -> Result<Vec<ScheduleStatus>, AttendanceError> {
        let room = self.find_room(room_id).await?;
        if !room.is_owner(user_id) {
            let accepted = room_user::Model::find_membership(&self.db, room.id, user_id)
                .await?
                .is_some_and(|m| m.is_accepted());
            if !accepted {
                return Err(AttendanceError::forbidden(
                    "You are not an accepted member of this room",
                ));
            }
        }

        let records: HashMap<i64, attendance_record::Model> =
            attendance_record::Model::list_for_room(&self.db, room.id, Some(user_id))
                .await?
                .into_iter()
                .map(|r| (r.schedule_id, r))
                .collect();

        let mut out = Vec::new();
        for schedule in attendance_schedule::Model::list_for_room(&self.db, room.id).await? {
            if schedule.archived {
                continue;
            }
            let (status, taken_at) = match records.get(&schedule.id) {
                Some(record) => (record.status, record.taken_at),
                None => {
                    let window = ScheduleWindow::try_from(&schedule)?;
                    if window.has_ended(now) {
                        (AttendanceStatus::Absent, None)
                    } else {
                        (AttendanceStatus::Pending, None)
                    }
                }
            };
            out.push(ScheduleStatus {
                schedule_id: schedule.id,
                name: schedule.name,
                description: schedule.description,
                date: schedule.date,
                start_time: schedule.start_time,
                end_time: schedule.end_time,
                status,
                taken_at,
            });
        }
        Ok(out)
    }

    pub async fn summary(
        &self,
        owner_id: i64,
        room_id: i64,
        now: NaiveDateTime,
    ) -> Result<AttendanceSummary, AttendanceError> {
        let room = self.owned_room(owner_id, room_id).await?;
        let sessions = self.held_sessions(room.id, now).await?;
        let students = room_user::Model::accepted_user_ids(&self.db, room.id).await?;
        let counts = self.attended_by_student(room.id, &sessions).await?;

        let attended: usize = students
            .iter()
            .map(|id| counts.get(id).copied().unwrap_or(0))
            .sum();

        Ok(AttendanceSummary {
            sessions: sessions.len(),
            students: students.len(),
            attended,
            overall_percentage: to_pct(attended, sessions.len() * students.len()),
        })
    }

    /// Attendance rate per accepted member, ordered by last then first name.
    pub async fn student_rates(
        &self,
        owner_id: i64,
        room_id: i64,
        now: NaiveDateTime,
    ) -> Result<Vec<StudentRate>, AttendanceError> {
        let room = self.owned_room(owner_id, room_id).await?;
        let sessions = self.held_sessions(room.id, now).await?;
        let students = room_user::Model::accepted_user_ids(&self.db, room.id).await?;
        let counts = self.attended_by_student(room.id, &sessions).await?;

        let users = user::Entity::find()
            .filter(user::Column::Id.is_in(students))
            .order_by_asc(user::Column::LastName)
            .order_by_asc(user::Column::FirstName)
            .all(&self.db)
            .await?;

        Ok(users
            .into_iter()
            .map(|u| {
                let attended = counts.get(&u.id).copied().unwrap_or(0);
                StudentRate {
                    user_id: u.id,
                    first_name: u.first_name,
                    last_name: u.last_name,
                    attended,
                    sessions: sessions.len(),
                    attendance_rate: to_pct(attended, sessions.len()),
                }
            })
            .collect())
    }

    pub async fn trend(
        &self,
        owner_id: i64,
        room_id: i64,
        now: NaiveDateTime,
    ) -> Result<Vec<TrendPoint>, AttendanceError> {
        let room = self.owned_room(owner_id, room_id).await?;
        let sessions = self.held_sessions(room.id, now).await?;
        let dates: HashMap<i64, NaiveDate> = sessions.iter().map(|s| (s.id, s.date)).collect();

        let mut points: BTreeMap<NaiveDate, TrendPoint> = sessions
            .iter()
            .map(|s| {
                (
                    s.date,
                    TrendPoint {
                        date: s.date,
                        ..Default::default()
                    },
                )
            })
            .collect();

        for record in attendance_record::Model::list_for_room(&self.db, room.id, None).await? {
            let Some(date) = dates.get(&record.schedule_id) else {
                continue;
            };
            let Some(point) = points.get_mut(date) else {
                continue;
            };
            match record.status {
                AttendanceStatus::Present => point.present += 1,
                AttendanceStatus::Late => point.late += 1,
                AttendanceStatus::Absent => point.absent += 1,
                AttendanceStatus::Excused => point.excused += 1,
                AttendanceStatus::Pending => {}
            }
        }

        Ok(points.into_values().collect())
    }

    async fn held_sessions(
        &self,
        room_id: i64,
        now: NaiveDateTime,
    ) -> Result<Vec<attendance_schedule::Model>, AttendanceError> {
        Ok(attendance_schedule::Model::list_for_room(&self.db, room_id)
            .await?
            .into_iter()
            .filter(|s| !s.archived && s.ends_at() <= now)
            .collect())
    }

    async fn attended_by_student(
        &self,
        room_id: i64,
        sessions: &[attendance_schedule::Model],
    ) -> Result<HashMap<i64, usize>, AttendanceError> {
        let held: Vec<i64> = sessions.iter().map(|s| s.id).collect();
        let mut counts = HashMap::new();
        for record in attendance_record::Model::list_for_room(&self.db, room_id, None).await? {
            if held.contains(&record.schedule_id) && attended(record.status) {
                *counts.entry(record.user_id).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }

    async fn find_room(&self, room_id: i64) -> Result<room::Model, AttendanceError> {
        room::Entity::find_by_id(room_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| AttendanceError::not_found("Room not found"))
    }

    async fn owned_room(&self, owner_id: i64, room_id: i64) -> Result<room::Model, AttendanceError> {
        let room = self.find_room(room_id).await?;
        if !room.is_owner(owner_id) {
            return Err(AttendanceError::forbidden(
                "Only the room owner can view attendance reports",
            ));
        }
        Ok(room)
    }
}

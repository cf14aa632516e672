//! Periodic reconciliation of ended schedule windows.
//!
//! Each tick:
//! 1. selects every non-archived window that has ended,
//! 2. inserts `absent` records for accepted members with no record at all,
//! 3. moves remaining `pending` records of those windows to `absent`, in keyset
//!    batches of `batch_size`, one transaction per batch,
//! 4. notifies the student and the room owner once per record moved.
//!
//! Every record is handled inside its own savepoint so one bad row rolls back
//! alone. Notifications are skipped when an unread one with the same
//! `(recipient, room, schedule, subject, kind)` already exists. All predicates are
//! re-evaluated from storage on every tick, so an interrupted tick is completed by
//! the next one.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDateTime};
use db::models::attendance_record::{self, AttendanceStatus, RecordKey};
use db::models::{attendance_schedule, room, room_user, user};
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    TransactionTrait,
};
use serde::Serialize;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::notification::{KIND_MARKED_ABSENT, KIND_STUDENT_MARKED_ABSENT, Notice, NotificationEmitter};
use crate::schedule_window::ScheduleWindow;

#[derive(Debug, Clone)]
pub struct SweepConfig {
    pub interval: Duration,
    pub batch_size: u64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5 * 60),
            batch_size: 1000,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub windows: usize,
    pub inserted_absent: usize,
    pub finalized: usize,
    pub notifications: usize,
    pub failures: usize,
    /// The tick did nothing because another one was still running.
    pub skipped: bool,
}

#[derive(Clone)]
pub struct ReconciliationSweeper {
    db: DatabaseConnection,
    config: SweepConfig,
    running: Arc<Mutex<()>>,
}

impl ReconciliationSweeper {
    pub fn new(db: DatabaseConnection, config: SweepConfig) -> Self {
        let config = SweepConfig {
            batch_size: config.batch_size.max(1),
            ..config
        };
        Self {
            db,
            config,
            running: Arc::new(Mutex::new(())),
        }
    }

    pub fn config(&self) -> &SweepConfig {
        &self.config
    }

    /// Runs one reconciliation pass as of `now`. Never fails; per-record and
    /// per-batch errors are logged and counted in the report.
    pub async fn run_tick(&self, now: NaiveDateTime) -> SweepReport {
        let Ok(_guard) = self.running.try_lock() else {
            tracing::warn!("Previous reconciliation sweep still running; skipping tick");
            return SweepReport {
                skipped: true,
                ..Default::default()
            };
        };

        let mut report = SweepReport::default();
        let candidates =
            match attendance_schedule::Model::ended_candidates(&self.db, now.date()).await {
                Ok(c) => c,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to load ended schedules");
                    report.failures += 1;
                    return report;
                }
            };

        let ended: Vec<_> = candidates
            .into_iter()
            .filter(|schedule| match ScheduleWindow::try_from(schedule) {
                Ok(window) => window.has_ended(now),
                Err(e) => {
                    tracing::warn!(schedule_id = schedule.id, error = %e, "Skipping malformed schedule");
                    report.failures += 1;
                    false
                }
            })
            .collect();

        self.reconcile(&ended, now, &mut report).await;

        tracing::info!(
            windows = report.windows,
            inserted_absent = report.inserted_absent,
            finalized = report.finalized,
            notifications = report.notifications,
            failures = report.failures,
            "Reconciliation sweep finished"
        );
        report
    }

    /// Reconciles a single ended window on demand. Waits for a running tick
    /// instead of skipping.
    pub async fn reconcile_schedule(
        &self,
        schedule: &attendance_schedule::Model,
        now: NaiveDateTime,
    ) -> SweepReport {
        let _guard = self.running.lock().await;
        let mut report = SweepReport::default();
        self.reconcile(std::slice::from_ref(schedule), now, &mut report).await;
        report
    }

    async fn reconcile(
        &self,
        schedules: &[attendance_schedule::Model],
        now: NaiveDateTime,
        report: &mut SweepReport,
    ) {
        if schedules.is_empty() {
            return;
        }
        report.windows += schedules.len();

        let room_ids: HashSet<i64> = schedules.iter().map(|s| s.room_id).collect();
        let rooms: HashMap<i64, room::Model> = match room::Entity::find()
            .filter(room::Column::Id.is_in(room_ids))
            .all(&self.db)
            .await
        {
            Ok(rows) => rows.into_iter().map(|r| (r.id, r)).collect(),
            Err(e) => {
                tracing::error!(error = %e, "Failed to load rooms for sweep");
                report.failures += 1;
                return;
            }
        };

        for schedule in schedules {
            let Some(room) = rooms.get(&schedule.room_id) else {
                tracing::warn!(schedule_id = schedule.id, "Schedule has no room; skipping");
                report.failures += 1;
                continue;
            };
            self.backfill_absent(schedule, room, now, report).await;
        }

        self.finalize_pending(schedules, &rooms, now, report).await;
    }

    async fn backfill_absent(
        &self,
        schedule: &attendance_schedule::Model,
        room: &room::Model,
        now: NaiveDateTime,
        report: &mut SweepReport,
    ) {
        let missing = match self.members_without_record(schedule).await {
            Ok(ids) => ids,
            Err(e) => {
                tracing::error!(schedule_id = schedule.id, error = %e, "Failed to diff members and records");
                report.failures += 1;
                return;
            }
        };
        if missing.is_empty() {
            return;
        }

        let txn = match self.db.begin().await {
            Ok(t) => t,
            Err(e) => {
                tracing::error!(schedule_id = schedule.id, error = %e, "Failed to open sweep transaction");
                report.failures += 1;
                return;
            }
        };

        for user_id in missing {
            let key = RecordKey::new(room.id, user_id, schedule.id);
            let outcome: Result<Option<usize>, DbErr> = async {
                let sp = txn.begin().await?;
                let step: Result<Option<usize>, DbErr> = async {
                    if !attendance_record::Model::insert_if_absent(&sp, key, AttendanceStatus::Absent, Some(now))
                        .await?
                    {
                        return Ok(None);
                    }
                    notify_absent(&sp, schedule, room, user_id).await.map(Some)
                }
                .await;
                settle(sp, step).await
            }
            .await;

            match outcome {
                Ok(Some(sent)) => {
                    report.inserted_absent += 1;
                    report.notifications += sent;
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(schedule_id = schedule.id, user_id, error = %e, "Failed to insert absent record");
                    report.failures += 1;
                }
            }
        }

        if let Err(e) = txn.commit().await {
            tracing::error!(schedule_id = schedule.id, error = %e, "Failed to commit absent backfill");
            report.failures += 1;
        }
    }

    async fn members_without_record(
        &self,
        schedule: &attendance_schedule::Model,
    ) -> Result<Vec<i64>, DbErr> {
        let existing: HashSet<i64> =
            attendance_record::Model::existing_user_ids(&self.db, schedule.id)
                .await?
                .into_iter()
                .collect();
        let members = room_user::Model::accepted_user_ids(&self.db, schedule.room_id).await?;
        Ok(members.into_iter().filter(|id| !existing.contains(id)).collect())
    }

    async fn finalize_pending(
        &self,
        schedules: &[attendance_schedule::Model],
        rooms: &HashMap<i64, room::Model>,
        now: NaiveDateTime,
        report: &mut SweepReport,
    ) {
        let by_id: HashMap<i64, &attendance_schedule::Model> =
            schedules.iter().map(|s| (s.id, s)).collect();
        let ids: Vec<i64> = schedules.iter().map(|s| s.id).collect();
        let batch_size = self.config.batch_size;
        let mut after_id = 0;

        loop {
            let page = match attendance_record::Model::pending_for_schedules(
                &self.db, &ids, after_id, batch_size,
            )
            .await
            {
                Ok(p) => p,
                Err(e) => {
                    tracing::error!(after_id, error = %e, "Failed to load pending records");
                    report.failures += 1;
                    return;
                }
            };
            let Some(last) = page.last() else {
                return;
            };
            after_id = last.id;
            let full_page = page.len() as u64 == batch_size;

            let txn = match self.db.begin().await {
                Ok(t) => t,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to open sweep transaction");
                    report.failures += 1;
                    return;
                }
            };

            for record in page {
                let Some((schedule, room)) = by_id
                    .get(&record.schedule_id)
                    .and_then(|s| rooms.get(&s.room_id).map(|r| (*s, r)))
                else {
                    report.failures += 1;
                    continue;
                };

                let outcome: Result<Option<usize>, DbErr> = async {
                    let sp = txn.begin().await?;
                    let step: Result<Option<usize>, DbErr> = async {
                        if !attendance_record::Model::finalize_pending(&sp, record.id, now).await? {
                            return Ok(None);
                        }
                        notify_absent(&sp, schedule, room, record.user_id).await.map(Some)
                    }
                    .await;
                    settle(sp, step).await
                }
                .await;

                match outcome {
                    Ok(Some(sent)) => {
                        report.finalized += 1;
                        report.notifications += sent;
                    }
                    Ok(None) => {}
                    Err(e) => {
                        tracing::warn!(record_id = record.id, error = %e, "Failed to finalize pending record");
                        report.failures += 1;
                    }
                }
            }

            if let Err(e) = txn.commit().await {
                tracing::error!(after_id, error = %e, "Failed to commit sweep batch");
                report.failures += 1;
            }

            if !full_page {
                return;
            }
        }
    }

    /// Starts the timer task. The first tick runs immediately.
    pub fn spawn(self) -> SweeperHandle {
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let interval = self.config.interval;

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            tracing::info!(interval_secs = interval.as_secs(), "Reconciliation sweeper started");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.run_tick(Local::now().naive_local()).await;
                    }
                    changed = stop_rx.changed() => {
                        if changed.is_err() || *stop_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            tracing::info!("Reconciliation sweeper stopped");
        });

        SweeperHandle {
            stop: stop_tx,
            task,
        }
    }
}

/// Owner of the running sweeper task.
pub struct SweeperHandle {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Signals the task and waits for an in-flight tick to finish.
    pub async fn stop(self) {
        let _ = self.stop.send(true);
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "Reconciliation sweeper task failed");
        }
    }
}

/// Commits the savepoint on success, rolls it back otherwise.
async fn settle<T>(
    sp: sea_orm::DatabaseTransaction,
    step: Result<T, DbErr>,
) -> Result<T, DbErr> {
    match step {
        Ok(value) => {
            sp.commit().await?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback) = sp.rollback().await {
                tracing::error!(error = %rollback, "Failed to roll back savepoint");
            }
            Err(e)
        }
    }
}

/// One notification to the student and one to the room owner, each skipped if an
/// unread duplicate exists. Returns how many were written.
async fn notify_absent<C: ConnectionTrait>(
    conn: &C,
    schedule: &attendance_schedule::Model,
    room: &room::Model,
    student_id: i64,
) -> Result<usize, DbErr> {
    let name = user::Model::find_active(conn, student_id)
        .await?
        .map(|u| u.full_name())
        .unwrap_or_else(|| format!("User {student_id}"));

    let to_student = Notice::new(
        student_id,
        "Marked Absent",
        format!(
            "You were marked absent for {} in {} on {}.",
            schedule.name, room.class_name, schedule.date
        ),
    )
    .about(room.id, Some(schedule.id), KIND_MARKED_ABSENT);

    let to_owner = Notice::new(
        room.owner_id,
        "Student Marked Absent",
        format!(
            "{name} was marked absent for {} in {} on {}.",
            schedule.name, room.class_name, schedule.date
        ),
    )
    .about(room.id, Some(schedule.id), KIND_STUDENT_MARKED_ABSENT)
    .subject(student_id);

    let mut sent = 0;
    if NotificationEmitter::emit_unless_unread(conn, &to_student).await? {
        sent += 1;
    }
    if NotificationEmitter::emit_unless_unread(conn, &to_owner).await? {
        sent += 1;
    }
    Ok(sent)
}

use std::sync::Arc;
use std::time::Duration;

use sea_orm::DatabaseConnection;
use services::attendance::{AttendancePolicy, AttendanceService};
use services::auth::JwtTokenResolver;
use services::enrollment::FaceEnrollmentService;
use services::face::FaceWorkerPool;
use services::report::ReportService;
use services::schedule::ScheduleService;
use services::sweeper::{ReconciliationSweeper, SweepConfig};
use util::config;

/// Everything a handler needs, built once in `main` and cloned per request.
///
/// The face pool and the sweeper are passed in so the caller decides their
/// lifetime; nothing here is a global.
#[derive(Clone)]
pub struct AppState {
    db: DatabaseConnection,
    attendance: AttendanceService,
    schedules: ScheduleService,
    enrollment: FaceEnrollmentService,
    reports: ReportService,
}

impl AppState {
    pub fn new(db: DatabaseConnection, faces: FaceWorkerPool, sweeper: ReconciliationSweeper) -> Self {
        let policy = attendance_policy();
        let tokens = Arc::new(JwtTokenResolver::new(db.clone(), &config::jwt_secret()));

        Self {
            attendance: AttendanceService::new(db.clone(), tokens, faces.clone(), policy.clone()),
            schedules: ScheduleService::new(db.clone(), sweeper),
            enrollment: FaceEnrollmentService::new(db.clone(), faces, policy.request_timeout),
            reports: ReportService::new(db.clone()),
            db,
        }
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    pub fn attendance(&self) -> &AttendanceService {
        &self.attendance
    }

    pub fn schedules(&self) -> &ScheduleService {
        &self.schedules
    }

    pub fn enrollment(&self) -> &FaceEnrollmentService {
        &self.enrollment
    }

    pub fn reports(&self) -> &ReportService {
        &self.reports
    }
}

pub fn attendance_policy() -> AttendancePolicy {
    AttendancePolicy {
        late_cutoff_minutes: config::late_cutoff_minutes(),
        face_match_threshold: config::face_match_threshold(),
        excuse_after_marked: config::excuse_after_marked(),
        request_timeout: Duration::from_millis(config::request_timeout_ms()),
    }
}

pub fn sweep_config() -> SweepConfig {
    SweepConfig {
        interval: Duration::from_secs(config::sweep_interval_minutes() * 60),
        batch_size: config::sweep_batch_size(),
    }
}

use sea_orm_migration::prelude::*;

use crate::migrations;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(migrations::m202601050001_create_users::Migration),
            Box::new(migrations::m202601050002_create_geofences::Migration),
            Box::new(migrations::m202601050003_create_rooms::Migration),
            Box::new(migrations::m202601050004_create_room_users::Migration),
            Box::new(migrations::m202601050005_create_attendance_schedules::Migration),
            Box::new(migrations::m202601050006_create_attendance_records::Migration),
            Box::new(migrations::m202601050007_create_face_embeddings::Migration),
            Box::new(migrations::m202601050008_create_notifications::Migration),
            Box::new(migrations::m202601050009_create_excuses::Migration),
        ]
    }
}

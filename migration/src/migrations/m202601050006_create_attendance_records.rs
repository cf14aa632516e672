use sea_orm_migration::prelude::*;

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m202601050006_create_attendance_records"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Alias::new("attendance_records"))
                    .if_not_exists()
                    .col(ColumnDef::new(Alias::new("id")).integer().not_null().auto_increment().primary_key())
                    .col(ColumnDef::new(Alias::new("room_id")).integer().not_null())
                    .col(ColumnDef::new(Alias::new("user_id")).integer().not_null())
                    .col(ColumnDef::new(Alias::new("schedule_id")).integer().not_null())
                    .col(ColumnDef::new(Alias::new("status")).string().not_null())
                    // NULL until a scan or a sweep sets it
                    .col(ColumnDef::new(Alias::new("taken_at")).date_time().null())
                    .col(ColumnDef::new(Alias::new("qr_id")).integer().null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_att_rec_room")
                            .from(Alias::new("attendance_records"), Alias::new("room_id"))
                            .to(Alias::new("rooms"), Alias::new("id"))
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_att_rec_user")
                            .from(Alias::new("attendance_records"), Alias::new("user_id"))
                            .to(Alias::new("users"), Alias::new("id"))
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_att_rec_schedule")
                            .from(Alias::new("attendance_records"), Alias::new("schedule_id"))
                            .to(Alias::new("attendance_schedules"), Alias::new("id"))
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // The only guard against duplicate marks from concurrent scans.
        manager
            .create_index(
                Index::create()
                    .name("uq_att_rec_room_user_schedule")
                    .table(Alias::new("attendance_records"))
                    .col(Alias::new("room_id"))
                    .col(Alias::new("user_id"))
                    .col(Alias::new("schedule_id"))
                    .unique()
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_att_rec_schedule_status")
                    .table(Alias::new("attendance_records"))
                    .col(Alias::new("schedule_id"))
                    .col(Alias::new("status"))
                    .if_not_exists()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Alias::new("attendance_records")).to_owned())
            .await
    }
}

pub mod m202601050001_create_users;
pub mod m202601050002_create_geofences;
pub mod m202601050003_create_rooms;
pub mod m202601050004_create_room_users;
pub mod m202601050005_create_attendance_schedules;
pub mod m202601050006_create_attendance_records;
pub mod m202601050007_create_face_embeddings;
pub mod m202601050008_create_notifications;
pub mod m202601050009_create_excuses;

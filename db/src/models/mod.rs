pub mod attendance_record;
pub mod attendance_schedule;
pub mod excuse;
pub mod face_embedding;
pub mod geofence;
pub mod notification;
pub mod room;
pub mod room_user;
pub mod user;

pub use attendance_record::Entity as AttendanceRecord;
pub use attendance_schedule::Entity as AttendanceSchedule;
pub use excuse::Entity as Excuse;
pub use face_embedding::Entity as FaceEmbedding;
pub use geofence::Entity as Geofence;
pub use notification::Entity as Notification;
pub use room::Entity as Room;
pub use room_user::Entity as RoomUser;
pub use user::Entity as User;

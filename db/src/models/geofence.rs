use sea_orm::ActiveValue::Set;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A circular area used to validate physical presence.
///
/// Rooms reference a geofence by id. Edits apply to every scan validated after the
/// update; past records are never re-evaluated.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "geofences")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Human readable name, e.g. "Engineering Building".
    pub location: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Radius in metres.
    pub radius: f64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::room::Entity")]
    Rooms,
}

impl Related<super::room::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Rooms.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub async fn create(
        db: &DbConn,
        location: &str,
        latitude: f64,
        longitude: f64,
        radius: f64,
    ) -> Result<Model, DbErr> {
        ActiveModel {
            location: Set(location.to_owned()),
            latitude: Set(latitude),
            longitude: Set(longitude),
            radius: Set(radius),
            ..Default::default()
        }
        .insert(db)
        .await
    }

    pub async fn update_area(
        db: &DbConn,
        id: i64,
        latitude: f64,
        longitude: f64,
        radius: f64,
    ) -> Result<Model, DbErr> {
        ActiveModel {
            id: Set(id),
            latitude: Set(latitude),
            longitude: Set(longitude),
            radius: Set(radius),
            ..Default::default()
        }
        .update(db)
        .await
    }
}

//! System state entity - the durable key-value table.
//! Holds the application-state document and the background reminder record,
//! each as one JSON string under a fixed key.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// System state database model - one JSON document per key
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "system_state")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i32,
    /// Document key (e.g., `"habit_tracker_state"`)
    #[sea_orm(unique)]
    pub key: String,
    /// Serialized JSON document
    pub value: String,
    /// When the document was last written
    pub updated_at: DateTime,
}

/// `SystemState` has no relationships with other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

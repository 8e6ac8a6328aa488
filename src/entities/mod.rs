//! Entity module - Contains the SeaORM entity definitions for the database.
//! The store keeps whole JSON documents in one key-value table.

pub mod system_state;

pub use system_state::{
    Column as SystemStateColumn, Entity as SystemState, Model as SystemStateModel,
};

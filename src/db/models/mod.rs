//! Database models and types module.
//! This module contains all the database-related structs, enums, and type definitions.

mod db_models; // Table rows
mod enums; // Role, status and type codes
mod params; // Request payloads
mod responses; // API response models

// Re-export all models for easier access
pub use db_models::*;
pub use enums::*;
pub use params::*;
pub use responses::*;

//! `rollcall-core`: types, configuration and errors shared by the seeding
//! engine and the gateway binary.

pub mod config;
pub mod error;
pub mod types;

pub use config::{RollcallConfig, SeedSettings, SeedingConfig};
pub use error::{Result, RollcallError};
pub use types::{db_time, AttendanceStatus, SectionId, SessionId, SessionStatus, TenantId};

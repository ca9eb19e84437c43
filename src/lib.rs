//! Attendance sessions and records for a school course roster, served over a
//! JSON-lines stdin/stdout protocol by the `asistenciad` binary.

pub mod attendance;
pub mod config;
pub mod dates;
pub mod db;
pub mod error;
pub mod ipc;
pub mod roster;

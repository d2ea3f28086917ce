pub mod attendance;
pub mod core;
pub mod roster;
pub mod schedule;
pub mod sessions;

pub mod auth_cmd;
pub mod check;
pub mod common;
pub mod completions;
pub mod notes;
pub mod users;

//! Bridge between the terminal front end and the backend worker thread.

pub mod commands;
pub mod runtime;

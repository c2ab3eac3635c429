//! Controller layer: UI events and command orchestration for the terminal front end.

pub mod events;
pub mod orchestration;

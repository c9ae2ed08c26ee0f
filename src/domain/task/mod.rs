pub mod actions;
pub mod registry;
pub mod task;

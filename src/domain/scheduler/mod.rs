pub mod in_progress;
pub mod scheduler;
pub mod webhook;

pub mod cabling;
pub mod config;
pub mod diagnostics;
pub mod engine;
pub mod node;
pub mod poll;
pub mod scheduler;
pub mod services;
pub mod task;
pub mod utils;

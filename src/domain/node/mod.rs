pub mod inventory;
pub mod node;

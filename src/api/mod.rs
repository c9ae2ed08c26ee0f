pub mod config_dto;
pub mod event_dto;

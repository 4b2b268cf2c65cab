pub mod buffer_manager;
pub mod typed;

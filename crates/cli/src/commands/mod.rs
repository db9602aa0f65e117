pub mod chat;
pub mod config_cmd;
pub mod modes;
pub mod tools;

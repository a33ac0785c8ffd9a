pub mod chat;
pub mod config;
pub mod database;
pub mod error;
pub mod pipeline;
pub mod tool;
pub mod usage;

pub mod args;
pub mod commands;
pub mod host;
pub mod natives;

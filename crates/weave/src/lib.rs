pub mod cli;
pub mod commands;
pub mod error;
pub mod recording;
pub mod render;
pub mod utils;

pub mod adb;
pub mod cli;
pub mod commands;
pub mod config;
pub mod coords;
pub mod error;
pub mod logging;
pub mod models;
pub mod playback;
pub mod subs;

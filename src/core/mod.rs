pub mod alerts;
pub mod config;
pub mod host;
pub mod irc;
pub mod sound;
pub mod store;

pub mod boards;
pub mod config;
pub mod daemon;
pub mod helpers;
pub mod poll;
pub mod status;

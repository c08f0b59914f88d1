pub mod config;
pub mod device;
pub mod error;
pub mod motion;
pub mod position;
pub mod preset;

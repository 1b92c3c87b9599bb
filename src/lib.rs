pub mod backend;
pub mod client;
pub mod config;
pub mod frame;
pub mod round;
pub mod session;
pub mod synchronizer;
pub mod ui;

pub mod common;
pub mod config;
pub mod context;
pub mod network;
pub mod pipeline;
pub mod storage;
pub mod ui;

pub mod config;
pub mod navigator;
pub mod render;
pub mod store;
pub mod telegram;
pub mod ui;

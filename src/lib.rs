pub mod app;
pub mod catalog;
pub mod config;
pub mod core;
pub mod dates;
pub mod keep_awake;
pub mod model;
pub mod playback;
pub mod server;
pub mod sink;
pub mod tags;
pub mod ui;
pub mod view;

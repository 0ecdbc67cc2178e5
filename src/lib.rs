pub mod audio;
pub mod models;
pub mod monitor;
pub mod settings;

//! Configuration management for the profile editor
//!
//! - **app**: the editor's own settings (TOML under the platform config dir)
//!
//! The game profile itself is not a config in this sense; it is edited by
//! [`crate::engine`].

pub mod app;

pub use app::AppConfig;

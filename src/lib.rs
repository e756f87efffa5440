#![forbid(unsafe_code)]
//! Safe editing of the Battlefield 6 `PROFSAVE_profile` settings file.
//!
//! The pieces, leaves first:
//! - [`protect`]: read-only protection with scoped writable access
//! - [`edid`]: HDR peak brightness from display EDID
//! - [`settings`]: catalog of editable keys and their match patterns
//! - [`locator`]: profile discovery
//! - [`engine`]: backup, substitution and atomic rewrite
//! - [`process`]: "is the game running" gate

pub mod atomic;
pub mod backups;
pub mod config;
pub mod constants;
pub mod edid;
pub mod engine;
pub mod error;
pub mod locator;
pub mod presets;
pub mod process;
pub mod protect;
pub mod settings;
pub mod worker;

pub use engine::{ApplyRequest, ApplyResult, ConfigEditEngine};
pub use error::{EditError, EditResult};
pub use settings::{Setting, SettingRegistry};

// src/config/mod.rs

//! Configuration loading and validation for flow.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Layer defaults, files, environment and overrides (`loader.rs`).
//! - Validate basic invariants like a positive budget (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_config, load_from_path, load_layered, parse_override};
pub use model::{ConfigSection, FlowConfig, RawConfigFile, RawConfigSection};
pub use validate::validate_config;

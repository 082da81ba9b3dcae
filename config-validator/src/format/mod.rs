//! Dialect parsers and the readers they share.
//!
//! - `ignition`: declarative JSON configs (primary parser)
//! - `cloud_config`: `#cloud-config` YAML bodies (fallback)
//! - `json` / `yaml`: position-tracking readers feeding [`crate::tree`]

pub mod cloud_config;
pub mod ignition;
pub mod json;
pub mod yaml;

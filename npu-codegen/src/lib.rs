//! C++ binding generator for the NPU backend.
//!
//! This crate reads the backend's operator schema YAML (optionally merged with
//! an op-plugin schema) and emits the C++ glue that registers NPU kernels with
//! the host framework's dispatcher.
//!
//! ## Modules
//! - `yaml`: lenient schema loading and two-source merging.
//! - `resolver`: op-plugin schema resolution into the wrap-name cache.
//! - `state`: wrap-name cache and op-api eligibility set for one run.
//! - `model`: function schemas, operator records and dispatch keys.
//! - `api`: C++ types, names and argument translation.
//! - `backend`: kernel index built from the merged schema.
//! - `dest`: per-operator synthesis of declarations, wrappers and registrations.
//! - `gen`: the end-to-end pipeline.
//!
//! ## Usage
//! The `gen_backend_stubs` tool drives [`gen::run`] at build time.
pub mod logging;

pub mod api;
pub mod backend;
pub mod dest;
pub mod error;
pub mod gen;
pub mod model;
pub mod resolver;
pub mod selector;
pub mod settings;
pub mod state;
pub mod yaml;

pub use error::{CodegenError, Result};
pub use gen::{generated_files, run, GenOptions, GenOutput};
pub use selector::OperatorSelector;
pub use settings::Settings;
pub use state::CodegenState;

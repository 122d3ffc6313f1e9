//! # djene-core
//!
//! Core types for the djene framework: the [`DjeneError`] error taxonomy,
//! application [`Settings`](settings::Settings), and logging setup.

pub mod error;
pub mod logging;
pub mod settings;

pub use error::{DjeneError, DjeneResult};
pub use settings::{DatabaseSettings, Settings};

//! Soft Actor-Critic building blocks on top of burn.

pub mod data;
pub mod environment;
pub mod error;
pub mod evaluation;
pub mod module;
pub mod objective;
pub mod seed;

pub use error::{Error, ErrorKind, Result};

// src/lib.rs

//! Bookshop directory core: slug resolution over swappable storage backends.

pub mod error;
#[cfg(feature = "lambda")]
pub mod lambda;
pub mod models;
pub mod services;
pub mod storage;
pub mod utils;

pub use error::{AppError, Result};
pub use services::Directory;

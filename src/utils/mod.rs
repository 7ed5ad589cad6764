/*!
 * Utilities Module
 *
 * Contains utility functions for error handling.
 */

pub mod errors;

pub use errors::{AppError, Result};

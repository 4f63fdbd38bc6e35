//! docrag core library
//!
//! Foundational pieces shared by every docrag crate:
//! - Error handling (`AppError`, `AppResult`)
//! - Logging infrastructure
//! - Configuration management
//! - Retry policy for external service calls

pub mod config;
pub mod error;
pub mod logging;
pub mod retry;

pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use retry::RetryPolicy;

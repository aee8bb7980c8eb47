pub mod error;
pub mod logger;
pub mod monitor;
pub mod ols;
pub mod optimization;
pub mod validation;

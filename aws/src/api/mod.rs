//! AWS control plane API client
//!
//! A thin JSON-over-HTTP client with per-service wrappers. Requests are not
//! signed; point `endpoint`/`endpoints` at a signing proxy or a local emulator.

pub mod client;
pub mod ec2;
pub mod error;
pub mod kms;
pub mod networkmonitor;
pub mod http;
pub mod resourceexplorer2;
pub mod ssoadmin;

pub use client::{Client, Endpoints, RetryConfig, Service};
pub use error::{ApiError, ErrorKind};

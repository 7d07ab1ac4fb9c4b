//! Thin HTTP client for the identity provider's token endpoint and
//! Management API. Credential caching lives in `auth-cell`.

pub mod client;

pub use client::{IdpClient, IdpError};

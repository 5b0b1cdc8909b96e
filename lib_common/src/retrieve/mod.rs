//! # Data Retrieval Module
//!
//! Centralized HTTP retrieval for the crawler. The feed client and the
//! snapshot fetcher both sit on top of `ky_http::ApiClient`, so request
//! building, user agent and status handling live in one place.
//!
//! ## Contained Modules:
//!
//! - **`ky_http`**: A small `ApiClient` built on `reqwest` that never treats a
//!   non-2xx status as an error. The caller decides what a status means.

/// Generic HTTP API client returning status-annotated responses.
pub mod ky_http;

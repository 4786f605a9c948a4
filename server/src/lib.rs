//! HTTP surface for csvpipe, mounted under `/api/v1`.
//!
//! The caller's owner id comes from the `x-owner-id` header. Library calls
//! are blocking and run on tokio's blocking pool.

pub mod error;
pub mod response;
pub mod routes;

pub use error::{ApiError, ServerError};
pub use routes::{router, AppState, Owner, OWNER_HEADER};

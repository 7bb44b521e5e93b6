//! Request middleware and extractors.

mod auth;
mod metrics;
mod request_id;

pub use auth::{AuthContext, Role};
pub use metrics::metrics_middleware;
pub use request_id::{request_id_middleware, REQUEST_ID_HEADER};

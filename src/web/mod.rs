//! HTTP surface: route table, handlers, and middleware.

pub mod bridge;
pub mod content;
pub mod middleware;
pub mod origin;
pub mod proxy;
pub mod routes;
pub mod status;

pub use routes::*;

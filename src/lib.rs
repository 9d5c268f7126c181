//! Reverse proxy that fronts a legacy server-rendered storefront and keeps the
//! edge storefront's session in step with the legacy customer session.

pub mod app;
pub mod cli;
pub mod config;
pub mod identity;
pub mod legacy;
pub mod logging;
pub mod rewrite;
pub mod session;
pub mod state;
pub mod utils;
pub mod web;

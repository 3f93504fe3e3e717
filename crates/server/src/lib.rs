//! HTTP front end for the television guide.

pub mod api;
pub mod metrics;
pub mod state;

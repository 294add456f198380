//! Infrastructure error mapping

mod conversions;

pub use conversions::{oauth_error, status_error, transport_error};

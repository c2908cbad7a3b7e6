//! Middleware stack para el servidor HTTP.
//!
//! Se aplica a todas las requests, en este orden:
//! - request id: genera o propaga `X-Request-Id`
//! - logging: span `http_request` con el request id

mod logging;
mod request_id;

pub use logging::log_requests;
pub use request_id::{MakeRequestUuidV7, REQUEST_ID_HEADER, propagate_request_id, set_request_id};

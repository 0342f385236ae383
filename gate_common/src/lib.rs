mod helpers;
mod http_method;
mod secret;

pub use helpers::{parse_boolean_flag, parse_duration_millis, parse_number};
pub use http_method::{HttpMethod, HttpMethodParseError};
pub use secret::Secret;

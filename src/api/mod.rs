pub mod actor;
pub mod handlers;
pub mod routes;

pub use handlers::{error_response, AppState, ErrorResponse};
pub use routes::*;

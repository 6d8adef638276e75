pub mod handlers;
pub mod request_json;
pub mod routes;

pub use handlers::*;
pub use request_json::RequestJson;
pub use routes::*;

//! HTTP API: itinerary endpoints, health, metrics and OpenAPI.

pub mod docs;
pub mod handlers;
pub mod routes;

pub use docs::ApiDoc;
pub use handlers::AppState;
pub use routes::create_router;

//! OpenAPI document.

use utoipa::OpenApi;

use super::handlers;
use crate::error::ErrorResponse;
use crate::gateway::{HealthStatus, InterestListing, StreamEvent, StreamPhase};
use crate::interests::InterestCategory;
use crate::itinerary::{
    Activity, DateRange, DayCoverage, DayPlan, EditOperation, EditRequest, ItineraryRequest,
    ItineraryResponse, ItinerarySnapshot,
};

/// API documentation served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    info(title = "Itinerary Gateway", description = "Travel itinerary generation backed by Gemini"),
    paths(
        handlers::health,
        handlers::list_interests,
        handlers::generate_itinerary,
        handlers::generate_itinerary_stream,
        handlers::edit_itinerary,
    ),
    components(schemas(
        HealthStatus,
        InterestListing,
        InterestCategory,
        ItineraryRequest,
        ItineraryResponse,
        ItinerarySnapshot,
        EditRequest,
        EditOperation,
        DayPlan,
        DayCoverage,
        Activity,
        DateRange,
        StreamEvent,
        StreamPhase,
        ErrorResponse,
    )),
    tags(
        (name = "itinerary", description = "Itinerary generation and editing"),
        (name = "system", description = "Service health")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_endpoint() {
        let doc = ApiDoc::openapi();
        for path in [
            "/health",
            "/api/interests",
            "/api/generate-itinerary",
            "/api/generate-itinerary-stream",
            "/api/edit-itinerary",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}

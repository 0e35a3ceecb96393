//! Itinerary domain: wire types, validation, prompts and model output parsing.

pub mod parse;
pub mod prompt;
pub mod types;
pub mod validate;

pub use parse::{parse_itinerary, ParsedItinerary};
pub use prompt::{edit_prompt, generation_prompt};
pub use types::{
    Activity, DateRange, DayCoverage, DayPlan, EditOperation, EditRequest, ItineraryRequest,
    ItineraryResponse, ItinerarySnapshot,
};
pub use validate::{validate_edit, validate_request, EditPlan, EditTarget, TripPlan};

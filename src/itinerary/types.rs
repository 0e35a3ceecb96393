//! Request and response types for itinerary operations.

use chrono::{DateTime, NaiveDate, NaiveTime, Timelike, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use strum::{Display, EnumString};
use utoipa::ToSchema;

/// Client request to generate an itinerary.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ItineraryRequest {
    /// Destination city or region.
    #[serde(default, alias = "city")]
    pub destination: Option<String>,

    /// Interest ids, labels or tags. A comma-separated string is also accepted.
    #[serde(default, deserialize_with = "deserialize_interests")]
    pub interests: Vec<String>,

    /// First day of the trip (YYYY-MM-DD).
    #[serde(default)]
    pub start_date: Option<String>,

    /// Last day of the trip (YYYY-MM-DD), inclusive.
    #[serde(default)]
    pub end_date: Option<String>,

    /// Trip length in days, when no date range is given.
    #[serde(default)]
    pub days: Option<u32>,

    /// Free-text preferences passed to the model.
    #[serde(default)]
    pub preferences: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum InterestsInput {
    List(Vec<String>),
    Csv(String),
}

fn deserialize_interests<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let input = Option::<InterestsInput>::deserialize(deserializer)?;
    Ok(match input {
        None => Vec::new(),
        Some(InterestsInput::List(list)) => list,
        Some(InterestsInput::Csv(csv)) => csv
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
    })
}

/// Inclusive calendar range of a trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DateRange {
    /// First day.
    pub start: NaiveDate,
    /// Last day.
    pub end: NaiveDate,
}

impl DateRange {
    /// Number of days covered, counting both ends.
    pub fn day_count(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

/// A single planned activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Activity {
    /// Name of the place or event.
    pub name: String,
    /// Start time, HH:MM.
    pub start_time: String,
    /// End time, HH:MM.
    pub end_time: String,
    /// Short description.
    #[serde(default)]
    pub description: String,
    /// Location hint (venue, neighborhood or address).
    #[serde(default)]
    pub location: String,
    /// Interest category this activity serves, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interest: Option<String>,
}

/// Activities for one day of the trip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DayPlan {
    /// Day number, starting at 1.
    pub day: u32,
    /// Calendar date, when the trip has a date range.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    /// Activities ordered by start time.
    pub activities: Vec<Activity>,
    /// Which parts of the day are planned.
    #[serde(default)]
    pub coverage: DayCoverage,
}

/// Per-day summary of planned time slots.
///
/// Slots are judged by start hour: morning 08-12, afternoon 12-17,
/// evening 17-24.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DayCoverage {
    /// Number of activities.
    pub count: usize,
    /// Something starts between 08:00 and 12:00.
    pub has_morning: bool,
    /// Something starts between 12:00 and 17:00.
    pub has_afternoon: bool,
    /// Something starts at or after 17:00.
    pub has_evening: bool,
}

impl DayCoverage {
    /// Coverage of a day from its activity start times.
    pub fn from_start_times<I>(starts: I) -> Self
    where
        I: IntoIterator<Item = NaiveTime>,
    {
        starts.into_iter().fold(Self::default(), |mut acc, start| {
            let hour = start.hour();
            acc.count += 1;
            acc.has_morning |= (8..12).contains(&hour);
            acc.has_afternoon |= (12..17).contains(&hour);
            acc.has_evening |= (17..24).contains(&hour);
            acc
        })
    }
}

/// Kind of change applied by an edit.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum EditOperation {
    /// An activity was swapped for another.
    Replace,
    /// Something was removed.
    Delete,
    /// Only timing changed.
    UpdateTime,
    /// Only a description changed.
    UpdateDescription,
    /// Something was added.
    Add,
    /// Several parts of the plan changed.
    Restructure,
}

/// Itinerary returned to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ItineraryResponse {
    /// Always true for successful responses.
    pub success: bool,
    /// Identifier of the request that produced this itinerary.
    pub request_id: String,
    /// Destination the itinerary is for.
    pub destination: String,
    /// Interest category ids the itinerary was built around.
    pub interests: Vec<String>,
    /// Trip dates, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_range: Option<DateRange>,
    /// Day plans in order.
    pub days: Vec<DayPlan>,
    /// Number of activities across all days.
    pub total_activities: usize,
    /// Model that produced the itinerary.
    pub model: String,
    /// Generation timestamp.
    pub generated_at: DateTime<Utc>,
    /// Edit operation, for edited itineraries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<EditOperation>,
    /// Summary of the edit, for edited itineraries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_summary: Option<String>,
}

/// Itinerary as sent back by clients for editing.
///
/// A full [`ItineraryResponse`] is accepted; only these fields are read.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ItinerarySnapshot {
    /// Destination of the itinerary.
    #[serde(default)]
    pub destination: Option<String>,
    /// Interest ids of the itinerary.
    #[serde(default)]
    pub interests: Vec<String>,
    /// Trip dates.
    #[serde(default)]
    pub date_range: Option<DateRange>,
    /// Current day plans.
    #[serde(default)]
    pub days: Vec<DayPlan>,
}

/// Client request to revise an existing itinerary.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct EditRequest {
    /// The itinerary to revise.
    #[serde(default)]
    pub itinerary: Option<ItinerarySnapshot>,
    /// What should change, in plain language.
    #[serde(default, alias = "edit_request")]
    pub instruction: Option<String>,
    /// Day the instruction refers to (1-based).
    #[serde(default)]
    pub day: Option<u32>,
    /// Activity index within `day` (0-based).
    #[serde(default)]
    pub activity: Option<usize>,
    /// Destination override.
    #[serde(default, alias = "city")]
    pub destination: Option<String>,
}

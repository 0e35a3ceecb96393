//! Input validation. Produces plans that prompts are built from.

use chrono::NaiveDate;

use crate::error::ValidationError;
use crate::interests::InterestCatalog;

use super::types::{DateRange, DayPlan, EditRequest, ItineraryRequest};

/// A validated generation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TripPlan {
    /// Trimmed destination.
    pub destination: String,
    /// Resolved interest category ids.
    pub interests: Vec<String>,
    /// Number of days to plan.
    pub day_count: u32,
    /// Dates, when the client gave them.
    pub date_range: Option<DateRange>,
    /// Free-text preferences, if non-blank.
    pub preferences: Option<String>,
}

impl TripPlan {
    /// Calendar date of a 1-based day, when the trip has dates.
    pub fn date_for_day(&self, day: u32) -> Option<NaiveDate> {
        let range = self.date_range?;
        range
            .start
            .checked_add_days(chrono::Days::new(u64::from(day.saturating_sub(1))))
    }
}

/// What part of an itinerary an edit targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditTarget {
    /// The whole itinerary.
    Itinerary,
    /// One day (1-based).
    Day(u32),
    /// One activity (day 1-based, index 0-based).
    Activity {
        /// Day number.
        day: u32,
        /// Index within the day.
        index: usize,
    },
}

/// A validated edit request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditPlan {
    /// Destination, when known.
    pub destination: Option<String>,
    /// Resolved interest ids of the current itinerary.
    pub interests: Vec<String>,
    /// Dates of the current itinerary.
    pub date_range: Option<DateRange>,
    /// Current days.
    pub current: Vec<DayPlan>,
    /// Trimmed instruction.
    pub instruction: String,
    /// What the instruction refers to.
    pub target: EditTarget,
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn parse_date(field: &'static str, value: &str) -> Result<NaiveDate, ValidationError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| ValidationError::InvalidDate {
        field,
        value: value.to_string(),
    })
}

fn trip_length(
    request: &ItineraryRequest,
    max_days: u32,
) -> Result<(u32, Option<DateRange>), ValidationError> {
    let start = non_blank(request.start_date.as_deref());
    let end = non_blank(request.end_date.as_deref());

    let (days, range) = match (start, end) {
        (Some(start), Some(end)) => {
            let range = DateRange {
                start: parse_date("start_date", &start)?,
                end: parse_date("end_date", &end)?,
            };
            if range.end < range.start {
                return Err(ValidationError::EndBeforeStart);
            }
            let range_days = u32::try_from(range.day_count()).unwrap_or(u32::MAX);
            if let Some(days) = request.days {
                if days != range_days {
                    return Err(ValidationError::DaysMismatch { days, range_days });
                }
            }
            (range_days, Some(range))
        }
        (Some(_), None) | (None, Some(_)) => return Err(ValidationError::IncompleteDateRange),
        (None, None) => match request.days {
            Some(days) => (days, None),
            None => return Err(ValidationError::MissingTripLength),
        },
    };

    if days == 0 {
        return Err(ValidationError::ZeroDays);
    }

    if days > max_days {
        return Err(ValidationError::TripTooLong { days, max: max_days });
    }

    Ok((days, range))
}

/// Validate a generation request against the catalog.
pub fn validate_request(
    request: &ItineraryRequest,
    catalog: &InterestCatalog,
    max_days: u32,
) -> Result<TripPlan, ValidationError> {
    let destination =
        non_blank(request.destination.as_deref()).ok_or(ValidationError::MissingDestination)?;
    let interests = catalog.resolve(&request.interests)?;
    let (day_count, date_range) = trip_length(request, max_days)?;

    Ok(TripPlan {
        destination,
        interests,
        day_count,
        date_range,
        preferences: non_blank(request.preferences.as_deref()),
    })
}

/// Validate an edit request.
pub fn validate_edit(
    request: &EditRequest,
    catalog: &InterestCatalog,
) -> Result<EditPlan, ValidationError> {
    let instruction =
        non_blank(request.instruction.as_deref()).ok_or(ValidationError::MissingInstruction)?;

    let snapshot = request
        .itinerary
        .as_ref()
        .filter(|s| !s.days.is_empty())
        .ok_or(ValidationError::EmptyItinerary)?;

    let target = match (request.day, request.activity) {
        (None, None) => EditTarget::Itinerary,
        (None, Some(_)) => return Err(ValidationError::ActivityWithoutDay),
        (Some(day), activity) => {
            let total = snapshot.days.len();
            let index = usize::try_from(day).unwrap_or(usize::MAX);
            if day == 0 || index > total {
                return Err(ValidationError::DayOutOfRange { day, total });
            }
            match activity {
                None => EditTarget::Day(day),
                Some(activity) => {
                    let total = snapshot.days[index - 1].activities.len();
                    if activity >= total {
                        return Err(ValidationError::ActivityOutOfRange {
                            activity,
                            day,
                            total,
                        });
                    }
                    EditTarget::Activity {
                        day,
                        index: activity,
                    }
                }
            }
        }
    };

    // Interests echo what the gateway returned earlier; an empty list is fine.
    let interests = match catalog.resolve(&snapshot.interests) {
        Ok(ids) => ids,
        Err(ValidationError::NoInterests) => Vec::new(),
        Err(e) => return Err(e),
    };

    Ok(EditPlan {
        destination: non_blank(request.destination.as_deref())
            .or_else(|| non_blank(snapshot.destination.as_deref())),
        interests,
        date_range: snapshot.date_range,
        current: snapshot.days.clone(),
        instruction,
        target,
    })
}

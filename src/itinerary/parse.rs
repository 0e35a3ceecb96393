//! Turning model text into validated day plans.
//!
//! Model output is accepted only when it matches the itinerary contract
//! exactly. The JSON object may be wrapped in a code fence or surrounded by
//! prose; nothing inside it is repaired.

use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, NaiveTime};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use crate::error::UpstreamError;

use super::types::{Activity, DayCoverage, DayPlan, EditOperation};

static FENCED_JSON: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)```(?:json)?\s*(\{.*?\})\s*```").expect("fenced JSON pattern is valid")
});

const TIME_FORMATS: &[&str] = &["%H:%M", "%H:%M:%S", "%I:%M %p", "%I:%M%p"];
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"];

#[derive(Debug, Deserialize)]
struct ModelItinerary {
    days: Vec<ModelDay>,
    #[serde(default)]
    operation: Option<String>,
    #[serde(default)]
    change_summary: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModelDay {
    activities: Vec<ModelActivity>,
}

#[derive(Debug, Deserialize)]
struct ModelActivity {
    name: String,
    start_time: String,
    end_time: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    interest: Option<String>,
}

/// Day plans parsed from model output, not yet bound to a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedItinerary {
    /// Days numbered from 1, undated.
    pub days: Vec<DayPlan>,
    /// Edit operation the model reported, if recognized.
    pub operation: Option<EditOperation>,
    /// Edit summary the model reported.
    pub change_summary: Option<String>,
}

/// Locate the JSON object in model text.
pub fn extract_json(text: &str) -> Result<serde_json::Value, UpstreamError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(UpstreamError::Empty);
    }

    if let Ok(value) = serde_json::from_str(text) {
        return Ok(value);
    }

    if let Some(block) = FENCED_JSON.captures(text).and_then(|c| c.get(1)) {
        if let Ok(value) = serde_json::from_str(block.as_str()) {
            return Ok(value);
        }
    }

    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
        if start < end {
            if let Ok(value) = serde_json::from_str(&text[start..=end]) {
                return Ok(value);
            }
        }
    }

    Err(UpstreamError::Malformed("no JSON object found in model output".to_string()))
}

/// Parse a model time into HH:MM form.
pub fn normalize_time(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();

    TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(&raw.to_uppercase(), fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
                .map(|dt| dt.time())
        })
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.time()))
}

fn convert_activity(
    day: usize,
    activity: ModelActivity,
    allowed_interests: &[String],
) -> Result<(NaiveTime, Activity), UpstreamError> {
    let name = activity.name.trim().to_string();
    if name.is_empty() {
        return Err(UpstreamError::Malformed(format!("day {day} has an unnamed activity")));
    }

    let start = normalize_time(&activity.start_time).ok_or_else(|| {
        UpstreamError::Malformed(format!("day {day}: unreadable start_time for {name}"))
    })?;
    let end = normalize_time(&activity.end_time).ok_or_else(|| {
        UpstreamError::Malformed(format!("day {day}: unreadable end_time for {name}"))
    })?;

    let interest = activity.interest.and_then(|label| {
        allowed_interests
            .iter()
            .find(|id| id.eq_ignore_ascii_case(label.trim()))
            .cloned()
    });

    Ok((
        start,
        Activity {
            name,
            start_time: start.format("%H:%M").to_string(),
            end_time: end.format("%H:%M").to_string(),
            description: activity.description.unwrap_or_default().trim().to_string(),
            location: activity.location.unwrap_or_default().trim().to_string(),
            interest,
        },
    ))
}

/// Parse model text into day plans.
///
/// Every day needs at least one activity, every activity a name and
/// readable times. Activities are sorted by start time within each day.
/// Interest labels outside `allowed_interests` are dropped.
pub fn parse_itinerary(
    text: &str,
    allowed_interests: &[String],
) -> Result<ParsedItinerary, UpstreamError> {
    let value = extract_json(text)?;
    let model: ModelItinerary = serde_json::from_value(value)
        .map_err(|e| UpstreamError::Malformed(format!("itinerary shape mismatch: {e}")))?;

    if model.days.is_empty() {
        return Err(UpstreamError::Malformed("itinerary has no days".to_string()));
    }

    let mut days = Vec::with_capacity(model.days.len());
    for (index, model_day) in model.days.into_iter().enumerate() {
        let number = index + 1;
        if model_day.activities.is_empty() {
            return Err(UpstreamError::Malformed(format!("day {number} has no activities")));
        }

        let mut timed = model_day
            .activities
            .into_iter()
            .map(|a| convert_activity(number, a, allowed_interests))
            .collect::<Result<Vec<_>, _>>()?;
        timed.sort_by_key(|(start, _)| *start);

        days.push(DayPlan {
            day: u32::try_from(number).unwrap_or(u32::MAX),
            date: None,
            coverage: DayCoverage::from_start_times(timed.iter().map(|(start, _)| *start)),
            activities: timed.into_iter().map(|(_, activity)| activity).collect(),
        });
    }

    Ok(ParsedItinerary {
        days,
        operation: model
            .operation
            .as_deref()
            .and_then(|op| EditOperation::from_str(op.trim()).ok()),
        change_summary: model
            .change_summary
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty()),
    })
}

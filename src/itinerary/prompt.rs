//! Prompt construction for generation and edit calls.

use std::fmt::Write;

use crate::interests::InterestCatalog;

use super::validate::{EditPlan, EditTarget, TripPlan};

const OUTPUT_CONTRACT: &str = r#"Respond with ONLY valid JSON (no markdown, no explanation) in this shape:
{
  "days": [
    {
      "day": 1,
      "activities": [
        {
          "name": "Place or event name",
          "start_time": "HH:MM",
          "end_time": "HH:MM",
          "description": "One or two sentences",
          "location": "Venue, neighborhood or address",
          "interest": "interest id from the list above, or null"
        }
      ]
    }
  ]
}"#;

fn describe_interests(out: &mut String, interests: &[String], catalog: &InterestCatalog) {
    for id in interests {
        match catalog.get(id) {
            Some(category) => {
                let _ = writeln!(
                    out,
                    "- {} ({}): e.g. {}; look for {}",
                    category.id,
                    category.label,
                    category.tags.join(", "),
                    category.keywords.join(", ")
                );
            }
            None => {
                let _ = writeln!(out, "- {id}");
            }
        }
    }
}

/// Prompt for a fresh itinerary.
pub fn generation_prompt(plan: &TripPlan, catalog: &InterestCatalog) -> String {
    let mut out = String::from(
        "You are a travel planner. Build a realistic day-by-day itinerary using real places.\n\n",
    );

    let _ = writeln!(out, "Destination: {}", plan.destination);
    match plan.date_range {
        Some(range) => {
            let _ = writeln!(
                out,
                "Dates: {} to {} ({} days)",
                range.start.format("%A, %B %d, %Y"),
                range.end.format("%A, %B %d, %Y"),
                plan.day_count
            );
        }
        None => {
            let _ = writeln!(out, "Length: {} days", plan.day_count);
        }
    }

    out.push_str("\nInterests (use these ids for the \"interest\" field):\n");
    describe_interests(&mut out, &plan.interests, catalog);

    if let Some(preferences) = &plan.preferences {
        let _ = writeln!(out, "\nTraveler preferences: {preferences}");
    }

    let _ = write!(
        out,
        "\nRules:\n\
         1. Return exactly {} days, each with at least one activity.\n\
         2. Order activities within a day by start time and avoid overlaps.\n\
         3. Use 24-hour HH:MM times.\n\
         4. Prefer in-person activities located in {}.\n\n",
        plan.day_count, plan.destination
    );

    out.push_str(OUTPUT_CONTRACT);
    out
}

/// Prompt for revising an existing itinerary.
pub fn edit_prompt(plan: &EditPlan, catalog: &InterestCatalog) -> String {
    let mut out = String::from(
        "You are an itinerary editing assistant. Apply the traveler's change to the \
         itinerary below and return the complete revised itinerary.\n\n",
    );

    let _ = writeln!(
        out,
        "Destination: {}",
        plan.destination.as_deref().unwrap_or("not specified")
    );
    if let Some(range) = plan.date_range {
        let _ = writeln!(out, "Dates: {} to {}", range.start, range.end);
    }

    if !plan.interests.is_empty() {
        out.push_str("\nInterests (use these ids for the \"interest\" field):\n");
        describe_interests(&mut out, &plan.interests, catalog);
    }

    let current = serde_json::to_string_pretty(&plan.current).unwrap_or_else(|_| "[]".to_string());
    let _ = writeln!(out, "\nCurrent itinerary days:\n{current}");

    match plan.target {
        EditTarget::Itinerary => {}
        EditTarget::Day(day) => {
            let _ = writeln!(out, "\nThe change concerns day {day}.");
        }
        EditTarget::Activity { day, index } => {
            let name = (day as usize)
                .checked_sub(1)
                .and_then(|i| plan.current.get(i))
                .and_then(|d| d.activities.get(index))
                .map(|a| a.name.as_str())
                .unwrap_or("the selected activity");
            let _ = writeln!(
                out,
                "\nThe change concerns activity {} of day {day}: \"{name}\".",
                index + 1
            );
        }
    }

    let _ = writeln!(out, "\nTraveler's request: \"{}\"", plan.instruction);

    out.push_str(
        "\nKeep everything the request does not mention unchanged. Renumber days from 1 if \
         days are removed or added.\n\
         Also include \"operation\" (one of replace, delete, update_time, update_description, \
         add, restructure) and \"change_summary\" (one sentence) at the top level.\n\n",
    );
    out.push_str(OUTPUT_CONTRACT);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::itinerary::types::{Activity, DayCoverage, DayPlan};

    fn trip() -> TripPlan {
        TripPlan {
            destination: "Kyoto".to_string(),
            interests: vec!["culture".to_string(), "food".to_string()],
            day_count: 3,
            date_range: None,
            preferences: Some("vegetarian".to_string()),
        }
    }

    #[test]
    fn generation_prompt_mentions_request_details() {
        let prompt = generation_prompt(&trip(), &InterestCatalog::builtin());
        assert!(prompt.contains("Destination: Kyoto"));
        assert!(prompt.contains("Length: 3 days"));
        assert!(prompt.contains("exactly 3 days"));
        assert!(prompt.contains("- culture (Art and Culture)"));
        assert!(prompt.contains("- food (Food and Drink)"));
        assert!(prompt.contains("Traveler preferences: vegetarian"));
        assert!(prompt.contains("\"days\""));
    }

    #[test]
    fn edit_prompt_includes_current_itinerary_and_target() {
        let plan = EditPlan {
            destination: None,
            interests: Vec::new(),
            date_range: None,
            current: vec![DayPlan {
                day: 1,
                date: None,
                activities: vec![Activity {
                    name: "Kinkaku-ji".to_string(),
                    start_time: "09:00".to_string(),
                    end_time: "10:30".to_string(),
                    description: String::new(),
                    location: String::new(),
                    interest: None,
                }],
                coverage: DayCoverage::default(),
            }],
            instruction: "swap for something indoors".to_string(),
            target: EditTarget::Activity { day: 1, index: 0 },
        };

        let prompt = edit_prompt(&plan, &InterestCatalog::builtin());
        assert!(prompt.contains("Destination: not specified"));
        assert!(prompt.contains("Kinkaku-ji"));
        assert!(prompt.contains("activity 1 of day 1"));
        assert!(prompt.contains("\"swap for something indoors\""));
        assert!(prompt.contains("change_summary"));
    }

    #[test]
    fn edit_prompt_tolerates_unknown_activity_target() {
        let plan = EditPlan {
            destination: Some("Kyoto".to_string()),
            interests: Vec::new(),
            date_range: None,
            current: Vec::new(),
            instruction: "swap it".to_string(),
            target: EditTarget::Activity { day: 0, index: 3 },
        };

        let prompt = edit_prompt(&plan, &InterestCatalog::builtin());
        assert!(prompt.contains("activity 4 of day 0: \"the selected activity\""));
    }
}

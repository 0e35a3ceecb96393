//! Static interest categories and interest resolution.

use std::collections::BTreeSet;

use serde::Serialize;
use utoipa::ToSchema;

use crate::error::ValidationError;

/// Built-in categories: (id, label, tags, prompt keywords).
const BUILTIN_CATEGORIES: &[(&str, &str, &[&str], &[&str])] = &[
    (
        "outdoor",
        "Outdoor",
        &[
            "Hiking", "Camping", "Road Trips", "Beach", "Mountains", "National Parks",
            "Adventure Travel", "Backpacking",
        ],
        &["outdoor events", "nature activities", "adventure tours"],
    ),
    (
        "social",
        "Social Activities",
        &[
            "Networking", "Meetups", "Social Events", "Parties", "Happy Hour", "Clubbing",
            "Bars", "Dancing",
        ],
        &["social events", "networking events", "happy hours", "meetups"],
    ),
    (
        "hobbies",
        "Hobbies and Passion",
        &[
            "Photography", "Reading", "Writing", "Crafts", "DIY", "Vintage Fashion", "Sneakers",
            "Collecting",
        ],
        &["hobby workshops", "craft classes", "creative events"],
    ),
    (
        "sports",
        "Sports and Fitness",
        &[
            "Gym", "Running", "Yoga", "Swimming", "Cycling", "Basketball", "Soccer", "Tennis",
            "Martial Arts",
        ],
        &["fitness classes", "sports events", "workout sessions"],
    ),
    (
        "wellbeing",
        "Health and Wellbeing",
        &[
            "Meditation", "Wellness", "Spa", "Mental Health", "Nutrition", "Mindfulness",
            "Self-care",
        ],
        &["wellness events", "meditation sessions", "health workshops"],
    ),
    (
        "technology",
        "Technology",
        &[
            "Coding", "AI", "Startups", "Tech Meetups", "Hackathons", "Gaming Tech", "VR",
            "Crypto",
        ],
        &["tech meetups", "hackathons", "startup events", "tech talks"],
    ),
    (
        "culture",
        "Art and Culture",
        &[
            "Museums", "Art Galleries", "Theater", "Opera", "Ballet", "Film", "Concerts",
            "Live Music",
        ],
        &["art exhibitions", "cultural events", "museum exhibits", "performances"],
    ),
    (
        "food",
        "Food and Drink",
        &[
            "Restaurants", "Street Food", "Cafes", "Food Markets", "Cooking Classes",
            "Wine Tasting", "Craft Beer", "Local Cuisine",
        ],
        &["food tours", "local restaurants", "market halls", "tasting experiences"],
    ),
    (
        "games",
        "Games",
        &[
            "Video Games", "Board Games", "E-Sports", "Gaming", "Tabletop RPG", "Card Games",
            "Arcade",
        ],
        &["gaming events", "esports", "board game nights", "gaming tournaments"],
    ),
    (
        "career",
        "Career and Business",
        &[
            "Networking", "Conferences", "Workshops", "Professional Development",
            "Entrepreneurship", "Leadership",
        ],
        &["business networking", "professional events", "industry conferences"],
    ),
    (
        "education",
        "Science and Education",
        &[
            "Lectures", "Workshops", "Book Clubs", "Learning", "Research", "STEM", "History",
            "Language Exchange",
        ],
        &["lectures", "educational workshops", "learning events"],
    ),
];

/// A single interest category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct InterestCategory {
    /// Stable identifier, e.g. "culture".
    pub id: String,
    /// Human-readable label.
    pub label: String,
    /// Finer-grained tags that map onto this category.
    pub tags: Vec<String>,
    /// Search phrases added to prompts.
    #[serde(skip)]
    pub keywords: Vec<String>,
}

impl InterestCategory {
    fn matches(&self, interest: &str) -> bool {
        self.id.eq_ignore_ascii_case(interest)
            || self.label.eq_ignore_ascii_case(interest)
            || self.tags.iter().any(|tag| tag.eq_ignore_ascii_case(interest))
    }
}

/// Immutable set of interest categories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterestCatalog {
    categories: Vec<InterestCategory>,
}

impl InterestCatalog {
    /// Catalog with the built-in categories.
    pub fn builtin() -> Self {
        let categories = BUILTIN_CATEGORIES
            .iter()
            .map(|(id, label, tags, keywords)| InterestCategory {
                id: id.to_string(),
                label: label.to_string(),
                tags: tags.iter().map(|t| t.to_string()).collect(),
                keywords: keywords.iter().map(|k| k.to_string()).collect(),
            })
            .collect();

        Self { categories }
    }

    /// All categories in display order.
    pub fn categories(&self) -> &[InterestCategory] {
        &self.categories
    }

    /// Category by id.
    pub fn get(&self, id: &str) -> Option<&InterestCategory> {
        self.categories.iter().find(|c| c.id == id)
    }

    /// Every tag across all categories, sorted and deduplicated.
    pub fn all_tags(&self) -> Vec<String> {
        self.categories
            .iter()
            .flat_map(|c| c.tags.iter().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Resolve client interest strings to category ids.
    ///
    /// Each string may be a category id, label or tag (case-insensitive).
    /// Blank entries are ignored. The result keeps first-seen order and has
    /// no duplicates.
    pub fn resolve<S: AsRef<str>>(&self, interests: &[S]) -> Result<Vec<String>, ValidationError> {
        let mut resolved: Vec<String> = Vec::new();
        let mut invalid = Vec::new();

        for raw in interests {
            let interest = raw.as_ref().trim();
            if interest.is_empty() {
                continue;
            }

            match self.categories.iter().find(|c| c.matches(interest)) {
                Some(category) => {
                    if !resolved.contains(&category.id) {
                        resolved.push(category.id.clone());
                    }
                }
                None => invalid.push(interest.to_string()),
            }
        }

        if !invalid.is_empty() {
            return Err(ValidationError::UnknownInterests { invalid });
        }

        if resolved.is_empty() {
            return Err(ValidationError::NoInterests);
        }

        Ok(resolved)
    }
}

impl Default for InterestCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn builtin_has_unique_ids() {
        let catalog = InterestCatalog::builtin();
        let ids: BTreeSet<_> = catalog.categories().iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids.len(), catalog.categories().len());
        assert!(catalog.get("culture").is_some());
        assert!(catalog.get("food").is_some());
    }

    #[test]
    fn resolve_accepts_ids_labels_and_tags() {
        let catalog = InterestCatalog::builtin();
        let resolved = catalog
            .resolve(&["culture", "Food and Drink", "hiking"])
            .unwrap();
        assert_eq!(resolved, vec!["culture", "food", "outdoor"]);
    }

    #[test]
    fn resolve_deduplicates_in_first_seen_order() {
        let catalog = InterestCatalog::builtin();
        let resolved = catalog.resolve(&["Museums", "food", "Opera", " "]).unwrap();
        assert_eq!(resolved, vec!["culture", "food"]);
    }

    #[test]
    fn resolve_rejects_unknown_interests() {
        let catalog = InterestCatalog::builtin();
        let err = catalog.resolve(&["culture", "skydiving"]).unwrap_err();
        assert_eq!(
            err,
            ValidationError::UnknownInterests {
                invalid: vec!["skydiving".to_string()]
            }
        );
    }

    #[test]
    fn resolve_rejects_empty_list() {
        let catalog = InterestCatalog::builtin();
        let empty: [&str; 0] = [];
        assert_eq!(catalog.resolve(&empty), Err(ValidationError::NoInterests));
        assert_eq!(catalog.resolve(&["", "  "]), Err(ValidationError::NoInterests));
    }

    #[test]
    fn all_tags_sorted_and_deduplicated() {
        let tags = InterestCatalog::builtin().all_tags();
        let mut sorted = tags.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(tags, sorted);
        assert_eq!(tags.iter().filter(|t| *t == "Networking").count(), 1);
    }
}

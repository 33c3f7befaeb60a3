use std::collections::BTreeMap;

use foundation::LatLng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlaceId(pub u64);

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagId(pub u64);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: TagId,
    pub slug: String,
}

/// Read-only projection of a place as the discovery core sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub id: PlaceId,
    pub position: LatLng,
    /// Locale code -> display title.
    #[serde(default)]
    pub titles: BTreeMap<String, String>,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    /// Milliseconds since the Unix epoch.
    pub created_at_ms: i64,
}

impl Place {
    pub fn has_any_tag(&self, ids: &std::collections::BTreeSet<TagId>) -> bool {
        self.tags.iter().any(|t| ids.contains(&t.id))
    }

    /// Resolve the display title for `locale`.
    ///
    /// Fallback chain: exact locale, primary language subtag (`fr-CA` -> `fr`),
    /// `default_locale`, first title in locale order, empty string.
    pub fn title_for(&self, locale: &str, default_locale: &str) -> &str {
        if let Some(t) = self.titles.get(locale) {
            return t;
        }
        let primary = locale.split(['-', '_']).next().unwrap_or(locale);
        if let Some(t) = self.titles.get(primary) {
            return t;
        }
        if let Some(t) = self.titles.get(default_locale) {
            return t;
        }
        self.titles.values().next().map(String::as_str).unwrap_or("")
    }
}

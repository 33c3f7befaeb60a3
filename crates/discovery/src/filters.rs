//! Search intent: the validated filter set and its untyped boundary form.

use std::collections::HashSet;
use std::fmt;

use foundation::LatLng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cursor::Cursor;
use crate::error::InvalidFilterError;
use crate::place::TagId;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    /// Ranked by distance from a point, within a radius.
    #[default]
    Proximity,
    /// Filtered by tag membership only.
    Worldwide,
}

impl SearchMode {
    /// Case-insensitive parse of the wire name.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "proximity" => Some(SearchMode::Proximity),
            "worldwide" => Some(SearchMode::Worldwide),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SearchMode::Proximity => "proximity",
            SearchMode::Worldwide => "worldwide",
        }
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tag as the client names it: numeric identifier or slug.
///
/// Resolution to canonical ids is the store's job.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TagRef {
    Id(TagId),
    Slug(String),
}

impl TagRef {
    /// All-digit tokens that fit a `u64` are identifiers; everything else is a slug.
    pub fn parse(token: &str) -> Self {
        if !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(id) = token.parse::<u64>() {
                return TagRef::Id(TagId(id));
            }
        }
        TagRef::Slug(token.to_string())
    }
}

impl fmt::Display for TagRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagRef::Id(id) => write!(f, "{}", id.0),
            TagRef::Slug(s) => f.write_str(s),
        }
    }
}

/// Tags as they arrive on the wire: one comma-joined string or a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TagsInput {
    Joined(String),
    List(Vec<String>),
}

/// Loosely-shaped search intent, before validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterInput {
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub radius: Option<i64>,
    #[serde(default)]
    pub tags: Option<TagsInput>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub cursor: Option<String>,
}

impl FilterInput {
    pub fn proximity(latitude: f64, longitude: f64, radius_m: i64) -> Self {
        Self {
            mode: Some(SearchMode::Proximity.as_str().to_string()),
            latitude: Some(latitude),
            longitude: Some(longitude),
            radius: Some(radius_m),
            ..Self::default()
        }
    }

    pub fn worldwide(tags: &str) -> Self {
        Self {
            mode: Some(SearchMode::Worldwide.as_str().to_string()),
            tags: Some(TagsInput::Joined(tags.to_string())),
            ..Self::default()
        }
    }

    pub fn with_tags(mut self, tags: &str) -> Self {
        self.tags = Some(TagsInput::Joined(tags.to_string()));
        self
    }
}

/// What validation does with a value that breaks a constraint.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationPolicy {
    /// Replace the offending value with its default.
    #[default]
    CorrectSilently,
    /// Raise [`InvalidFilterError`].
    Throw,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterLimits {
    pub min_radius_m: u32,
    pub max_radius_m: u32,
    pub default_radius_m: u32,
    pub max_tags: usize,
}

impl Default for FilterLimits {
    fn default() -> Self {
        Self {
            min_radius_m: 100,
            max_radius_m: 500_000,
            default_radius_m: 10_000,
            max_tags: 10,
        }
    }
}

impl FilterLimits {
    pub fn radius_allowed(&self, radius_m: i64) -> bool {
        radius_m >= self.min_radius_m as i64 && radius_m <= self.max_radius_m as i64
    }
}

/// Validated, immutable search intent.
///
/// Only [`SpatialFilterSet::validate`] builds one; changes go through
/// [`SpatialFilterSet::revise`], which validates again.
#[derive(Debug, Clone, PartialEq)]
pub struct SpatialFilterSet {
    mode: SearchMode,
    center: Option<LatLng>,
    radius_m: u32,
    tags: Vec<TagRef>,
    address: Option<String>,
    cursor: Option<Cursor>,
}

impl SpatialFilterSet {
    pub fn validate(
        input: FilterInput,
        policy: ValidationPolicy,
        limits: &FilterLimits,
    ) -> Result<Self, InvalidFilterError> {
        let strict = policy == ValidationPolicy::Throw;

        let mode = match input.mode.as_deref().map(str::trim) {
            None | Some("") => SearchMode::default(),
            Some(raw) => match SearchMode::parse(raw) {
                Some(mode) => mode,
                None if strict => return Err(InvalidFilterError::UnknownMode(raw.to_string())),
                None => {
                    debug!(mode = raw, "unknown search mode, using default");
                    SearchMode::default()
                }
            },
        };

        let radius_m = match input.radius {
            None => limits.default_radius_m,
            Some(r) if limits.radius_allowed(r) => r as u32,
            Some(r) if strict => {
                return Err(InvalidFilterError::RadiusOutOfRange {
                    radius_m: r,
                    min_m: limits.min_radius_m,
                    max_m: limits.max_radius_m,
                });
            }
            Some(r) => {
                debug!(radius_m = r, "radius out of range, using default");
                limits.default_radius_m
            }
        };

        // The pair is kept or dropped as a unit.
        let center = match (input.latitude, input.longitude) {
            (None, None) => None,
            (Some(lat), Some(lng)) if LatLng::new(lat, lng).is_valid() => {
                Some(LatLng::new(lat, lng))
            }
            (latitude, longitude) if strict => {
                return Err(InvalidFilterError::InvalidCoordinates {
                    latitude,
                    longitude,
                });
            }
            (latitude, longitude) => {
                debug!(?latitude, ?longitude, "invalid coordinates, clearing both");
                None
            }
        };

        let tags = normalize_tags(input.tags.as_ref(), limits.max_tags);

        let address = input
            .address
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty());

        let cursor = match input.cursor.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(token) => match Cursor::decode(token) {
                Ok(c) => Some(c),
                Err(e) if strict => return Err(e),
                Err(e) => {
                    debug!(error = %e, "dropping malformed cursor");
                    None
                }
            },
        };

        Ok(Self {
            mode,
            center,
            radius_m,
            tags,
            address,
            cursor,
        })
    }

    /// Re-verify hard constraints against `limits`.
    pub fn check(&self, limits: &FilterLimits) -> Result<(), InvalidFilterError> {
        if !limits.radius_allowed(self.radius_m as i64) {
            return Err(InvalidFilterError::RadiusOutOfRange {
                radius_m: self.radius_m as i64,
                min_m: limits.min_radius_m,
                max_m: limits.max_radius_m,
            });
        }
        if let Some(c) = self.center {
            if !c.is_valid() {
                return Err(InvalidFilterError::InvalidCoordinates {
                    latitude: Some(c.lat),
                    longitude: Some(c.lng),
                });
            }
        }
        if self.tags.len() > limits.max_tags {
            return Err(InvalidFilterError::TooManyTags {
                count: self.tags.len(),
                max: limits.max_tags,
            });
        }
        Ok(())
    }

    /// Edit the boundary form of this filter set and validate the result.
    pub fn revise(
        &self,
        edit: impl FnOnce(&mut FilterInput),
        policy: ValidationPolicy,
        limits: &FilterLimits,
    ) -> Result<Self, InvalidFilterError> {
        let mut input = self.to_input();
        edit(&mut input);
        Self::validate(input, policy, limits)
    }

    pub fn to_input(&self) -> FilterInput {
        FilterInput {
            mode: Some(self.mode.as_str().to_string()),
            latitude: self.center.map(|c| c.lat),
            longitude: self.center.map(|c| c.lng),
            radius: Some(self.radius_m as i64),
            tags: if self.tags.is_empty() {
                None
            } else {
                Some(TagsInput::List(
                    self.tags.iter().map(ToString::to_string).collect(),
                ))
            },
            address: self.address.clone(),
            cursor: self.cursor.map(|c| c.encode()),
        }
    }

    pub fn mode(&self) -> SearchMode {
        self.mode
    }

    pub fn center(&self) -> Option<LatLng> {
        self.center
    }

    pub fn radius_m(&self) -> u32 {
        self.radius_m
    }

    pub fn tags(&self) -> &[TagRef] {
        &self.tags
    }

    pub fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    pub fn cursor(&self) -> Option<&Cursor> {
        self.cursor.as_ref()
    }
}

fn normalize_tags(input: Option<&TagsInput>, max_tags: usize) -> Vec<TagRef> {
    let tokens: Vec<&str> = match input {
        None => Vec::new(),
        Some(TagsInput::Joined(s)) => s.split(',').collect(),
        Some(TagsInput::List(items)) => items.iter().map(String::as_str).collect(),
    };

    // Dedupe on the parsed form so "42" and "042" share one slot.
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for token in tokens {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        let tag = TagRef::parse(token);
        if seen.contains(&tag) {
            continue;
        }
        if out.len() == max_tags {
            break;
        }
        seen.insert(tag.clone());
        out.push(tag);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::{
        FilterInput, FilterLimits, SearchMode, SpatialFilterSet, TagRef, TagsInput,
        ValidationPolicy,
    };
    use crate::cursor::{Cursor, CursorKey};
    use crate::error::InvalidFilterError;
    use crate::place::{PlaceId, TagId};
    use foundation::LatLng;
    use pretty_assertions::assert_eq;

    fn lenient(input: FilterInput) -> SpatialFilterSet {
        SpatialFilterSet::validate(input, ValidationPolicy::CorrectSilently, &FilterLimits::default())
            .unwrap()
    }

    fn strict(input: FilterInput) -> Result<SpatialFilterSet, InvalidFilterError> {
        SpatialFilterSet::validate(input, ValidationPolicy::Throw, &FilterLimits::default())
    }

    #[test]
    fn defaults_for_empty_input() {
        let f = lenient(FilterInput::default());
        assert_eq!(f.mode(), SearchMode::Proximity);
        assert_eq!(f.radius_m(), 10_000);
        assert!(f.center().is_none());
        assert!(f.tags().is_empty());
        assert!(f.cursor().is_none());
    }

    #[test]
    fn radius_out_of_range_is_corrected_or_rejected() {
        let f = lenient(FilterInput::proximity(48.0, 2.0, 5));
        assert_eq!(f.radius_m(), 10_000);

        let f = lenient(FilterInput::proximity(48.0, 2.0, 900_000));
        assert_eq!(f.radius_m(), 10_000);

        assert_eq!(
            strict(FilterInput::proximity(48.0, 2.0, -1)),
            Err(InvalidFilterError::RadiusOutOfRange {
                radius_m: -1,
                min_m: 100,
                max_m: 500_000
            })
        );

        let f = strict(FilterInput::proximity(48.0, 2.0, 200_000)).unwrap();
        assert_eq!(f.radius_m(), 200_000);
    }

    #[test]
    fn unknown_mode_defaults_to_proximity_or_throws() {
        let input = FilterInput {
            mode: Some("galaxy".into()),
            ..FilterInput::default()
        };
        assert_eq!(lenient(input.clone()).mode(), SearchMode::Proximity);
        assert_eq!(
            strict(input),
            Err(InvalidFilterError::UnknownMode("galaxy".into()))
        );

        let input = FilterInput {
            mode: Some(" WorldWide ".into()),
            ..FilterInput::default()
        };
        assert_eq!(lenient(input).mode(), SearchMode::Worldwide);
    }

    #[test]
    fn invalid_coordinates_clear_both() {
        let f = lenient(FilterInput::proximity(95.0, 2.0, 1_000));
        assert_eq!(f.center(), None);

        let f = lenient(FilterInput::proximity(45.0, 200.0, 1_000));
        assert_eq!(f.center(), None);

        assert!(matches!(
            strict(FilterInput::proximity(45.0, 200.0, 1_000)),
            Err(InvalidFilterError::InvalidCoordinates { .. })
        ));
    }

    #[test]
    fn half_a_coordinate_pair_is_cleared() {
        let input = FilterInput {
            latitude: Some(48.0),
            ..FilterInput::default()
        };
        assert_eq!(lenient(input.clone()).center(), None);
        assert!(strict(input).is_err());
    }

    #[test]
    fn tags_are_split_trimmed_deduped_and_capped() {
        let f = lenient(FilterInput::worldwide(" nasa, ,museum,nasa,42 ,, museum"));
        assert_eq!(
            f.tags(),
            &[
                TagRef::Slug("nasa".into()),
                TagRef::Slug("museum".into()),
                TagRef::Id(TagId(42)),
            ]
        );

        let many: Vec<String> = (0..15).map(|i| format!("t{i}")).collect();
        let f = lenient(FilterInput {
            tags: Some(TagsInput::Joined(many.join(","))),
            ..FilterInput::default()
        });
        assert_eq!(f.tags().len(), 10);
        assert_eq!(f.tags()[9], TagRef::Slug("t9".into()));
    }

    #[test]
    fn tag_list_input_is_trimmed_too() {
        let f = lenient(FilterInput {
            tags: Some(TagsInput::List(vec![" a ".into(), "a".into(), "".into(), "7".into()])),
            ..FilterInput::default()
        });
        assert_eq!(f.tags(), &[TagRef::Slug("a".into()), TagRef::Id(TagId(7))]);
    }

    #[test]
    fn oversized_numeric_token_is_a_slug() {
        assert_eq!(
            TagRef::parse("99999999999999999999999"),
            TagRef::Slug("99999999999999999999999".into())
        );
    }

    #[test]
    fn blank_address_is_dropped() {
        let f = lenient(FilterInput {
            address: Some("   ".into()),
            ..FilterInput::default()
        });
        assert_eq!(f.address(), None);

        let f = lenient(FilterInput {
            address: Some(" 5 Av. Anatole France ".into()),
            ..FilterInput::default()
        });
        assert_eq!(f.address(), Some("5 Av. Anatole France"));
    }

    #[test]
    fn malformed_cursor_dropped_or_rejected() {
        let input = FilterInput {
            cursor: Some("%%%".into()),
            ..FilterInput::default()
        };
        assert!(lenient(input.clone()).cursor().is_none());
        assert!(matches!(strict(input), Err(InvalidFilterError::MalformedCursor(_))));

        let token = Cursor::new(CursorKey::Worldwide {
            created_at_ms: 5,
            id: PlaceId(3),
        })
        .encode();
        let f = lenient(FilterInput {
            cursor: Some(token),
            ..FilterInput::default()
        });
        assert!(f.cursor().is_some());
    }

    #[test]
    fn revise_validates_again() {
        let f = lenient(FilterInput::proximity(48.8566, 2.3522, 1_000));
        let g = f
            .revise(
                |i| i.radius = Some(50_000),
                ValidationPolicy::Throw,
                &FilterLimits::default(),
            )
            .unwrap();
        assert_eq!(g.radius_m(), 50_000);
        assert_eq!(g.center(), Some(LatLng::new(48.8566, 2.3522)));
        // Original untouched.
        assert_eq!(f.radius_m(), 1_000);

        let err = f.revise(
            |i| i.radius = Some(0),
            ValidationPolicy::Throw,
            &FilterLimits::default(),
        );
        assert!(err.is_err());
    }

    #[test]
    fn to_input_round_trips_through_validation() {
        let f = lenient(FilterInput::proximity(10.0, 20.0, 2_000).with_tags("a,5"));
        let again = lenient(f.to_input());
        assert_eq!(again, f);
    }

    #[test]
    fn check_enforces_caller_limits() {
        let f = lenient(FilterInput::proximity(10.0, 20.0, 200_000));
        let tight = FilterLimits {
            max_radius_m: 50_000,
            ..FilterLimits::default()
        };
        assert!(f.check(&FilterLimits::default()).is_ok());
        assert!(matches!(
            f.check(&tight),
            Err(InvalidFilterError::RadiusOutOfRange { .. })
        ));
    }

    #[test]
    fn check_enforces_tag_cap() {
        let loose = FilterLimits {
            max_tags: 50,
            ..FilterLimits::default()
        };
        let many: Vec<String> = (0..20).map(|i| format!("t{i}")).collect();
        let f = SpatialFilterSet::validate(
            FilterInput::worldwide(&many.join(",")),
            ValidationPolicy::Throw,
            &loose,
        )
        .unwrap();
        assert_eq!(f.tags().len(), 20);
        assert!(f.check(&loose).is_ok());

        let tight = FilterLimits {
            max_tags: 3,
            ..FilterLimits::default()
        };
        assert_eq!(
            f.check(&tight),
            Err(InvalidFilterError::TooManyTags { count: 20, max: 3 })
        );
    }

    #[test]
    fn equivalent_numeric_tags_share_a_slot() {
        let f = lenient(FilterInput::worldwide("42,042,0042,nasa"));
        assert_eq!(
            f.tags(),
            &[TagRef::Id(TagId(42)), TagRef::Slug("nasa".into())]
        );

        let limits = FilterLimits {
            max_tags: 2,
            ..FilterLimits::default()
        };
        let f = SpatialFilterSet::validate(
            FilterInput::worldwide("7,07,a,b"),
            ValidationPolicy::CorrectSilently,
            &limits,
        )
        .unwrap();
        assert_eq!(f.tags(), &[TagRef::Id(TagId(7)), TagRef::Slug("a".into())]);
    }

    #[test]
    fn tags_deserialize_from_string_or_list() {
        let joined: FilterInput = serde_json::from_str(r#"{"tags":"a,b"}"#).unwrap();
        assert_eq!(joined.tags, Some(TagsInput::Joined("a,b".into())));
        let list: FilterInput = serde_json::from_str(r#"{"tags":["a","b"]}"#).unwrap();
        assert_eq!(list.tags, Some(TagsInput::List(vec!["a".into(), "b".into()])));
    }
}

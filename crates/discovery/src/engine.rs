use std::collections::BTreeSet;
use std::sync::Arc;

use foundation::{BoundingBox, StableF64};
use tracing::debug;

use crate::cursor::CursorKey;
use crate::error::Result;
use crate::filters::{SearchMode, SpatialFilterSet};
use crate::place::{Place, TagId};
use crate::store::PlaceStore;

/// One ranked result.
#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    pub place: Place,
    /// Set for proximity results only.
    pub distance_m: Option<f64>,
}

impl Hit {
    /// Ordering key of this hit, usable as a resume point.
    pub fn key(&self) -> CursorKey {
        match self.distance_m {
            Some(distance_m) => CursorKey::Proximity {
                distance_m,
                id: self.place.id,
            },
            None => CursorKey::Worldwide {
                created_at_ms: self.place.created_at_ms,
                id: self.place.id,
            },
        }
    }
}

/// Builds and runs the two supported query shapes.
///
/// Ordering contract:
/// - proximity: ascending distance, ties by ascending id
/// - worldwide: descending creation time, ties by ascending id
///
/// Bounding-box clipping applies identically to both and only ever removes
/// results.
#[derive(Clone)]
pub struct PlaceQueryEngine {
    store: Arc<dyn PlaceStore>,
}

fn bbox_allows(place: &Place, bbox: Option<&BoundingBox>) -> bool {
    let Some(bbox) = bbox else {
        return true;
    };
    bbox.contains(place.position)
}

fn tags_allow(place: &Place, tags: Option<&BTreeSet<TagId>>) -> bool {
    let Some(tags) = tags else {
        // No tag filter requested.
        return true;
    };
    place.has_any_tag(tags)
}

impl PlaceQueryEngine {
    pub fn new(store: Arc<dyn PlaceStore>) -> Self {
        Self { store }
    }

    pub fn execute(
        &self,
        filters: &SpatialFilterSet,
        bbox: Option<&BoundingBox>,
    ) -> Result<Vec<Hit>> {
        let hits = match filters.mode() {
            SearchMode::Proximity => self.proximity(filters, bbox)?,
            SearchMode::Worldwide => self.worldwide(filters, bbox)?,
        };
        debug!(
            mode = %filters.mode(),
            clipped = bbox.is_some(),
            hits = hits.len(),
            "place query executed"
        );
        Ok(hits)
    }

    fn proximity(
        &self,
        filters: &SpatialFilterSet,
        bbox: Option<&BoundingBox>,
    ) -> Result<Vec<Hit>> {
        let Some(center) = filters.center() else {
            // No search point yet.
            return Ok(Vec::new());
        };
        let radius_m = filters.radius_m() as f64;

        let tag_ids = if filters.tags().is_empty() {
            None
        } else {
            Some(self.store.resolve_tags(filters.tags())?)
        };

        let candidates = self.store.within_radius(center, radius_m)?;
        let total = candidates.len();

        let mut hits: Vec<Hit> = candidates
            .into_iter()
            .filter(|(place, d)| {
                *d <= radius_m && tags_allow(place, tag_ids.as_ref()) && bbox_allows(place, bbox)
            })
            .map(|(place, d)| Hit {
                place,
                distance_m: Some(d),
            })
            .collect();

        hits.sort_by(|a, b| {
            StableF64(a.distance_m.unwrap_or(f64::INFINITY))
                .cmp(&StableF64(b.distance_m.unwrap_or(f64::INFINITY)))
                .then_with(|| a.place.id.cmp(&b.place.id))
        });

        debug!(candidates = total, radius_m, "proximity candidates filtered");
        Ok(hits)
    }

    fn worldwide(
        &self,
        filters: &SpatialFilterSet,
        bbox: Option<&BoundingBox>,
    ) -> Result<Vec<Hit>> {
        if filters.tags().is_empty() {
            // Worldwide never means "everything".
            return Ok(Vec::new());
        }

        let tag_ids = self.store.resolve_tags(filters.tags())?;
        if tag_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut hits: Vec<Hit> = self
            .store
            .tagged(&tag_ids)?
            .into_iter()
            .filter(|place| place.has_any_tag(&tag_ids) && bbox_allows(place, bbox))
            .map(|place| Hit {
                place,
                distance_m: None,
            })
            .collect();

        hits.sort_by(|a, b| {
            b.place
                .created_at_ms
                .cmp(&a.place.created_at_ms)
                .then_with(|| a.place.id.cmp(&b.place.id))
        });

        Ok(hits)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::PlaceQueryEngine;
    use crate::error::{DiscoveryError, StoreError};
    use crate::filters::{FilterInput, FilterLimits, SpatialFilterSet, TagRef, ValidationPolicy};
    use crate::place::{Place, PlaceId, Tag, TagId};
    use crate::store::{InMemoryPlaceStore, PlaceStore};
    use foundation::{BoundingBox, LatLng, haversine_m};
    use std::collections::BTreeSet;
    use std::sync::Arc;

    const DAY_MS: i64 = 86_400_000;

    pub(crate) fn place(id: u64, lat: f64, lng: f64, created_at_ms: i64, tags: &[&str]) -> Place {
        Place {
            id: PlaceId(id),
            position: LatLng::new(lat, lng),
            titles: [("en".to_string(), format!("place {id}"))].into(),
            tags: tags
                .iter()
                .map(|slug| Tag {
                    id: TagId(slug.bytes().map(u64::from).sum()),
                    slug: slug.to_string(),
                })
                .collect(),
            thumbnail: None,
            created_at_ms,
        }
    }

    pub(crate) fn filters(input: FilterInput) -> SpatialFilterSet {
        SpatialFilterSet::validate(input, ValidationPolicy::Throw, &FilterLimits::default())
            .unwrap()
    }

    fn engine(places: Vec<Place>) -> PlaceQueryEngine {
        PlaceQueryEngine::new(Arc::new(InMemoryPlaceStore::from_places(places)))
    }

    fn ids(hits: &[super::Hit]) -> Vec<u64> {
        hits.iter().map(|h| h.place.id.0).collect()
    }

    fn scattered() -> Vec<Place> {
        vec![
            place(1, 48.8566, 2.3522, 0, &["museum"]),
            place(2, 48.8606, 2.3376, 0, &["museum", "art"]),
            place(3, 48.8049, 2.1204, 0, &["castle"]),
            place(4, 45.7640, 4.8357, 0, &["museum"]),
            place(5, 40.7128, -74.0060, 0, &["nasa"]),
            place(6, 49.2000, 2.6000, 0, &[]),
        ]
    }

    #[test]
    fn paris_radius_includes_center_excludes_lyon() {
        let e = engine(vec![
            place(1, 48.8566, 2.3522, 0, &[]),
            place(2, 45.7640, 4.8357, 0, &[]),
        ]);
        let hits = e
            .execute(&filters(FilterInput::proximity(48.8566, 2.3522, 200_000)), None)
            .unwrap();
        assert_eq!(ids(&hits), vec![1]);
        assert_eq!(hits[0].distance_m, Some(0.0));
    }

    #[test]
    fn proximity_results_are_within_radius_and_sorted() {
        let center = LatLng::new(48.8566, 2.3522);
        let e = engine(scattered());
        let hits = e
            .execute(&filters(FilterInput::proximity(center.lat, center.lng, 60_000)), None)
            .unwrap();
        assert!(!hits.is_empty());
        for h in &hits {
            let d = haversine_m(center, h.place.position);
            assert!(d <= 60_000.0);
            assert_eq!(h.distance_m, Some(d));
        }
        for w in hits.windows(2) {
            assert!(w[0].distance_m <= w[1].distance_m);
        }
        assert_eq!(ids(&hits), vec![1, 2, 3, 6]);
    }

    #[test]
    fn equal_distances_break_ties_by_id() {
        let e = engine(vec![
            place(9, 10.0, 10.0, 0, &[]),
            place(3, 10.0, 10.0, 0, &[]),
            place(5, 10.0, 10.0, 0, &[]),
        ]);
        let hits = e
            .execute(&filters(FilterInput::proximity(10.0, 10.0, 1_000)), None)
            .unwrap();
        assert_eq!(ids(&hits), vec![3, 5, 9]);
    }

    #[test]
    fn proximity_tags_are_or_across_list_and_with_radius() {
        let e = engine(scattered());
        let f = filters(FilterInput::proximity(48.8566, 2.3522, 60_000).with_tags("castle,art"));
        assert_eq!(ids(&e.execute(&f, None).unwrap()), vec![2, 3]);

        // Lyon is a museum but out of range.
        let f = filters(FilterInput::proximity(48.8566, 2.3522, 60_000).with_tags("museum"));
        assert_eq!(ids(&e.execute(&f, None).unwrap()), vec![1, 2]);
    }

    #[test]
    fn unresolvable_tags_match_nothing() {
        let e = engine(scattered());
        let f = filters(FilterInput::proximity(48.8566, 2.3522, 60_000).with_tags("zzz"));
        assert!(e.execute(&f, None).unwrap().is_empty());
    }

    #[test]
    fn proximity_without_coordinates_is_empty() {
        let e = engine(scattered());
        let f = filters(FilterInput::default());
        assert!(e.execute(&f, None).unwrap().is_empty());
    }

    #[test]
    fn worldwide_without_tags_is_always_empty() {
        let e = engine(scattered());
        let f = filters(FilterInput {
            mode: Some("worldwide".into()),
            ..FilterInput::default()
        });
        assert!(e.execute(&f, None).unwrap().is_empty());
        assert!(e.execute(&f, Some(&BoundingBox::world())).unwrap().is_empty());
    }

    #[test]
    fn worldwide_orders_newest_first() {
        let now = 1_700_000_000_000;
        let e = engine(vec![
            place(1, 28.5729, -80.6490, now - DAY_MS, &["nasa"]),
            place(2, 29.5593, -95.0900, now, &["nasa"]),
            place(3, 0.0, 0.0, now + DAY_MS, &["other"]),
        ]);
        let hits = e.execute(&filters(FilterInput::worldwide("nasa")), None).unwrap();
        assert_eq!(ids(&hits), vec![2, 1]);
        assert!(hits.iter().all(|h| h.distance_m.is_none()));
    }

    #[test]
    fn worldwide_accepts_ids_and_slugs() {
        let e = engine(scattered());
        let nasa_id: u64 = "nasa".bytes().map(u64::from).sum();
        let f = filters(FilterInput::worldwide(&format!("{nasa_id},castle")));
        assert_eq!(ids(&e.execute(&f, None).unwrap()), vec![3, 5]);
    }

    #[test]
    fn bbox_clips_paris_and_drops_new_york() {
        let e = engine(vec![
            place(1, 48.8566, 2.3522, 0, &["x"]),
            place(2, 40.7128, -74.0060, 0, &["x"]),
        ]);
        let bbox = BoundingBox::new(49.0, 48.5, 2.5, 2.0);
        let hits = e.execute(&filters(FilterInput::worldwide("x")), Some(&bbox)).unwrap();
        assert_eq!(ids(&hits), vec![1]);
    }

    #[test]
    fn bbox_only_narrows() {
        let e = engine(scattered());
        let bbox = BoundingBox::new(48.9, 48.83, 2.4, 2.3);
        let cases = [
            filters(FilterInput::proximity(48.8566, 2.3522, 500_000)),
            filters(FilterInput::proximity(48.8566, 2.3522, 60_000).with_tags("museum")),
            filters(FilterInput::worldwide("museum,nasa,castle")),
        ];
        for f in cases {
            let all: BTreeSet<u64> = ids(&e.execute(&f, None).unwrap()).into_iter().collect();
            let clipped: BTreeSet<u64> =
                ids(&e.execute(&f, Some(&bbox)).unwrap()).into_iter().collect();
            assert!(clipped.is_subset(&all), "{clipped:?} not within {all:?}");
        }
    }

    struct DownStore;

    impl PlaceStore for DownStore {
        fn resolve_tags(&self, _refs: &[TagRef]) -> Result<BTreeSet<TagId>, StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
        fn within_radius(
            &self,
            _center: LatLng,
            _radius_m: f64,
        ) -> Result<Vec<(Place, f64)>, StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
        fn tagged(&self, _tags: &BTreeSet<TagId>) -> Result<Vec<Place>, StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
    }

    #[test]
    fn store_failure_is_upstream_error() {
        let e = PlaceQueryEngine::new(Arc::new(DownStore));
        let err = e
            .execute(&filters(FilterInput::proximity(1.0, 1.0, 1_000)), None)
            .unwrap_err();
        assert!(matches!(err, DiscoveryError::Upstream(StoreError::Unavailable(_))));
    }

    #[test]
    fn empty_conditions_do_not_touch_the_store() {
        let e = PlaceQueryEngine::new(Arc::new(DownStore));
        assert!(e.execute(&filters(FilterInput::default()), None).unwrap().is_empty());
        let worldwide = filters(FilterInput {
            mode: Some("worldwide".into()),
            ..FilterInput::default()
        });
        assert!(e.execute(&worldwide, None).unwrap().is_empty());
    }
}

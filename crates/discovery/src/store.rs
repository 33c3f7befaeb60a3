use std::collections::{BTreeMap, BTreeSet};

use foundation::{LatLng, haversine_m};

use crate::error::StoreError;
use crate::filters::TagRef;
use crate::place::{Place, PlaceId, TagId};

/// The persistence layer as the discovery core needs it.
///
/// Implementations answer from a committed snapshot; the core holds no state
/// between calls and may query concurrently.
pub trait PlaceStore: Send + Sync {
    /// Map identifiers and slugs to canonical tag ids. Unknown refs resolve to nothing.
    fn resolve_tags(&self, refs: &[TagRef]) -> Result<BTreeSet<TagId>, StoreError>;

    /// Places within `radius_m` of `center`, with their distance in meters.
    ///
    /// Ordering is unspecified; the engine ranks.
    fn within_radius(&self, center: LatLng, radius_m: f64)
    -> Result<Vec<(Place, f64)>, StoreError>;

    /// Places carrying at least one of `tags`.
    fn tagged(&self, tags: &BTreeSet<TagId>) -> Result<Vec<Place>, StoreError>;
}

/// Reference store backed by a sorted map. Distance is a linear haversine scan.
#[derive(Debug, Default, Clone)]
pub struct InMemoryPlaceStore {
    places: BTreeMap<PlaceId, Place>,
    slugs: BTreeMap<String, TagId>,
}

impl InMemoryPlaceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_places(places: impl IntoIterator<Item = Place>) -> Self {
        let mut store = Self::new();
        for p in places {
            store.upsert(p);
        }
        store
    }

    pub fn upsert(&mut self, place: Place) {
        for tag in &place.tags {
            self.slugs.insert(tag.slug.clone(), tag.id);
        }
        self.places.insert(place.id, place);
    }

    pub fn remove(&mut self, id: PlaceId) -> Option<Place> {
        self.places.remove(&id)
    }

    pub fn len(&self) -> usize {
        self.places.len()
    }

    pub fn is_empty(&self) -> bool {
        self.places.is_empty()
    }
}

impl PlaceStore for InMemoryPlaceStore {
    fn resolve_tags(&self, refs: &[TagRef]) -> Result<BTreeSet<TagId>, StoreError> {
        let known_ids: BTreeSet<TagId> = self.slugs.values().copied().collect();
        Ok(refs
            .iter()
            .filter_map(|r| match r {
                TagRef::Id(id) => known_ids.contains(id).then_some(*id),
                TagRef::Slug(slug) => self.slugs.get(slug).copied(),
            })
            .collect())
    }

    fn within_radius(
        &self,
        center: LatLng,
        radius_m: f64,
    ) -> Result<Vec<(Place, f64)>, StoreError> {
        Ok(self
            .places
            .values()
            .filter_map(|p| {
                let d = haversine_m(center, p.position);
                (d <= radius_m).then(|| (p.clone(), d))
            })
            .collect())
    }

    fn tagged(&self, tags: &BTreeSet<TagId>) -> Result<Vec<Place>, StoreError> {
        Ok(self
            .places
            .values()
            .filter(|p| p.has_any_tag(tags))
            .cloned()
            .collect())
    }
}

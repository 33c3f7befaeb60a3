use std::cmp::Ordering;
use std::sync::Arc;

use foundation::BoundingBox;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::cursor::{Cursor, CursorKey};
use crate::engine::{Hit, PlaceQueryEngine};
use crate::error::{InvalidFilterError, Result};
use crate::filters::{FilterLimits, SpatialFilterSet};
use crate::place::PlaceId;
use crate::store::PlaceStore;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub limits: FilterLimits,
    pub default_page_size: usize,
    pub max_page_size: usize,
    /// Hard cap on marker results.
    pub max_map_points: usize,
    pub default_locale: String,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            limits: FilterLimits::default(),
            default_page_size: 20,
            max_page_size: 100,
            max_map_points: 500,
            default_locale: "en".to_string(),
        }
    }
}

/// Paging arguments for [`DiscoveryService::list_page`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageRequest {
    /// Clamped to `[1, max_page_size]`; `None` uses the configured default.
    pub size: Option<usize>,
    /// Overrides the cursor carried by the filter set.
    pub cursor: Option<Cursor>,
    /// Falls back to the configured default locale.
    pub locale: Option<String>,
}

impl PageRequest {
    pub fn new(size: usize) -> Self {
        Self {
            size: Some(size),
            ..Self::default()
        }
    }

    pub fn after(mut self, token: &str) -> std::result::Result<Self, InvalidFilterError> {
        self.cursor = Some(Cursor::decode(token)?);
        Ok(self)
    }

    pub fn in_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }
}

/// Display row for the result list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceRow {
    pub id: PlaceId,
    pub latitude: f64,
    pub longitude: f64,
    pub title: String,
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_m: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListPage {
    pub items: Vec<PlaceRow>,
    pub next_cursor: Option<String>,
    pub has_more: bool,
}

/// Marker payload: coordinates only.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapPoint {
    pub id: PlaceId,
    pub latitude: f64,
    pub longitude: f64,
}

/// Stateless entry point for list and map data.
///
/// Each call runs one engine query, so it observes one store snapshot.
#[derive(Clone)]
pub struct DiscoveryService {
    engine: PlaceQueryEngine,
    config: Arc<DiscoveryConfig>,
}

impl DiscoveryService {
    pub fn new(store: Arc<dyn PlaceStore>, config: DiscoveryConfig) -> Self {
        Self {
            engine: PlaceQueryEngine::new(store),
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    pub fn engine(&self) -> &PlaceQueryEngine {
        &self.engine
    }

    pub fn list_page(
        &self,
        filters: &SpatialFilterSet,
        bbox: Option<&BoundingBox>,
        page: PageRequest,
    ) -> Result<ListPage> {
        filters.check(&self.config.limits)?;

        let size = page
            .size
            .unwrap_or(self.config.default_page_size)
            .clamp(1, self.config.max_page_size.max(1));
        let resume = page.cursor.as_ref().or(filters.cursor()).map(|c| *c.key());
        if let Some(key) = resume {
            if key.mode() != filters.mode() {
                return Err(InvalidFilterError::MalformedCursor(format!(
                    "cursor belongs to a {} search, not {}",
                    key.mode(),
                    filters.mode()
                ))
                .into());
            }
        }

        let hits = self.engine.execute(filters, bbox)?;
        let mut remaining = hits
            .into_iter()
            .filter(|h| resume.is_none_or(|key| is_after(h, &key)));
        let rows: Vec<Hit> = remaining.by_ref().take(size).collect();
        let has_more = remaining.next().is_some();
        let next_cursor = if has_more {
            rows.last().map(|h| Cursor::new(h.key()).encode())
        } else {
            None
        };

        let locale = page
            .locale
            .as_deref()
            .unwrap_or(&self.config.default_locale);
        let items: Vec<PlaceRow> = rows.iter().map(|h| self.row(h, locale)).collect();

        debug!(
            mode = %filters.mode(),
            resumed = resume.is_some(),
            items = items.len(),
            has_more,
            "list page served"
        );

        Ok(ListPage {
            items,
            next_cursor,
            has_more,
        })
    }

    pub fn map_points(
        &self,
        filters: &SpatialFilterSet,
        bbox: Option<&BoundingBox>,
    ) -> Result<Vec<MapPoint>> {
        filters.check(&self.config.limits)?;

        let hits = self.engine.execute(filters, bbox)?;
        if hits.len() > self.config.max_map_points {
            info!(
                total = hits.len(),
                cap = self.config.max_map_points,
                "map points truncated"
            );
        }

        Ok(hits
            .into_iter()
            .take(self.config.max_map_points)
            .map(|h| MapPoint {
                id: h.place.id,
                latitude: h.place.position.lat,
                longitude: h.place.position.lng,
            })
            .collect())
    }

    fn row(&self, hit: &Hit, locale: &str) -> PlaceRow {
        let place = &hit.place;
        PlaceRow {
            id: place.id,
            latitude: place.position.lat,
            longitude: place.position.lng,
            title: place
                .title_for(locale, &self.config.default_locale)
                .to_string(),
            tags: place.tags.iter().map(|t| t.slug.clone()).collect(),
            thumbnail: place.thumbnail.clone(),
            distance_m: hit.distance_m,
        }
    }
}

fn is_after(hit: &Hit, key: &CursorKey) -> bool {
    hit.key().cmp_in_order(key) == Some(Ordering::Greater)
}

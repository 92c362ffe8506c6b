//! Tile footprints as GeoJSON.
//!
//! Enable the `geojson` feature to use this module. Footprints are in the
//! grid's projection coordinates, not longitude/latitude.
//!
//! # Example
//!
//! ```ignore
//! use tilegrid::{footprint::footprints, Tiler};
//!
//! let plan = tiler.plan(&area)?;
//! let collection = footprints(&plan);
//! std::fs::write("tiles.geojson", collection.to_string())?;
//! ```

use geojson::{Feature, FeatureCollection, Geometry, JsonObject, JsonValue, Value as GeoJsonValue};

use crate::area::Extent;
use crate::mapper::{CandidateTile, TilePlan};

/// Closed polygon ring around an extent, counter-clockwise from the lower-left corner.
fn extent_ring(extent: &Extent) -> Vec<Vec<f64>> {
    vec![
        vec![extent.xmin, extent.ymin],
        vec![extent.xmax, extent.ymin],
        vec![extent.xmax, extent.ymax],
        vec![extent.xmin, extent.ymax],
        vec![extent.xmin, extent.ymin],
    ]
}

/// Footprint of one candidate tile.
///
/// Properties: `index`, `tile_row`, `tile_column`, `letter` (null for
/// numbered grids) and `overlaps`.
pub fn footprint(candidate: &CandidateTile) -> Feature {
    let mut properties = JsonObject::new();
    properties.insert("index".to_string(), JsonValue::from(candidate.index));
    properties.insert("tile_row".to_string(), JsonValue::from(candidate.grid_row));
    properties.insert("tile_column".to_string(), JsonValue::from(candidate.grid_col));
    properties.insert(
        "letter".to_string(),
        candidate
            .letter
            .as_ref()
            .map(|slot| JsonValue::from(slot.code.clone()))
            .unwrap_or(JsonValue::Null),
    );
    properties.insert("overlaps".to_string(), JsonValue::from(candidate.overlaps()));

    let bounds = &candidate.bounds;
    Feature {
        bbox: Some(vec![bounds.xmin, bounds.ymin, bounds.xmax, bounds.ymax]),
        geometry: Some(Geometry::new(GeoJsonValue::Polygon(vec![extent_ring(bounds)]))),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}

/// Footprints of every candidate tile in a plan, in row-major order.
pub fn footprints(plan: &TilePlan) -> FeatureCollection {
    FeatureCollection {
        bbox: None,
        features: plan.candidates.iter().map(footprint).collect(),
        foreign_members: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::area::AreaDefinition;
    use crate::grid::{LetteredGridSpec, ReferenceArea, TileGridSpec};
    use crate::mapper::plan_tiles;

    #[test]
    fn test_numbered_footprints() {
        let area = AreaDefinition::new("a", "p", 4, 4, Extent::new(0.0, 0.0, 4.0, 4.0)).unwrap();
        let plan = plan_tiles(&TileGridSpec::numbered(2, 2), &area).unwrap();
        let collection = footprints(&plan);

        assert_eq!(collection.features.len(), 4);
        let first = &collection.features[0];
        assert_eq!(first.bbox, Some(vec![0.0, 2.0, 2.0, 4.0]));

        let props = first.properties.as_ref().unwrap();
        assert_eq!(props["tile_row"], 0);
        assert_eq!(props["letter"], JsonValue::Null);
        assert_eq!(props["overlaps"], true);

        match &first.geometry.as_ref().unwrap().value {
            GeoJsonValue::Polygon(rings) => {
                assert_eq!(rings[0].len(), 5);
                assert_eq!(rings[0][0], rings[0][4]);
            }
            other => panic!("Expected Polygon, got {:?}", other),
        }
    }

    #[test]
    fn test_lettered_footprints() {
        let sector = AreaDefinition::new("s", "p", 8, 8, Extent::new(0.0, 0.0, 8.0, 8.0)).unwrap();
        let source = AreaDefinition::new("src", "p", 4, 4, Extent::new(4.0, 0.0, 8.0, 4.0)).unwrap();
        let spec = LetteredGridSpec::new(2, 2, ReferenceArea::Sector(sector)).subtiles(1, 1);
        let plan = plan_tiles(&TileGridSpec::lettered(spec), &source).unwrap();
        let collection = footprints(&plan);

        let letters: Vec<&JsonValue> = collection
            .features
            .iter()
            .map(|f| &f.properties.as_ref().unwrap()["letter"])
            .collect();
        assert_eq!(letters, vec!["A", "B", "C", "D"]);

        let overlapping: Vec<bool> = collection
            .features
            .iter()
            .map(|f| f.properties.as_ref().unwrap()["overlaps"] == true)
            .collect();
        assert_eq!(overlapping, vec![false, false, false, true]);

        let json = collection.to_string();
        assert!(json.contains("FeatureCollection"));
    }
}

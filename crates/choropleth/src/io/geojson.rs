use std::path::Path;

use geo_types::Polygon;
use geojson::{FeatureCollection, Geometry, JsonObject, Value};
use serde_json::json;

use crate::{
    error::{ChoroplethError, Result},
    georef::BoundingBox,
    typed_geojson::{CategoryProperties, ChoroplethGeoJson, TypedFeature, TypedFeatureCollection, TypedGeoJson},
    types::{CategoryFeature, ChoroplethMap},
};

/// Name of the WGS-84 longitude/latitude CRS as GIS tools expect it.
pub const CRS84: &str = "urn:ogc:def:crs:OGC:1.3:CRS84";

fn collection_members(map: &ChoroplethMap) -> JsonObject {
    let mut foreign_members = JsonObject::new();
    foreign_members.insert(
        "crs".to_string(),
        json!({ "type": "name", "properties": { "name": CRS84 } }),
    );
    foreign_members.insert("image_width".to_string(), json!(map.image_width));
    foreign_members.insert("image_height".to_string(), json!(map.image_height));
    foreign_members.insert("feature_count".to_string(), json!(map.features.len()));
    foreign_members
}

fn missing(field: &str) -> ChoroplethError {
    ChoroplethError::InvalidGeoJson(format!("missing or invalid {field}"))
}

impl ChoroplethMap {
    /// Export to typed GeoJSON format
    pub fn to_typed_geojson(&self) -> ChoroplethGeoJson {
        let features = self
            .features
            .iter()
            .map(|feature| {
                let properties = CategoryProperties {
                    category: feature.category.clone(),
                    color: feature.color.clone(),
                    rank: feature.rank,
                    area: feature.area(),
                };
                TypedFeature::new(Some(Geometry::new(Value::from(&feature.polygon))), properties)
            })
            .collect();

        TypedGeoJson::FeatureCollection(TypedFeatureCollection {
            bbox: Some(self.bounding_box.to_geojson_bbox()),
            features,
            foreign_members: Some(collection_members(self)),
        })
    }

    pub fn to_geojson(&self) -> FeatureCollection {
        match self.to_typed_geojson().into_feature_collection() {
            Some(collection) => collection.into_feature_collection(),
            None => FeatureCollection {
                bbox: None,
                features: Vec::new(),
                foreign_members: None,
            },
        }
    }

    /// Export to GeoJSON and serialize to JSON string
    pub fn to_geojson_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.to_geojson())?)
    }

    pub fn save_geojson<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, self.to_geojson_string()?)?;
        Ok(())
    }

    pub fn from_geojson_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let geojson_str = std::fs::read_to_string(path)?;
        Self::from_geojson_string(&geojson_str)
    }

    /// Load a map written by [`ChoroplethMap::save_geojson`].
    pub fn from_geojson_string(geojson_str: &str) -> Result<Self> {
        let collection: FeatureCollection = geojson_str.parse()?;

        let bounding_box = match collection.bbox.as_deref() {
            Some(&[west, south, east, north]) => BoundingBox::new(west, east, south, north)?,
            _ => return Err(missing("bbox")),
        };

        let foreign_members = collection.foreign_members.as_ref().ok_or_else(|| missing("metadata"))?;
        let dimension = |field: &str| {
            foreign_members
                .get(field)
                .and_then(|v| v.as_u64())
                .and_then(|v| u32::try_from(v).ok())
                .ok_or_else(|| missing(field))
        };
        let image_width = dimension("image_width")?;
        let image_height = dimension("image_height")?;

        let typed = TypedFeatureCollection::<CategoryProperties>::from_feature_collection(collection);
        let mut features = Vec::with_capacity(typed.len());
        for feature in typed.features() {
            let properties = feature.properties().ok_or_else(|| missing("feature properties"))?;
            let Some(geometry) = feature.feature.geometry.clone() else {
                continue;
            };
            let polygon = Polygon::<f64>::try_from(geometry.value)?;

            features.push(CategoryFeature {
                rank: properties.rank,
                category: properties.category,
                color: properties.color,
                polygon,
            });
        }

        Ok(ChoroplethMap {
            features,
            bounding_box,
            image_width,
            image_height,
        })
    }
}

impl ChoroplethGeoJson {
    /// Read a written map as its typed view
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let collection: FeatureCollection = std::fs::read_to_string(path)?.parse()?;
        Ok(TypedGeoJson::FeatureCollection(TypedFeatureCollection::from_feature_collection(
            collection,
        )))
    }
}

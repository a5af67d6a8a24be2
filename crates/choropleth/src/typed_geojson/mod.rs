use std::collections::BTreeMap;
use std::marker::PhantomData;

use geojson::{Feature, FeatureCollection, Geometry, JsonObject};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Properties carried by every feature of a choropleth output file
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, JsonSchema)]
#[schemars(description = "Properties for broadband speed category features")]
pub struct CategoryProperties {
    #[schemars(description = "Legend label of the speed category")]
    pub category: String,
    #[schemars(description = "Display color as #rrggbb")]
    pub color: String,
    #[schemars(description = "Position of the category in the legend, slowest first")]
    pub rank: usize,
    #[schemars(description = "Planar area of the polygon in square degrees")]
    pub area: f64,
}

/// Typed view of a written choropleth map
pub type ChoroplethGeoJson = TypedGeoJson<CategoryProperties>;

/// A typed GeoJSON Feature that is generic over its properties.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct TypedFeature<P> {
    #[serde(flatten)]
    pub feature: Feature,
    #[serde(skip)]
    _properties: PhantomData<P>,
}

impl<P> TypedFeature<P>
where
    for<'de> P: Serialize + Deserialize<'de>,
{
    pub fn new(geometry: Option<Geometry>, properties: P) -> Self {
        let feature = Feature {
            bbox: None,
            geometry,
            id: None,
            properties: serde_json::to_value(properties).ok().and_then(|v| v.as_object().cloned()),
            foreign_members: None,
        };
        Self::from_feature(feature)
    }

    pub fn from_feature(feature: Feature) -> Self {
        Self {
            feature,
            _properties: PhantomData,
        }
    }

    /// Tries to access the typed properties of the feature.
    pub fn properties(&self) -> Option<P> {
        self.feature
            .properties
            .as_ref()
            .and_then(|p| serde_json::from_value(serde_json::Value::Object(p.clone())).ok())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct TypedFeatureCollection<P> {
    pub bbox: Option<Vec<f64>>,
    pub features: Vec<TypedFeature<P>>,
    pub foreign_members: Option<JsonObject>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub enum TypedGeoJson<P> {
    Geometry(Geometry),
    Feature(TypedFeature<P>),
    FeatureCollection(TypedFeatureCollection<P>),
}

impl<P> TypedGeoJson<P> {
    pub fn as_feature_collection(&self) -> Option<&TypedFeatureCollection<P>> {
        match self {
            TypedGeoJson::FeatureCollection(fc) => Some(fc),
            _ => None,
        }
    }

    pub fn into_feature_collection(self) -> Option<TypedFeatureCollection<P>> {
        match self {
            TypedGeoJson::FeatureCollection(fc) => Some(fc),
            _ => None,
        }
    }
}

impl<P> TypedFeatureCollection<P> {
    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn features(&self) -> &[TypedFeature<P>] {
        &self.features
    }

    /// Wrap an untyped collection without checking its properties
    pub fn from_feature_collection(collection: FeatureCollection) -> Self {
        Self {
            bbox: collection.bbox,
            features: collection
                .features
                .into_iter()
                .map(|feature| TypedFeature {
                    feature,
                    _properties: PhantomData,
                })
                .collect(),
            foreign_members: collection.foreign_members,
        }
    }

    /// Plain RFC 7946 collection, ready to serialize
    pub fn into_feature_collection(self) -> FeatureCollection {
        FeatureCollection {
            bbox: self.bbox,
            features: self.features.into_iter().map(|f| f.feature).collect(),
            foreign_members: self.foreign_members,
        }
    }
}

impl ChoroplethGeoJson {
    fn typed_features(&self) -> impl Iterator<Item = (&TypedFeature<CategoryProperties>, CategoryProperties)> {
        self.as_feature_collection()
            .into_iter()
            .flat_map(|fc| fc.features.iter())
            .filter_map(|feature| feature.properties().map(|props| (feature, props)))
    }

    /// Features tagged with one category, in file order
    pub fn features_for_category(&self, category: &str) -> Vec<&TypedFeature<CategoryProperties>> {
        self.typed_features()
            .filter(|(_, props)| props.category == category)
            .map(|(feature, _)| feature)
            .collect()
    }

    /// Feature count per category name
    pub fn count_by_category(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for (_, props) in self.typed_features() {
            *counts.entry(props.category).or_insert(0) += 1;
        }
        counts
    }

    /// Category names in legend order, each listed once
    pub fn categories(&self) -> Vec<String> {
        let mut ranked: Vec<(usize, String)> = self
            .typed_features()
            .map(|(_, props)| (props.rank, props.category))
            .collect();
        ranked.sort();
        ranked.dedup();
        ranked.into_iter().map(|(_, name)| name).collect()
    }

    /// Total planar area per category name, in square degrees
    pub fn area_by_category(&self) -> BTreeMap<String, f64> {
        let mut areas = BTreeMap::new();
        for (_, props) in self.typed_features() {
            *areas.entry(props.category).or_insert(0.0) += props.area;
        }
        areas
    }

    pub fn image_dimensions(&self) -> Option<(u32, u32)> {
        let foreign = self.as_feature_collection()?.foreign_members.as_ref()?;
        let width = u32::try_from(foreign.get("image_width")?.as_u64()?).ok()?;
        let height = u32::try_from(foreign.get("image_height")?.as_u64()?).ok()?;
        Some((width, height))
    }

    pub fn feature_count(&self) -> Option<usize> {
        self.as_feature_collection()?
            .foreign_members
            .as_ref()
            .and_then(|foreign| foreign.get("feature_count"))
            .and_then(|v| v.as_u64())
            .map(|v| v as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geojson::Value;

    fn feature(category: &str, rank: usize, area: f64) -> TypedFeature<CategoryProperties> {
        let ring = vec![
            vec![0.0, 0.0],
            vec![1.0, 0.0],
            vec![1.0, 1.0],
            vec![0.0, 0.0],
        ];
        TypedFeature::new(
            Some(Geometry::new(Value::Polygon(vec![ring]))),
            CategoryProperties {
                category: category.into(),
                color: "#000000".into(),
                rank,
                area,
            },
        )
    }

    fn collection() -> ChoroplethGeoJson {
        TypedGeoJson::FeatureCollection(TypedFeatureCollection {
            bbox: None,
            features: vec![
                feature("50-100 Mbps", 3, 1.0),
                feature("0-9 Mbps", 0, 2.0),
                feature("50-100 Mbps", 3, 0.5),
            ],
            foreign_members: None,
        })
    }

    #[test]
    fn groups_features_by_category() {
        let geojson = collection();
        assert_eq!(geojson.features_for_category("50-100 Mbps").len(), 2);
        assert!(geojson.features_for_category("100+ Mbps").is_empty());

        let counts = geojson.count_by_category();
        assert_eq!(counts.get("0-9 Mbps"), Some(&1));
        assert_eq!(counts.get("50-100 Mbps"), Some(&2));
        assert_eq!(geojson.area_by_category().get("50-100 Mbps"), Some(&1.5));
    }

    #[test]
    fn categories_follow_legend_rank() {
        assert_eq!(collection().categories(), vec!["0-9 Mbps", "50-100 Mbps"]);
    }

    #[test]
    fn properties_round_trip_through_the_feature() {
        let feature = feature("10-24 Mbps", 1, 0.25);
        let props = feature.properties().unwrap();
        assert_eq!(props.rank, 1);
        assert_eq!(props.area, 0.25);
    }
}

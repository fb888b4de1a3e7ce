//! GeoJSON feature reading and writing
//!
//! Parsing and geometry conversion go through the `geojson` crate and its
//! `geo-types` bridge.

use crate::error::{Error, Result};
use crate::vector::{AttributeValue, Feature, FeatureCollection};
use geo_types::Geometry;
use geojson::{GeoJson, feature::Id};
use std::path::Path;

/// Anything that can be turned into a [`Feature`] for zonal processing.
///
/// Implemented for plain features, geometries and feature-read results, so a
/// reader's `Result<Feature>` items can be fed in without unwrapping.
pub trait IntoFeature {
    fn into_feature(self) -> Result<Feature>;
}

impl IntoFeature for Feature {
    fn into_feature(self) -> Result<Feature> {
        Ok(self)
    }
}

impl IntoFeature for Geometry<f64> {
    fn into_feature(self) -> Result<Feature> {
        Ok(Feature::new(self))
    }
}

impl IntoFeature for Result<Feature> {
    fn into_feature(self) -> Result<Feature> {
        self
    }
}

/// Read a GeoJSON file into feature results
pub fn read_geojson<P: AsRef<Path>>(path: P) -> Result<Vec<Result<Feature>>> {
    let text = std::fs::read_to_string(path.as_ref())?;
    parse_geojson(&text)
}

/// Parse GeoJSON text: a FeatureCollection, a single Feature or a bare Geometry.
///
/// Malformed JSON fails as a whole; a feature whose geometry cannot be
/// converted yields an `Err` item in its position.
pub fn parse_geojson(text: &str) -> Result<Vec<Result<Feature>>> {
    let gj: GeoJson = text.parse()?;
    Ok(match gj {
        GeoJson::FeatureCollection(fc) => fc.features.into_iter().map(convert_feature).collect(),
        GeoJson::Feature(f) => vec![convert_feature(f)],
        GeoJson::Geometry(g) => vec![convert_geometry(g).map(Feature::new)],
    })
}

fn convert_geometry(g: geojson::Geometry) -> Result<Geometry<f64>> {
    Geometry::<f64>::try_from(g).map_err(|e| Error::FeatureRead(e.to_string()))
}

fn convert_feature(f: geojson::Feature) -> Result<Feature> {
    let geometry = f.geometry.map(convert_geometry).transpose()?;
    let properties = f
        .properties
        .unwrap_or_default()
        .into_iter()
        .map(|(k, v)| (k, AttributeValue::from(v)))
        .collect();
    let id = f.id.map(|id| match id {
        Id::String(s) => s,
        Id::Number(n) => n.to_string(),
    });

    Ok(Feature { geometry, properties, id })
}

/// Convert a feature to its GeoJSON representation
pub fn to_geojson_feature(feature: &Feature) -> geojson::Feature {
    let properties: geojson::JsonObject = feature
        .properties
        .iter()
        .map(|(k, v)| (k.clone(), serde_json::Value::from(v.clone())))
        .collect();

    geojson::Feature {
        bbox: None,
        geometry: feature
            .geometry
            .as_ref()
            .map(|g| geojson::Geometry::new(geojson::Value::from(g))),
        id: feature.id.clone().map(Id::String),
        properties: Some(properties),
        foreign_members: None,
    }
}

/// Serialize features as a GeoJSON FeatureCollection string
pub fn write_geojson_string<'a, I>(features: I) -> String
where
    I: IntoIterator<Item = &'a Feature>,
{
    let fc = geojson::FeatureCollection {
        bbox: None,
        features: features.into_iter().map(to_geojson_feature).collect(),
        foreign_members: None,
    };
    GeoJson::FeatureCollection(fc).to_string()
}

impl FeatureCollection {
    /// Parse GeoJSON, failing on the first feature that cannot be read
    pub fn from_geojson(text: &str) -> Result<Self> {
        parse_geojson(text)?.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FC: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {"type": "Feature", "id": 7, "properties": {"name": "a", "pop": 12},
             "geometry": {"type": "Polygon", "coordinates": [[[0,0],[2,0],[2,2],[0,2],[0,0]]]}},
            {"type": "Feature", "properties": null,
             "geometry": {"type": "Point", "coordinates": [1.5, 1.5]}},
            {"type": "Feature", "properties": {}, "geometry": null}
        ]
    }"#;

    #[test]
    fn test_parse_feature_collection() {
        let features = parse_geojson(FC).unwrap();
        assert_eq!(features.len(), 3);

        let first = features[0].as_ref().unwrap();
        assert!(matches!(first.geometry, Some(Geometry::Polygon(_))));
        assert_eq!(first.get_property("name"), Some(&AttributeValue::String("a".into())));
        assert_eq!(first.get_property("pop"), Some(&AttributeValue::Int(12)));
        assert_eq!(first.id.as_deref(), Some("7"));

        let second = features[1].as_ref().unwrap();
        assert!(matches!(second.geometry, Some(Geometry::Point(_))));
        assert!(second.properties.is_empty());

        assert!(features[2].as_ref().unwrap().geometry.is_none());
    }

    #[test]
    fn test_parse_bare_geometry() {
        let features = parse_geojson(r#"{"type": "Point", "coordinates": [1, 2]}"#).unwrap();
        assert_eq!(features.len(), 1);
        assert!(features[0].is_ok());
    }

    #[test]
    fn test_invalid_json_is_error() {
        assert!(parse_geojson("{ nope").is_err());
    }

    #[test]
    fn test_write_round_trip() {
        let fc = FeatureCollection::from_geojson(FC).unwrap();
        let text = write_geojson_string(fc.iter());
        let again = FeatureCollection::from_geojson(&text).unwrap();
        assert_eq!(again.len(), 3);
        assert_eq!(again.features[0].properties, fc.features[0].properties);
        assert_eq!(again.features[0].geometry, fc.features[0].geometry);
    }
}

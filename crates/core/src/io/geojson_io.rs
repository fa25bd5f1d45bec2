//! GeoJSON reading/writing for region and zone layers
//!
//! Geometries convert through the `geojson` crate's `geo-types` bridge. The
//! legacy `crs` member (`urn:ogc:def:crs:EPSG::25833` and friends) is honoured
//! on read and emitted on write, since the layers this pipeline consumes are
//! usually in a projected CRS rather than plain WGS84.

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::vector::{AttributeValue, Feature, FeatureCollection};
use geojson::{GeoJson, JsonObject, JsonValue};
use std::path::Path;

/// Read a GeoJSON file into a FeatureCollection
///
/// Accepts a FeatureCollection, a single Feature or a bare Geometry.
/// Features without geometry are kept; consumers skip them.
pub fn read_geojson<P: AsRef<Path>>(path: P) -> Result<FeatureCollection> {
    let text = std::fs::read_to_string(path.as_ref())?;
    parse_geojson(&text)
}

/// Parse GeoJSON text into a FeatureCollection
pub fn parse_geojson(text: &str) -> Result<FeatureCollection> {
    let geojson: GeoJson = text.parse()?;

    match geojson {
        GeoJson::FeatureCollection(fc) => {
            let crs = fc.foreign_members.as_ref().and_then(crs_member);
            let features = fc
                .features
                .into_iter()
                .map(convert_feature)
                .collect::<Result<Vec<_>>>()?;
            Ok(FeatureCollection::with_crs(features, crs))
        }
        GeoJson::Feature(f) => {
            let crs = f.foreign_members.as_ref().and_then(crs_member);
            Ok(FeatureCollection::with_crs(vec![convert_feature(f)?], crs))
        }
        GeoJson::Geometry(g) => {
            let geometry = geo_types::Geometry::<f64>::try_from(g)?;
            Ok(FeatureCollection::with_crs(vec![Feature::new(geometry)], None))
        }
    }
}

fn convert_feature(feature: geojson::Feature) -> Result<Feature> {
    let geometry = feature
        .geometry
        .map(geo_types::Geometry::<f64>::try_from)
        .transpose()?;

    let properties = feature
        .properties
        .unwrap_or_default()
        .into_iter()
        .map(|(k, v)| (k, json_to_attribute(v)))
        .collect();

    let id = feature.id.map(|id| match id {
        geojson::feature::Id::String(s) => s,
        geojson::feature::Id::Number(n) => n.to_string(),
    });

    Ok(Feature { geometry, properties, id })
}

fn json_to_attribute(value: JsonValue) -> AttributeValue {
    match value {
        JsonValue::Null => AttributeValue::Null,
        JsonValue::Bool(b) => AttributeValue::Bool(b),
        JsonValue::Number(n) => match n.as_i64() {
            Some(i) => AttributeValue::Int(i),
            None => AttributeValue::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        JsonValue::String(s) => AttributeValue::String(s),
        other => AttributeValue::String(other.to_string()),
    }
}

fn attribute_to_json(value: &AttributeValue) -> JsonValue {
    match value {
        AttributeValue::Null => JsonValue::Null,
        AttributeValue::Bool(b) => JsonValue::Bool(*b),
        AttributeValue::Int(i) => JsonValue::from(*i),
        AttributeValue::Float(f) => serde_json::Number::from_f64(*f)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
        AttributeValue::String(s) => JsonValue::String(s.clone()),
    }
}

/// Extract an EPSG code from a legacy GeoJSON `crs` member
fn crs_member(members: &JsonObject) -> Option<CRS> {
    let name = members.get("crs")?.get("properties")?.get("name")?.as_str()?;
    let code = name.rsplit(':').next()?.parse::<u32>().ok()?;
    Some(CRS::from_epsg(code))
}

/// Serialize a FeatureCollection as GeoJSON text
pub fn to_geojson_string(collection: &FeatureCollection) -> Result<String> {
    let features = collection
        .iter()
        .map(|f| {
            let properties: JsonObject = f
                .properties
                .iter()
                .map(|(k, v)| (k.clone(), attribute_to_json(v)))
                .collect();

            geojson::Feature {
                bbox: None,
                geometry: f
                    .geometry
                    .as_ref()
                    .map(|g| geojson::Geometry::new(geojson::Value::from(g))),
                id: f.id.clone().map(geojson::feature::Id::String),
                properties: Some(properties),
                foreign_members: None,
            }
        })
        .collect();

    let foreign_members = collection.crs.as_ref().and_then(|crs| crs.epsg()).map(|code| {
        let mut members = JsonObject::new();
        members.insert(
            "crs".to_string(),
            serde_json::json!({
                "type": "name",
                "properties": { "name": format!("urn:ogc:def:crs:EPSG::{}", code) }
            }),
        );
        members
    });

    let fc = geojson::FeatureCollection {
        bbox: None,
        features,
        foreign_members,
    };

    Ok(serde_json::to_string_pretty(&fc)?)
}

/// Write a FeatureCollection to a GeoJSON file
pub fn write_geojson<P: AsRef<Path>>(collection: &FeatureCollection, path: P) -> Result<()> {
    let text = to_geojson_string(collection)?;
    std::fs::write(path.as_ref(), text).map_err(Error::from)
}

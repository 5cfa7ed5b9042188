use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use geo::{Coord, LineString, MultiPolygon, Polygon};
use serde_json::Value;

use crate::types::LandcoverPolygon;

/// Load land-cover reference polygons from a GeoJSON FeatureCollection.
///
/// Each feature needs a `Polygon` or `MultiPolygon` geometry plus the
/// `landcover_type`, `urban_density`, `vegetation_cover` and `water_bodies`
/// properties. Feature order is preserved; the spatial joiner's tie-break
/// depends on it.
pub fn load_landcover(path: &Path) -> Result<Vec<LandcoverPolygon>> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read landcover file: {}", path.display()))?;
    let value: Value = serde_json::from_slice(&bytes)
        .with_context(|| format!("Failed to parse landcover GeoJSON: {}", path.display()))?;

    let features = value["features"]
        .as_array()
        .ok_or_else(|| anyhow!("{}: not a GeoJSON FeatureCollection", path.display()))?;

    let mut polygons = Vec::with_capacity(features.len());
    for (i, feature) in features.iter().enumerate() {
        polygons.push(
            parse_feature(feature)
                .with_context(|| format!("{}: invalid landcover feature {i}", path.display()))?,
        );
    }
    log::info!("Loaded {} landcover polygons from {}", polygons.len(), path.display());
    Ok(polygons)
}

fn parse_feature(feature: &Value) -> Result<LandcoverPolygon> {
    let geometry = feature["geometry"]
        .as_object()
        .ok_or_else(|| anyhow!("missing geometry"))?;
    let coords = geometry["coordinates"]
        .as_array()
        .ok_or_else(|| anyhow!("missing coordinates"))?;

    let geometry = match geometry["type"].as_str() {
        Some("Polygon") => MultiPolygon(vec![parse_polygon(coords)?]),
        Some("MultiPolygon") => MultiPolygon(
            coords
                .iter()
                .map(|rings| {
                    rings
                        .as_array()
                        .ok_or_else(|| anyhow!("invalid MultiPolygon member"))
                        .and_then(|r| parse_polygon(r))
                })
                .collect::<Result<Vec<_>>>()?,
        ),
        other => bail!("unsupported geometry type: {other:?}"),
    };

    let props = &feature["properties"];
    Ok(LandcoverPolygon {
        geometry,
        landcover_type: props["landcover_type"]
            .as_str()
            .ok_or_else(|| anyhow!("missing landcover_type property"))?
            .to_string(),
        urban_density: required_f64(props, "urban_density")?,
        vegetation_cover: required_f64(props, "vegetation_cover")?,
        water_bodies: required_f64(props, "water_bodies")?,
    })
}

fn required_f64(props: &Value, name: &str) -> Result<f64> {
    props[name]
        .as_f64()
        .ok_or_else(|| anyhow!("missing numeric property {name}"))
}

/// Rings are `[exterior, interior, interior, ...]`, each ring `[[lon, lat], ...]`.
fn parse_polygon(rings: &[Value]) -> Result<Polygon<f64>> {
    let exterior = rings
        .first()
        .and_then(|v| v.as_array())
        .ok_or_else(|| anyhow!("polygon missing exterior ring"))?;
    let interiors = rings[1..]
        .iter()
        .map(|ring| {
            ring.as_array()
                .ok_or_else(|| anyhow!("invalid interior ring"))
                .and_then(|r| parse_ring(r))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Polygon::new(parse_ring(exterior)?, interiors))
}

fn parse_ring(coords: &[Value]) -> Result<LineString<f64>> {
    coords
        .iter()
        .map(|pair| {
            let pair = pair.as_array().ok_or_else(|| anyhow!("invalid coordinate"))?;
            let x = pair.first().and_then(Value::as_f64);
            let y = pair.get(1).and_then(Value::as_f64);
            match (x, y) {
                (Some(x), Some(y)) => Ok(Coord { x, y }),
                _ => bail!("invalid coordinate pair"),
            }
        })
        .collect::<Result<Vec<Coord<f64>>>>()
        .map(LineString::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{point, Intersects};
    use std::io::Write;

    fn write_geojson(body: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".geojson").tempfile().unwrap();
        write!(file, "{body}").unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn loads_polygon_feature() {
        let file = write_geojson(
            r#"{"type":"FeatureCollection","features":[
                {"type":"Feature",
                 "geometry":{"type":"Polygon","coordinates":[[[77.5,12.9],[77.7,12.9],[77.7,13.1],[77.5,13.1],[77.5,12.9]]]},
                 "properties":{"landcover_type":"urban","urban_density":0.8,"vegetation_cover":0.1,"water_bodies":0.02}}
            ]}"#,
        );

        let polygons = load_landcover(file.path()).unwrap();
        assert_eq!(polygons.len(), 1);
        assert_eq!(polygons[0].landcover_type, "urban");
        assert_eq!(polygons[0].urban_density, 0.8);
        // GeoJSON is lon/lat ordered: x=lon, y=lat.
        assert!(polygons[0].geometry.intersects(&point!(x: 77.59, y: 12.97)));
    }

    #[test]
    fn missing_property_is_an_error() {
        let file = write_geojson(
            r#"{"type":"FeatureCollection","features":[
                {"type":"Feature",
                 "geometry":{"type":"Polygon","coordinates":[[[0,0],[1,0],[1,1],[0,1],[0,0]]]},
                 "properties":{"landcover_type":"water"}}
            ]}"#,
        );
        let err = load_landcover(file.path()).unwrap_err();
        assert!(format!("{err:#}").contains("urban_density"));
    }

    #[test]
    fn non_collection_is_an_error() {
        let file = write_geojson(r#"{"type":"Feature"}"#);
        assert!(load_landcover(file.path()).is_err());
    }
}

//! GeoJSON ⇄ [`FeatureCollection`], and GeoTIFF masks (`geotiff` feature).

use geojson::{feature::Id, GeoJson, JsonObject, JsonValue};

use crate::error::{Result, SscError};
use crate::feature::{AttrValue, Attributes, Feature, FeatureCollection, FeatureId};

// ── GeoJSON ───────────────────────────────────────────────────────────────────

fn attr_from_json(value: &JsonValue) -> Option<AttrValue> {
    match value {
        JsonValue::Null => None,
        JsonValue::Number(n) => n.as_f64().map(AttrValue::Number),
        JsonValue::String(s) => Some(AttrValue::Text(s.clone())),
        JsonValue::Bool(b) => Some(AttrValue::Number(if *b { 1.0 } else { 0.0 })),
        other => Some(AttrValue::Text(other.to_string())),
    }
}

fn attr_to_json(value: &AttrValue) -> JsonValue {
    match value {
        // NaN / ±inf have no JSON number form.
        AttrValue::Number(v) => serde_json::Number::from_f64(*v).map_or(JsonValue::Null, JsonValue::Number),
        AttrValue::Text(s) => JsonValue::String(s.clone()),
    }
}

fn feature_from_geojson(index: usize, f: geojson::Feature) -> Result<Feature> {
    let id = match &f.id {
        Some(Id::String(s)) => FeatureId::from(s.as_str()),
        Some(Id::Number(n)) => FeatureId::from(n.to_string()),
        None => FeatureId::from(index),
    };
    let Some(geometry) = f.geometry else {
        return Err(SscError::UnsupportedGeometry { feature: id });
    };
    let geometry = geo::Geometry::<f64>::try_from(geometry)?;
    let attributes: Attributes = f
        .properties
        .iter()
        .flatten()
        .filter_map(|(k, v)| attr_from_json(v).map(|a| (k.clone(), a)))
        .collect();
    Ok(Feature::new(id, geometry, attributes))
}

/// Parse a GeoJSON `FeatureCollection` (a bare `Feature` is accepted too).
/// Features without an `id` get their position as identity.
pub fn parse_feature_collection(text: &str) -> Result<FeatureCollection> {
    let features = match text.parse::<GeoJson>()? {
        GeoJson::FeatureCollection(fc) => fc.features,
        GeoJson::Feature(f) => vec![f],
        GeoJson::Geometry(_) => {
            return Err(SscError::GeoJson("expected a FeatureCollection, found a bare geometry".into()))
        }
    };
    features
        .into_iter()
        .enumerate()
        .map(|(i, f)| feature_from_geojson(i, f))
        .collect()
}

pub fn to_geojson(collection: &FeatureCollection) -> geojson::FeatureCollection {
    let features = collection
        .iter()
        .map(|f| {
            let properties: JsonObject = f
                .attributes()
                .iter()
                .map(|(k, v)| (k.clone(), attr_to_json(v)))
                .collect();
            geojson::Feature {
                bbox: None,
                geometry: Some(geojson::Geometry::new(geojson::Value::from(f.geometry()))),
                id: Some(Id::String(f.id().to_string())),
                properties: Some(properties),
                foreign_members: None,
            }
        })
        .collect();
    geojson::FeatureCollection { bbox: None, features, foreign_members: None }
}

/// Serialize as a GeoJSON `FeatureCollection` string. Undefined numbers become `null`.
pub fn write_feature_collection(collection: &FeatureCollection) -> String {
    GeoJson::FeatureCollection(to_geojson(collection)).to_string()
}

// ── Rasters ───────────────────────────────────────────────────────────────────

/// Load a raster from `path`: `.tif`/`.tiff` as GeoTIFF over `bounds`
/// (requires the `geotiff` feature), anything else as [`Raster`] JSON.
pub fn read_raster(
    path: &std::path::Path,
    bounds: Option<crate::config::RegionBounds>,
    nodata: Option<f32>,
) -> Result<crate::raster::Raster> {
    let io_err = |e: std::io::Error| SscError::RasterFormat(format!("{}: {e}", path.display()));
    let is_tiff = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("tif") || e.eq_ignore_ascii_case("tiff"));

    if !is_tiff {
        let text = std::fs::read_to_string(path).map_err(io_err)?;
        let mut raster: crate::raster::Raster =
            serde_json::from_str(&text).map_err(|e| SscError::RasterFormat(e.to_string()))?;
        if raster.data.len() != raster.width * raster.height {
            return Err(SscError::RasterFormat(format!(
                "{} × {} raster carries {} values",
                raster.width,
                raster.height,
                raster.data.len()
            )));
        }
        if let Some(nd) = nodata {
            raster.data.iter_mut().filter(|v| **v == nd).for_each(|v| *v = f32::NAN);
        }
        return Ok(raster);
    }

    let Some(bounds) = bounds else {
        return Err(SscError::RasterFormat(format!("{}: GeoTIFF input needs explicit bounds", path.display())));
    };
    #[cfg(feature = "geotiff")]
    {
        let file = std::fs::File::open(path).map_err(io_err)?;
        read_geotiff(std::io::BufReader::new(file), bounds, nodata)
    }
    #[cfg(not(feature = "geotiff"))]
    {
        let _ = (bounds, nodata);
        Err(SscError::RasterFormat(format!("{}: built without GeoTIFF support", path.display())))
    }
}

// ── GeoTIFF ───────────────────────────────────────────────────────────────────

/// Decode a single-band U8 / U16 / F32 TIFF into a [`Raster`] spanning
/// `bounds = [min_lon, min_lat, max_lon, max_lat]`. TIFF rows run north to
/// south and are flipped into the raster's south-to-north order. `nodata`
/// values become NaN.
#[cfg(feature = "geotiff")]
pub fn read_geotiff<R: std::io::Read + std::io::Seek>(
    reader: R,
    bounds: crate::config::RegionBounds,
    nodata: Option<f32>,
) -> Result<crate::raster::Raster> {
    use tiff::decoder::{Decoder, DecodingResult};

    let err = |e: tiff::TiffError| SscError::RasterFormat(e.to_string());
    let mut decoder = Decoder::new(reader).map_err(err)?;
    let (width, height) = decoder.dimensions().map_err(err)?;
    let (width, height) = (width as usize, height as usize);

    let values: Vec<f32> = match decoder.read_image().map_err(err)? {
        DecodingResult::U8(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::U16(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::F32(v) => v,
        _ => return Err(SscError::RasterFormat("unsupported pixel type (expected U8, U16 or F32)".into())),
    };
    if values.len() != width * height {
        return Err(SscError::RasterFormat(format!(
            "expected {} single-band pixels, decoded {}",
            width * height,
            values.len()
        )));
    }

    let [min_lon, min_lat, max_lon, max_lat] = bounds;
    let mut data = Vec::with_capacity(values.len());
    for tiff_row in (0..height).rev() {
        let row = &values[tiff_row * width..(tiff_row + 1) * width];
        data.extend(row.iter().map(|&v| if Some(v) == nodata { f32::NAN } else { v }));
    }
    Ok(crate::raster::Raster { data, width, height, min_lon, max_lon, min_lat, max_lat })
}

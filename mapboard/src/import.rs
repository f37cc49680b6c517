//! Shapefile import from zip archives.
//!
//! An uploaded archive may contain several shapefiles. Every `.shp` member is decoded and the
//! geometries of all of them end up in one [`ImportedFeatureSet`], which is shown as one layer.
//! The `.dbf` and `.prj` members of a shapefile are matched to its `.shp` member by file stem,
//! ignoring case.

use std::collections::BTreeMap;
use std::io::{Cursor, Read};
use std::path::Path;
#[cfg(not(target_arch = "wasm32"))]
use std::path::PathBuf;

use geo_types::Geometry;
use geojson::{Feature, FeatureCollection, JsonObject, JsonValue};
use shapefile::dbase::{self, Date, FieldValue, Record};
use shapefile::{Shape, ShapeReader};
use zip::ZipArchive;

use crate::error::MapboardError;
use crate::projection::SourceCrs;

const MACOS_METADATA_DIR: &str = "__MACOSX";

/// Returns true if the file name has the `.zip` extension (case-insensitive).
pub fn is_zip_archive_name(name: &str) -> bool {
    Path::new(name)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"))
}

/// Geometry read from a shapefile.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportedFeature {
    /// Name of the shapefile (file stem of the `.shp` member) the geometry comes from.
    pub layer: String,
    /// Geometry, `x = longitude, y = latitude`.
    pub geometry: Geometry<f64>,
    /// Attributes from the `.dbf` member, empty if the shapefile has none.
    pub properties: JsonObject,
}

/// All features decoded from one archive.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportedFeatureSet {
    /// Name of the archive.
    pub name: String,
    /// Decoded features in archive order.
    pub features: Vec<ImportedFeature>,
}

impl ImportedFeatureSet {
    /// Number of features.
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// Returns true if the archive had no convertible shapes.
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Features as a GeoJSON feature collection. Properties are the `.dbf` attributes plus the
    /// source shapefile in the `layer` property, unless an attribute already has that name.
    pub fn to_feature_collection(&self) -> FeatureCollection {
        let features = self
            .features
            .iter()
            .map(|feature| {
                let mut properties = feature.properties.clone();
                properties
                    .entry("layer")
                    .or_insert_with(|| feature.layer.clone().into());

                Feature {
                    bbox: None,
                    geometry: Some(geojson::Geometry::new(geojson::Value::from(
                        &feature.geometry,
                    ))),
                    id: None,
                    properties: Some(properties),
                    foreign_members: None,
                }
            })
            .collect();

        FeatureCollection {
            bbox: None,
            features,
            foreign_members: None,
        }
    }
}

/// Where to read an archive from.
#[derive(Debug, Clone)]
pub enum ImportSource {
    /// File in the local file system.
    #[cfg(not(target_arch = "wasm32"))]
    Path(PathBuf),
    /// Contents already loaded in memory, e.g. a file dropped into a browser window.
    Bytes {
        /// File name.
        name: String,
        /// File contents.
        bytes: Vec<u8>,
    },
}

impl ImportSource {
    /// File name of the source.
    pub fn name(&self) -> String {
        match self {
            #[cfg(not(target_arch = "wasm32"))]
            Self::Path(path) => path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
            Self::Bytes { name, .. } => name.clone(),
        }
    }
}

/// Reads and decodes an archive.
///
/// The extension is checked before any data is read.
pub async fn import_shapefile(source: ImportSource) -> Result<ImportedFeatureSet, MapboardError> {
    let name = source.name();
    if !is_zip_archive_name(&name) {
        return Err(MapboardError::NotZipArchive(name));
    }

    let bytes = match source {
        #[cfg(not(target_arch = "wasm32"))]
        ImportSource::Path(path) => tokio::fs::read(&path).await?,
        ImportSource::Bytes { bytes, .. } => bytes,
    };

    log::debug!("Read {} bytes from {name}", bytes.len());
    decode_shapefile_archive(&name, &bytes)
}

#[derive(Debug, Default)]
struct ShapefileMembers {
    name: String,
    shp: Option<Vec<u8>>,
    dbf: Option<Vec<u8>>,
    prj: Option<String>,
}

/// Decodes every shapefile in a zip archive.
///
/// Attributes of the `.dbf` member become feature properties. Coordinates are converted to
/// longitude and latitude according to the `.prj` member, and a shapefile in a coordinate
/// system that cannot be converted fails the whole import.
pub fn decode_shapefile_archive(name: &str, bytes: &[u8]) -> Result<ImportedFeatureSet, MapboardError> {
    if !is_zip_archive_name(name) {
        return Err(MapboardError::NotZipArchive(name.to_string()));
    }

    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let mut shapefiles: BTreeMap<String, ShapefileMembers> = BTreeMap::new();

    for index in 0..archive.len() {
        let mut file = archive.by_index(index)?;
        if file.is_dir() {
            continue;
        }

        let path = file.name().to_string();
        if path
            .split('/')
            .any(|component| component == MACOS_METADATA_DIR)
        {
            continue;
        }

        let Some((stem, extension)) = path.rsplit_once('.') else {
            continue;
        };
        let extension = extension.to_ascii_lowercase();
        if !matches!(extension.as_str(), "shp" | "dbf" | "prj") {
            continue;
        }

        let mut contents = Vec::new();
        file.read_to_end(&mut contents)?;

        let members = shapefiles
            .entry(stem.to_ascii_lowercase())
            .or_insert_with(|| ShapefileMembers {
                name: stem.rsplit('/').next().unwrap_or(stem).to_string(),
                ..Default::default()
            });
        match extension.as_str() {
            "shp" => members.shp = Some(contents),
            "dbf" => members.dbf = Some(contents),
            _ => members.prj = Some(String::from_utf8_lossy(&contents).into_owned()),
        }
    }

    let mut features = Vec::new();
    let mut shapefile_count = 0;
    for members in shapefiles.into_values() {
        let Some(shp) = members.shp else {
            continue;
        };
        shapefile_count += 1;

        let layer = members.name;
        let crs = SourceCrs::from_prj(members.prj.as_deref().unwrap_or_default())?;
        let records = read_shapes(shp, members.dbf)?;
        log::debug!("Decoded {} shapes from {layer}, coordinates in {crs:?}", records.len());

        for (index, (shape, record)) in records.into_iter().enumerate() {
            match Geometry::<f64>::try_from(shape) {
                Ok(geometry) => features.push(ImportedFeature {
                    layer: layer.clone(),
                    geometry: crs.to_lonlat(geometry)?,
                    properties: record.map(record_properties).unwrap_or_default(),
                }),
                Err(err) => log::debug!("Skipping shape {index} of {layer}: {err}"),
            }
        }
    }

    if shapefile_count == 0 {
        return Err(MapboardError::NoShapefile(name.to_string()));
    }

    log::info!("Imported {} features from {name}", features.len());

    Ok(ImportedFeatureSet {
        name: name.to_string(),
        features,
    })
}

/// Reads the shapes of a `.shp` member together with the matching `.dbf` records, if there are
/// any.
fn read_shapes(
    shp: Vec<u8>,
    dbf: Option<Vec<u8>>,
) -> Result<Vec<(Shape, Option<Record>)>, MapboardError> {
    let shapes = ShapeReader::new(Cursor::new(shp))?;
    let Some(dbf) = dbf else {
        return Ok(shapes.read()?.into_iter().map(|shape| (shape, None)).collect());
    };

    let records = dbase::Reader::new(Cursor::new(dbf)).map_err(shapefile::Error::DbaseError)?;
    let mut reader = shapefile::Reader::new(shapes, records);
    Ok(reader
        .read()?
        .into_iter()
        .map(|(shape, record)| (shape, Some(record)))
        .collect())
}

fn record_properties(record: Record) -> JsonObject {
    record
        .into_iter()
        .map(|(field, value)| (field, field_value_to_json(value)))
        .collect()
}

fn field_value_to_json(value: FieldValue) -> JsonValue {
    fn number(value: f64) -> JsonValue {
        serde_json::Number::from_f64(value)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null)
    }

    fn date(date: Date) -> String {
        format!("{:04}-{:02}-{:02}", date.year(), date.month(), date.day())
    }

    match value {
        FieldValue::Character(text) => text.map(JsonValue::String).unwrap_or(JsonValue::Null),
        FieldValue::Memo(text) => JsonValue::String(text),
        FieldValue::Numeric(value) => value.map(number).unwrap_or(JsonValue::Null),
        FieldValue::Float(value) => value.map(|v| number(v.into())).unwrap_or(JsonValue::Null),
        FieldValue::Double(value) | FieldValue::Currency(value) => number(value),
        FieldValue::Integer(value) => value.into(),
        FieldValue::Logical(value) => value.map(JsonValue::Bool).unwrap_or(JsonValue::Null),
        FieldValue::Date(value) => value
            .map(|value| JsonValue::String(date(value)))
            .unwrap_or(JsonValue::Null),
        FieldValue::DateTime(value) => {
            let time = value.time();
            JsonValue::String(format!(
                "{}T{:02}:{:02}:{:02}",
                date(value.date()),
                time.hours(),
                time.minutes(),
                time.seconds()
            ))
        }
    }
}

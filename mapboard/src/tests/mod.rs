//! Fixtures shared by the unit tests.

use std::io::{Cursor, Write};

use shapefile::dbase::{FieldName, FieldValue, Record, TableWriterBuilder};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::drawing::FeatureId;

const SHP_FILE_CODE: i32 = 9994;
const SHP_VERSION: i32 = 1000;
const SHP_HEADER_LEN: usize = 100;

pub(crate) fn feature_id(id: u64) -> FeatureId {
    FeatureId::from_raw(id)
}

/// Record content of a point shape.
pub(crate) fn point_record(x: f64, y: f64) -> Vec<u8> {
    let mut content = Vec::new();
    content.extend_from_slice(&1i32.to_le_bytes());
    content.extend_from_slice(&x.to_le_bytes());
    content.extend_from_slice(&y.to_le_bytes());
    content
}

/// Record content of a null shape.
pub(crate) fn null_record() -> Vec<u8> {
    0i32.to_le_bytes().to_vec()
}

/// Record content of a single ring polygon shape. Outer rings are clockwise in shapefiles.
pub(crate) fn polygon_record(ring: &[(f64, f64)]) -> Vec<u8> {
    let (min_x, max_x) = ring
        .iter()
        .fold((f64::MAX, f64::MIN), |(min, max), (x, _)| (min.min(*x), max.max(*x)));
    let (min_y, max_y) = ring
        .iter()
        .fold((f64::MAX, f64::MIN), |(min, max), (_, y)| (min.min(*y), max.max(*y)));

    let mut content = Vec::new();
    content.extend_from_slice(&5i32.to_le_bytes());
    for value in [min_x, min_y, max_x, max_y] {
        content.extend_from_slice(&value.to_le_bytes());
    }
    content.extend_from_slice(&1i32.to_le_bytes());
    content.extend_from_slice(&(ring.len() as i32).to_le_bytes());
    content.extend_from_slice(&0i32.to_le_bytes());
    for (x, y) in ring {
        content.extend_from_slice(&x.to_le_bytes());
        content.extend_from_slice(&y.to_le_bytes());
    }
    content
}

/// Main `.shp` file with the given records. Lengths in the headers are in 16-bit words.
pub(crate) fn shp_file(shape_type: i32, records: &[Vec<u8>]) -> Vec<u8> {
    let body_len: usize = records.iter().map(|content| 8 + content.len()).sum();
    let file_len = SHP_HEADER_LEN + body_len;

    let mut bytes = Vec::with_capacity(file_len);
    bytes.extend_from_slice(&SHP_FILE_CODE.to_be_bytes());
    bytes.extend_from_slice(&[0; 20]);
    bytes.extend_from_slice(&((file_len / 2) as i32).to_be_bytes());
    bytes.extend_from_slice(&SHP_VERSION.to_le_bytes());
    bytes.extend_from_slice(&shape_type.to_le_bytes());
    bytes.extend_from_slice(&[0; 64]);

    for (index, content) in records.iter().enumerate() {
        bytes.extend_from_slice(&(index as i32 + 1).to_be_bytes());
        bytes.extend_from_slice(&((content.len() / 2) as i32).to_be_bytes());
        bytes.extend_from_slice(content);
    }

    bytes
}

/// `.dbf` table with a single `NAME` character field and one record per name.
pub(crate) fn dbf_file(names: &[&str]) -> Vec<u8> {
    let records: Vec<Record> = names
        .iter()
        .map(|name| {
            let mut record = Record::default();
            record.insert("NAME".into(), FieldValue::Character(Some(name.to_string())));
            record
        })
        .collect();

    let mut cursor = Cursor::new(Vec::new());
    let writer = TableWriterBuilder::new()
        .add_character_field(FieldName::try_from("NAME").expect("valid field name"), 50)
        .build_with_dest(&mut cursor);
    writer.write_records(&records).expect("write to memory");

    cursor.into_inner()
}

/// Zip archive with the given members, stored without compression.
pub(crate) fn zip_archive(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);

    for (name, contents) in entries {
        writer.start_file(*name, options).expect("valid entry name");
        writer.write_all(contents).expect("write to memory");
    }

    writer.finish().expect("write to memory").into_inner()
}

#[test]
fn shp_header_length_matches_contents() {
    let bytes = shp_file(1, &[point_record(1.0, 2.0), null_record()]);
    assert_eq!(bytes.len(), 100 + 8 + 20 + 8 + 4);

    let words = i32::from_be_bytes([bytes[24], bytes[25], bytes[26], bytes[27]]);
    assert_eq!(words as usize * 2, bytes.len());
}

use ndarray::{Array1, Axis};
use serde::de::{self, MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::path::Path;

use super::error::RecordingError;
use super::mat_writer::{validate_variable_name, MatValue};

/// Read a msgpack file and convert every top-level key into a MAT variable.
///
/// This is the raw export: nothing about gaze data is assumed, the decoded map is written
/// as it is. Maps become structs, arrays of numbers become double row vectors and any other
/// array becomes a cell row. Keys that are not valid MATLAB names are skipped with a warning.
pub fn read_dump(path: &Path) -> Result<Vec<(String, MatValue)>, RecordingError> {
    if !path.exists() {
        return Err(RecordingError::BadFilePath(path.to_path_buf()));
    }
    let bytes = std::fs::read(path)?;
    log::info!(
        "Loaded {} ({})",
        path.to_string_lossy(),
        human_bytes::human_bytes(bytes.len() as f64)
    );
    decode_dump(&bytes)
}

pub fn decode_dump(bytes: &[u8]) -> Result<Vec<(String, MatValue)>, RecordingError> {
    let DumpValue(value) = rmp_serde::from_slice(bytes).map_err(RecordingError::Legacy)?;
    match value {
        MatValue::Struct(fields) => Ok(fields),
        _ => Err(RecordingError::NotAMap),
    }
}

/// Any msgpack value, converted on the fly
struct DumpValue(MatValue);

impl<'de> Deserialize<'de> for DumpValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(DumpVisitor).map(DumpValue)
    }
}

struct DumpVisitor;

impl<'de> Visitor<'de> for DumpVisitor {
    type Value = MatValue;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("any msgpack value")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Self::Value, E> {
        Ok(MatValue::scalar(if v { 1.0 } else { 0.0 }))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        Ok(MatValue::scalar(v as f64))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        Ok(MatValue::scalar(v as f64))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
        Ok(MatValue::scalar(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        Ok(MatValue::Char(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Self::Value, E> {
        Ok(MatValue::Char(v))
    }

    fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<Self::Value, E> {
        Ok(MatValue::Uint8(v.to_vec()))
    }

    fn visit_byte_buf<E: de::Error>(self, v: Vec<u8>) -> Result<Self::Value, E> {
        Ok(MatValue::Uint8(v))
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(MatValue::empty())
    }

    fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(MatValue::empty())
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
        DumpValue::deserialize(deserializer).map(|DumpValue(value)| value)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(DumpValue(item)) = seq.next_element()? {
            items.push(item);
        }
        if items.is_empty() {
            return Ok(MatValue::empty());
        }

        let numbers: Option<Vec<f64>> = items.iter().map(as_scalar).collect();
        Ok(match numbers {
            Some(numbers) => MatValue::Double(Array1::from_vec(numbers).insert_axis(Axis(0))),
            None => MatValue::Cell(Array1::from_vec(items).insert_axis(Axis(0))),
        })
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
        let mut fields: Vec<(String, MatValue)> = Vec::new();
        while let Some(DumpValue(key)) = map.next_key()? {
            let DumpValue(value) = map.next_value()?;
            let MatValue::Char(name) = key else {
                log::warn!("Skipping a map entry whose key is not a string");
                continue;
            };
            if validate_variable_name(&name).is_err() {
                log::warn!("Skipping '{name}': not a valid MATLAB name");
                continue;
            }
            if fields.iter().any(|(field, _)| *field == name) {
                log::warn!("Skipping repeated key '{name}'");
                continue;
            }
            fields.push((name, value));
        }
        Ok(MatValue::Struct(fields))
    }
}

fn as_scalar(value: &MatValue) -> Option<f64> {
    match value {
        MatValue::Double(matrix) if matrix.dim() == (1, 1) => matrix.iter().next().copied(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use serde::Serialize;
    use std::collections::BTreeMap;

    #[derive(Serialize)]
    struct Pupil {
        diameter: f64,
        topic: String,
    }

    #[derive(Serialize)]
    struct PupilData {
        gaze_positions: Vec<Pupil>,
        timestamps: Vec<f64>,
        version: String,
        empty: Vec<f64>,
        #[serde(rename = "_hidden")]
        hidden: u8,
    }

    #[test]
    fn top_level_keys_become_variables() {
        let data = PupilData {
            gaze_positions: vec![Pupil {
                diameter: 3.5,
                topic: String::from("pupil.0"),
            }],
            timestamps: vec![1.0, 2.0, 3.0],
            version: String::from("1.0"),
            empty: vec![],
            hidden: 1,
        };
        let bytes = rmp_serde::to_vec_named(&data).unwrap();
        let variables = decode_dump(&bytes).unwrap();

        let names: Vec<&str> = variables.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, vec!["gaze_positions", "timestamps", "version", "empty"]);

        let pupil = MatValue::Struct(vec![
            (String::from("diameter"), MatValue::scalar(3.5)),
            (String::from("topic"), MatValue::Char(String::from("pupil.0"))),
        ]);
        assert_eq!(
            variables[0].1,
            MatValue::Cell(Array1::from_vec(vec![pupil]).insert_axis(Axis(0)))
        );
        assert_eq!(variables[1].1, MatValue::Double(array![[1.0, 2.0, 3.0]]));
        assert_eq!(variables[2].1, MatValue::Char(String::from("1.0")));
        assert_eq!(variables[3].1, MatValue::empty());
    }

    #[test]
    fn mixed_arrays_become_cells() {
        #[derive(Serialize)]
        struct Mixed {
            mixed: (f64, String, bool),
            nothing: Option<f64>,
            raw: serde_bytes::ByteBuf,
        }
        let bytes = rmp_serde::to_vec_named(&Mixed {
            mixed: (1.5, String::from("x"), true),
            nothing: None,
            raw: serde_bytes::ByteBuf::from(vec![7u8, 8]),
        })
        .unwrap();
        let variables = decode_dump(&bytes).unwrap();
        match &variables[0].1 {
            MatValue::Cell(items) => {
                assert_eq!(items.dim(), (1, 3));
                assert_eq!(items[[0, 0]], MatValue::scalar(1.5));
                assert_eq!(items[[0, 1]], MatValue::Char(String::from("x")));
                assert_eq!(items[[0, 2]], MatValue::scalar(1.0));
            }
            other => panic!("expected a cell, got {other:?}"),
        }
        assert_eq!(variables[1].1, MatValue::empty());
        assert_eq!(variables[2].1, MatValue::Uint8(vec![7, 8]));
    }

    #[test]
    fn non_string_keys_are_skipped() {
        let map = BTreeMap::from([(1u8, 2.0f64)]);
        let bytes = rmp_serde::to_vec(&map).unwrap();
        assert!(decode_dump(&bytes).unwrap().is_empty());
    }

    #[test]
    fn top_level_must_be_a_map() {
        let bytes = rmp_serde::to_vec(&vec![1.0, 2.0]).unwrap();
        assert!(matches!(decode_dump(&bytes), Err(RecordingError::NotAMap)));
        assert!(matches!(
            decode_dump(&[0xc1]),
            Err(RecordingError::Legacy(_))
        ));
    }

    #[test]
    fn missing_file_is_reported() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("pupil_data");
        assert!(matches!(
            read_dump(&path),
            Err(RecordingError::BadFilePath(p)) if p == path
        ));
    }
}

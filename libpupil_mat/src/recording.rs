use serde::de::{DeserializeSeed, IgnoredAny, MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use serde_bytes::ByteBuf;
use std::fmt;
use std::path::{Path, PathBuf};

use super::datum::{GazeDatum, RawDatum};
use super::error::RecordingError;

/// File extension Pupil Player uses for its per-topic recordings
pub const PLDATA_EXTENSION: &str = "pldata";
/// The key holding gaze samples in a legacy pupil_data file
pub const LEGACY_GAZE_KEY: &str = "gaze_positions";

/// The on-disk layout of a Pupil recording
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "format")]
pub enum RecordingFormat {
    /// A `<topic>.pldata` stream of (topic, payload) pairs, one datum per payload
    Pldata { topic: String },
    /// A single map as written by old Pupil Capture versions; `key` selects the datum array
    Legacy { key: String },
}

impl Default for RecordingFormat {
    fn default() -> Self {
        Self::Legacy {
            key: String::from(LEGACY_GAZE_KEY),
        }
    }
}

impl RecordingFormat {
    /// Resolve the file to read. A pldata recording can be given as the recording directory,
    /// in which case `<dir>/<topic>.pldata` is used.
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        match self {
            Self::Pldata { topic } if path.is_dir() => {
                path.join(format!("{topic}.{PLDATA_EXTENSION}"))
            }
            _ => path.to_path_buf(),
        }
    }
}

/// Read a whole recording into memory and decode every datum
pub fn read_recording(
    path: &Path,
    format: &RecordingFormat,
) -> Result<Vec<GazeDatum>, RecordingError> {
    let file_path = format.resolve_path(path);
    if !file_path.exists() {
        return Err(RecordingError::BadFilePath(file_path));
    }

    let bytes = std::fs::read(&file_path)?;
    log::info!(
        "Loaded {} ({})",
        file_path.to_string_lossy(),
        human_bytes::human_bytes(bytes.len() as f64)
    );

    let data = match format {
        RecordingFormat::Pldata { .. } => decode_pldata(&bytes)?,
        RecordingFormat::Legacy { key } => decode_legacy(&bytes, key)?,
    };
    log::info!("Decoded {} samples.", data.len());
    Ok(data)
}

/// Decode a pldata stream.
///
/// The stream is a plain concatenation of two element arrays `[topic, payload]` where the
/// payload is a binary blob holding one msgpack-encoded datum map.
pub fn decode_pldata(bytes: &[u8]) -> Result<Vec<GazeDatum>, RecordingError> {
    let mut remaining = bytes;
    let mut data = Vec::new();
    while !remaining.is_empty() {
        let index = data.len();
        let (_topic, payload): (String, ByteBuf) = rmp_serde::from_read(&mut remaining)
            .map_err(|source| RecordingError::Envelope { index, source })?;
        data.push(GazeDatum::from_msgpack(index, &payload)?);
    }
    Ok(data)
}

/// Decode a legacy pupil_data map and pull out the array stored under `key`
pub fn decode_legacy(bytes: &[u8], key: &str) -> Result<Vec<GazeDatum>, RecordingError> {
    let mut deserializer = rmp_serde::Deserializer::new(bytes);
    let raw = SelectKey(key)
        .deserialize(&mut deserializer)
        .map_err(RecordingError::Legacy)?
        .ok_or_else(|| RecordingError::MissingKey(key.to_string()))?;

    let mut data = Vec::with_capacity(raw.len());
    for (index, datum) in raw.into_iter().enumerate() {
        data.push(GazeDatum::from_raw(index, datum)?);
    }
    Ok(data)
}

/// Walks the top level map of a legacy file, only materializing the value under one key.
/// Legacy files also carry pupil positions, notifications and so on which we skip over.
struct SelectKey<'a>(&'a str);

impl<'de> DeserializeSeed<'de> for SelectKey<'_> {
    type Value = Option<Vec<RawDatum>>;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
        deserializer.deserialize_map(self)
    }
}

impl<'de> Visitor<'de> for SelectKey<'_> {
    type Value = Option<Vec<RawDatum>>;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a map of pupil data arrays")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
        let mut selected = None;
        while let Some(key) = map.next_key::<String>()? {
            if key == self.0 {
                selected = Some(map.next_value::<Vec<RawDatum>>()?);
            } else {
                map.next_value::<IgnoredAny>()?;
            }
        }
        Ok(selected)
    }
}

use serde::de::IgnoredAny;
use serde::Deserialize;

use super::error::DatumError;

/// A pupil measurement attached to a gaze datum.
///
/// Kept as it was decoded: whether `topic` and `diameter` are needed depends on the export
/// schema, so they are checked by the extractor rather than here.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PupilDatum {
    pub topic: Option<String>,
    pub diameter: Option<f64>,
}

/// One gaze sample from a Pupil recording.
///
/// GazeDatums are only ever created through [`GazeDatum::from_raw`], so the fields every
/// schema exports are known to be present and correctly shaped.
#[derive(Debug, Clone, PartialEq)]
pub struct GazeDatum {
    pub timestamp: f64,
    pub norm_pos: [f64; 2],
    pub confidence: f64,
    pub base_data: Option<Vec<PupilDatum>>,
}

#[derive(Debug, Default, Deserialize)]
struct RawPupilDatum {
    topic: Option<String>,
    diameter: Option<f64>,
}

/// Pupil entries that are not maps, or whose fields have unexpected types, still count as an
/// entry; they just carry nothing we can export.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawPupilEntry {
    Pupil(RawPupilDatum),
    Other(IgnoredAny),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawBaseData {
    List(Vec<RawPupilEntry>),
    Other(IgnoredAny),
}

/// The datum map as it comes off the wire. Everything is optional here; shape checks
/// happen in [`GazeDatum::from_raw`]. Unknown keys are ignored.
#[derive(Debug, Default, Deserialize)]
pub struct RawDatum {
    timestamp: Option<f64>,
    norm_pos: Option<Vec<f64>>,
    confidence: Option<f64>,
    base_data: Option<RawBaseData>,
}

impl GazeDatum {
    /// Validate a decoded datum map. `index` is the position of the datum in the recording
    /// and is only used for error reporting.
    pub fn from_raw(index: usize, raw: RawDatum) -> Result<Self, DatumError> {
        let timestamp = raw.timestamp.ok_or(DatumError::MissingField {
            index,
            field: "timestamp",
        })?;
        let norm_pos = raw.norm_pos.ok_or(DatumError::MissingField {
            index,
            field: "norm_pos",
        })?;
        if norm_pos.len() != 2 {
            return Err(DatumError::BadNormPos {
                index,
                len: norm_pos.len(),
            });
        }
        let confidence = raw.confidence.ok_or(DatumError::MissingField {
            index,
            field: "confidence",
        })?;

        // A base_data that is not a list is treated like a missing one
        let base_data = match raw.base_data {
            Some(RawBaseData::List(entries)) => Some(
                entries
                    .into_iter()
                    .map(|entry| match entry {
                        RawPupilEntry::Pupil(pupil) => PupilDatum {
                            topic: pupil.topic,
                            diameter: pupil.diameter,
                        },
                        RawPupilEntry::Other(_) => PupilDatum::default(),
                    })
                    .collect(),
            ),
            Some(RawBaseData::Other(_)) | None => None,
        };

        Ok(Self {
            timestamp,
            norm_pos: [norm_pos[0], norm_pos[1]],
            confidence,
            base_data,
        })
    }

    /// Decode and validate a single MessagePack-encoded datum map
    pub fn from_msgpack(index: usize, bytes: &[u8]) -> Result<Self, DatumError> {
        let raw: RawDatum = rmp_serde::from_slice(bytes)
            .map_err(|source| DatumError::Decode { index, source })?;
        Self::from_raw(index, raw)
    }
}

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use super::datum::{GazeDatum, PupilDatum};
use super::error::ExtractError;
use super::topic_map::{EyeSlot, TopicMap};

/// Written in a diameter column when that eye has no measurement
pub const MISSING_DIAMETER: f64 = -1.0;

const GAZE_COLUMNS: [&str; 4] = ["timestamp", "gaze_x", "gaze_y", "confidence"];
const GAZE_PUPIL_COLUMNS: [&str; 6] = [
    "timestamp",
    "gaze_x",
    "gaze_y",
    "confidence",
    "diameter_left",
    "diameter_right",
];

/// The column layout of the exported matrix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Schema {
    /// timestamp, gaze x, gaze y, confidence
    Gaze,
    /// Gaze plus left and right pupil diameters
    GazePupil,
}

impl Schema {
    pub fn column_names(&self) -> &'static [&'static str] {
        match self {
            Self::Gaze => &GAZE_COLUMNS,
            Self::GazePupil => &GAZE_PUPIL_COLUMNS,
        }
    }

    pub fn n_columns(&self) -> usize {
        self.column_names().len()
    }
}

/// What to do with a datum whose base_data is present but empty
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyBaseData {
    /// Both diameters get the missing sentinel
    #[default]
    Sentinel,
    /// Fail the conversion
    Error,
}

/// Left and right pupil diameters of one sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EyeDiameters {
    pub left: f64,
    pub right: f64,
}

impl Default for EyeDiameters {
    fn default() -> Self {
        Self {
            left: MISSING_DIAMETER,
            right: MISSING_DIAMETER,
        }
    }
}

/// Extractor turns gaze datums into rows of the output matrix.
///
/// One row per datum, in input order. The first four columns are copied straight from the
/// datum; the pupil schema adds the two diameters resolved by [`Extractor::resolve_diameters`].
#[derive(Debug, Clone)]
pub struct Extractor {
    schema: Schema,
    topic_map: TopicMap,
    empty_policy: EmptyBaseData,
}

impl Extractor {
    pub fn new(schema: Schema, topic_map: TopicMap, empty_policy: EmptyBaseData) -> Self {
        Self {
            schema,
            topic_map,
            empty_policy,
        }
    }

    pub fn schema(&self) -> Schema {
        self.schema
    }

    /// Build the full N x C matrix. Fails on the first datum that cannot be exported.
    pub fn extract(&self, data: &[GazeDatum]) -> Result<Array2<f64>, ExtractError> {
        let n_columns = self.schema.n_columns();
        let mut matrix = Array2::<f64>::zeros((data.len(), n_columns));
        let mut lone_eye_count = 0;
        let mut no_eye_count = 0;

        for (index, datum) in data.iter().enumerate() {
            let mut row = matrix.row_mut(index);
            row[0] = datum.timestamp;
            row[1] = datum.norm_pos[0];
            row[2] = datum.norm_pos[1];
            row[3] = datum.confidence;

            if self.schema == Schema::GazePupil {
                let pupils = datum
                    .base_data
                    .as_deref()
                    .ok_or(ExtractError::MissingBaseData { index })?;
                match pupils.len() {
                    0 => no_eye_count += 1,
                    1 => lone_eye_count += 1,
                    _ => (),
                }
                let diameters = self.resolve_diameters(index, pupils)?;
                row[4] = diameters.left;
                row[5] = diameters.right;
            }
        }

        if lone_eye_count > 0 {
            log::debug!("{lone_eye_count} samples had a measurement from only one eye");
        }
        if no_eye_count > 0 {
            log::warn!(
                "{no_eye_count} samples had no pupil measurement; both diameters set to {MISSING_DIAMETER}"
            );
        }

        Ok(matrix)
    }

    /// Resolve the left/right diameters of a single datum.
    ///
    /// Two or more measurements are taken in order (first left, second right) regardless of
    /// their topics, so only their diameters must be present. A lone measurement is placed by
    /// its topic and the other eye gets the sentinel.
    pub fn resolve_diameters(
        &self,
        index: usize,
        pupils: &[PupilDatum],
    ) -> Result<EyeDiameters, ExtractError> {
        let mut diameters = EyeDiameters::default();
        match pupils {
            [] => {
                if self.empty_policy == EmptyBaseData::Error {
                    return Err(ExtractError::EmptyBaseData { index });
                }
            }
            [lone] => {
                let topic = lone.topic.as_deref().ok_or(ExtractError::MissingPupilField {
                    index,
                    field: "topic",
                })?;
                let diameter = pupil_diameter(index, lone)?;
                match self.topic_map.slot_for(topic) {
                    EyeSlot::Left => diameters.left = diameter,
                    EyeSlot::Right => diameters.right = diameter,
                }
            }
            [first, second, ..] => {
                diameters.left = pupil_diameter(index, first)?;
                diameters.right = pupil_diameter(index, second)?;
            }
        }
        Ok(diameters)
    }
}

fn pupil_diameter(index: usize, pupil: &PupilDatum) -> Result<f64, ExtractError> {
    pupil.diameter.ok_or(ExtractError::MissingPupilField {
        index,
        field: "diameter",
    })
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new(Schema::GazePupil, TopicMap::default(), EmptyBaseData::default())
    }
}

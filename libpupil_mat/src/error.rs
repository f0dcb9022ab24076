use std::path::PathBuf;
use thiserror::Error;

use super::mat_writer::MAX_NAME_LENGTH;

#[derive(Debug, Error)]
pub enum DatumError {
    #[error("Datum {index} could not be decoded: {source}")]
    Decode {
        index: usize,
        #[source]
        source: rmp_serde::decode::Error,
    },
    #[error("Datum {index} is missing required field '{field}'")]
    MissingField { index: usize, field: &'static str },
    #[error("Datum {index} has a norm_pos of length {len}; expected 2")]
    BadNormPos { index: usize, len: usize },
}

#[derive(Debug, Error)]
pub enum RecordingError {
    #[error("Could not open recording because file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Recording failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Failed to decode pldata envelope {index}: {source}")]
    Envelope {
        index: usize,
        #[source]
        source: rmp_serde::decode::Error,
    },
    #[error("Recording contained a bad datum: {0}")]
    Datum(#[from] DatumError),
    #[error("Legacy recording has no key '{0}'")]
    MissingKey(String),
    #[error("Failed to decode legacy recording: {0}")]
    Legacy(#[source] rmp_serde::decode::Error),
    #[error("Recording does not hold a map at its top level")]
    NotAMap,
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Datum {index} has no base_data but the schema requires pupil diameters")]
    MissingBaseData { index: usize },
    #[error("Datum {index} has an empty base_data and the empty policy is 'error'")]
    EmptyBaseData { index: usize },
    #[error("Datum {index} has a pupil measurement without '{field}'")]
    MissingPupilField { index: usize, field: &'static str },
}

#[derive(Debug, Error)]
pub enum MatWriterError {
    #[error("'{0}' is not a valid MATLAB variable name (letter first, then letters, digits or '_', at most {max} characters)", max=MAX_NAME_LENGTH)]
    InvalidVariableName(String),
    #[error("Variable '{0}' is too large for a Level-5 MAT-file")]
    VariableTooLarge(String),
    #[error("MatWriter failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration as file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Config failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Config failed to parse YAML: {0}")]
    ParsingError(#[from] serde_yaml::Error),
}

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("Processor failed due to Recording error: {0}")]
    RecordingError(#[from] RecordingError),
    #[error("Processor failed due to Extract error: {0}")]
    ExtractError(#[from] ExtractError),
    #[error("Processor failed due to MatWriter error: {0}")]
    MatWriterError(#[from] MatWriterError),
    #[error("Processor failed due to Config error: {0}")]
    ConfigError(#[from] ConfigError),
}

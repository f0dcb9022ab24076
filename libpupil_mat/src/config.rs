use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::error::ConfigError;
use super::extractor::{EmptyBaseData, Extractor, Schema};
use super::mat_writer::MatrixLayout;
use super::recording::RecordingFormat;
use super::topic_map::{default_topic_slots, EyeSlot, TopicMap};

/// A single recording to convert
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversion {
    pub input_path: PathBuf,
    #[serde(flatten)]
    pub format: RecordingFormat,
    pub schema: Schema,
    /// Name of the MATLAB variable, and the stem of the output file
    pub variable_name: String,
}

impl Default for Conversion {
    fn default() -> Self {
        Self {
            input_path: PathBuf::from("None"),
            format: RecordingFormat::default(),
            schema: Schema::Gaze,
            variable_name: String::from("eye_data"),
        }
    }
}

/// Structure representing the application configuration. Holds the settings shared by all
/// conversions and the list of conversions to run.
/// Configs are seralizable and deserializable to YAML using serde and serde_yaml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub output_path: PathBuf,
    pub layout: MatrixLayout,
    pub empty_base_data: EmptyBaseData,
    pub topic_slots: BTreeMap<String, EyeSlot>,
    pub conversions: Vec<Conversion>,
}

impl Default for Config {
    /// Generate a new Config object. The output goes to the working directory and the
    /// single template conversion has an invalid input path.
    fn default() -> Self {
        Self {
            output_path: PathBuf::from("."),
            layout: MatrixLayout::default(),
            empty_base_data: EmptyBaseData::default(),
            topic_slots: default_topic_slots(),
            conversions: vec![Conversion::default()],
        }
    }
}

impl Config {
    /// Read the configuration in a YAML file
    /// Returns a Config if successful
    pub fn read_config_file(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            return Err(ConfigError::BadFilePath(config_path.to_path_buf()));
        }

        let yaml_str = std::fs::read_to_string(config_path)?;

        Ok(serde_yaml::from_str::<Self>(&yaml_str)?)
    }

    /// Write the configuration to a YAML file
    pub fn write_config_file(&self, config_path: &Path) -> Result<(), ConfigError> {
        let yaml_str = serde_yaml::to_string(self)?;
        std::fs::write(config_path, yaml_str)?;
        Ok(())
    }

    /// Get the path to the output .mat file for a variable
    pub fn get_mat_file_name(&self, variable_name: &str) -> Result<PathBuf, ConfigError> {
        if self.output_path.exists() {
            Ok(self.output_path.join(format!("{variable_name}.mat")))
        } else {
            Err(ConfigError::BadFilePath(self.output_path.clone()))
        }
    }

    /// Build the extractor for one of the conversions
    pub fn make_extractor(&self, conversion: &Conversion) -> Extractor {
        Extractor::new(
            conversion.schema,
            TopicMap::from_entries(&self.topic_slots),
            self.empty_base_data,
        )
    }
}

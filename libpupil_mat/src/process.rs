use std::path::{Path, PathBuf};

use super::config::{Config, Conversion};
use super::dump::read_dump;
use super::error::ProcessorError;
use super::mat_writer::{validate_variable_name, MatWriter};
use super::recording::read_recording;

/// What a finished conversion produced
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionSummary {
    pub output_path: PathBuf,
    pub rows: usize,
    pub columns: usize,
}

/// What a finished raw dump produced
#[derive(Debug, Clone, PartialEq)]
pub struct DumpSummary {
    pub output_path: PathBuf,
    pub variables: Vec<String>,
}

/// Convert a single recording.
///
/// Reads the whole recording, builds the matrix and only then writes the output file. Any
/// failure along the way aborts the conversion with no output written.
pub fn convert(
    conversion: &Conversion,
    config: &Config,
) -> Result<ConversionSummary, ProcessorError> {
    // Fail on a bad name before doing any decoding work
    validate_variable_name(&conversion.variable_name)?;
    let output_path = config.get_mat_file_name(&conversion.variable_name)?;

    let data = read_recording(&conversion.input_path, &conversion.format)?;
    let extractor = config.make_extractor(conversion);
    let matrix = extractor.extract(&data)?;
    log::info!(
        "Extracted {} rows with columns [{}]",
        matrix.nrows(),
        extractor.schema().column_names().join(", ")
    );

    let writer = MatWriter::new(&output_path);
    writer.write_matrix(&conversion.variable_name, &matrix, config.layout)?;

    Ok(ConversionSummary {
        output_path,
        rows: matrix.nrows(),
        columns: matrix.ncols(),
    })
}

/// Run every conversion in the config, in order. Stops at the first failure.
///
/// `on_finished` is called after each conversion with its index and summary, typically to
/// drive a progress bar.
pub fn process<F>(
    config: &Config,
    mut on_finished: F,
) -> Result<Vec<ConversionSummary>, ProcessorError>
where
    F: FnMut(usize, &ConversionSummary),
{
    let mut summaries = Vec::with_capacity(config.conversions.len());
    for (idx, conversion) in config.conversions.iter().enumerate() {
        log::info!(
            "Converting {} into {}...",
            conversion.input_path.to_string_lossy(),
            conversion.variable_name
        );
        let summary = convert(conversion, config)?;
        on_finished(idx, &summary);
        summaries.push(summary);
    }
    Ok(summaries)
}

/// Write every top-level key of the msgpack map in `input` as a variable of
/// `<output_path>/<output_name>.mat`. A `.mat` already on `output_name` is not doubled.
pub fn dump_recording(
    input: &Path,
    output_name: &str,
    config: &Config,
) -> Result<DumpSummary, ProcessorError> {
    let stem = output_name.strip_suffix(".mat").unwrap_or(output_name);
    let output_path = config.get_mat_file_name(stem)?;
    let variables = read_dump(input)?;
    log::info!("Decoded {} top-level variables", variables.len());

    MatWriter::new(&output_path).write_variables(&variables)?;

    Ok(DumpSummary {
        output_path,
        variables: variables.into_iter().map(|(name, _)| name).collect(),
    })
}

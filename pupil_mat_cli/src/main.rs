//! # pupil_mat_cli
//!
//! Command line front end of pupil_mat.
//!
//! ```bash
//! # old style recordings, one pupil_data file
//! pupil_mat_cli legacy /path/to/000/pupil_data eye_data
//! # pldata recordings, give the directory (or the .pldata file) and the topic
//! pupil_mat_cli pldata /path/to/000 gaze eye_data
//! # everything in a legacy pupil_data file, one variable per top-level key
//! pupil_mat_cli dump /path/to/000/pupil_data pupil_data
//! # batches
//! pupil_mat_cli new -p convert.yml
//! pupil_mat_cli run -p convert.yml
//! ```
use clap::{Arg, ArgAction, ArgMatches, Command};
use indicatif::{MultiProgress, ProgressBar};
use indicatif_log_bridge::LogWrapper;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use libpupil_mat::config::{Config, Conversion};
use libpupil_mat::extractor::{EmptyBaseData, Schema};
use libpupil_mat::mat_writer::MatrixLayout;
use libpupil_mat::process::{dump_recording, process};
use libpupil_mat::recording::{RecordingFormat, LEGACY_GAZE_KEY};

/// Options shared by the single conversion subcommands
fn with_conversion_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("input")
                .required(true)
                .value_parser(clap::value_parser!(PathBuf))
                .help("Path to the recording"),
        )
        .arg(
            Arg::new("schema")
                .long("schema")
                .value_parser(["gaze", "gaze-pupil"])
                .help("Columns to export; gaze-pupil adds left and right pupil diameters"),
        )
        .arg(
            Arg::new("layout")
                .long("layout")
                .value_parser(["cell", "double"])
                .default_value("cell")
                .help("Store the matrix as a cell array or as a double matrix"),
        )
        .arg(
            Arg::new("empty-base-data")
                .long("empty-base-data")
                .value_parser(["sentinel", "error"])
                .default_value("sentinel")
                .help("What to do with samples that have no pupil data"),
        )
        .arg(
            Arg::new("output-dir")
                .short('o')
                .long("output-dir")
                .value_parser(clap::value_parser!(PathBuf))
                .default_value(".")
                .help("Directory the .mat file is written to"),
        )
}

fn config_path_arg() -> Arg {
    Arg::new("path")
        .short('p')
        .long("path")
        .required(true)
        .value_parser(clap::value_parser!(PathBuf))
        .help("Path to the configuration file")
}

fn cli() -> Command {
    Command::new("pupil_mat_cli")
        .about("Convert Pupil Labs gaze recordings to MATLAB .mat files")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Log debug information"),
        )
        .subcommand(
            Command::new("new")
                .about("Make a template configuration yaml file")
                .arg(config_path_arg()),
        )
        .subcommand(
            Command::new("run")
                .about("Run every conversion in a configuration yaml file")
                .arg(config_path_arg()),
        )
        .subcommand(
            with_conversion_args(
                Command::new("legacy").about("Convert a legacy pupil_data recording"),
            )
            .arg(
                Arg::new("output-name")
                    .required(true)
                    .help("Name of the MATLAB variable and of the .mat file"),
            )
            .arg(
                Arg::new("key")
                    .long("key")
                    .default_value(LEGACY_GAZE_KEY)
                    .help("Key of the datum array in the pupil_data map"),
            ),
        )
        .subcommand(
            with_conversion_args(Command::new("pldata").about("Convert a .pldata recording"))
                .arg(
                    Arg::new("topic")
                        .required(true)
                        .help("Recording topic, e.g. gaze"),
                )
                .arg(
                    Arg::new("output-name")
                        .required(true)
                        .help("Name of the MATLAB variable and of the .mat file"),
                ),
        )
        .subcommand(
            Command::new("dump")
                .about("Write every top-level key of a msgpack file as a MATLAB variable")
                .arg(
                    Arg::new("input")
                        .required(true)
                        .value_parser(clap::value_parser!(PathBuf))
                        .help("Path to the msgpack file, e.g. a legacy pupil_data"),
                )
                .arg(
                    Arg::new("output-name")
                        .required(true)
                        .help("Name of the .mat file, without extension"),
                )
                .arg(
                    Arg::new("output-dir")
                        .short('o')
                        .long("output-dir")
                        .value_parser(clap::value_parser!(PathBuf))
                        .default_value(".")
                        .help("Directory the .mat file is written to"),
                ),
        )
}

fn get_str<'a>(matches: &'a ArgMatches, id: &str) -> &'a str {
    matches
        .get_one::<String>(id)
        .map(String::as_str)
        .unwrap_or_default()
}

/// Turn the options of a legacy/pldata subcommand into a one conversion Config
fn single_conversion_config(
    matches: &ArgMatches,
    format: RecordingFormat,
    default_schema: Schema,
) -> Config {
    let schema = match get_str(matches, "schema") {
        "gaze" => Schema::Gaze,
        "gaze-pupil" => Schema::GazePupil,
        _ => default_schema,
    };
    let layout = match get_str(matches, "layout") {
        "double" => MatrixLayout::Double,
        _ => MatrixLayout::Cell,
    };
    let empty_base_data = match get_str(matches, "empty-base-data") {
        "error" => EmptyBaseData::Error,
        _ => EmptyBaseData::Sentinel,
    };
    let output_path = matches
        .get_one::<PathBuf>("output-dir")
        .cloned()
        .unwrap_or_else(|| PathBuf::from("."));
    let input_path = matches
        .get_one::<PathBuf>("input")
        .cloned()
        .expect("We require an input");

    Config {
        output_path,
        layout,
        empty_base_data,
        conversions: vec![Conversion {
            input_path,
            format,
            schema,
            variable_name: get_str(matches, "output-name").to_string(),
        }],
        ..Default::default()
    }
}

fn make_template_config(path: &Path) -> ExitCode {
    log::info!("Making a template config at {}...", path.to_string_lossy());
    match Config::default().write_config_file(path) {
        Ok(()) => {
            log::info!("Done.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run_config(config: &Config, pb_manager: &MultiProgress) -> ExitCode {
    log::info!("Output Path: {}", config.output_path.to_string_lossy());
    log::info!("Layout: {:?}", config.layout);
    log::info!("Empty base_data: {:?}", config.empty_base_data);
    log::info!("Conversions: {}", config.conversions.len());

    let pb = pb_manager.add(ProgressBar::new(config.conversions.len() as u64));
    let result = process(config, |_, summary| {
        log::info!(
            "{} rows x {} columns written to {}",
            summary.rows,
            summary.columns,
            summary.output_path.to_string_lossy()
        );
        pb.inc(1);
    });
    pb.finish();

    match result {
        Ok(_) => {
            log::info!("Done.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("Conversion failed with error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run_dump(matches: &ArgMatches) -> ExitCode {
    let Some(input) = matches.get_one::<PathBuf>("input") else {
        return ExitCode::FAILURE;
    };
    let config = Config {
        output_path: matches
            .get_one::<PathBuf>("output-dir")
            .cloned()
            .unwrap_or_else(|| PathBuf::from(".")),
        ..Default::default()
    };
    log::info!("Dumping {}...", input.to_string_lossy());
    match dump_recording(input, get_str(matches, "output-name"), &config) {
        Ok(summary) => {
            log::info!(
                "{} variables written to {}",
                summary.variables.len(),
                summary.output_path.to_string_lossy()
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("Dump failed with error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn main() -> ExitCode {
    let matches = cli().get_matches();

    // Initialize feedback
    let level = if matches.get_flag("verbose") {
        simplelog::LevelFilter::Debug
    } else {
        simplelog::LevelFilter::Info
    };
    let logger = simplelog::TermLogger::new(
        level,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    );

    let pb_manager = MultiProgress::new();

    if let Err(e) = LogWrapper::new(pb_manager.clone(), logger).try_init() {
        eprintln!("Could not create logging/progress: {e}");
        return ExitCode::FAILURE;
    }
    log::set_max_level(level);

    match matches.subcommand() {
        Some(("new", sub)) => match sub.get_one::<PathBuf>("path") {
            Some(path) => make_template_config(path),
            None => ExitCode::FAILURE,
        },
        Some(("run", sub)) => {
            let Some(config_path) = sub.get_one::<PathBuf>("path") else {
                return ExitCode::FAILURE;
            };
            log::info!("Loading config from {}...", config_path.to_string_lossy());
            match Config::read_config_file(config_path) {
                Ok(config) => {
                    log::info!("Config successfully loaded.");
                    run_config(&config, &pb_manager)
                }
                Err(e) => {
                    log::error!("{e}");
                    ExitCode::FAILURE
                }
            }
        }
        Some(("legacy", sub)) => {
            let format = RecordingFormat::Legacy {
                key: get_str(sub, "key").to_string(),
            };
            run_config(
                &single_conversion_config(sub, format, Schema::Gaze),
                &pb_manager,
            )
        }
        Some(("pldata", sub)) => {
            let format = RecordingFormat::Pldata {
                topic: get_str(sub, "topic").to_string(),
            };
            run_config(
                &single_conversion_config(sub, format, Schema::GazePupil),
                &pb_manager,
            )
        }
        Some(("dump", sub)) => run_dump(sub),
        _ => ExitCode::FAILURE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        cli().debug_assert();
    }

    #[test]
    fn pldata_defaults_to_pupil_schema() {
        let matches = cli()
            .try_get_matches_from(["pupil_mat_cli", "pldata", "/rec/000", "gaze", "eye_data"])
            .unwrap();
        let (_, sub) = matches.subcommand().unwrap();
        let format = RecordingFormat::Pldata {
            topic: get_str(sub, "topic").to_string(),
        };
        let config = single_conversion_config(sub, format.clone(), Schema::GazePupil);
        let conversion = &config.conversions[0];
        assert_eq!(conversion.schema, Schema::GazePupil);
        assert_eq!(conversion.format, format);
        assert_eq!(conversion.variable_name, "eye_data");
        assert_eq!(conversion.input_path, PathBuf::from("/rec/000"));
        assert_eq!(config.layout, MatrixLayout::Cell);
        assert_eq!(config.empty_base_data, EmptyBaseData::Sentinel);
    }

    #[test]
    fn legacy_options_are_applied() {
        let matches = cli()
            .try_get_matches_from([
                "pupil_mat_cli",
                "legacy",
                "pupil_data",
                "gaze",
                "--schema",
                "gaze-pupil",
                "--layout",
                "double",
                "--empty-base-data",
                "error",
                "-o",
                "/tmp/out",
            ])
            .unwrap();
        let (name, sub) = matches.subcommand().unwrap();
        assert_eq!(name, "legacy");
        assert_eq!(get_str(sub, "key"), LEGACY_GAZE_KEY);
        let config = single_conversion_config(sub, RecordingFormat::default(), Schema::Gaze);
        assert_eq!(config.conversions[0].schema, Schema::GazePupil);
        assert_eq!(config.layout, MatrixLayout::Double);
        assert_eq!(config.empty_base_data, EmptyBaseData::Error);
        assert_eq!(config.output_path, PathBuf::from("/tmp/out"));
    }

    #[test]
    fn dump_takes_input_and_output_name() {
        let matches = cli()
            .try_get_matches_from(["pupil_mat_cli", "dump", "pupil_data", "raw", "-o", "/tmp"])
            .unwrap();
        let (name, sub) = matches.subcommand().unwrap();
        assert_eq!(name, "dump");
        assert_eq!(
            sub.get_one::<PathBuf>("input"),
            Some(&PathBuf::from("pupil_data"))
        );
        assert_eq!(get_str(sub, "output-name"), "raw");
        assert_eq!(
            sub.get_one::<PathBuf>("output-dir"),
            Some(&PathBuf::from("/tmp"))
        );
        assert!(cli()
            .try_get_matches_from(["pupil_mat_cli", "dump", "pupil_data"])
            .is_err());
    }

    #[test]
    fn missing_output_name_is_an_error() {
        assert!(cli()
            .try_get_matches_from(["pupil_mat_cli", "pldata", "/rec/000", "gaze"])
            .is_err());
    }
}

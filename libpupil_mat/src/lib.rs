//! # pupil_mat
//!
//! pupil_mat converts Pupil Labs eye tracking recordings into MATLAB MAT-files. It reads
//! the msgpack encoded gaze data written by Pupil Capture/Player, extracts a fixed set of
//! columns per gaze sample and writes them as a single named matrix variable.
//!
//! ## Recording formats
//!
//! - `pldata`: recordings made with Pupil Capture 1.8 and newer store every topic in its own
//! `<topic>.pldata` file. Give either the file itself or the recording directory together
//! with a topic (typically `gaze`).
//! - `legacy`: older recordings keep everything in a single `pupil_data` file. The gaze
//! samples are stored under the `gaze_positions` key.
//!
//! ## Output
//!
//! Each conversion writes `<variable_name>.mat` containing one variable `<variable_name>`.
//! Rows are gaze samples, in recording order. The columns are
//!
//! ```text
//! 1. timestamp
//! 2. gaze x (normalized)
//! 3. gaze y (normalized)
//! 4. confidence
//! 5. left pupil diameter   (gaze_pupil schema only)
//! 6. right pupil diameter  (gaze_pupil schema only)
//! ```
//!
//! A diameter of `-1` means that eye had no measurement for the sample. When a sample has
//! pupil data from both eyes the first entry is the left eye. When it has only one, the
//! pupil topic decides (`pupil.0` is left by default, anything else is right).
//!
//! By default the variable is stored as a cell array of doubles, which is what the older
//! Python export scripts produced. Set `layout: double` to get a plain numeric matrix.
//!
//! ## Configuration
//!
//! Batches of conversions can be described in a YAML file:
//!
//! ```yml
//! output_path: .
//! layout: cell
//! empty_base_data: sentinel
//! topic_slots:
//!   pupil.0: left
//!   pupil.1: right
//! conversions:
//!   - input_path: /path/to/recording/000
//!     format: pldata
//!     topic: gaze
//!     schema: gaze_pupil
//!     variable_name: eye_data
//! ```
//!
//! `empty_base_data` controls samples that carry an empty pupil list: `sentinel` writes
//! `-1` for both eyes, `error` aborts the conversion.
//!
//! ## Raw dumps
//!
//! [`process::dump_recording`] skips the gaze extraction altogether and writes every
//! top-level key of a legacy `pupil_data` map as its own variable. Nested maps become
//! structs, arrays of numbers become double row vectors, other arrays become cells and
//! strings become char arrays.
pub mod config;
pub mod datum;
pub mod dump;
pub mod error;
pub mod extractor;
pub mod mat_writer;
pub mod process;
pub mod recording;
pub mod topic_map;

use byteorder::{LittleEndian, WriteBytesExt};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;

use super::error::MatWriterError;

/// Longest variable name MATLAB accepts
pub const MAX_NAME_LENGTH: usize = 63;

const HEADER_TEXT_LENGTH: usize = 116;
const HEADER_LENGTH: usize = 128;
const MAT_VERSION: u16 = 0x0100;
const ENDIAN_INDICATOR: &[u8; 2] = b"IM";

// Data element types
const MI_INT8: u32 = 1;
const MI_UINT8: u32 = 2;
const MI_UINT16: u32 = 4;
const MI_INT32: u32 = 5;
const MI_UINT32: u32 = 6;
const MI_DOUBLE: u32 = 9;
const MI_MATRIX: u32 = 14;

// Array classes
const MX_CELL_CLASS: u32 = 1;
const MX_STRUCT_CLASS: u32 = 2;
const MX_CHAR_CLASS: u32 = 4;
const MX_DOUBLE_CLASS: u32 = 6;
const MX_UINT8_CLASS: u32 = 9;

const TAG_LENGTH: usize = 8;
// array flags and 2-D dimensions sub-elements, each a tag plus 8 bytes of data
const FLAGS_AND_DIMS_LENGTH: usize = 2 * (TAG_LENGTH + 8);
// Struct field names are stored in fixed width, NUL padded slots
const FIELD_NAME_LENGTH: usize = MAX_NAME_LENGTH + 1;

/// How the matrix is stored in the MAT-file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatrixLayout {
    /// A cell array holding one 1x1 double per cell
    #[default]
    Cell,
    /// A plain real double matrix
    Double,
}

/// A value that can be stored as a MAT-file variable
#[derive(Debug, Clone, PartialEq)]
pub enum MatValue {
    /// Real double array
    Double(Array2<f64>),
    /// Cell array, any value per cell
    Cell(Array2<MatValue>),
    /// Character row vector
    Char(String),
    /// uint8 row vector
    Uint8(Vec<u8>),
    /// 1x1 struct; field names must be valid variable names
    Struct(Vec<(String, MatValue)>),
}

impl MatValue {
    pub fn scalar(value: f64) -> Self {
        Self::Double(Array2::from_elem((1, 1), value))
    }

    /// The 0x0 double, MATLAB's `[]`
    pub fn empty() -> Self {
        Self::Double(Array2::zeros((0, 0)))
    }

    pub fn from_matrix(matrix: &Array2<f64>, layout: MatrixLayout) -> Self {
        match layout {
            MatrixLayout::Double => Self::Double(matrix.clone()),
            MatrixLayout::Cell => Self::Cell(matrix.map(|value| Self::scalar(*value))),
        }
    }

    pub fn dims(&self) -> (usize, usize) {
        match self {
            Self::Double(matrix) => matrix.dim(),
            Self::Cell(items) => items.dim(),
            Self::Char(text) => (1, text.encode_utf16().count()),
            Self::Uint8(bytes) => (1, bytes.len()),
            Self::Struct(_) => (1, 1),
        }
    }

    fn class(&self) -> u32 {
        match self {
            Self::Double(_) => MX_DOUBLE_CLASS,
            Self::Cell(_) => MX_CELL_CLASS,
            Self::Char(_) => MX_CHAR_CLASS,
            Self::Uint8(_) => MX_UINT8_CLASS,
            Self::Struct(_) => MX_STRUCT_CLASS,
        }
    }

    /// Size of the miMATRIX element body holding this value under `name`
    fn body_length(&self, name: &str) -> usize {
        let data_length = match self {
            Self::Double(matrix) => TAG_LENGTH + matrix.len() * 8,
            Self::Cell(items) => items.iter().map(|item| item.element_length("")).sum(),
            Self::Char(text) => TAG_LENGTH + padded(text.encode_utf16().count() * 2),
            Self::Uint8(bytes) => TAG_LENGTH + padded(bytes.len()),
            Self::Struct(fields) => {
                // field name length (a small element) and the field names
                TAG_LENGTH
                    + TAG_LENGTH
                    + fields.len() * FIELD_NAME_LENGTH
                    + fields
                        .iter()
                        .map(|(_, value)| value.element_length(""))
                        .sum::<usize>()
            }
        };
        header_body_length(name) + data_length
    }

    fn element_length(&self, name: &str) -> usize {
        TAG_LENGTH + self.body_length(name)
    }

    /// Check dimensions and struct field names all the way down
    fn check(&self, variable: &str) -> Result<(), MatWriterError> {
        let (rows, cols) = self.dims();
        if i32::try_from(rows).is_err() || i32::try_from(cols).is_err() {
            return Err(MatWriterError::VariableTooLarge(variable.to_string()));
        }
        match self {
            Self::Cell(items) => items.iter().try_for_each(|item| item.check(variable)),
            Self::Struct(fields) => fields.iter().try_for_each(|(field, value)| {
                validate_variable_name(field)?;
                value.check(variable)
            }),
            _ => Ok(()),
        }
    }

    fn write_element(&self, buffer: &mut Vec<u8>, name: &str) -> Result<(), MatWriterError> {
        let (rows, cols) = self.dims();
        write_array_header(
            buffer,
            self.class(),
            rows,
            cols,
            name,
            self.body_length(name),
        )?;
        match self {
            Self::Double(matrix) => {
                write_tag(buffer, MI_DOUBLE, matrix.len() * 8)?;
                // MATLAB stores column-major; iterating the transpose walks the columns
                for value in matrix.t().iter() {
                    buffer.write_f64::<LittleEndian>(*value)?;
                }
            }
            Self::Cell(items) => {
                for item in items.t().iter() {
                    item.write_element(buffer, "")?;
                }
            }
            Self::Char(text) => {
                let n_bytes = text.encode_utf16().count() * 2;
                write_tag(buffer, MI_UINT16, n_bytes)?;
                for unit in text.encode_utf16() {
                    buffer.write_u16::<LittleEndian>(unit)?;
                }
                pad(buffer, n_bytes);
            }
            Self::Uint8(bytes) => {
                write_tag(buffer, MI_UINT8, bytes.len())?;
                buffer.write_all(bytes)?;
                pad(buffer, bytes.len());
            }
            Self::Struct(fields) => {
                // Small element: type and size packed into the first four bytes
                buffer.write_u16::<LittleEndian>(MI_INT32 as u16)?;
                buffer.write_u16::<LittleEndian>(4)?;
                buffer.write_i32::<LittleEndian>(FIELD_NAME_LENGTH as i32)?;

                write_tag(buffer, MI_INT8, fields.len() * FIELD_NAME_LENGTH)?;
                for (field, _) in fields {
                    buffer.write_all(field.as_bytes())?;
                    buffer.resize(buffer.len() + FIELD_NAME_LENGTH - field.len(), 0);
                }
                for (_, value) in fields {
                    value.write_element(buffer, "")?;
                }
            }
        }
        Ok(())
    }
}

/// Writes named variables to a Level-5 MAT-file.
///
/// The whole file is encoded in memory first and written in one go, so a failed
/// conversion never leaves a partial file behind.
#[derive(Debug)]
pub struct MatWriter {
    path: PathBuf,
}

impl MatWriter {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write `matrix` as the variable `name`, replacing any existing file
    pub fn write_matrix(
        &self,
        name: &str,
        matrix: &Array2<f64>,
        layout: MatrixLayout,
    ) -> Result<(), MatWriterError> {
        self.write_bytes(&encode_matrix(name, matrix, layout)?)
    }

    /// Write every variable in order, replacing any existing file
    pub fn write_variables(&self, variables: &[(String, MatValue)]) -> Result<(), MatWriterError> {
        self.write_bytes(&encode_variables(variables)?)
    }

    fn write_bytes(&self, bytes: &[u8]) -> Result<(), MatWriterError> {
        std::fs::write(&self.path, bytes)?;
        log::info!(
            "Wrote {} ({})",
            self.path.to_string_lossy(),
            human_bytes::human_bytes(bytes.len() as f64)
        );
        Ok(())
    }
}

/// Check that `name` can be used as a MATLAB variable name
pub fn validate_variable_name(name: &str) -> Result<(), MatWriterError> {
    let mut chars = name.chars();
    let starts_with_letter = chars.next().is_some_and(|c| c.is_ascii_alphabetic());
    let rest_is_valid = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if starts_with_letter && rest_is_valid && name.len() <= MAX_NAME_LENGTH {
        Ok(())
    } else {
        Err(MatWriterError::InvalidVariableName(name.to_string()))
    }
}

/// Encode a complete MAT-file holding `matrix` under `name`
pub fn encode_matrix(
    name: &str,
    matrix: &Array2<f64>,
    layout: MatrixLayout,
) -> Result<Vec<u8>, MatWriterError> {
    encode_variables(&[(name.to_string(), MatValue::from_matrix(matrix, layout))])
}

/// Encode a complete MAT-file holding each value under its name
pub fn encode_variables(variables: &[(String, MatValue)]) -> Result<Vec<u8>, MatWriterError> {
    let mut file_length = HEADER_LENGTH;
    for (name, value) in variables {
        validate_variable_name(name)?;
        value.check(name)?;
        if u32::try_from(value.body_length(name)).is_err() {
            return Err(MatWriterError::VariableTooLarge(name.clone()));
        }
        file_length += value.element_length(name);
    }

    let mut buffer = Vec::with_capacity(file_length);
    write_file_header(&mut buffer)?;
    for (name, value) in variables {
        value.write_element(&mut buffer, name)?;
    }
    Ok(buffer)
}

/// Created-on stamp in the same form MATLAB itself writes, e.g. `Fri Oct 16 17:22:03 2026`
fn creation_stamp() -> String {
    let now = OffsetDateTime::now_utc();
    let weekday = now.weekday().to_string();
    let month = now.month().to_string();
    format!(
        "{} {} {:2} {:02}:{:02}:{:02} {}",
        &weekday[..3],
        &month[..3],
        now.day(),
        now.hour(),
        now.minute(),
        now.second(),
        now.year()
    )
}

fn write_file_header(buffer: &mut Vec<u8>) -> Result<(), MatWriterError> {
    let mut text = format!(
        "MATLAB 5.0 MAT-file, Platform: {}, Created on: {} by {} {}",
        std::env::consts::OS,
        creation_stamp(),
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
    )
    .into_bytes();
    text.resize(HEADER_TEXT_LENGTH, b' ');
    buffer.write_all(&text)?;
    // No subsystem data
    buffer.write_u64::<LittleEndian>(0)?;
    buffer.write_u16::<LittleEndian>(MAT_VERSION)?;
    buffer.write_all(ENDIAN_INDICATOR)?;
    Ok(())
}

/// Pad a data length up to the 8 byte boundary every element must end on
fn padded(length: usize) -> usize {
    (length + 7) & !7
}

/// Bytes in a matrix element body up to (not including) its data
fn header_body_length(name: &str) -> usize {
    FLAGS_AND_DIMS_LENGTH + TAG_LENGTH + padded(name.len())
}

fn pad(buffer: &mut Vec<u8>, length: usize) {
    buffer.resize(buffer.len() + padded(length) - length, 0);
}

fn write_tag(buffer: &mut Vec<u8>, data_type: u32, n_bytes: usize) -> Result<(), MatWriterError> {
    buffer.write_u32::<LittleEndian>(data_type)?;
    buffer.write_u32::<LittleEndian>(n_bytes as u32)?;
    Ok(())
}

/// Matrix tag, array flags, dimensions and name. Everything after that is class specific.
fn write_array_header(
    buffer: &mut Vec<u8>,
    class: u32,
    rows: usize,
    cols: usize,
    name: &str,
    body_length: usize,
) -> Result<(), MatWriterError> {
    write_tag(buffer, MI_MATRIX, body_length)?;

    write_tag(buffer, MI_UINT32, 8)?;
    buffer.write_u32::<LittleEndian>(class)?;
    buffer.write_u32::<LittleEndian>(0)?;

    write_tag(buffer, MI_INT32, 8)?;
    buffer.write_i32::<LittleEndian>(rows as i32)?;
    buffer.write_i32::<LittleEndian>(cols as i32)?;

    write_tag(buffer, MI_INT8, name.len())?;
    buffer.write_all(name.as_bytes())?;
    pad(buffer, name.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::ByteOrder;
    use ndarray::array;

    // A 1x1 unnamed double: tag, flags, dims, empty name, data tag, one value
    const SCALAR_ELEMENT_LENGTH: usize = TAG_LENGTH + FLAGS_AND_DIMS_LENGTH + 2 * TAG_LENGTH + 8;

    fn read_u32(bytes: &[u8], offset: usize) -> u32 {
        LittleEndian::read_u32(&bytes[offset..offset + 4])
    }

    fn read_f64(bytes: &[u8], offset: usize) -> f64 {
        LittleEndian::read_f64(&bytes[offset..offset + 8])
    }

    #[test]
    fn header_is_level5_little_endian() {
        let bytes = encode_matrix("gaze", &array![[1.0]], MatrixLayout::Double).unwrap();
        assert!(bytes.starts_with(b"MATLAB 5.0 MAT-file"));
        assert_eq!(&bytes[116..124], &[0u8; 8]);
        assert_eq!(&bytes[124..126], &[0x00, 0x01]);
        assert_eq!(&bytes[126..128], b"IM");
    }

    #[test]
    fn double_layout_is_column_major() {
        let matrix = array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];
        let bytes = encode_matrix("gaze", &matrix, MatrixLayout::Double).unwrap();

        assert_eq!(bytes.len(), 240);
        assert_eq!(read_u32(&bytes, 128), MI_MATRIX);
        assert_eq!(read_u32(&bytes, 132) as usize, bytes.len() - 136);
        assert_eq!(read_u32(&bytes, 144), MX_DOUBLE_CLASS);
        // dimensions
        assert_eq!(read_u32(&bytes, 160), 2);
        assert_eq!(read_u32(&bytes, 164), 3);
        // name
        assert_eq!(read_u32(&bytes, 172), 4);
        assert_eq!(&bytes[176..180], b"gaze");
        // data
        assert_eq!(read_u32(&bytes, 184), MI_DOUBLE);
        assert_eq!(read_u32(&bytes, 188), 48);
        let values: Vec<f64> = (0..6).map(|i| read_f64(&bytes, 192 + 8 * i)).collect();
        assert_eq!(values, vec![1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);
    }

    #[test]
    fn cell_layout_nests_one_scalar_per_cell() {
        let matrix = array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];
        let bytes = encode_matrix("gaze", &matrix, MatrixLayout::Cell).unwrap();

        assert_eq!(SCALAR_ELEMENT_LENGTH, 64);
        assert_eq!(bytes.len(), 136 + 48 + 6 * SCALAR_ELEMENT_LENGTH);
        assert_eq!(read_u32(&bytes, 132) as usize, bytes.len() - 136);
        assert_eq!(read_u32(&bytes, 144), MX_CELL_CLASS);

        let first_cell = 184;
        assert_eq!(read_u32(&bytes, first_cell), MI_MATRIX);
        assert_eq!(
            read_u32(&bytes, first_cell + 4) as usize,
            SCALAR_ELEMENT_LENGTH - TAG_LENGTH
        );
        assert_eq!(read_u32(&bytes, first_cell + 16), MX_DOUBLE_CLASS);
        // unnamed
        assert_eq!(read_u32(&bytes, first_cell + 44), 0);
        let values: Vec<f64> = (0..6)
            .map(|i| read_f64(&bytes, first_cell + 56 + SCALAR_ELEMENT_LENGTH * i))
            .collect();
        assert_eq!(values, vec![1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);
    }

    #[test]
    fn struct_has_field_names_then_fields() {
        let value = MatValue::Struct(vec![(String::from("a"), MatValue::scalar(1.0))]);
        let bytes = encode_variables(&[(String::from("s"), value)]).unwrap();

        assert_eq!(bytes.len(), 136 + 48 + 16 + 64 + SCALAR_ELEMENT_LENGTH);
        assert_eq!(read_u32(&bytes, 132) as usize, bytes.len() - 136);
        assert_eq!(read_u32(&bytes, 144), MX_STRUCT_CLASS);
        assert_eq!(read_u32(&bytes, 160), 1);
        assert_eq!(read_u32(&bytes, 164), 1);
        // field name length as a small element
        assert_eq!(read_u32(&bytes, 184), (4 << 16) | MI_INT32);
        assert_eq!(read_u32(&bytes, 188) as usize, FIELD_NAME_LENGTH);
        // field names
        assert_eq!(read_u32(&bytes, 192), MI_INT8);
        assert_eq!(read_u32(&bytes, 196) as usize, FIELD_NAME_LENGTH);
        assert_eq!(&bytes[200..202], b"a\0");
        // the field itself, unnamed
        assert_eq!(read_u32(&bytes, 264), MI_MATRIX);
        assert_eq!(read_u32(&bytes, 280), MX_DOUBLE_CLASS);
        assert_eq!(read_f64(&bytes, 320), 1.0);
    }

    #[test]
    fn char_is_utf16_row() {
        let bytes =
            encode_variables(&[(String::from("c"), MatValue::Char(String::from("hé")))]).unwrap();
        assert_eq!(bytes.len(), 200);
        assert_eq!(read_u32(&bytes, 144), MX_CHAR_CLASS);
        assert_eq!(read_u32(&bytes, 160), 1);
        assert_eq!(read_u32(&bytes, 164), 2);
        assert_eq!(read_u32(&bytes, 184), MI_UINT16);
        assert_eq!(read_u32(&bytes, 188), 4);
        assert_eq!(LittleEndian::read_u16(&bytes[192..194]), 0x68);
        assert_eq!(LittleEndian::read_u16(&bytes[194..196]), 0xE9);
    }

    #[test]
    fn variables_follow_each_other() {
        let variables = vec![
            (String::from("raw"), MatValue::Uint8(vec![1, 2, 3])),
            (String::from("none"), MatValue::empty()),
        ];
        let bytes = encode_variables(&variables).unwrap();
        // uint8 data padded to 8 bytes
        assert_eq!(read_u32(&bytes, 144), MX_UINT8_CLASS);
        assert_eq!(read_u32(&bytes, 184), MI_UINT8);
        assert_eq!(read_u32(&bytes, 188), 3);
        assert_eq!(&bytes[192..200], &[1, 2, 3, 0, 0, 0, 0, 0]);
        // second variable starts right after
        assert_eq!(read_u32(&bytes, 200), MI_MATRIX);
        assert_eq!(&bytes[248..252], b"none");
        assert_eq!(read_u32(&bytes, 232), 0);
        assert_eq!(read_u32(&bytes, 236), 0);
        assert_eq!(bytes.len(), 200 + 64);
    }

    #[test]
    fn bad_struct_field_is_rejected() {
        let value = MatValue::Struct(vec![(String::from("_private"), MatValue::scalar(1.0))]);
        assert!(matches!(
            encode_variables(&[(String::from("s"), value)]),
            Err(MatWriterError::InvalidVariableName(name)) if name == "_private"
        ));
    }

    #[test]
    fn empty_matrix_is_valid() {
        let matrix = Array2::<f64>::zeros((0, 6));
        let bytes = encode_matrix("empty", &matrix, MatrixLayout::Cell).unwrap();
        assert_eq!(bytes.len(), 136 + 48);
        assert_eq!(read_u32(&bytes, 160), 0);
        assert_eq!(read_u32(&bytes, 164), 6);
    }

    #[test]
    fn variable_names_follow_matlab_rules() {
        assert!(validate_variable_name("eye_data_01").is_ok());
        assert!(validate_variable_name(&"a".repeat(MAX_NAME_LENGTH)).is_ok());
        for bad in ["", "1data", "_data", "eye-data", "eye data", "données"] {
            assert!(
                matches!(
                    validate_variable_name(bad),
                    Err(MatWriterError::InvalidVariableName(_))
                ),
                "{bad} should be rejected"
            );
        }
        assert!(validate_variable_name(&"a".repeat(MAX_NAME_LENGTH + 1)).is_err());
    }

    #[test]
    fn writer_writes_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("gaze.mat");
        let writer = MatWriter::new(&path);
        writer
            .write_matrix("gaze", &array![[1.0, 2.0]], MatrixLayout::Double)
            .unwrap();
        let bytes = std::fs::read(writer.path()).unwrap();
        assert_eq!(read_f64(&bytes, 192), 1.0);
        assert_eq!(read_f64(&bytes, 200), 2.0);
    }
}

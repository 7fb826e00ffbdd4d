//! XLSX workbook codec.
//!
//! Decoding flattens each worksheet into a [`SpreadsheetTable`] of display
//! strings and remembers which cells were numbers or booleans. Encoding writes
//! those cells back with their original type as long as their text is
//! unchanged; everything else is written as a string. Formatting, formulas,
//! and charts are not carried over.

use std::collections::HashMap;
use std::io::Cursor;

use calamine::{open_workbook_from_rs, Data, Reader, Xlsx};
use rust_xlsxwriter::Workbook as XlsxWorkbook;

use crate::error::{RemediationError, Result};
use crate::table::SpreadsheetTable;

/// MIME type of an `.xlsx` document.
pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Original type of a non-text cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TypedValue {
    /// Numeric cell (dates are kept as their serial number).
    Number(f64),
    /// Boolean cell.
    Bool(bool),
}

#[derive(Debug, Clone, PartialEq)]
struct TypedCell {
    text: String,
    value: TypedValue,
}

/// One named worksheet.
#[derive(Debug, Clone, PartialEq)]
pub struct Worksheet {
    name: String,
    table: SpreadsheetTable,
    typed: HashMap<(usize, usize), TypedCell>,
}

impl Worksheet {
    /// Creates a worksheet whose cells are all text.
    #[must_use]
    pub fn new(name: impl Into<String>, table: SpreadsheetTable) -> Self {
        Self {
            name: name.into(),
            table,
            typed: HashMap::new(),
        }
    }

    /// Sheet name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Cell text.
    #[must_use]
    pub fn table(&self) -> &SpreadsheetTable {
        &self.table
    }

    /// Mutable cell text.
    pub fn table_mut(&mut self) -> &mut SpreadsheetTable {
        &mut self.table
    }

    /// Original type of a cell, if it was decoded as a number or boolean.
    #[must_use]
    pub fn typed_value(&self, row: usize, column: usize) -> Option<TypedValue> {
        self.typed.get(&(row, column)).map(|cell| cell.value)
    }
}

/// Ordered worksheets of one document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Workbook {
    sheets: Vec<Worksheet>,
}

impl Workbook {
    /// Creates a workbook from worksheets.
    #[must_use]
    pub fn new(sheets: Vec<Worksheet>) -> Self {
        Self { sheets }
    }

    /// All worksheets in document order.
    #[must_use]
    pub fn sheets(&self) -> &[Worksheet] {
        &self.sheets
    }

    /// Resolves the worksheet to remediate: the named one, or the first.
    ///
    /// # Errors
    ///
    /// Returns `RemediationError::Parse` if the named sheet does not exist or
    /// the workbook has no sheets.
    pub fn select_sheet_mut(&mut self, name: Option<&str>) -> Result<&mut Worksheet> {
        match name {
            Some(name) => self
                .sheets
                .iter_mut()
                .find(|sheet| sheet.name == name)
                .ok_or_else(|| RemediationError::parse(format!("worksheet not found: {name}"))),
            None => self
                .sheets
                .first_mut()
                .ok_or_else(|| RemediationError::parse("workbook has no worksheets")),
        }
    }
}

/// Reads and writes `.xlsx` documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct XlsxCodec;

impl XlsxCodec {
    /// Decodes an `.xlsx` document.
    ///
    /// # Errors
    ///
    /// Returns `RemediationError::Parse` if the bytes are not a readable workbook.
    pub fn decode(bytes: &[u8]) -> Result<Workbook> {
        let mut source: Xlsx<_> = open_workbook_from_rs(Cursor::new(bytes))
            .map_err(|e| RemediationError::parse(format!("failed to open workbook: {e}")))?;

        let mut sheets = Vec::new();
        for name in source.sheet_names() {
            let range = source.worksheet_range(&name).map_err(|e| {
                RemediationError::parse(format!("failed to read worksheet {name}: {e}"))
            })?;

            let (row_offset, col_offset) = range.start().unwrap_or((0, 0));
            let row_offset = row_offset as usize;
            let col_offset = col_offset as usize;

            let mut rows: Vec<Vec<String>> = Vec::new();
            let mut typed = HashMap::new();
            for (row, col, cell) in range.cells() {
                let (text, value) = match cell {
                    Data::Empty => continue,
                    Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => {
                        (s.clone(), None)
                    }
                    Data::Float(f) => (f.to_string(), Some(TypedValue::Number(*f))),
                    #[allow(clippy::cast_precision_loss)]
                    Data::Int(i) => (i.to_string(), Some(TypedValue::Number(*i as f64))),
                    Data::Bool(b) => (b.to_string(), Some(TypedValue::Bool(*b))),
                    Data::DateTime(dt) => {
                        let serial = dt.as_f64();
                        (serial.to_string(), Some(TypedValue::Number(serial)))
                    }
                    other => (other.to_string(), None),
                };

                let row = row_offset + row;
                let col = col_offset + col;
                if rows.len() <= row {
                    rows.resize_with(row + 1, Vec::new);
                }
                if rows[row].len() <= col {
                    rows[row].resize(col + 1, String::new());
                }
                if let Some(value) = value {
                    typed.insert(
                        (row, col),
                        TypedCell {
                            text: text.clone(),
                            value,
                        },
                    );
                }
                rows[row][col] = text;
            }

            sheets.push(Worksheet {
                name,
                table: SpreadsheetTable::new(rows),
                typed,
            });
        }

        Ok(Workbook { sheets })
    }

    /// Encodes a workbook as `.xlsx`.
    ///
    /// # Errors
    ///
    /// Returns `RemediationError::Encode` if a sheet name is invalid, a cell is
    /// out of the format's bounds, or serialization fails.
    pub fn encode(workbook: &Workbook) -> Result<Vec<u8>> {
        let mut out = XlsxWorkbook::new();

        for sheet in &workbook.sheets {
            let worksheet = out.add_worksheet();
            worksheet
                .set_name(&sheet.name)
                .map_err(|e| RemediationError::encode(format!("sheet name error: {e}")))?;

            for (row, cells) in sheet.table.rows().iter().enumerate() {
                for (col, text) in cells.iter().enumerate() {
                    if text.is_empty() {
                        continue;
                    }
                    let (r, c) = position(row, col)?;
                    let written = match sheet.typed.get(&(row, col)) {
                        Some(typed) if typed.text == *text => match typed.value {
                            TypedValue::Number(n) => worksheet.write_number(r, c, n),
                            TypedValue::Bool(b) => worksheet.write_boolean(r, c, b),
                        },
                        _ => worksheet.write_string(r, c, text),
                    };
                    written.map_err(|e| {
                        RemediationError::encode(format!("failed to write cell ({row}, {col}): {e}"))
                    })?;
                }
            }
        }

        out.save_to_buffer()
            .map_err(|e| RemediationError::encode(format!("failed to serialize workbook: {e}")))
    }
}

fn position(row: usize, col: usize) -> Result<(u32, u16)> {
    let r = u32::try_from(row)
        .map_err(|_| RemediationError::encode(format!("row {row} out of range")))?;
    let c = u16::try_from(col)
        .map_err(|_| RemediationError::encode(format!("column {col} out of range")))?;
    Ok((r, c))
}

//! Worksheet row iterator.
//!
//! Streams `<row>`/`<c>` elements out of a worksheet part without loading
//! the whole sheet, padding skipped row numbers with empty rows and
//! missing columns within a row with `Null` so row numbering and column
//! alignment stay correct even over sparse sheets.

use crate::config::ReaderConfig;
use crate::error::Result;
use crate::row::{column_letter, parse_cell_ref, CellValue, Row};
use crate::shared_strings::SharedStringsStore;
use crate::styles::Styles;
use crate::xmlreader::{NsId, XmlPullReader};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CellType {
    SharedString,
    InlineString,
    FormulaString,
    Boolean,
    Error,
    Number,
}

impl CellType {
    fn from_attr(t: Option<&str>) -> Self {
        match t {
            Some("s") => CellType::SharedString,
            Some("inlineStr") => CellType::InlineString,
            Some("str") => CellType::FormulaString,
            Some("b") => CellType::Boolean,
            Some("e") => CellType::Error,
            _ => CellType::Number,
        }
    }
}

/// Pull-parses a single worksheet part, one row at a time.
pub struct Worksheet {
    path: PathBuf,
    reader: Option<XmlPullReader>,
    next_row_num: u32,
    /// Row number of a `<row>` start tag already consumed from the
    /// stream but not yet due (rows between it and `next_row_num` are
    /// synthesized as empty).
    pending_row: Option<u32>,
}

impl Worksheet {
    pub fn open(path: &Path) -> Result<Self> {
        let mut ws = Worksheet {
            path: path.to_path_buf(),
            reader: None,
            next_row_num: 1,
            pending_row: None,
        };
        ws.rewind()?;
        Ok(ws)
    }

    /// Reset iteration to the first row.
    pub fn rewind(&mut self) -> Result<()> {
        let mut reader = XmlPullReader::open(&self.path)?;
        reader.next_ns("sheetData", Some(NsId::XlsxMain))?;
        self.reader = Some(reader);
        self.next_row_num = 1;
        self.pending_row = None;
        Ok(())
    }

    /// Pull the next row, if any, along with its 1-based row number.
    pub fn next(
        &mut self,
        shared_strings: &mut SharedStringsStore,
        styles: &mut Styles,
        config: &ReaderConfig,
    ) -> Result<Option<(u32, Row)>> {
        if let Some(pending) = self.pending_row {
            if pending > self.next_row_num {
                let row_num = self.next_row_num;
                self.next_row_num += 1;
                return Ok(Some((row_num, Row::new())));
            }
            self.pending_row = None;
            let row_num = pending;
            self.next_row_num = row_num + 1;
            let row = self.parse_row_body(shared_strings, styles, config)?;
            return Ok(Some((row_num, row)));
        }

        let Some(reader) = self.reader.as_mut() else {
            return Ok(None);
        };

        loop {
            if !reader.read()? {
                return Ok(None);
            }
            if reader.matches_element("sheetData", Some(NsId::XlsxMain)) && reader.is_closing_tag() {
                return Ok(None);
            }
            if reader.matches_element("row", Some(NsId::XlsxMain)) && reader.is_opening_tag() {
                let row_num = reader
                    .attribute("r", None)
                    .and_then(|s| s.parse::<u32>().ok())
                    .unwrap_or(self.next_row_num);
                let span_width = reader.attribute("spans", None).and_then(|s| span_upper_bound(&s));
                let self_closing = reader.is_empty_element();
                if row_num > self.next_row_num {
                    self.pending_row = Some(row_num);
                    let emitted = self.next_row_num;
                    self.next_row_num += 1;
                    return Ok(Some((emitted, Row::new())));
                }
                self.next_row_num = row_num + 1;
                let row = if self_closing {
                    build_row(Vec::new(), span_width.unwrap_or(0), config)?
                } else {
                    self.parse_row_body(shared_strings, styles, config, span_width)?
                };
                return Ok(Some((row_num, row)));
            }
        }
    }

    fn parse_row_body(
        &mut self,
        shared_strings: &mut SharedStringsStore,
        styles: &mut Styles,
        config: &ReaderConfig,
        span_width: Option<usize>,
    ) -> Result<Row> {
        let mut cells: Vec<(usize, CellValue)> = Vec::new();
        let mut max_col = span_width.unwrap_or(0);

        let reader = self.reader.as_mut().expect("reader open while parsing row");
        loop {
            if !reader.read()? {
                break;
            }
            if reader.matches_element("row", Some(NsId::XlsxMain)) && reader.is_closing_tag() {
                break;
            }
            if !(reader.matches_element("c", Some(NsId::XlsxMain)) && reader.is_opening_tag()) {
                continue;
            }

            let cell_ref = reader.attribute("r", None);
            let cell_type = CellType::from_attr(reader.attribute("t", None).as_deref());
            let style_index = reader
                .attribute("s", None)
                .and_then(|s| s.parse::<usize>().ok())
                .unwrap_or(0);
            let col_index = cell_ref
                .as_deref()
                .and_then(parse_cell_ref)
                .map(|(c, _)| c)
                .unwrap_or(cells.len());
            let self_closing = reader.is_empty_element();

            // A self-closing `<c r="B1" s="4"/>` has no `<v>`/`<t>` body to
            // read; its value is always Null (blank, possibly styled, cell).
            let value = if self_closing {
                CellValue::Null
            } else {
                self.parse_cell_value(cell_type, style_index, shared_strings, styles, config)?
            };
            max_col = max_col.max(col_index + 1);
            cells.push((col_index, value));
        }

        build_row(cells, max_col, config)
    }

    fn parse_cell_value(
        &mut self,
        cell_type: CellType,
        style_index: usize,
        shared_strings: &mut SharedStringsStore,
        styles: &mut Styles,
        config: &ReaderConfig,
    ) -> Result<CellValue> {
        let reader = self.reader.as_mut().expect("reader open while parsing cell");
        let mut raw_value: Option<String> = None;
        let mut inline_text = String::new();
        let mut in_inline_text = false;

        loop {
            if !reader.read()? {
                break;
            }
            if reader.matches_element("c", Some(NsId::XlsxMain)) && reader.is_closing_tag() {
                break;
            }
            if reader.matches_element("v", Some(NsId::XlsxMain)) && !reader.is_closing_tag() {
                reader.read()?;
                if !reader.is_eof() {
                    raw_value = Some(reader.text().to_string());
                }
                continue;
            }
            if reader.matches_element("t", Some(NsId::XlsxMain)) {
                if reader.is_closing_tag() {
                    in_inline_text = false;
                } else {
                    in_inline_text = true;
                }
                continue;
            }
            if in_inline_text {
                inline_text.push_str(reader.text());
            }
        }

        match cell_type {
            CellType::InlineString => Ok(CellValue::Text(inline_text)),
            CellType::SharedString => match raw_value.and_then(|v| v.parse::<usize>().ok()) {
                Some(idx) => Ok(CellValue::Text(shared_strings.get(idx)?)),
                None => Ok(CellValue::Null),
            },
            CellType::FormulaString => Ok(match raw_value {
                Some(v) => CellValue::Text(v),
                None => CellValue::Null,
            }),
            CellType::Boolean => Ok(match raw_value.as_deref() {
                Some("1") => CellValue::Bool(true),
                Some("0") => CellValue::Bool(false),
                _ => CellValue::Null,
            }),
            CellType::Error => Ok(match raw_value {
                Some(v) => CellValue::Error(v),
                None => CellValue::Null,
            }),
            CellType::Number => match raw_value.and_then(|v| v.parse::<f64>().ok()) {
                Some(n) => Ok(styles.format_value(n, style_index, config).into()),
                None => Ok(CellValue::Null),
            },
        }
    }
}

/// Parses the upper bound `b` out of a `spans="a:b"` attribute, returning
/// it as a column count (`b`, not `b - 1`). `spans` is only a lower bound
/// on row width; a present cell past it still widens the row.
fn span_upper_bound(spans: &str) -> Option<usize> {
    let (_, b) = spans.split_once(':')?;
    b.trim().parse().ok()
}

fn build_row(cells: Vec<(usize, CellValue)>, max_col: usize, config: &ReaderConfig) -> Result<Row> {
    let mut row = Row::new();
    if config.skip_empty_cells {
        let all_null = cells.iter().all(|(_, v)| matches!(v, CellValue::Null));
        if cells.is_empty() || all_null {
            row.insert(key_for(0, config), CellValue::Null);
            return Ok(row);
        }
        for (idx, value) in cells {
            if matches!(value, CellValue::Null) {
                continue;
            }
            row.insert(key_for(idx, config), value);
        }
        return Ok(row);
    }

    let mut slots: Vec<CellValue> = (0..max_col).map(|_| CellValue::Null).collect();
    for (idx, value) in cells {
        if idx >= slots.len() {
            slots.resize(idx + 1, CellValue::Null);
        }
        slots[idx] = value;
    }
    for (idx, value) in slots.into_iter().enumerate() {
        row.insert(key_for(idx, config), value);
    }
    Ok(row)
}

fn key_for(idx: usize, config: &ReaderConfig) -> String {
    if config.output_column_names {
        column_letter(idx)
    } else {
        idx.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_sheet(xml: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("sheet1.xml");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(xml.as_bytes()).unwrap();
        (dir, path)
    }

    const SHEET_NS: &str = r#"xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main""#;

    #[test]
    fn parses_contiguous_rows_with_inline_and_shared_strings() {
        let xml = format!(
            r#"<worksheet {ns}><sheetData>
                <row r="1"><c r="A1" t="s"><v>0</v></c><c r="B1"><v>3.5</v></c></row>
                <row r="2"><c r="A2" t="inlineStr"><is><t>hi</t></is></c></row>
            </sheetData></worksheet>"#,
            ns = SHEET_NS
        );
        let (_dir, path) = write_sheet(&xml);
        let mut ws = Worksheet::open(&path).unwrap();
        let mut strings = SharedStringsStore::empty();
        let mut styles = Styles::empty();
        let cfg = ReaderConfig::default();

        let (n, row) = ws.next(&mut strings, &mut styles, &cfg).unwrap().unwrap();
        assert_eq!(n, 1);
        assert_eq!(row.get("1"), Some(&CellValue::Number(3.5)));

        let (n, row) = ws.next(&mut strings, &mut styles, &cfg).unwrap().unwrap();
        assert_eq!(n, 2);
        assert_eq!(row.get("0"), Some(&CellValue::Text("hi".to_string())));

        assert!(ws.next(&mut strings, &mut styles, &cfg).unwrap().is_none());
    }

    #[test]
    fn pads_skipped_row_numbers_with_empty_rows() {
        let xml = format!(
            r#"<worksheet {ns}><sheetData>
                <row r="3"><c r="A3"><v>1</v></c></row>
            </sheetData></worksheet>"#,
            ns = SHEET_NS
        );
        let (_dir, path) = write_sheet(&xml);
        let mut ws = Worksheet::open(&path).unwrap();
        let mut strings = SharedStringsStore::empty();
        let mut styles = Styles::empty();
        let cfg = ReaderConfig::default();

        let (n, row) = ws.next(&mut strings, &mut styles, &cfg).unwrap().unwrap();
        assert_eq!(n, 1);
        assert!(row.is_empty());

        let (n, row) = ws.next(&mut strings, &mut styles, &cfg).unwrap().unwrap();
        assert_eq!(n, 2);
        assert!(row.is_empty());

        let (n, row) = ws.next(&mut strings, &mut styles, &cfg).unwrap().unwrap();
        assert_eq!(n, 3);
        assert_eq!(row.get("0"), Some(&CellValue::Number(1.0)));
    }

    #[test]
    fn pads_sparse_columns_within_a_row() {
        let xml = format!(
            r#"<worksheet {ns}><sheetData>
                <row r="1"><c r="C1"><v>9</v></c></row>
            </sheetData></worksheet>"#,
            ns = SHEET_NS
        );
        let (_dir, path) = write_sheet(&xml);
        let mut ws = Worksheet::open(&path).unwrap();
        let mut strings = SharedStringsStore::empty();
        let mut styles = Styles::empty();
        let cfg = ReaderConfig::default();

        let (_, row) = ws.next(&mut strings, &mut styles, &cfg).unwrap().unwrap();
        assert_eq!(row.len(), 3);
        assert_eq!(row.get("0"), Some(&CellValue::Null));
        assert_eq!(row.get("1"), Some(&CellValue::Null));
        assert_eq!(row.get("2"), Some(&CellValue::Number(9.0)));
    }

    #[test]
    fn output_column_names_remaps_keys_to_letters() {
        let xml = format!(
            r#"<worksheet {ns}><sheetData>
                <row r="1"><c r="B1"><v>1</v></c></row>
            </sheetData></worksheet>"#,
            ns = SHEET_NS
        );
        let (_dir, path) = write_sheet(&xml);
        let mut ws = Worksheet::open(&path).unwrap();
        let mut strings = SharedStringsStore::empty();
        let mut styles = Styles::empty();
        let mut cfg = ReaderConfig::default();
        cfg.output_column_names = true;

        let (_, row) = ws.next(&mut strings, &mut styles, &cfg).unwrap().unwrap();
        assert_eq!(row.get("B"), Some(&CellValue::Number(1.0)));
    }

    #[test]
    fn spans_widens_row_below_the_max_present_cell() {
        let xml = format!(
            r#"<worksheet {ns}><sheetData>
                <row r="1" spans="1:5"><c r="A1"><v>1</v></c><c r="C1"><v>2</v></c><c r="E1"><v>3</v></c></row>
            </sheetData></worksheet>"#,
            ns = SHEET_NS
        );
        let (_dir, path) = write_sheet(&xml);
        let mut ws = Worksheet::open(&path).unwrap();
        let mut strings = SharedStringsStore::empty();
        let mut styles = Styles::empty();
        let cfg = ReaderConfig::default();

        let (_, row) = ws.next(&mut strings, &mut styles, &cfg).unwrap().unwrap();
        assert_eq!(row.len(), 5);
        assert_eq!(row.get("0"), Some(&CellValue::Number(1.0)));
        assert_eq!(row.get("1"), Some(&CellValue::Null));
        assert_eq!(row.get("2"), Some(&CellValue::Number(2.0)));
        assert_eq!(row.get("3"), Some(&CellValue::Null));
        assert_eq!(row.get("4"), Some(&CellValue::Number(3.0)));
    }

    #[test]
    fn spans_lower_bound_does_not_shrink_a_wider_row() {
        let xml = format!(
            r#"<worksheet {ns}><sheetData>
                <row r="1" spans="1:1"><c r="A1"><v>1</v></c><c r="D1"><v>2</v></c></row>
            </sheetData></worksheet>"#,
            ns = SHEET_NS
        );
        let (_dir, path) = write_sheet(&xml);
        let mut ws = Worksheet::open(&path).unwrap();
        let mut strings = SharedStringsStore::empty();
        let mut styles = Styles::empty();
        let cfg = ReaderConfig::default();

        let (_, row) = ws.next(&mut strings, &mut styles, &cfg).unwrap().unwrap();
        assert_eq!(row.len(), 4);
        assert_eq!(row.get("3"), Some(&CellValue::Number(2.0)));
    }

    #[test]
    fn skip_empty_cells_drops_gaps_but_keeps_a_single_null_for_a_fully_empty_row() {
        let xml = format!(
            r#"<worksheet {ns}><sheetData>
                <row r="1" spans="1:5"><c r="A1"><v>1</v></c><c r="C1"><v>2</v></c></row>
                <row r="2"/>
            </sheetData></worksheet>"#,
            ns = SHEET_NS
        );
        let (_dir, path) = write_sheet(&xml);
        let mut ws = Worksheet::open(&path).unwrap();
        let mut strings = SharedStringsStore::empty();
        let mut styles = Styles::empty();
        let mut cfg = ReaderConfig::default();
        cfg.skip_empty_cells = true;

        let (_, row) = ws.next(&mut strings, &mut styles, &cfg).unwrap().unwrap();
        assert_eq!(row.len(), 2);
        assert_eq!(row.get("0"), Some(&CellValue::Number(1.0)));
        assert_eq!(row.get("2"), Some(&CellValue::Number(2.0)));

        let (_, row) = ws.next(&mut strings, &mut styles, &cfg).unwrap().unwrap();
        assert_eq!(row.len(), 1);
        assert_eq!(row.get("0"), Some(&CellValue::Null));
    }

    #[test]
    fn self_closing_row_is_not_silently_dropped() {
        let xml = format!(
            r#"<worksheet {ns}><sheetData>
                <row r="1"><c r="A1"><v>1</v></c></row>
                <row r="2" spans="1:1"/>
                <row r="3"><c r="A3"><v>3</v></c></row>
            </sheetData></worksheet>"#,
            ns = SHEET_NS
        );
        let (_dir, path) = write_sheet(&xml);
        let mut ws = Worksheet::open(&path).unwrap();
        let mut strings = SharedStringsStore::empty();
        let mut styles = Styles::empty();
        let cfg = ReaderConfig::default();

        let (n, row) = ws.next(&mut strings, &mut styles, &cfg).unwrap().unwrap();
        assert_eq!(n, 1);
        assert_eq!(row.get("0"), Some(&CellValue::Number(1.0)));

        let (n, row) = ws.next(&mut strings, &mut styles, &cfg).unwrap().unwrap();
        assert_eq!(n, 2);
        assert_eq!(row.len(), 1);
        assert_eq!(row.get("0"), Some(&CellValue::Null));

        let (n, row) = ws.next(&mut strings, &mut styles, &cfg).unwrap().unwrap();
        assert_eq!(n, 3);
        assert_eq!(row.get("0"), Some(&CellValue::Number(3.0)));

        assert!(ws.next(&mut strings, &mut styles, &cfg).unwrap().is_none());
    }

    #[test]
    fn self_closing_blank_cell_is_null_and_still_widens_the_row() {
        let xml = format!(
            r#"<worksheet {ns}><sheetData>
                <row r="1"><c r="A1"><v>1</v></c><c r="C1" s="2"/></row>
            </sheetData></worksheet>"#,
            ns = SHEET_NS
        );
        let (_dir, path) = write_sheet(&xml);
        let mut ws = Worksheet::open(&path).unwrap();
        let mut strings = SharedStringsStore::empty();
        let mut styles = Styles::empty();
        let cfg = ReaderConfig::default();

        let (_, row) = ws.next(&mut strings, &mut styles, &cfg).unwrap().unwrap();
        assert_eq!(row.len(), 3);
        assert_eq!(row.get("0"), Some(&CellValue::Number(1.0)));
        assert_eq!(row.get("1"), Some(&CellValue::Null));
        assert_eq!(row.get("2"), Some(&CellValue::Null));
    }

    #[test]
    fn rewind_restarts_from_first_row() {
        let xml = format!(
            r#"<worksheet {ns}><sheetData>
                <row r="1"><c r="A1"><v>1</v></c></row>
                <row r="2"><c r="A2"><v>2</v></c></row>
            </sheetData></worksheet>"#,
            ns = SHEET_NS
        );
        let (_dir, path) = write_sheet(&xml);
        let mut ws = Worksheet::open(&path).unwrap();
        let mut strings = SharedStringsStore::empty();
        let mut styles = Styles::empty();
        let cfg = ReaderConfig::default();

        ws.next(&mut strings, &mut styles, &cfg).unwrap();
        ws.next(&mut strings, &mut styles, &cfg).unwrap();
        assert!(ws.next(&mut strings, &mut styles, &cfg).unwrap().is_none());

        ws.rewind().unwrap();
        let (n, _) = ws.next(&mut strings, &mut styles, &cfg).unwrap().unwrap();
        assert_eq!(n, 1);
    }
}

//! The public reader façade: opens an `.xlsx` package, extracts the parts
//! it needs into a scratch directory, and exposes a cursor-style
//! iterator over each sheet's rows.

use crate::config::ReaderConfig;
use crate::error::{ExcelError, Result};
use crate::package::{self, PackageRelationships};
use crate::row::Row;
use crate::shared_strings::SharedStringsStore;
use crate::styles::Styles;
use crate::worksheet::Worksheet;
use crate::xmlreader::{NsId, XmlPullReader};
use rand::Rng;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write as _;
use std::path::{Path, PathBuf};
use zip::ZipArchive;

struct SheetMeta {
    name: String,
    rel_id: String,
}

/// Read-only metadata for one sheet, in the order returned by [`ExcelReader::sheets`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetInfo {
    name: String,
}

impl SheetInfo {
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Pull-style reader over a single `.xlsx` workbook. Cursor operations
/// (`rewind`/`next`/`current`/`key`) mirror the teacher's original
/// `RowIterator`, generalized to read real OOXML instead of going
/// through `calamine`.
pub struct ExcelReader {
    temp_dir: PathBuf,
    config: ReaderConfig,
    shared_strings: SharedStringsStore,
    styles: Styles,
    sheets: Vec<SheetMeta>,
    sheet_paths: HashMap<String, PathBuf>,
    current_sheet_index: usize,
    worksheet: Option<Worksheet>,
    current: Option<(u32, Row)>,
}

impl ExcelReader {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_config(path, ReaderConfig::default())
    }

    pub fn open_with_config<P: AsRef<Path>>(path: P, config: ReaderConfig) -> Result<Self> {
        config.validate()?;

        let file = File::open(path.as_ref())?;
        let mut zip = ZipArchive::new(file)?;
        let relationships: PackageRelationships = package::resolve(&mut zip)?;

        let base_temp = config.temp_dir.clone().unwrap_or_else(std::env::temp_dir);
        let temp_dir = unique_subdir(&base_temp)?;

        let workbook_path = relationships
            .workbook
            .as_ref()
            .ok_or_else(|| ExcelError::CorruptPackage("workbook relationship missing".into()))?
            .original_path
            .clone();
        let workbook_bytes = package::read_entry(&mut zip, &workbook_path)?;
        let sheets = parse_workbook_sheets(workbook_bytes)?;
        if sheets.is_empty() {
            let _ = fs::remove_dir_all(&temp_dir);
            return Err(ExcelError::CorruptPackage(
                "workbook declares no sheets".into(),
            ));
        }

        let shared_strings_path = match &relationships.shared_strings {
            Some(rel) if rel.valid => {
                let bytes = package::read_entry(&mut zip, &rel.original_path)?;
                Some(extract_to(&temp_dir, "sharedStrings.xml", &bytes)?)
            }
            _ => None,
        };
        let shared_strings = match &shared_strings_path {
            Some(p) => {
                SharedStringsStore::prepare(p, &temp_dir, &config.shared_strings_configuration)?
            }
            None => SharedStringsStore::empty(),
        };

        let styles_path = match &relationships.styles {
            Some(rel) if rel.valid => {
                let bytes = package::read_entry(&mut zip, &rel.original_path)?;
                Some(extract_to(&temp_dir, "styles.xml", &bytes)?)
            }
            _ => None,
        };
        let styles = Styles::load(styles_path.as_deref())?;

        let mut sheet_paths = HashMap::new();
        for (idx, meta) in sheets.iter().enumerate() {
            let Some(rel) = relationships.worksheets.get(&meta.rel_id) else {
                continue;
            };
            if !rel.valid {
                continue;
            }
            let bytes = package::read_entry(&mut zip, &rel.original_path)?;
            let extracted = extract_to(&temp_dir, &format!("sheet{idx}.xml"), &bytes)?;
            sheet_paths.insert(meta.rel_id.clone(), extracted);
        }

        let mut reader = ExcelReader {
            temp_dir,
            config,
            shared_strings,
            styles,
            sheets,
            sheet_paths,
            current_sheet_index: 0,
            worksheet: None,
            current: None,
        };
        if !reader.change_sheet(0)? {
            let _ = fs::remove_dir_all(&reader.temp_dir);
            return Err(ExcelError::CorruptPackage(
                "first sheet's worksheet part is missing or invalid".into(),
            ));
        }
        Ok(reader)
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn sheet_count(&self) -> usize {
        self.sheets.len()
    }

    /// The ordered sheet metadata list built at `open` time.
    pub fn sheets(&self) -> Vec<SheetInfo> {
        self.sheets
            .iter()
            .map(|s| SheetInfo {
                name: s.name.clone(),
            })
            .collect()
    }

    /// Switches the active sheet, extracting it (if not already
    /// extracted) and rewinding its iterator. An out-of-range `index`
    /// returns `Ok(false)` and leaves the active sheet untouched — this
    /// is a negative result, not an error. A genuine I/O or XML failure
    /// while opening the target worksheet still propagates as `Err`.
    pub fn change_sheet(&mut self, index: usize) -> Result<bool> {
        let Some(meta) = self.sheets.get(index) else {
            return Ok(false);
        };
        let Some(path) = self.sheet_paths.get(&meta.rel_id).cloned() else {
            return Ok(false);
        };
        self.worksheet = Some(Worksheet::open(&path)?);
        self.current_sheet_index = index;
        self.current = None;
        Ok(true)
    }

    /// As [`Self::change_sheet`], looked up by sheet name instead of index.
    pub fn change_sheet_by_name(&mut self, name: &str) -> Result<bool> {
        let Some(idx) = self.sheets.iter().position(|s| s.name == name) else {
            return Ok(false);
        };
        self.change_sheet(idx)
    }

    pub fn current_sheet_name(&self) -> Option<&str> {
        self.sheets
            .get(self.current_sheet_index)
            .map(|s| s.name.as_str())
    }

    pub fn rewind(&mut self) -> Result<()> {
        if let Some(ws) = self.worksheet.as_mut() {
            ws.rewind()?;
        }
        self.current = None;
        Ok(())
    }

    pub fn next(&mut self) -> Result<bool> {
        let Some(ws) = self.worksheet.as_mut() else {
            self.current = None;
            return Ok(false);
        };
        self.current = ws.next(&mut self.shared_strings, &mut self.styles, &self.config)?;
        Ok(self.current.is_some())
    }

    pub fn current(&self) -> Option<&Row> {
        self.current.as_ref().map(|(_, row)| row)
    }

    pub fn key(&self) -> Option<u32> {
        self.current.as_ref().map(|(n, _)| *n)
    }

    pub fn valid(&self) -> bool {
        self.current.is_some()
    }

    /// Count the remaining rows on the current sheet, restoring the
    /// cursor to its current position afterwards.
    pub fn count(&mut self) -> Result<u64> {
        self.rewind()?;
        let mut count = 0u64;
        while self.next()? {
            count += 1;
        }
        self.rewind()?;
        Ok(count)
    }

    pub fn close(&mut self) {
        self.worksheet = None;
        self.shared_strings.close();
        if self.temp_dir.exists() {
            let _ = fs::remove_dir_all(&self.temp_dir);
        }
    }
}

impl Drop for ExcelReader {
    fn drop(&mut self) {
        self.close();
    }
}

fn unique_subdir(base: &Path) -> Result<PathBuf> {
    fs::create_dir_all(base)?;
    for _ in 0..8 {
        let tag: String = (0..8)
            .map(|_| {
                const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
                ALPHABET[rand::thread_rng().gen_range(0..ALPHABET.len())] as char
            })
            .collect();
        let candidate = base.join(format!("xlsxstream-{tag}"));
        if !candidate.exists() {
            fs::create_dir_all(&candidate)?;
            return Ok(candidate);
        }
    }
    Err(ExcelError::CorruptPackage(
        "could not allocate a scratch directory".into(),
    ))
}

fn extract_to(dir: &Path, name: &str, bytes: &[u8]) -> Result<PathBuf> {
    let path = dir.join(name);
    let mut f = File::create(&path)?;
    f.write_all(bytes)?;
    Ok(path)
}

fn parse_workbook_sheets(bytes: Vec<u8>) -> Result<Vec<SheetMeta>> {
    let mut reader = XmlPullReader::xml(bytes);
    let mut sheets = Vec::new();
    while reader.read()? {
        if reader.matches_element("sheet", Some(NsId::XlsxMain)) && reader.is_opening_tag() {
            let name = reader.attribute("name", None).unwrap_or_default();
            let rel_id = reader
                .attribute("id", Some(NsId::RelDoc))
                .unwrap_or_default();
            if !rel_id.is_empty() {
                sheets.push(SheetMeta { name, rel_id });
            }
        }
    }
    sheets.sort_by_key(|s| rid_numeric_suffix(&s.rel_id));
    Ok(sheets)
}

/// Numeric suffix of a relationship id such as `"rId12"` -> `12`. Falls
/// back to `u64::MAX` for malformed ids so they sort last instead of
/// panicking the comparison.
fn rid_numeric_suffix(rel_id: &str) -> u64 {
    rel_id
        .trim_start_matches(|c: char| !c.is_ascii_digit())
        .parse()
        .unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row::CellValue;
    use std::io::Write as _;
    use zip::write::SimpleFileOptions;

    fn build_workbook(path: &Path) {
        let file = File::create(path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let opts = SimpleFileOptions::default();

        zip.start_file("_rels/.rels", opts).unwrap();
        zip.write_all(
            br#"<?xml version="1.0"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>
</Relationships>"#,
        )
        .unwrap();

        zip.start_file("xl/workbook.xml", opts).unwrap();
        zip.write_all(
            br#"<?xml version="1.0"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
<sheets><sheet name="Sheet1" sheetId="1" r:id="rId1"/></sheets>
</workbook>"#,
        )
        .unwrap();

        zip.start_file("xl/_rels/workbook.xml.rels", opts).unwrap();
        zip.write_all(
            br#"<?xml version="1.0"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>
<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/sharedStrings" Target="sharedStrings.xml"/>
</Relationships>"#,
        )
        .unwrap();

        zip.start_file("xl/worksheets/sheet1.xml", opts).unwrap();
        zip.write_all(
            br#"<?xml version="1.0"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
<sheetData>
<row r="1"><c r="A1" t="s"><v>0</v></c><c r="B1"><v>2</v></c></row>
</sheetData>
</worksheet>"#,
        )
        .unwrap();

        zip.start_file("xl/sharedStrings.xml", opts).unwrap();
        zip.write_all(
            br#"<?xml version="1.0"?>
<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="1" uniqueCount="1">
<si><t>hello</t></si>
</sst>"#,
        )
        .unwrap();

        zip.finish().unwrap();
    }

    #[test]
    fn opens_and_iterates_a_minimal_workbook() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("book.xlsx");
        build_workbook(&path);

        let mut reader = ExcelReader::open(&path).unwrap();
        assert_eq!(reader.sheet_names(), vec!["Sheet1"]);
        assert!(reader.next().unwrap());
        assert_eq!(reader.key(), Some(1));
        assert_eq!(
            reader.current().unwrap().get("0"),
            Some(&CellValue::Text("hello".to_string()))
        );
        assert_eq!(
            reader.current().unwrap().get("1"),
            Some(&CellValue::Number(2.0))
        );
        assert!(!reader.next().unwrap());
    }

    #[test]
    fn unknown_sheet_name_is_not_found() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("book.xlsx");
        build_workbook(&path);
        let mut reader = ExcelReader::open(&path).unwrap();
        let current = reader.current_sheet_name().map(str::to_string);
        assert!(!reader.change_sheet_by_name("NoSuchSheet").unwrap());
        assert_eq!(reader.current_sheet_name().map(str::to_string), current);
    }

    #[test]
    fn count_restores_cursor_position() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("book.xlsx");
        build_workbook(&path);
        let mut reader = ExcelReader::open(&path).unwrap();
        assert_eq!(reader.count().unwrap(), 1);
        assert!(reader.next().unwrap());
        assert_eq!(reader.key(), Some(1));
    }
}

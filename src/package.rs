//! Package relationship resolution.
//!
//! Walks `_rels/.rels` to find the workbook part, then
//! `xl/_rels/workbook.xml.rels` to find the worksheet, shared-strings, and
//! styles parts it references.

use crate::error::{ExcelError, Result};
use crate::xmlreader::XmlPullReader;
use std::collections::HashMap;
use std::io::{Read, Seek};
use zip::ZipArchive;

const REL_OFFICE_DOCUMENT: &str = "officeDocument";
const REL_WORKSHEET: &str = "worksheet";
const REL_SHARED_STRINGS: &str = "sharedStrings";
const REL_STYLES: &str = "styles";

/// One resolved entry from a `.rels` file: its id, the package-internal
/// path it points at, an optional on-disk path once extracted, and
/// whether the target was actually present in the zip.
#[derive(Debug, Clone)]
pub struct RelationshipElement {
    pub id: String,
    pub original_path: String,
    pub access_path: Option<String>,
    pub valid: bool,
}

/// The subset of the relationship graph this crate needs: the workbook
/// part, and the worksheet/shared-strings/styles parts it references.
#[derive(Debug, Default)]
pub struct PackageRelationships {
    pub workbook: Option<RelationshipElement>,
    pub worksheets: HashMap<String, RelationshipElement>,
    pub shared_strings: Option<RelationshipElement>,
    pub styles: Option<RelationshipElement>,
}

/// Given an in-package path, the path of the `.rels` file that describes
/// it.
pub fn rels_path_for(package_path: &str) -> String {
    if package_path.is_empty() {
        return "_rels/.rels".to_string();
    }
    if let Some(stripped) = package_path.strip_suffix('/') {
        return format!("{stripped}/_rels/.rels");
    }
    match package_path.rfind('/') {
        Some(idx) => {
            let (dir, file) = package_path.split_at(idx);
            let file = &file[1..];
            format!("{dir}/_rels/{file}.rels")
        }
        None => format!("_rels/{package_path}.rels"),
    }
}

fn dir_of(package_path: &str) -> &str {
    match package_path.rfind('/') {
        Some(idx) => &package_path[..idx],
        None => "",
    }
}

fn normalize_target(referring_dir: &str, target: &str) -> String {
    let target = target.replace('\\', "/");
    if let Some(stripped) = target.strip_prefix('/') {
        return stripped.to_string();
    }
    let mut stack: Vec<&str> = if referring_dir.is_empty() {
        Vec::new()
    } else {
        referring_dir.split('/').collect()
    };
    for seg in target.split('/') {
        match seg {
            "" | "." => continue,
            ".." => {
                stack.pop();
            }
            other => stack.push(other),
        }
    }
    stack.join("/")
}

fn entry_exists<R: Read + Seek>(zip: &mut ZipArchive<R>, path: &str) -> bool {
    zip.by_name(path).is_ok()
}

pub(crate) fn read_entry<R: Read + Seek>(zip: &mut ZipArchive<R>, path: &str) -> Result<Vec<u8>> {
    let mut file = zip
        .by_name(path)
        .map_err(|e| ExcelError::CorruptPackage(format!("missing part '{path}': {e}")))?;
    let mut buf = Vec::with_capacity(file.size() as usize);
    file.read_to_end(&mut buf)?;
    Ok(buf)
}

/// Parse one `.rels` document into `(id, type-suffix, normalized target)`
/// triples. The namespace is deliberately not enforced here: real-world
/// packages are consistent about using an unprefixed default namespace on
/// `<Relationships>`, and the element/attribute names are unambiguous.
fn parse_rels(bytes: Vec<u8>, referring_dir: &str) -> Result<Vec<(String, String, String)>> {
    let mut reader = XmlPullReader::xml(bytes);
    let mut out = Vec::new();
    while reader.read()? {
        if !reader.matches_element("Relationship", None) {
            continue;
        }
        let id = reader.attribute("Id", None).unwrap_or_default();
        let rel_type = reader.attribute("Type", None).unwrap_or_default();
        let target = reader.attribute("Target", None).unwrap_or_default();
        if id.is_empty() || target.is_empty() {
            continue;
        }
        let suffix = rel_type.rsplit('/').next().unwrap_or_default().to_string();
        out.push((id, suffix, normalize_target(referring_dir, &target)));
    }
    Ok(out)
}

/// Resolve the full relationship graph this crate needs from an open zip.
pub fn resolve<R: Read + Seek>(zip: &mut ZipArchive<R>) -> Result<PackageRelationships> {
    let root_rels_bytes = read_entry(zip, "_rels/.rels")?;
    let root_rels = parse_rels(root_rels_bytes, "")?;

    let workbook_path = root_rels
        .iter()
        .find(|(_, suffix, _)| suffix == REL_OFFICE_DOCUMENT)
        .map(|(_, _, target)| target.clone())
        .ok_or_else(|| {
            ExcelError::CorruptPackage("no officeDocument relationship in package".into())
        })?;

    if !entry_exists(zip, &workbook_path) {
        return Err(ExcelError::CorruptPackage(format!(
            "workbook part '{workbook_path}' missing from package"
        )));
    }

    let mut result = PackageRelationships {
        workbook: Some(RelationshipElement {
            id: "workbook".to_string(),
            original_path: workbook_path.clone(),
            access_path: None,
            valid: true,
        }),
        ..Default::default()
    };

    let workbook_dir = dir_of(&workbook_path).to_string();
    let workbook_rels_path = rels_path_for(&workbook_path);
    let workbook_rels_bytes = match read_entry(zip, &workbook_rels_path) {
        Ok(b) => b,
        Err(_) => return Ok(result),
    };

    for (id, suffix, target) in parse_rels(workbook_rels_bytes, &workbook_dir)? {
        let valid = entry_exists(zip, &target);
        let element = RelationshipElement {
            id: id.clone(),
            original_path: target,
            access_path: None,
            valid,
        };
        match suffix.as_str() {
            REL_WORKSHEET => {
                result.worksheets.insert(id, element);
            }
            REL_SHARED_STRINGS => result.shared_strings = Some(element),
            REL_STYLES => result.styles = Some(element),
            _ => {}
        }
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rels_path_for_root() {
        assert_eq!(rels_path_for(""), "_rels/.rels");
    }

    #[test]
    fn rels_path_for_nested_file() {
        assert_eq!(
            rels_path_for("xl/workbook.xml"),
            "xl/_rels/workbook.xml.rels"
        );
    }

    #[test]
    fn normalize_relative_and_absolute_targets() {
        assert_eq!(
            normalize_target("xl", "worksheets/sheet1.xml"),
            "xl/worksheets/sheet1.xml"
        );
        assert_eq!(normalize_target("xl", "/xl/styles.xml"), "xl/styles.xml");
        assert_eq!(
            normalize_target("xl/worksheets", "../styles.xml"),
            "xl/styles.xml"
        );
    }

    #[test]
    fn parses_relationship_entries() {
        let xml = br#"<?xml version="1.0"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>
</Relationships>"#;
        let parsed = parse_rels(xml.to_vec(), "").unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].0, "rId1");
        assert_eq!(parsed[0].1, "officeDocument");
        assert_eq!(parsed[0].2, "xl/workbook.xml");
    }
}

//! Shared-strings store: a bounded RAM cache plus seek-optimized spill
//! files, falling back to re-scanning `sharedStrings.xml` when neither
//! holds the requested index.
//!
//! Grounded on the teacher's own `load_shared_strings` (a flat in-RAM
//! table) generalized to the tiered cache/spill/fallback design, using
//! the namespaced pull reader from [`crate::xmlreader`] in place of the
//! teacher's substring search.

use crate::config::SharedStringsConfiguration;
use crate::error::Result;
use crate::xmlreader::{NsId, XmlPullReader};
use rand::Rng;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// A spill file: `optimized_file_entry_count` shared strings, one JSON
/// string per line, named with its starting index and a random tag.
struct OptimizedFile {
    path: PathBuf,
    first_index: usize,
    handle: Option<BufReader<File>>,
    current_line_index: i64,
    current_value: String,
}

struct XmlFallback {
    reader: XmlPullReader,
    current_index: i64,
    current_value: String,
}

pub struct SharedStringsStore {
    total_count: usize,
    cache: Vec<String>,
    use_optimized_files: bool,
    keep_file_handles: bool,
    spill_files: Vec<OptimizedFile>,
    xml_path: Option<PathBuf>,
    fallback: Option<XmlFallback>,
}

fn random_tag() -> String {
    const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut rng = rand::thread_rng();
    (0..5)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

/// Minimal JSON string encode/decode so spill-file lines round-trip
/// arbitrary text (including embedded newlines) as exactly one line.
fn json_encode_str(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn json_decode_str(s: &str) -> Option<String> {
    let s = s.trim();
    let inner = s.strip_prefix('"')?.strip_suffix('"')?;
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next()? {
            '"' => out.push('"'),
            '\\' => out.push('\\'),
            '/' => out.push('/'),
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            'u' => {
                let hex: String = (0..4).filter_map(|_| chars.next()).collect();
                let code = u32::from_str_radix(&hex, 16).ok()?;
                out.push(char::from_u32(code)?);
            }
            _ => return None,
        }
    }
    Some(out)
}

struct WritingSpill {
    path: PathBuf,
    first_index: usize,
    count: usize,
    writer: BufWriter<File>,
}

impl SharedStringsStore {
    /// An empty store: used when a package has no shared-strings part.
    pub fn empty() -> Self {
        SharedStringsStore {
            total_count: 0,
            cache: Vec::new(),
            use_optimized_files: false,
            keep_file_handles: false,
            spill_files: Vec::new(),
            xml_path: None,
            fallback: None,
        }
    }

    /// Prescan `xml_path` (an already-extracted `sharedStrings.xml`),
    /// populating the RAM cache and/or spill files per `config`.
    pub fn prepare(
        xml_path: &Path,
        temp_dir: &Path,
        config: &SharedStringsConfiguration,
    ) -> Result<Self> {
        let mut store = SharedStringsStore {
            total_count: 0,
            cache: Vec::new(),
            use_optimized_files: config.use_optimized_files,
            keep_file_handles: config.keep_file_handles,
            spill_files: Vec::new(),
            xml_path: Some(xml_path.to_path_buf()),
            fallback: None,
        };

        let mut reader = XmlPullReader::open(xml_path)?;
        if !reader.next_ns("sst", Some(NsId::XlsxMain))? {
            return Ok(store);
        }
        let unique_count: usize = reader
            .attribute("uniqueCount", None)
            .and_then(|s| s.parse().ok())
            .unwrap_or(0);
        store.total_count = unique_count;
        if unique_count == 0 {
            log::debug!("shared strings: uniqueCount=0, skipping prescan");
            return Ok(store);
        }
        log::debug!("shared strings: prescanning {unique_count} entries");

        let cache_budget_bytes = config.cache_size_kilobyte * 1024;
        let mut write_to_cache = config.use_cache;
        let mut cache_bytes = 0usize;
        let mut index = 0usize;
        let mut in_si = false;
        let mut current_value = String::new();
        let mut current_spill: Option<WritingSpill> = None;

        while reader.read()? {
            if reader.matches_element("si", Some(NsId::XlsxMain)) {
                if reader.is_empty_element() {
                    // `<si/>` with no `<t>`/`<r>` children at all: an empty string.
                    Self::route_entry(
                        &mut store,
                        &mut write_to_cache,
                        &mut cache_bytes,
                        cache_budget_bytes,
                        config,
                        temp_dir,
                        &mut current_spill,
                        index,
                        "",
                    )?;
                    index += 1;
                } else if reader.is_closing_tag() {
                    if in_si {
                        in_si = false;
                        Self::route_entry(
                            &mut store,
                            &mut write_to_cache,
                            &mut cache_bytes,
                            cache_budget_bytes,
                            config,
                            temp_dir,
                            &mut current_spill,
                            index,
                            &current_value,
                        )?;
                        index += 1;
                    }
                } else {
                    in_si = true;
                    current_value.clear();
                }
                continue;
            }
            if in_si && reader.matches_element("t", Some(NsId::XlsxMain)) && !reader.is_closing_tag()
            {
                if reader.read()? && !reader.is_closing_tag() {
                    current_value.push_str(reader.text());
                }
            }
        }

        if let Some(spill) = current_spill {
            store.spill_files.push(OptimizedFile {
                path: spill.path,
                first_index: spill.first_index,
                handle: None,
                current_line_index: -1,
                current_value: String::new(),
            });
        }
        store.spill_files.sort_by_key(|f| f.first_index);
        Ok(store)
    }

    #[allow(clippy::too_many_arguments)]
    fn route_entry(
        store: &mut Self,
        write_to_cache: &mut bool,
        cache_bytes: &mut usize,
        cache_budget_bytes: usize,
        config: &SharedStringsConfiguration,
        temp_dir: &Path,
        current_spill: &mut Option<WritingSpill>,
        index: usize,
        value: &str,
    ) -> Result<()> {
        if *write_to_cache {
            let prospective = *cache_bytes + value.len();
            if prospective > cache_budget_bytes {
                *write_to_cache = false;
                log::debug!("shared strings: cache budget exceeded at index {index}, spilling remainder");
            } else {
                store.cache.push(value.to_string());
                *cache_bytes = prospective;
                return Ok(());
            }
        }

        if !config.use_optimized_files {
            return Ok(());
        }

        let needs_new = match current_spill {
            None => true,
            Some(s) => s.count >= config.optimized_file_entry_count,
        };
        if needs_new {
            if let Some(finished) = current_spill.take() {
                store.spill_files.push(OptimizedFile {
                    path: finished.path,
                    first_index: finished.first_index,
                    handle: None,
                    current_line_index: -1,
                    current_value: String::new(),
                });
            }
            let name = format!("sst_{}_{}.jsonl", index, random_tag());
            let path = temp_dir.join(name);
            let writer = BufWriter::new(File::create(&path)?);
            *current_spill = Some(WritingSpill {
                path,
                first_index: index,
                count: 0,
                writer,
            });
        }

        let spill = current_spill.as_mut().unwrap();
        writeln!(spill.writer, "{}", json_encode_str(value))?;
        spill.count += 1;
        Ok(())
    }

    /// Resolve a shared-string index to its value.
    pub fn get(&mut self, target_index: usize) -> Result<String> {
        if self.total_count > 0 && target_index >= self.total_count {
            return Ok(String::new());
        }
        if target_index < self.cache.len() {
            return Ok(self.cache[target_index].clone());
        }
        if self.use_optimized_files {
            if let Some(pos) = self
                .spill_files
                .iter()
                .rposition(|f| f.first_index <= target_index)
            {
                if let Some(value) = self.read_from_spill(pos, target_index)? {
                    return Ok(value);
                }
            }
        }
        self.read_from_xml_fallback(target_index)
    }

    fn read_from_spill(&mut self, file_idx: usize, target_index: usize) -> Result<Option<String>> {
        let keep_handles = self.keep_file_handles;
        let f = &mut self.spill_files[file_idx];
        let local_target = (target_index - f.first_index) as i64;

        if f.current_line_index == local_target {
            return Ok(Some(f.current_value.clone()));
        }

        let mut handle = match f.handle.take() {
            Some(h) if f.current_line_index <= local_target => h,
            _ => {
                f.current_line_index = -1;
                BufReader::new(File::open(&f.path)?)
            }
        };

        let mut line = String::new();
        let result = loop {
            line.clear();
            let n = handle.read_line(&mut line)?;
            if n == 0 {
                break None;
            }
            f.current_line_index += 1;
            if f.current_line_index == local_target {
                break json_decode_str(&line);
            }
        };

        if let Some(ref v) = result {
            f.current_value = v.clone();
        }
        if keep_handles {
            f.handle = Some(handle);
        }
        Ok(result)
    }

    fn read_from_xml_fallback(&mut self, target_index: usize) -> Result<String> {
        let Some(xml_path) = self.xml_path.clone() else {
            return Ok(String::new());
        };
        if self.fallback.is_none() {
            self.fallback = Some(XmlFallback {
                reader: XmlPullReader::open(&xml_path)?,
                current_index: -1,
                current_value: String::new(),
            });
        }

        {
            let fb = self.fallback.as_ref().unwrap();
            if fb.current_index == target_index as i64 {
                let v = fb.current_value.clone();
                if !self.keep_file_handles {
                    self.fallback = None;
                }
                return Ok(v);
            }
        }

        if self.fallback.as_ref().unwrap().current_index > target_index as i64 {
            let fb = self.fallback.as_mut().unwrap();
            fb.reader = XmlPullReader::open(&xml_path)?;
            fb.current_index = -1;
        }

        let mut found: Option<String> = None;
        loop {
            let fb = self.fallback.as_mut().unwrap();
            if !fb.reader.next_ns("si", Some(NsId::XlsxMain))? {
                break;
            }
            fb.current_index += 1;
            let mut value = String::new();
            // A self-closing `<si/>` has no `<t>` children at all (an empty
            // string) and no separate closing event to scan for.
            if !fb.reader.is_empty_element() {
                loop {
                    if !fb.reader.read()? {
                        break;
                    }
                    if fb.reader.matches_element("si", Some(NsId::XlsxMain)) && fb.reader.is_closing_tag()
                    {
                        break;
                    }
                    if fb.reader.matches_element("t", Some(NsId::XlsxMain)) && !fb.reader.is_closing_tag()
                    {
                        if fb.reader.read()? && !fb.reader.is_closing_tag() {
                            value.push_str(fb.reader.text());
                        }
                    }
                }
            }
            if fb.current_index == target_index as i64 {
                fb.current_value = value.clone();
                found = Some(value);
                break;
            }
        }

        if !self.keep_file_handles {
            self.fallback = None;
        }
        Ok(found.unwrap_or_default())
    }

    /// All spill files created during the prescan, for the façade to
    /// register with its temp-directory cleanup.
    pub fn temp_files(&self) -> Vec<PathBuf> {
        self.spill_files.iter().map(|f| f.path.clone()).collect()
    }

    /// Drop open handles without unlinking files.
    pub fn close(&mut self) {
        for f in &mut self.spill_files {
            f.handle = None;
            f.current_line_index = -1;
        }
        self.fallback = None;
    }
}

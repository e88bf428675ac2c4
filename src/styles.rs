//! Styles / number-format engine.
//!
//! Loads `numFmts`/`cellXfs` from `styles.xml` and compiles number-format
//! codes into a small set of renderers (text, percentage, date/time,
//! euro, fraction, generic number), caching the compiled form per
//! `numFmtId`. The compilation pipeline and the date-token substitution
//! table are grounded on `sheetkit-core`'s `numfmt.rs` (section-splitting
//! on `;` respecting quotes, compile-once-cache-by-id, conditional
//! bracket stripping), adapted to this crate's own token-substitution
//! scheme rather than sheetkit's literal month/weekday tables.

use crate::config::ReaderConfig;
use crate::error::Result;
use crate::xmlreader::{NsId, XmlPullReader};
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Timelike};
use std::collections::HashMap;
use std::path::Path;

/// How a compiled number-format section renders a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FormatKind {
    Text,
    Percentage,
    DateTime,
    Euro,
    Fraction,
    Number,
}

/// A compiled section of a (possibly multi-section) number format.
#[derive(Debug, Clone)]
struct ParsedSection {
    kind: FormatKind,
    currency: Option<String>,
    /// The section uses a bare `$` literal (builtin ids 5-8, 41-44)
    /// rather than a `[$XXX-locale]` bracket, so the currency label
    /// comes from `ReaderConfig::currency_code` at render time.
    dollar_literal: bool,
    scale: f64,
    thousands: bool,
    min_width: usize,
    decimals: usize,
    date_pattern: String,
    max_denominator: u32,
    fraction_has_digits: bool,
}

/// A fully compiled number format: one [`ParsedSection`] per `;`-delimited
/// section, selected at render time by the value's sign.
#[derive(Debug, Clone)]
struct CompiledFormat {
    sections: Vec<ParsedSection>,
}

/// Resolution of one `cellXfs` entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StyleRef {
    NoFormat,
    General,
    NumFmt(u32),
}

/// A number value formatted per the resolved style.
#[derive(Debug, Clone, PartialEq)]
pub enum FormattedValue {
    /// No format code applies (General, unset, or a quote-prefixed text
    /// cell): the raw numeric value, untouched.
    Number(f64),
    Text(String),
    DateTime(NaiveDateTime),
}

pub struct Styles {
    custom_formats: HashMap<u32, String>,
    xfs: Vec<StyleRef>,
    compiled: HashMap<u32, CompiledFormat>,
}

impl Styles {
    pub fn empty() -> Self {
        Styles {
            custom_formats: HashMap::new(),
            xfs: Vec::new(),
            compiled: HashMap::new(),
        }
    }

    /// Load `numFmts`/`cellXfs` from an extracted `styles.xml`, if present.
    pub fn load(xml_path: Option<&Path>) -> Result<Self> {
        let mut styles = Styles::empty();
        let Some(path) = xml_path else {
            return Ok(styles);
        };
        if !path.exists() {
            return Ok(styles);
        }

        let mut reader = XmlPullReader::open(path)?;
        let mut in_cell_xfs = false;
        while reader.read()? {
            if reader.matches_element("numFmt", Some(NsId::XlsxMain)) && reader.is_opening_tag() {
                if let (Some(id), Some(code)) = (
                    reader.attribute("numFmtId", None),
                    reader.attribute("formatCode", None),
                ) {
                    if let Ok(id) = id.parse::<u32>() {
                        styles.custom_formats.insert(id, code);
                    }
                }
                continue;
            }
            if reader.matches_element("cellXfs", Some(NsId::XlsxMain)) {
                in_cell_xfs = !reader.is_closing_tag();
                continue;
            }
            if in_cell_xfs
                && reader.matches_element("xf", Some(NsId::XlsxMain))
                && reader.is_opening_tag()
            {
                let num_fmt_id = reader
                    .attribute("numFmtId", None)
                    .and_then(|s| s.parse::<u32>().ok());
                let applies = reader
                    .attribute("applyNumberFormat", None)
                    .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                    .unwrap_or(true);
                let quote_prefix = reader
                    .attribute("quotePrefix", None)
                    .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                    .unwrap_or(false);

                let style_ref = match num_fmt_id {
                    Some(id) if applies => StyleRef::NumFmt(id),
                    _ if quote_prefix => StyleRef::NoFormat,
                    _ => StyleRef::General,
                };
                styles.xfs.push(style_ref);
            }
        }
        Ok(styles)
    }

    pub fn style_at(&self, index: usize) -> StyleRef {
        self.xfs.get(index).copied().unwrap_or(StyleRef::General)
    }

    fn resolve_code(&self, id: u32, overrides: &HashMap<u32, String>) -> Option<String> {
        if let Some(builtin) = builtin_format_code(id) {
            return Some(overrides.get(&id).cloned().unwrap_or_else(|| builtin.to_string()));
        }
        self.custom_formats.get(&id).cloned()
    }

    fn compiled(&mut self, id: u32, overrides: &HashMap<u32, String>) -> Option<&CompiledFormat> {
        if !self.compiled.contains_key(&id) {
            let code = self.resolve_code(id, overrides)?;
            log::trace!("styles: compiling number format id={id} code={code:?}");
            self.compiled.insert(id, CompiledFormat::compile(&code));
        }
        self.compiled.get(&id)
    }

    /// Format a numeric cell value according to its resolved style.
    pub fn format_value(&mut self, value: f64, style_index: usize, cfg: &ReaderConfig) -> FormattedValue {
        match self.style_at(style_index) {
            StyleRef::NoFormat => FormattedValue::Number(value),
            StyleRef::General => FormattedValue::Number(value),
            StyleRef::NumFmt(id) => match self.compiled(id, &cfg.customized_formats) {
                Some(compiled) => compiled.apply(value, cfg),
                None => FormattedValue::Number(value),
            },
        }
    }
}

fn general_format(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

/// Standard Excel builtin number-format codes (ids 0-49 that are defined;
/// undefined ids in this range fall through to `General`).
fn builtin_format_code(id: u32) -> Option<&'static str> {
    Some(match id {
        0 => "General",
        1 => "0",
        2 => "0.00",
        3 => "#,##0",
        4 => "#,##0.00",
        5 => "$#,##0_);($#,##0)",
        6 => "$#,##0_);[Red]($#,##0)",
        7 => "$#,##0.00_);($#,##0.00)",
        8 => "$#,##0.00_);[Red]($#,##0.00)",
        9 => "0%",
        10 => "0.00%",
        11 => "0.00E+00",
        12 => "# ?/?",
        13 => "# ??/??",
        14 => "mm-dd-yy",
        15 => "d-mmm-yy",
        16 => "d-mmm",
        17 => "mmm-yy",
        18 => "h:mm AM/PM",
        19 => "h:mm:ss AM/PM",
        20 => "h:mm",
        21 => "h:mm:ss",
        22 => "m/d/yy h:mm",
        37 => "#,##0_);(#,##0)",
        38 => "#,##0_);[Red](#,##0)",
        39 => "#,##0.00_);(#,##0.00)",
        40 => "#,##0.00_);[Red](#,##0.00)",
        45 => "mm:ss",
        46 => "[h]:mm:ss",
        47 => "mm:ss.0",
        48 => "##0.0E+0",
        49 => "@",
        _ => return None,
    })
}

impl CompiledFormat {
    fn compile(code: &str) -> Self {
        let sections = split_sections(code)
            .into_iter()
            .map(|s| compile_section(&s))
            .collect();
        CompiledFormat { sections }
    }

    fn pick_section(&self, value: f64) -> Option<&ParsedSection> {
        match self.sections.len() {
            0 => None,
            1 => self.sections.first(),
            2 => self.sections.get(if value < 0.0 { 1 } else { 0 }),
            _ => {
                let idx = if value < 0.0 {
                    1
                } else if value == 0.0 {
                    2
                } else {
                    0
                };
                self.sections.get(idx).or_else(|| self.sections.first())
            }
        }
    }

    fn apply(&self, value: f64, cfg: &ReaderConfig) -> FormattedValue {
        match self.pick_section(value) {
            Some(section) => render(section, value, cfg),
            None => FormattedValue::Number(value),
        }
    }
}

fn split_sections(code: &str) -> Vec<String> {
    let mut sections = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut bracket_depth = 0i32;
    let mut chars = code.chars();
    while let Some(c) = chars.next() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            '[' if !in_quotes => {
                bracket_depth += 1;
                current.push(c);
            }
            ']' if !in_quotes => {
                bracket_depth -= 1;
                current.push(c);
            }
            '\\' if !in_quotes => {
                current.push(c);
                if let Some(n) = chars.next() {
                    current.push(n);
                }
            }
            ';' if !in_quotes && bracket_depth == 0 => {
                sections.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }
    sections.push(current);
    sections
}

/// Strip `[Color]`/`[condition]` brackets, capturing a `[$XXX-locale]`
/// currency code if present.
fn strip_brackets(section: &str) -> (String, Option<String>) {
    let mut out = String::new();
    let mut currency = None;
    let mut chars = section.chars();
    while let Some(c) = chars.next() {
        if c == '[' {
            let mut content = String::new();
            for c2 in chars.by_ref() {
                if c2 == ']' {
                    break;
                }
                content.push(c2);
            }
            if let Some(rest) = content.strip_prefix('$') {
                let code = rest.split('-').next().unwrap_or("").to_string();
                if !code.is_empty() {
                    currency = Some(code);
                }
            }
            continue;
        }
        out.push(c);
    }
    (out, currency)
}

fn strip_quoted(s: &str) -> String {
    let mut out = String::new();
    let mut in_quotes = false;
    for c in s.chars() {
        if c == '"' {
            in_quotes = !in_quotes;
            continue;
        }
        if !in_quotes {
            out.push(c);
        }
    }
    out
}

fn classify(stripped: &str) -> FormatKind {
    let trimmed = stripped.trim();
    if trimmed == "@" {
        return FormatKind::Text;
    }
    if trimmed.ends_with('%') {
        return FormatKind::Percentage;
    }
    let unquoted = strip_quoted(trimmed).to_lowercase();
    if unquoted.contains("am/pm") || unquoted.chars().any(|c| matches!(c, 'y' | 'd' | 'h')) {
        return FormatKind::DateTime;
    }
    if trimmed.contains('?') && trimmed.contains('/') {
        return FormatKind::Fraction;
    }
    FormatKind::Number
}

fn compile_section(raw: &str) -> ParsedSection {
    let (stripped, currency) = strip_brackets(raw);
    let mut kind = classify(&stripped);
    // `strip_brackets` already consumed a `[$eUR ]`-style literal into
    // `currency` before `classify` ever sees the text, so the euro check
    // has to happen here rather than inside `classify`.
    if kind == FormatKind::Number {
        if let Some(cur) = &currency {
            if cur.to_lowercase().contains("eur") {
                kind = FormatKind::Euro;
            }
        }
    }
    let mut out = ParsedSection {
        kind,
        currency,
        dollar_literal: false,
        scale: 1.0,
        thousands: false,
        min_width: 0,
        decimals: 0,
        date_pattern: String::new(),
        max_denominator: 0,
        fraction_has_digits: false,
    };
    match kind {
        FormatKind::DateTime => {
            out.date_pattern = compile_date_pattern(&stripped);
        }
        FormatKind::Percentage => {
            out.decimals = count_decimals_before(&stripped, '%');
        }
        FormatKind::Fraction => {
            let denom_qs = stripped
                .rsplit('/')
                .next()
                .unwrap_or("")
                .chars()
                .filter(|c| *c == '?')
                .count()
                .max(1) as u32;
            out.max_denominator = 10u32.pow(denom_qs) - 1;
            out.fraction_has_digits = stripped.chars().any(|c| c == '0' || c == '#')
                || stripped.trim_start().starts_with("? ");
        }
        FormatKind::Number | FormatKind::Euro => compile_number(&stripped, &mut out),
        FormatKind::Text => {}
    }
    out
}

fn count_decimals_before(s: &str, marker: char) -> usize {
    let Some(end) = s.find(marker) else { return 0 };
    let Some(dot) = s[..end].rfind('.') else {
        return 0;
    };
    s[dot + 1..end].chars().filter(|c| *c == '0').count()
}

fn compile_number(code: &str, out: &mut ParsedSection) {
    let cleaned: String = code.chars().filter(|&c| c != '_' && c != '*').collect();
    out.thousands = cleaned.contains("#,#") || cleaned.contains("0,0") || cleaned.contains(",0");
    out.dollar_literal = out.currency.is_none() && cleaned.contains('$');

    let digit_end = cleaned
        .rfind(|c| c == '0' || c == '#')
        .map(|i| i + 1)
        .unwrap_or(cleaned.len());
    let trailing = &cleaned[digit_end..];
    let comma_count = trailing.chars().take_while(|c| *c == ',').count();
    out.scale = 1000f64.powi(comma_count as i32);

    if let Some(dot) = cleaned.find('.') {
        out.min_width = cleaned[..dot].chars().filter(|c| *c == '0').count();
        out.decimals = cleaned[dot + 1..]
            .chars()
            .take_while(|c| *c == '0' || *c == '#')
            .filter(|c| *c == '0')
            .count();
    } else {
        out.min_width = cleaned.chars().filter(|c| *c == '0').count();
        out.decimals = 0;
    }
    if out.min_width == 0 {
        out.min_width = 1;
    }
}

/// The internal date-token substitution table (section 4.4): maps `yyyy`,
/// `mm`, `dd`, `h`, ... runs to single output letters, longest-match
/// first so e.g. `yyyy` is consumed before `yy`.
///
/// Each run is first swapped for a private-use-area sentinel rather than
/// straight to its output letter, and only the sentinels are mapped to
/// output letters in one final pass. Substituting straight to output
/// letters would let a later, shorter pass re-match an earlier
/// substitution's result (`mm` -> `m` immediately re-consumed by the
/// following `m` -> `n` pass, collapsing every padded month/day to its
/// unpadded form); sentinels outside the token alphabet can't be
/// re-matched by any later `replace` call.
fn compile_date_pattern(code: &str) -> String {
    let mut s = code.to_lowercase();
    s = s.replace('\\', "");
    s = s.replace("am/pm", "\u{E000}");
    s = s.replace("yyyy", "\u{E001}");
    s = s.replace("yy", "\u{E002}");
    s = s.replace("mmmmm", "\u{E003}");
    s = s.replace("mmmm", "\u{E004}");
    s = s.replace("mmm", "\u{E005}");
    s = s.replace(":mm", ":\u{E006}");
    s = s.replace("mm", "\u{E007}");
    s = s.replace('m', "\u{E008}");
    s = s.replace("dddd", "\u{E009}");
    s = s.replace("ddd", "\u{E00A}");
    s = s.replace("dd", "\u{E00B}");
    s = s.replace('d', "\u{E00C}");
    s = s.replace("ss", "\u{E00D}");
    s = s.replace(".s", "");

    if s.contains('\u{E000}') {
        s = s.replace("hh", "h");
        s = s.replace('h', "G");
    } else {
        s = s.replace("hh", "H");
        s = s.replace('h', "G");
    }

    s.replace('\u{E000}', "A")
        .replace('\u{E001}', "Y")
        .replace('\u{E002}', "y")
        .replace('\u{E003}', "M")
        .replace('\u{E004}', "F")
        .replace('\u{E005}', "M")
        .replace('\u{E006}', "i")
        .replace('\u{E007}', "m")
        .replace('\u{E008}', "n")
        .replace('\u{E009}', "l")
        .replace('\u{E00A}', "D")
        .replace('\u{E00B}', "d")
        .replace('\u{E00C}', "j")
        .replace('\u{E00D}', "s")
}

fn serial_to_datetime(value: f64) -> NaiveDateTime {
    let base = NaiveDate::from_ymd_opt(1899, 12, 30)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    let mut days = value.floor();
    if days > 60.0 {
        days -= 1.0;
    }
    let frac = value - value.floor();
    let seconds = (frac * 86400.0).round() as i64;
    base + Duration::days(days as i64) + Duration::seconds(seconds)
}

fn render(section: &ParsedSection, value: f64, cfg: &ReaderConfig) -> FormattedValue {
    match section.kind {
        FormatKind::Text => FormattedValue::Text(general_format(value)),
        FormatKind::Percentage => {
            // `f64` display formatting rounds half-to-even on the binary
            // value, not half-away-from-zero on the decimal digits (e.g.
            // `format!("{:.0}", 12.5)` prints "12"). Round explicitly at
            // the section's decimal precision first so ties round away
            // from zero the way the format code's digit count implies.
            let factor = 10f64.powi(section.decimals as i32);
            let rounded = (value * 100.0 * factor).round() / factor;
            FormattedValue::Text(format!("{:.*}%", section.decimals, rounded))
        }
        FormatKind::Euro => FormattedValue::Text(format!("EUR {value:.2}")),
        FormatKind::Fraction => FormattedValue::Text(render_fraction(value, section)),
        FormatKind::Number => FormattedValue::Text(render_number(value, section, cfg)),
        FormatKind::DateTime => render_datetime(value, section, cfg),
    }
}

fn render_fraction(value: f64, section: &ParsedSection) -> String {
    let sign = if value < 0.0 { "-" } else { "" };
    let value = value.abs();
    let integer_part = value.floor();
    let frac = value - integer_part;
    let int = integer_part as i64;
    if frac < 1e-9 {
        return format!("{sign}{int}");
    }
    let max_den = section.max_denominator.max(1);
    let (num, den) = best_fraction(frac, max_den);
    let g = gcd(num.max(1), den).max(1);
    let (num, den) = (num / g, den / g);
    if int != 0 && section.fraction_has_digits {
        format!("{sign}{int} {num}/{den}")
    } else if int != 0 {
        format!("{sign}{}/{den}", int as u64 * den as u64 + num as u64)
    } else {
        format!("{sign}{num}/{den}")
    }
}

fn best_fraction(frac: f64, max_den: u32) -> (u32, u32) {
    let mut best = (frac.round() as u32, 1u32);
    let mut best_err = (frac - best.0 as f64).abs();
    for den in 1..=max_den {
        let num = (frac * den as f64).round() as u32;
        let err = (frac - num as f64 / den as f64).abs();
        if err < best_err {
            best_err = err;
            best = (num, den);
        }
    }
    best
}

fn gcd(a: u32, b: u32) -> u32 {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}

fn render_number(value: f64, section: &ParsedSection, cfg: &ReaderConfig) -> String {
    let scaled = value / section.scale;
    let sign = if scaled < 0.0 { "-" } else { "" };
    let scaled = scaled.abs();
    let formatted = format!("{:.*}", section.decimals, scaled);
    let (mut int_part, frac_part) = match formatted.split_once('.') {
        Some((i, f)) => (i.to_string(), f.to_string()),
        None => (formatted, String::new()),
    };
    while int_part.len() < section.min_width {
        int_part.insert(0, '0');
    }
    if section.thousands {
        int_part = group_thousands(&int_part, cfg.thousand_separator);
    }
    let mut out = String::new();
    if let Some(cur) = &section.currency {
        out.push_str(cur);
        out.push(' ');
    } else if section.dollar_literal {
        out.push_str(&cfg.currency_code);
        out.push(' ');
    }
    out.push_str(sign);
    out.push_str(&int_part);
    if section.decimals > 0 {
        out.push(cfg.decimal_separator);
        out.push_str(&frac_part);
    }
    out
}

fn group_thousands(digits: &str, sep: char) -> String {
    let chars: Vec<char> = digits.chars().collect();
    let len = chars.len();
    let mut out = String::with_capacity(len + len / 3);
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push(sep);
        }
        out.push(*c);
    }
    out
}

fn render_datetime(value: f64, section: &ParsedSection, cfg: &ReaderConfig) -> FormattedValue {
    let dt = serial_to_datetime(value);
    if cfg.return_date_time_objects {
        return FormattedValue::DateTime(dt);
    }
    let has_date = section.date_pattern.chars().any(|c| "YyMFnlDdj".contains(c));
    let has_time = section.date_pattern.chars().any(|c| "HhGiAs".contains(c));
    let forced = match (has_date, has_time) {
        (true, true) => cfg.force_datetime_format.as_deref(),
        (true, false) => cfg.force_date_format.as_deref(),
        (false, true) => cfg.force_time_format.as_deref(),
        (false, false) => None,
    };
    match forced {
        Some(pattern) => FormattedValue::Text(render_force_pattern(pattern, dt)),
        None => FormattedValue::Text(render_internal_pattern(&section.date_pattern, dt)),
    }
}

/// Render the internally compiled pattern (letters produced by
/// [`compile_date_pattern`]).
fn render_internal_pattern(pattern: &str, dt: NaiveDateTime) -> String {
    let mut out = String::with_capacity(pattern.len());
    for c in pattern.chars() {
        match c {
            'Y' => out.push_str(&format!("{:04}", dt.year())),
            'y' => out.push_str(&format!("{:02}", dt.year() % 100)),
            'F' => out.push_str(month_name(dt.month())),
            'M' => out.push_str(&month_name(dt.month())[..3.min(month_name(dt.month()).len())]),
            'n' => out.push_str(&dt.month().to_string()),
            'm' => out.push_str(&format!("{:02}", dt.month())),
            'l' => out.push_str(weekday_name(dt)),
            'D' => out.push_str(&weekday_name(dt)[..3.min(weekday_name(dt).len())]),
            'd' => out.push_str(&format!("{:02}", dt.day())),
            'j' => out.push_str(&dt.day().to_string()),
            'i' => out.push_str(&format!("{:02}", dt.minute())),
            's' => out.push_str(&format!("{:02}", dt.second())),
            'H' => out.push_str(&format!("{:02}", dt.hour())),
            'G' => {
                let h12 = match dt.hour() % 12 {
                    0 => 12,
                    h => h,
                };
                out.push_str(&h12.to_string());
            }
            'A' => out.push_str(if dt.hour() < 12 { "AM" } else { "PM" }),
            other => out.push(other),
        }
    }
    out
}

/// Render a user-supplied `force_*_format` string. Unlike the internal
/// compiled pattern, repetition here signals zero-padding (`d`/`dd`,
/// `m`/`mm`, `y`/`yyyy`), matching the literal example in the testable
/// properties: `force_date_format="d.m.Y"` on day 1 renders `"1"`, not
/// `"01"`.
fn render_force_pattern(pattern: &str, dt: NaiveDateTime) -> String {
    let mut out = String::new();
    let chars: Vec<char> = pattern.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        let run_len = chars[i..].iter().take_while(|&&x| x == c).count();
        let padded = run_len >= 2;
        match c {
            // A capital `Y` always means the full 4-digit year, even as a
            // single letter (the spec's own `force_date_format="d.m.Y"`
            // example expects `2021`, not `21`). Lowercase `y` follows the
            // repetition-signals-padding scheme: `y`/`yy` -> 2 digits,
            // `yyyy` (or more) -> 4 digits.
            'Y' => out.push_str(&format!("{:04}", dt.year())),
            'y' => {
                if run_len >= 4 {
                    out.push_str(&format!("{:04}", dt.year()));
                } else {
                    out.push_str(&format!("{:02}", dt.year() % 100));
                }
            }
            'M' | 'm' => {
                out.push_str(&if padded {
                    format!("{:02}", dt.month())
                } else {
                    dt.month().to_string()
                });
            }
            'D' | 'd' => {
                out.push_str(&if padded {
                    format!("{:02}", dt.day())
                } else {
                    dt.day().to_string()
                });
            }
            'H' | 'h' => {
                out.push_str(&if padded {
                    format!("{:02}", dt.hour())
                } else {
                    dt.hour().to_string()
                });
            }
            'S' | 's' => {
                out.push_str(&if padded {
                    format!("{:02}", dt.second())
                } else {
                    dt.second().to_string()
                });
            }
            other => {
                out.push(other);
                i += 1;
                continue;
            }
        }
        i += run_len;
    }
    out
}

fn month_name(m: u32) -> &'static str {
    const NAMES: [&str; 12] = [
        "January", "February", "March", "April", "May", "June", "July", "August", "September",
        "October", "November", "December",
    ];
    NAMES.get((m.saturating_sub(1)) as usize).copied().unwrap_or("")
}

fn weekday_name(dt: NaiveDateTime) -> &'static str {
    const NAMES: [&str; 7] = [
        "Monday",
        "Tuesday",
        "Wednesday",
        "Thursday",
        "Friday",
        "Saturday",
        "Sunday",
    ];
    NAMES[dt.weekday().num_days_from_monday() as usize]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> ReaderConfig {
        ReaderConfig::default()
    }

    #[test]
    fn percentage_rounding() {
        let compiled = CompiledFormat::compile("0.00%");
        assert_eq!(
            compiled.apply(0.125, &cfg()),
            FormattedValue::Text("12.50%".to_string())
        );
        let compiled = CompiledFormat::compile("0%");
        assert_eq!(
            compiled.apply(0.125, &cfg()),
            FormattedValue::Text("13%".to_string())
        );
    }

    #[test]
    fn date_format_and_force_override() {
        let compiled = CompiledFormat::compile("yyyy-mm-dd");
        assert_eq!(
            compiled.apply(44197.0, &cfg()),
            FormattedValue::Text("2021-01-01".to_string())
        );

        let mut c = cfg();
        c.force_date_format = Some("d.m.Y".to_string());
        assert_eq!(
            compiled.apply(44197.0, &c),
            FormattedValue::Text("1.1.2021".to_string())
        );
    }

    #[test]
    fn fraction_reduction() {
        let compiled = CompiledFormat::compile("# ?/?");
        assert_eq!(
            compiled.apply(0.25, &cfg()),
            FormattedValue::Text("1/4".to_string())
        );
        assert_eq!(
            compiled.apply(2.25, &cfg()),
            FormattedValue::Text("2 1/4".to_string())
        );

        let compiled = CompiledFormat::compile("?/?");
        assert_eq!(
            compiled.apply(0.25, &cfg()),
            FormattedValue::Text("1/4".to_string())
        );
    }

    #[test]
    fn builtin_ids_resolve() {
        assert_eq!(builtin_format_code(9), Some("0%"));
        assert_eq!(builtin_format_code(164), None);
    }

    #[test]
    fn bare_dollar_literal_uses_configured_currency_code() {
        let compiled = CompiledFormat::compile(builtin_format_code(5).unwrap());
        assert_eq!(
            compiled.apply(1234.0, &cfg()),
            FormattedValue::Text("USD 1,234".to_string())
        );
    }

    #[test]
    fn apply_number_format_defaults_true_when_absent() {
        let xml = br#"<?xml version="1.0"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
  <cellXfs count="2">
    <xf numFmtId="9"/>
    <xf numFmtId="0" applyNumberFormat="0" quotePrefix="1"/>
  </cellXfs>
</styleSheet>"#;
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("styles.xml");
        std::fs::write(&path, xml).unwrap();
        let styles = Styles::load(Some(&path)).unwrap();
        assert_eq!(styles.style_at(0), StyleRef::NumFmt(9));
        assert_eq!(styles.style_at(1), StyleRef::NoFormat);
    }

    #[test]
    fn euro_bracket_literal_renders_as_euro_not_plain_number() {
        let compiled = CompiledFormat::compile("[$eUR ]#,##0.00_-");
        assert_eq!(
            compiled.apply(1234.5, &cfg()),
            FormattedValue::Text("EUR 1234.50".to_string())
        );
    }

    #[test]
    fn force_date_format_single_capital_y_is_full_year() {
        let compiled = CompiledFormat::compile("yyyy-mm-dd");
        let mut c = cfg();
        c.force_date_format = Some("Y".to_string());
        assert_eq!(
            compiled.apply(44197.0, &c),
            FormattedValue::Text("2021".to_string())
        );
    }

    #[test]
    fn self_closing_num_fmt_is_registered_and_resolved() {
        let xml = br#"<?xml version="1.0"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
  <numFmts count="1">
    <numFmt numFmtId="164" formatCode="yyyy-mm-dd"/>
  </numFmts>
  <cellXfs count="1">
    <xf numFmtId="164"/>
  </cellXfs>
</styleSheet>"#;
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("styles.xml");
        std::fs::write(&path, xml).unwrap();
        let mut styles = Styles::load(Some(&path)).unwrap();
        assert_eq!(styles.style_at(0), StyleRef::NumFmt(164));
        assert_eq!(
            styles.format_value(44197.0, 0, &cfg()),
            FormattedValue::Text("2021-01-01".to_string())
        );
    }
}

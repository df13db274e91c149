//! Spreadsheet normalizer
//!
//! Turns a downloaded xlsx release into clean [`Material`] records. The
//! publisher's workbook is built for human readers: merged multi-row
//! headers, section banner rows between material groups, footnotes below
//! the data, and numbers formatted with Swiss thousands separators. The
//! normalizer maps one fixed column layout (declared once in
//! [`INDICATOR_COLUMNS`] and the `COL_*` constants below), gates real data
//! rows on a UUID shape check and parses the messy number formats.
//!
//! Row order is preserved: the publisher groups materials thematically and
//! downstream consumers rely on that order.

use std::collections::HashSet;
use std::io::Cursor;

use calamine::{Data, Range, Reader, Xlsx};
use thiserror::Error;

use ecomat_common::models::{Indicator, Material};
use ecomat_common::uuid_norm::is_material_uuid;

// Fixed column layout of the materials worksheet
const COL_LEGACY_ID: usize = 0;
const COL_UUID: usize = 1;
const COL_NAME_DE: usize = 2;
const COL_NAME_FR: usize = 3;
const COL_DISPOSAL_ID: usize = 4;
const COL_DISPOSAL_NAME_DE: usize = 5;
const COL_DISPOSAL_NAME_FR: usize = 6;
const COL_DENSITY: usize = 7;
const COL_UNIT: usize = 8;

/// Indicator columns in worksheet order
const INDICATOR_COLUMNS: [(Indicator, usize); 22] = [
    (Indicator::UbpTotal, 9),
    (Indicator::UbpProduction, 10),
    (Indicator::UbpDisposal, 11),
    (Indicator::PeTotal, 12),
    (Indicator::PeProduction, 13),
    (Indicator::PeProductionEnergetic, 14),
    (Indicator::PeProductionMaterial, 15),
    (Indicator::PeDisposal, 16),
    (Indicator::PeRenewableTotal, 17),
    (Indicator::PeRenewableProduction, 18),
    (Indicator::PeRenewableProductionEnergetic, 19),
    (Indicator::PeRenewableProductionMaterial, 20),
    (Indicator::PeRenewableDisposal, 21),
    (Indicator::PeNonRenewableTotal, 22),
    (Indicator::PeNonRenewableProduction, 23),
    (Indicator::PeNonRenewableProductionEnergetic, 24),
    (Indicator::PeNonRenewableProductionMaterial, 25),
    (Indicator::PeNonRenewableDisposal, 26),
    (Indicator::GhgTotal, 27),
    (Indicator::GhgProduction, 28),
    (Indicator::GhgDisposal, 29),
    (Indicator::BiogenicCarbon, 30),
];

/// Worksheet name fragments identifying the materials sheet
const SHEET_MARKERS: &[&str] = &["baumaterial", "matériaux", "materiaux", "building materials"];

/// Cell content identifying the header row (first columns)
const HEADER_MARKERS: &[&str] = &["id-nummer", "id-number", "numéro id"];

/// Spot checks that the fixed layout still matches the file. Each entry:
/// column index, accepted header fragments, human name for the error.
const ALIGNMENT_CHECKS: &[(usize, &[&str], &str)] = &[
    (COL_UUID, &["uuid"], "uuid"),
    (
        COL_DENSITY,
        &["rohdichte", "masse volumique", "density"],
        "density",
    ),
    (9, &["ubp"], "ubp total"),
    (
        27,
        &["treibhausgas", "effet de serre", "greenhouse"],
        "greenhouse gas total",
    ),
];

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("workbook could not be read: {0}")]
    Workbook(#[from] calamine::XlsxError),

    /// No worksheet matched the known names; carries the names present
    #[error("no materials worksheet found (sheets: {0})")]
    SheetNotFound(String),

    #[error("header row not found in materials worksheet")]
    HeaderNotFound,

    /// A spot-checked column does not carry the expected header. The
    /// publisher reordered columns; the layout constants need review.
    #[error("column {column} does not look like '{expected}'")]
    HeaderMismatch { column: usize, expected: &'static str },
}

/// Normalize a downloaded workbook into material records
pub fn normalize(bytes: &[u8]) -> Result<Vec<Material>, NormalizeError> {
    let mut workbook = Xlsx::new(Cursor::new(bytes))?;
    let names = workbook.sheet_names();
    let sheet =
        find_sheet(&names).ok_or_else(|| NormalizeError::SheetNotFound(names.join(", ")))?;
    let range = workbook.worksheet_range(&sheet)?;
    normalize_range(&range)
}

/// Normalize an already-loaded worksheet range.
///
/// Split out from [`normalize`] so the row mapping can be exercised without
/// binary workbook fixtures.
pub fn normalize_range(range: &Range<Data>) -> Result<Vec<Material>, NormalizeError> {
    let rows: Vec<&[Data]> = range.rows().collect();
    let header_row = find_header_row(&rows).ok_or(NormalizeError::HeaderNotFound)?;
    check_alignment(&rows, header_row)?;

    let mut materials: Vec<Material> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut skipped = 0usize;
    let mut duplicates = 0usize;

    for row in rows.iter().skip(header_row + 1) {
        let Some(material) = material_from_row(row) else {
            skipped += 1;
            continue;
        };
        let key = material.uuid_key();
        if seen.contains(&key) {
            duplicates += 1;
            tracing::warn!(uuid = %material.uuid, "Duplicate material UUID, keeping first occurrence");
            continue;
        }
        seen.insert(key);
        materials.push(material);
    }

    tracing::debug!(
        kept = materials.len(),
        skipped,
        duplicates,
        "Normalized materials worksheet"
    );
    Ok(materials)
}

fn find_sheet(names: &[String]) -> Option<String> {
    if let Some(name) = names.iter().find(|n| {
        let lower = n.to_lowercase();
        SHEET_MARKERS.iter().any(|m| lower.contains(m))
    }) {
        return Some(name.clone());
    }
    // A single-sheet workbook is unambiguous even without a known name
    if names.len() == 1 {
        return Some(names[0].clone());
    }
    None
}

/// Locate the header row by its marker cell in the first columns
/// The marker lives in column A of the header row; matches elsewhere in a
/// row (cross references, notes) do not make it a header
fn find_header_row(rows: &[&[Data]]) -> Option<usize> {
    rows.iter().take(40).position(|row| match row.first() {
        Some(Data::String(s)) => {
            let lower = s.to_lowercase();
            HEADER_MARKERS.iter().any(|m| lower.contains(m))
        }
        _ => false,
    })
}

fn check_alignment(rows: &[&[Data]], header_row: usize) -> Result<(), NormalizeError> {
    for (column, markers, expected) in ALIGNMENT_CHECKS {
        let text = header_text(rows, header_row, *column).to_lowercase();
        if !markers.iter().any(|m| text.contains(m)) {
            return Err(NormalizeError::HeaderMismatch {
                column: *column,
                expected,
            });
        }
    }
    Ok(())
}

/// Header text for one column: the marker row plus up to two group header
/// rows above it (merged group labels sit above the leaf labels)
fn header_text(rows: &[&[Data]], header_row: usize, column: usize) -> String {
    let start = header_row.saturating_sub(2);
    let mut text = String::new();
    for row in rows.iter().take(header_row + 1).skip(start) {
        if let Some(Data::String(s)) = row.get(column) {
            text.push_str(s);
            text.push(' ');
        }
    }
    text
}

/// Map one worksheet row to a material.
///
/// Returns `None` for non-data rows: anything without a UUID-shaped
/// identity cell (banners, footnotes, sub-headers) or without a name in
/// either language.
fn material_from_row(row: &[Data]) -> Option<Material> {
    let uuid = cell_text(row, COL_UUID)?;
    if !is_material_uuid(&uuid) {
        return None;
    }

    let name_de = cell_text(row, COL_NAME_DE);
    let name_fr = cell_text(row, COL_NAME_FR);
    if name_de.is_none() && name_fr.is_none() {
        return None;
    }

    let density = cell_text(row, COL_DENSITY);
    let (density_min, density_max) = density
        .as_deref()
        .map(parse_density_range)
        .unwrap_or((None, None));

    let mut material = Material {
        uuid,
        legacy_id: cell_text(row, COL_LEGACY_ID),
        name_de,
        name_fr,
        disposal_id: cell_text(row, COL_DISPOSAL_ID),
        disposal_name_de: cell_text(row, COL_DISPOSAL_NAME_DE),
        disposal_name_fr: cell_text(row, COL_DISPOSAL_NAME_FR),
        density,
        density_min,
        density_max,
        unit: cell_text(row, COL_UNIT),
        ..Default::default()
    };

    for (indicator, column) in INDICATOR_COLUMNS {
        material.set_indicator(indicator, cell_number(row, column));
    }

    Some(material)
}

/// Cell as trimmed text; numeric cells render without a trailing `.0`
fn cell_text(row: &[Data], idx: usize) -> Option<String> {
    let text = match row.get(idx)? {
        Data::String(s) => s.trim().to_string(),
        Data::Float(f) => {
            if f.fract() == 0.0 && f.abs() < 1e15 {
                format!("{}", *f as i64)
            } else {
                f.to_string()
            }
        }
        Data::Int(i) => i.to_string(),
        _ => return None,
    };
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Cell as a number; string cells go through [`parse_number`]
fn cell_number(row: &[Data], idx: usize) -> Option<f64> {
    match row.get(idx)? {
        Data::Float(f) => Some(*f),
        Data::Int(i) => Some(*i as f64),
        Data::String(s) => parse_number(s),
        _ => None,
    }
}

/// Parse a number the way the source spreadsheets write them.
///
/// Handles apostrophe and space thousands separators (including thin and
/// no-break spaces), comma or dot decimal separators, placeholder dashes
/// and trailing unit text. A separator followed by exactly three digits and
/// then a non-digit is a thousands grouping; any other pattern around the
/// last separator makes it the decimal point. Numeric ranges (`20-25`) are
/// not single numbers and yield `None`.
pub fn parse_number(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "-" {
        return None;
    }

    // Thousands separators: apostrophes and all whitespace variants
    let mut s: String = trimmed
        .chars()
        .filter(|c| !matches!(c, '\'' | '’') && !c.is_whitespace())
        .collect();

    if range_split(&s).is_some() {
        return None;
    }

    if let Some(pos) = s.rfind([',', '.']) {
        let tail = s[pos + 1..].to_string();
        let run = tail.chars().take_while(|c| c.is_ascii_digit()).count();
        if run == 3 && tail.chars().count() > run {
            // Exactly three digits then a non-digit: thousands grouping
            s.retain(|c| c != ',' && c != '.');
        } else {
            let head: String = s[..pos].chars().filter(|c| *c != ',' && *c != '.').collect();
            s = format!("{}.{}", head, tail);
        }
    }

    // Drop residual unit text; keep digits, the decimal point and a
    // leading sign
    let cleaned: String = s
        .char_indices()
        .filter(|(i, c)| c.is_ascii_digit() || *c == '.' || (*c == '-' && *i == 0))
        .map(|(_, c)| c)
        .collect();

    if cleaned.is_empty() || cleaned == "-" || cleaned == "." {
        return None;
    }
    cleaned.parse().ok()
}

/// Parse a density cell into optional bounds.
///
/// `20-25` gives both bounds, a single number gives identical bounds, and
/// placeholders give none. The raw string is kept separately by the caller.
pub fn parse_density_range(raw: &str) -> (Option<f64>, Option<f64>) {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "-" {
        return (None, None);
    }
    if let Some((low, high)) = range_split(trimmed) {
        let bounds = (parse_number(low), parse_number(high));
        if bounds.0.is_some() || bounds.1.is_some() {
            return bounds;
        }
        return (None, None);
    }
    let value = parse_number(trimmed);
    (value, value)
}

/// Split `low-high` at a dash that has digits on both sides. A leading
/// dash is a sign, not a range.
fn range_split(s: &str) -> Option<(&str, &str)> {
    for (i, c) in s.char_indices() {
        if (c == '-' || c == '–') && i > 0 {
            let before = &s[..i];
            let after = &s[i + c.len_utf8()..];
            let prev_digit = before.chars().any(|c| c.is_ascii_digit());
            let next_digit = after
                .chars()
                .find(|c| !c.is_whitespace())
                .is_some_and(|c| c.is_ascii_digit());
            if prev_digit && next_digit {
                return Some((before, after));
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn txt(s: &str) -> Data {
        Data::String(s.to_string())
    }

    fn num(f: f64) -> Data {
        Data::Float(f)
    }

    fn sheet(rows: Vec<Vec<Data>>) -> Range<Data> {
        let max_cols = rows.iter().map(|r| r.len()).max().unwrap_or(1);
        let mut range = Range::new(
            (0, 0),
            ((rows.len().max(1) - 1) as u32, (max_cols.max(1) - 1) as u32),
        );
        for (r, row) in rows.into_iter().enumerate() {
            for (c, cell) in row.into_iter().enumerate() {
                range.set_value((r as u32, c as u32), cell);
            }
        }
        range
    }

    /// Group header row plus marker row, matching the fixed layout
    fn header_rows() -> Vec<Vec<Data>> {
        let mut group = vec![Data::Empty; 31];
        group[9] = txt("UBP (Total)");
        group[27] = txt("Treibhausgasemissionen");

        let mut marker = vec![Data::Empty; 31];
        marker[COL_LEGACY_ID] = txt("ID-Nummer");
        marker[COL_UUID] = txt("UUID-Nummer");
        marker[COL_NAME_DE] = txt("BAUMATERIALIEN");
        marker[COL_NAME_FR] = txt("MATERIAUX DE CONSTRUCTION");
        marker[COL_DENSITY] = txt("Rohdichte");
        marker[COL_UNIT] = txt("Bezug");
        marker[9] = txt("Total");
        marker[27] = txt("Total");

        vec![group, marker]
    }

    fn material_row(uuid: &str, name: &str) -> Vec<Data> {
        let mut row = vec![Data::Empty; 31];
        row[COL_LEGACY_ID] = num(1001.0);
        row[COL_UUID] = txt(uuid);
        row[COL_NAME_DE] = txt(name);
        row[COL_DENSITY] = txt("2200");
        row[COL_UNIT] = txt("kg");
        row[9] = num(428.0);
        row[27] = num(0.25);
        row
    }

    const UUID_A: &str = "a3f9c2d4-1b5e-4c8a-9d2f-7e6b5a4c3d2e";
    const UUID_B: &str = "b4a0d3e5-2c6f-4d9b-8e3a-8f7c6b5d4e3f";

    #[test]
    fn parse_number_handles_swiss_formats() {
        assert_eq!(parse_number("1'234,5"), Some(1234.5));
        assert_eq!(parse_number("1'234'567"), Some(1234567.0));
        assert_eq!(parse_number("1 234,5"), Some(1234.5));
        assert_eq!(parse_number("1\u{a0}234.5"), Some(1234.5));
        assert_eq!(parse_number("1\u{2009}234"), Some(1234.0));
        assert_eq!(parse_number("1’234.5"), Some(1234.5));
    }

    #[test]
    fn parse_number_disambiguates_separators() {
        // Three digits then a non-digit after the last separator: grouping
        assert_eq!(parse_number("12.345 kg"), Some(12345.0));
        assert_eq!(parse_number("1,234.56"), Some(1234.56));
        assert_eq!(parse_number("1.234,56"), Some(1234.56));
        // Anything else around the last separator: decimal point
        assert_eq!(parse_number("1,5"), Some(1.5));
        assert_eq!(parse_number("1.234"), Some(1.234));
        assert_eq!(parse_number("0.125"), Some(0.125));
        assert_eq!(parse_number("1,2345"), Some(1.2345));
    }

    #[test]
    fn parse_number_roundtrips_plain_values() {
        for value in [0.0, 1.0, 42.0, 963.5, 0.125, -3.75, 1234567.0] {
            let printed = format!("{}", value);
            assert_eq!(parse_number(&printed), Some(value), "input {:?}", printed);
        }
    }

    #[test]
    fn parse_number_rejects_placeholders_and_ranges() {
        assert_eq!(parse_number(""), None);
        assert_eq!(parse_number("   "), None);
        assert_eq!(parse_number("-"), None);
        assert_eq!(parse_number("20-25"), None);
        assert_eq!(parse_number("20 – 25"), None);
        assert_eq!(parse_number("n.a."), None);
    }

    #[test]
    fn parse_number_keeps_negative_sign() {
        assert_eq!(parse_number("-5,5"), Some(-5.5));
        assert_eq!(parse_number("-0.8"), Some(-0.8));
    }

    #[test]
    fn parse_number_strips_unit_residue() {
        assert_eq!(parse_number("963.5 MJ"), Some(963.5));
        assert_eq!(parse_number("~2200"), Some(2200.0));
    }

    #[test]
    fn density_range_parses_bounds() {
        assert_eq!(parse_density_range("20-25"), (Some(20.0), Some(25.0)));
        assert_eq!(parse_density_range("20 - 25"), (Some(20.0), Some(25.0)));
        assert_eq!(
            parse_density_range("1'800-2'000"),
            (Some(1800.0), Some(2000.0))
        );
    }

    #[test]
    fn density_single_value_fills_both_bounds() {
        assert_eq!(parse_density_range("2200"), (Some(2200.0), Some(2200.0)));
        assert_eq!(parse_density_range("140,5"), (Some(140.5), Some(140.5)));
    }

    #[test]
    fn density_placeholder_has_no_bounds() {
        assert_eq!(parse_density_range("-"), (None, None));
        assert_eq!(parse_density_range(""), (None, None));
    }

    #[test]
    fn normalize_range_maps_rows_in_order() {
        let mut rows = header_rows();
        rows.push(material_row(UUID_A, "Beton"));
        rows.push(material_row(UUID_B, "Backstein"));

        let materials = normalize_range(&sheet(rows)).unwrap();
        assert_eq!(materials.len(), 2);
        assert_eq!(materials[0].name_de.as_deref(), Some("Beton"));
        assert_eq!(materials[1].name_de.as_deref(), Some("Backstein"));
        assert_eq!(materials[0].uuid, UUID_A);
        assert_eq!(materials[0].ubp_total, Some(428.0));
        assert_eq!(materials[0].ghg_total, Some(0.25));
        assert_eq!(materials[0].legacy_id.as_deref(), Some("1001"));
        assert_eq!(materials[0].density_min, Some(2200.0));
    }

    #[test]
    fn numeric_strings_in_indicator_cells_are_parsed() {
        let mut rows = header_rows();
        let mut row = material_row(UUID_A, "Beton");
        row[9] = txt("1'234,5");
        row[12] = txt("-");
        rows.push(row);

        let materials = normalize_range(&sheet(rows)).unwrap();
        assert_eq!(materials[0].ubp_total, Some(1234.5));
        assert_eq!(materials[0].pe_total, None);
    }

    #[test]
    fn rows_without_material_uuid_are_dropped() {
        let mut rows = header_rows();
        let mut banner = vec![Data::Empty; 31];
        banner[COL_UUID] = txt("Beton und Mörtel");
        rows.push(banner);
        rows.push(material_row(UUID_A, "Beton"));
        let mut footnote = vec![Data::Empty; 31];
        footnote[COL_LEGACY_ID] = txt("1) Werte gerundet");
        rows.push(footnote);

        let materials = normalize_range(&sheet(rows)).unwrap();
        // Strictly fewer materials than physical data rows
        assert_eq!(materials.len(), 1);
        assert_eq!(materials[0].uuid, UUID_A);
    }

    #[test]
    fn rows_without_any_name_are_dropped() {
        let mut rows = header_rows();
        let mut nameless = material_row(UUID_A, "");
        nameless[COL_NAME_DE] = Data::Empty;
        rows.push(nameless);

        let materials = normalize_range(&sheet(rows)).unwrap();
        assert!(materials.is_empty());
    }

    #[test]
    fn duplicate_uuids_keep_the_first_occurrence() {
        let mut rows = header_rows();
        rows.push(material_row(UUID_A, "Beton"));
        // Same UUID in different casing
        rows.push(material_row(&UUID_A.to_uppercase(), "Beton (Duplikat)"));

        let materials = normalize_range(&sheet(rows)).unwrap();
        assert_eq!(materials.len(), 1);
        assert_eq!(materials[0].name_de.as_deref(), Some("Beton"));
    }

    #[test]
    fn missing_header_row_fails() {
        let rows = vec![vec![txt("irgendwas")], vec![num(1.0)]];
        let err = normalize_range(&sheet(rows)).unwrap_err();
        assert!(matches!(err, NormalizeError::HeaderNotFound));
    }

    #[test]
    fn header_marker_outside_column_a_is_not_a_header() {
        // A note row mentioning the ID column must not be mistaken for the
        // header just because the marker text appears further right
        let rows = vec![
            vec![Data::Empty, txt("ID-Nummer siehe Spalte A")],
            vec![txt("Stand 2024")],
        ];
        let err = normalize_range(&sheet(rows)).unwrap_err();
        assert!(matches!(err, NormalizeError::HeaderNotFound));
    }

    #[test]
    fn shifted_columns_fail_the_alignment_check() {
        let mut rows = header_rows();
        // Simulate an inserted column: UBP header no longer at column 9
        rows[0][9] = txt("Bemerkungen");
        rows[1][9] = txt("Hinweis");
        rows.push(material_row(UUID_A, "Beton"));

        let err = normalize_range(&sheet(rows)).unwrap_err();
        match err {
            NormalizeError::HeaderMismatch { column, expected } => {
                assert_eq!(column, 9);
                assert_eq!(expected, "ubp total");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn sheet_selection_prefers_marked_names() {
        let names = vec![
            "Erläuterungen".to_string(),
            "Baumaterialien".to_string(),
        ];
        assert_eq!(find_sheet(&names).as_deref(), Some("Baumaterialien"));
    }

    #[test]
    fn single_unmarked_sheet_is_accepted() {
        let names = vec!["Tabelle1".to_string()];
        assert_eq!(find_sheet(&names).as_deref(), Some("Tabelle1"));
    }

    #[test]
    fn ambiguous_sheets_are_rejected() {
        let names = vec!["Tabelle1".to_string(), "Tabelle2".to_string()];
        assert_eq!(find_sheet(&names), None);
    }

    #[test]
    fn density_range_cell_maps_to_bounds() {
        let mut rows = header_rows();
        let mut row = material_row(UUID_A, "Dämmstoff");
        row[COL_DENSITY] = txt("20-25");
        rows.push(row);
        let mut row = material_row(UUID_B, "Anstrich");
        row[COL_DENSITY] = txt("-");
        rows.push(row);

        let materials = normalize_range(&sheet(rows)).unwrap();
        assert_eq!(materials[0].density.as_deref(), Some("20-25"));
        assert_eq!(materials[0].density_min, Some(20.0));
        assert_eq!(materials[0].density_max, Some(25.0));
        assert_eq!(materials[1].density.as_deref(), Some("-"));
        assert_eq!(materials[1].density_min, None);
        assert_eq!(materials[1].density_max, None);
    }
}

//! UUID normalization for material identity
//!
//! Source spreadsheets are inconsistent about UUID formatting: casing varies
//! between releases and hyphens are occasionally missing or doubled. All
//! identity comparisons go through [`normalize_uuid`] so that two spellings of
//! the same UUID always collide.

/// Normalize a UUID string to its canonical comparison key.
///
/// Strips every non-alphanumeric character and upper-cases the rest. The
/// result is stable under repeated application.
pub fn normalize_uuid(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Check whether a cell value has the shape of a hyphenated v4 UUID.
///
/// Rows whose UUID cell fails this check are not materials (section headers,
/// footnotes, stray formulas) and get dropped during normalization. The check
/// is on shape only: 8-4-4-4-12 hex groups, version nibble `4`, variant
/// nibble in `8..b`. Casing is ignored.
pub fn is_material_uuid(raw: &str) -> bool {
    let s = raw.trim();
    if s.len() != 36 {
        return false;
    }
    let bytes = s.as_bytes();
    for (i, b) in bytes.iter().enumerate() {
        match i {
            8 | 13 | 18 | 23 => {
                if *b != b'-' {
                    return false;
                }
            }
            _ => {
                if !b.is_ascii_hexdigit() {
                    return false;
                }
            }
        }
    }
    // Version nibble sits at offset 14, variant nibble at offset 19
    if bytes[14] != b'4' {
        return false;
    }
    matches!(
        bytes[19].to_ascii_lowercase(),
        b'8' | b'9' | b'a' | b'b'
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_hyphens_and_uppercases() {
        assert_eq!(
            normalize_uuid("a3f9c2d4-1b5e-4c8a-9d2f-7e6b5a4c3d2e"),
            "A3F9C2D41B5E4C8A9D2F7E6B5A4C3D2E"
        );
    }

    #[test]
    fn normalize_is_idempotent() {
        let once = normalize_uuid("A3F9-c2d4.1b5e");
        let twice = normalize_uuid(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn normalize_collides_mixed_spellings() {
        let a = normalize_uuid("A3F9C2D4-1B5E-4C8A-9D2F-7E6B5A4C3D2E");
        let b = normalize_uuid("a3f9c2d4-1b5e-4c8a-9d2f-7e6b5a4c3d2e");
        assert_eq!(a, b);
    }

    #[test]
    fn material_uuid_accepts_v4_shape() {
        assert!(is_material_uuid("a3f9c2d4-1b5e-4c8a-9d2f-7e6b5a4c3d2e"));
        assert!(is_material_uuid("A3F9C2D4-1B5E-4C8A-BD2F-7E6B5A4C3D2E"));
        assert!(is_material_uuid("  a3f9c2d4-1b5e-4c8a-9d2f-7e6b5a4c3d2e  "));
    }

    #[test]
    fn material_uuid_rejects_non_uuid_cells() {
        assert!(!is_material_uuid(""));
        assert!(!is_material_uuid("Beton"));
        assert!(!is_material_uuid("Anmerkungen siehe Blatt 2"));
        // Unhyphenated
        assert!(!is_material_uuid("a3f9c2d41b5e4c8a9d2f7e6b5a4c3d2e"));
        // Wrong version nibble
        assert!(!is_material_uuid("a3f9c2d4-1b5e-1c8a-9d2f-7e6b5a4c3d2e"));
        // Wrong variant nibble
        assert!(!is_material_uuid("a3f9c2d4-1b5e-4c8a-1d2f-7e6b5a4c3d2e"));
        // Non-hex characters
        assert!(!is_material_uuid("g3f9c2d4-1b5e-4c8a-9d2f-7e6b5a4c3d2e"));
    }
}

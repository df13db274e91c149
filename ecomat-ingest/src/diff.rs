//! Version comparison
//!
//! Pure, read-only diff between the record sets of two promoted versions.
//! Materials match by normalized UUID, so a case change in the source
//! spreadsheet does not show up as a remove/add pair.

use std::collections::{BTreeSet, HashMap};

use serde::Serialize;

use ecomat_common::models::Material;

#[derive(Debug, Serialize)]
pub struct VersionDiff {
    pub a_label: String,
    pub b_label: String,
    /// Materials present only in `b`
    pub added: Vec<DiffEntry>,
    /// Materials present only in `a`
    pub removed: Vec<DiffEntry>,
    pub changed: Vec<MaterialChange>,
    pub unchanged: usize,
}

impl VersionDiff {
    pub fn has_changes(&self) -> bool {
        !(self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty())
    }
}

#[derive(Debug, Serialize)]
pub struct DiffEntry {
    pub uuid: String,
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct MaterialChange {
    pub uuid: String,
    pub name: String,
    pub fields: Vec<FieldChange>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum FieldChange {
    Numeric {
        field: &'static str,
        old: Option<f64>,
        new: Option<f64>,
        absolute_delta: Option<f64>,
        percent_delta: Option<f64>,
    },
    Text {
        field: &'static str,
        old: Option<String>,
        new: Option<String>,
    },
}

/// Compare two record sets, reading the change direction as "from `a` to
/// `b`". Entries come out ordered by normalized UUID.
pub fn diff_versions(
    a_label: &str,
    a_records: &[Material],
    b_label: &str,
    b_records: &[Material],
) -> VersionDiff {
    let a_by_key: HashMap<String, &Material> =
        a_records.iter().map(|m| (m.uuid_key(), m)).collect();
    let b_by_key: HashMap<String, &Material> =
        b_records.iter().map(|m| (m.uuid_key(), m)).collect();

    let keys: BTreeSet<&String> = a_by_key.keys().chain(b_by_key.keys()).collect();

    let mut diff = VersionDiff {
        a_label: a_label.to_string(),
        b_label: b_label.to_string(),
        added: Vec::new(),
        removed: Vec::new(),
        changed: Vec::new(),
        unchanged: 0,
    };

    for key in keys {
        match (a_by_key.get(key), b_by_key.get(key)) {
            (None, Some(b)) => diff.added.push(entry(b)),
            (Some(a), None) => diff.removed.push(entry(a)),
            (Some(a), Some(b)) => {
                let fields = field_changes(a, b);
                if fields.is_empty() {
                    diff.unchanged += 1;
                } else {
                    diff.changed.push(MaterialChange {
                        uuid: b.uuid.clone(),
                        name: b.display_name().to_string(),
                        fields,
                    });
                }
            }
            (None, None) => {}
        }
    }
    diff
}

fn entry(material: &Material) -> DiffEntry {
    DiffEntry {
        uuid: material.uuid.clone(),
        name: material.display_name().to_string(),
    }
}

fn field_changes(a: &Material, b: &Material) -> Vec<FieldChange> {
    let mut changes = Vec::new();

    for ((field, old), (_, new)) in a.text_fields().into_iter().zip(b.text_fields()) {
        if old != new {
            changes.push(FieldChange::Text {
                field,
                old: old.map(str::to_string),
                new: new.map(str::to_string),
            });
        }
    }

    for ((field, old), (_, new)) in a.numeric_fields().into_iter().zip(b.numeric_fields()) {
        if old != new {
            changes.push(FieldChange::Numeric {
                field,
                old,
                new,
                absolute_delta: match (old, new) {
                    (Some(o), Some(n)) => Some(n - o),
                    _ => None,
                },
                percent_delta: match (old, new) {
                    (Some(o), Some(n)) if o != 0.0 => Some((n - o) / o * 100.0),
                    _ => None,
                },
            });
        }
    }
    changes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn material(uuid: &str, name: &str, ghg: Option<f64>) -> Material {
        Material {
            uuid: uuid.to_string(),
            name_de: Some(name.to_string()),
            ghg_total: ghg,
            ..Default::default()
        }
    }

    const U1: &str = "11111111-2222-4333-8444-555555555555";
    const U2: &str = "21111111-2222-4333-8444-555555555555";

    #[test]
    fn identical_sets_produce_empty_diff() {
        let records = vec![material(U1, "Beton", Some(100.0))];
        let diff = diff_versions("A", &records, "A", &records);
        assert!(!diff.has_changes());
        assert_eq!(diff.unchanged, 1);
    }

    #[test]
    fn added_and_removed_are_detected() {
        let a = vec![material(U1, "Beton", Some(100.0))];
        let b = vec![material(U2, "Holz", Some(12.0))];
        let diff = diff_versions("A", &a, "B", &b);
        assert_eq!(diff.added.len(), 1);
        assert_eq!(diff.added[0].name, "Holz");
        assert_eq!(diff.removed.len(), 1);
        assert_eq!(diff.removed[0].name, "Beton");
        assert_eq!(diff.unchanged, 0);
    }

    #[test]
    fn numeric_change_carries_deltas() {
        let a = vec![material(U1, "Beton", Some(100.0))];
        let b = vec![material(U1, "Beton", Some(110.0))];
        let diff = diff_versions("A", &a, "B", &b);
        assert_eq!(diff.changed.len(), 1);
        let FieldChange::Numeric {
            field,
            absolute_delta,
            percent_delta,
            ..
        } = &diff.changed[0].fields[0]
        else {
            panic!("expected a numeric change");
        };
        assert_eq!(*field, "ghg_total");
        assert_eq!(*absolute_delta, Some(10.0));
        assert!((percent_delta.unwrap() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn percent_delta_undefined_for_old_zero() {
        let a = vec![material(U1, "Beton", Some(0.0))];
        let b = vec![material(U1, "Beton", Some(5.0))];
        let diff = diff_versions("A", &a, "B", &b);
        let FieldChange::Numeric {
            absolute_delta,
            percent_delta,
            ..
        } = &diff.changed[0].fields[0]
        else {
            panic!("expected a numeric change");
        };
        assert_eq!(*absolute_delta, Some(5.0));
        assert_eq!(*percent_delta, None);
    }

    #[test]
    fn text_change_is_reported_per_field() {
        let a = vec![material(U1, "Beton", Some(100.0))];
        let mut updated = material(U1, "Beton", Some(100.0));
        updated.name_fr = Some("Béton".to_string());
        let diff = diff_versions("A", &a, "B", &[updated]);
        assert_eq!(diff.changed.len(), 1);
        let FieldChange::Text { field, old, new } = &diff.changed[0].fields[0] else {
            panic!("expected a text change");
        };
        assert_eq!(*field, "name_fr");
        assert_eq!(*old, None);
        assert_eq!(new.as_deref(), Some("Béton"));
    }

    #[test]
    fn uuid_case_difference_is_not_a_change() {
        let a = vec![material(&U1.to_uppercase(), "Beton", Some(100.0))];
        let b = vec![material(U1, "Beton", Some(100.0))];
        let diff = diff_versions("A", &a, "B", &b);
        assert!(!diff.has_changes());
        assert_eq!(diff.unchanged, 1);
    }

    #[test]
    fn indicator_appearing_from_none_has_no_deltas_percent() {
        let a = vec![material(U1, "Beton", None)];
        let b = vec![material(U1, "Beton", Some(42.0))];
        let diff = diff_versions("A", &a, "B", &b);
        let FieldChange::Numeric {
            old,
            new,
            absolute_delta,
            percent_delta,
            ..
        } = &diff.changed[0].fields[0]
        else {
            panic!("expected a numeric change");
        };
        assert_eq!(*old, None);
        assert_eq!(*new, Some(42.0));
        assert_eq!(*absolute_delta, None);
        assert_eq!(*percent_delta, None);
    }
}

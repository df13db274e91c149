//! Core data model for versioned environmental impact datasets
//!
//! A dataset release is a list of [`Material`] records in publisher order.
//! Releases are identified by their version label (for example
//! `2024/1:2024, Version 5`) and kept immutable once promoted.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::uuid_norm::normalize_uuid;

/// One material record from a dataset release.
///
/// `uuid` is the publisher-assigned identity and is stable across releases;
/// everything else may change between versions. All impact indicators are
/// optional because the source cells frequently hold placeholders instead of
/// numbers.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Material {
    /// Publisher UUID, exactly as it appeared in the spreadsheet
    pub uuid: String,
    /// Numeric ID from older dataset generations, kept for cross-referencing
    pub legacy_id: Option<String>,
    pub name_de: Option<String>,
    pub name_fr: Option<String>,
    /// ID of the matching disposal dataset row
    pub disposal_id: Option<String>,
    pub disposal_name_de: Option<String>,
    pub disposal_name_fr: Option<String>,
    /// Raw density cell: a number, a `min-max` range, or a placeholder
    pub density: Option<String>,
    pub density_min: Option<f64>,
    pub density_max: Option<f64>,
    /// Reference unit the indicators are expressed in (kg, m2, ...)
    pub unit: Option<String>,

    // UBP (eco-points) impact
    pub ubp_total: Option<f64>,
    pub ubp_production: Option<f64>,
    pub ubp_disposal: Option<f64>,

    // Primary energy, total
    pub pe_total: Option<f64>,
    pub pe_production: Option<f64>,
    pub pe_production_energetic: Option<f64>,
    pub pe_production_material: Option<f64>,
    pub pe_disposal: Option<f64>,

    // Primary energy, renewable share
    pub pe_renewable_total: Option<f64>,
    pub pe_renewable_production: Option<f64>,
    pub pe_renewable_production_energetic: Option<f64>,
    pub pe_renewable_production_material: Option<f64>,
    pub pe_renewable_disposal: Option<f64>,

    // Primary energy, non-renewable share
    pub pe_non_renewable_total: Option<f64>,
    pub pe_non_renewable_production: Option<f64>,
    pub pe_non_renewable_production_energetic: Option<f64>,
    pub pe_non_renewable_production_material: Option<f64>,
    pub pe_non_renewable_disposal: Option<f64>,

    // Greenhouse gas emissions
    pub ghg_total: Option<f64>,
    pub ghg_production: Option<f64>,
    pub ghg_disposal: Option<f64>,

    pub biogenic_carbon: Option<f64>,
}

impl Material {
    /// Comparison key for identity lookups across releases
    pub fn uuid_key(&self) -> String {
        normalize_uuid(&self.uuid)
    }

    /// Best human-readable name: German, then French, then the UUID
    pub fn display_name(&self) -> &str {
        self.name_de
            .as_deref()
            .or(self.name_fr.as_deref())
            .unwrap_or(&self.uuid)
    }

    /// Read one impact indicator by enum key
    pub fn indicator(&self, which: Indicator) -> Option<f64> {
        match which {
            Indicator::UbpTotal => self.ubp_total,
            Indicator::UbpProduction => self.ubp_production,
            Indicator::UbpDisposal => self.ubp_disposal,
            Indicator::PeTotal => self.pe_total,
            Indicator::PeProduction => self.pe_production,
            Indicator::PeProductionEnergetic => self.pe_production_energetic,
            Indicator::PeProductionMaterial => self.pe_production_material,
            Indicator::PeDisposal => self.pe_disposal,
            Indicator::PeRenewableTotal => self.pe_renewable_total,
            Indicator::PeRenewableProduction => self.pe_renewable_production,
            Indicator::PeRenewableProductionEnergetic => self.pe_renewable_production_energetic,
            Indicator::PeRenewableProductionMaterial => self.pe_renewable_production_material,
            Indicator::PeRenewableDisposal => self.pe_renewable_disposal,
            Indicator::PeNonRenewableTotal => self.pe_non_renewable_total,
            Indicator::PeNonRenewableProduction => self.pe_non_renewable_production,
            Indicator::PeNonRenewableProductionEnergetic => {
                self.pe_non_renewable_production_energetic
            }
            Indicator::PeNonRenewableProductionMaterial => {
                self.pe_non_renewable_production_material
            }
            Indicator::PeNonRenewableDisposal => self.pe_non_renewable_disposal,
            Indicator::GhgTotal => self.ghg_total,
            Indicator::GhgProduction => self.ghg_production,
            Indicator::GhgDisposal => self.ghg_disposal,
            Indicator::BiogenicCarbon => self.biogenic_carbon,
        }
    }

    /// Write one impact indicator by enum key
    pub fn set_indicator(&mut self, which: Indicator, value: Option<f64>) {
        match which {
            Indicator::UbpTotal => self.ubp_total = value,
            Indicator::UbpProduction => self.ubp_production = value,
            Indicator::UbpDisposal => self.ubp_disposal = value,
            Indicator::PeTotal => self.pe_total = value,
            Indicator::PeProduction => self.pe_production = value,
            Indicator::PeProductionEnergetic => self.pe_production_energetic = value,
            Indicator::PeProductionMaterial => self.pe_production_material = value,
            Indicator::PeDisposal => self.pe_disposal = value,
            Indicator::PeRenewableTotal => self.pe_renewable_total = value,
            Indicator::PeRenewableProduction => self.pe_renewable_production = value,
            Indicator::PeRenewableProductionEnergetic => {
                self.pe_renewable_production_energetic = value
            }
            Indicator::PeRenewableProductionMaterial => {
                self.pe_renewable_production_material = value
            }
            Indicator::PeRenewableDisposal => self.pe_renewable_disposal = value,
            Indicator::PeNonRenewableTotal => self.pe_non_renewable_total = value,
            Indicator::PeNonRenewableProduction => self.pe_non_renewable_production = value,
            Indicator::PeNonRenewableProductionEnergetic => {
                self.pe_non_renewable_production_energetic = value
            }
            Indicator::PeNonRenewableProductionMaterial => {
                self.pe_non_renewable_production_material = value
            }
            Indicator::PeNonRenewableDisposal => self.pe_non_renewable_disposal = value,
            Indicator::GhgTotal => self.ghg_total = value,
            Indicator::GhgProduction => self.ghg_production = value,
            Indicator::GhgDisposal => self.ghg_disposal = value,
            Indicator::BiogenicCarbon => self.biogenic_carbon = value,
        }
    }

    /// Descriptive text fields, paired with their stable field key.
    ///
    /// Used by the diff tool to report old/new text changes field by field.
    pub fn text_fields(&self) -> [(&'static str, Option<&str>); 8] {
        [
            ("legacy_id", self.legacy_id.as_deref()),
            ("name_de", self.name_de.as_deref()),
            ("name_fr", self.name_fr.as_deref()),
            ("disposal_id", self.disposal_id.as_deref()),
            ("disposal_name_de", self.disposal_name_de.as_deref()),
            ("disposal_name_fr", self.disposal_name_fr.as_deref()),
            ("density", self.density.as_deref()),
            ("unit", self.unit.as_deref()),
        ]
    }

    /// Numeric fields (parsed density bounds plus all indicators), paired
    /// with their stable field key
    pub fn numeric_fields(&self) -> Vec<(&'static str, Option<f64>)> {
        let mut fields = Vec::with_capacity(2 + Indicator::ALL.len());
        fields.push(("density_min", self.density_min));
        fields.push(("density_max", self.density_max));
        for ind in Indicator::ALL {
            fields.push((ind.key(), self.indicator(ind)));
        }
        fields
    }
}

/// Enumerates the 22 impact indicator columns of a release.
///
/// The enum order matches the column order in the source spreadsheets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Indicator {
    UbpTotal,
    UbpProduction,
    UbpDisposal,
    PeTotal,
    PeProduction,
    PeProductionEnergetic,
    PeProductionMaterial,
    PeDisposal,
    PeRenewableTotal,
    PeRenewableProduction,
    PeRenewableProductionEnergetic,
    PeRenewableProductionMaterial,
    PeRenewableDisposal,
    PeNonRenewableTotal,
    PeNonRenewableProduction,
    PeNonRenewableProductionEnergetic,
    PeNonRenewableProductionMaterial,
    PeNonRenewableDisposal,
    GhgTotal,
    GhgProduction,
    GhgDisposal,
    BiogenicCarbon,
}

impl Indicator {
    pub const ALL: [Indicator; 22] = [
        Indicator::UbpTotal,
        Indicator::UbpProduction,
        Indicator::UbpDisposal,
        Indicator::PeTotal,
        Indicator::PeProduction,
        Indicator::PeProductionEnergetic,
        Indicator::PeProductionMaterial,
        Indicator::PeDisposal,
        Indicator::PeRenewableTotal,
        Indicator::PeRenewableProduction,
        Indicator::PeRenewableProductionEnergetic,
        Indicator::PeRenewableProductionMaterial,
        Indicator::PeRenewableDisposal,
        Indicator::PeNonRenewableTotal,
        Indicator::PeNonRenewableProduction,
        Indicator::PeNonRenewableProductionEnergetic,
        Indicator::PeNonRenewableProductionMaterial,
        Indicator::PeNonRenewableDisposal,
        Indicator::GhgTotal,
        Indicator::GhgProduction,
        Indicator::GhgDisposal,
        Indicator::BiogenicCarbon,
    ];

    /// Stable snake_case key, identical to the database column name
    pub fn key(self) -> &'static str {
        match self {
            Indicator::UbpTotal => "ubp_total",
            Indicator::UbpProduction => "ubp_production",
            Indicator::UbpDisposal => "ubp_disposal",
            Indicator::PeTotal => "pe_total",
            Indicator::PeProduction => "pe_production",
            Indicator::PeProductionEnergetic => "pe_production_energetic",
            Indicator::PeProductionMaterial => "pe_production_material",
            Indicator::PeDisposal => "pe_disposal",
            Indicator::PeRenewableTotal => "pe_renewable_total",
            Indicator::PeRenewableProduction => "pe_renewable_production",
            Indicator::PeRenewableProductionEnergetic => "pe_renewable_production_energetic",
            Indicator::PeRenewableProductionMaterial => "pe_renewable_production_material",
            Indicator::PeRenewableDisposal => "pe_renewable_disposal",
            Indicator::PeNonRenewableTotal => "pe_non_renewable_total",
            Indicator::PeNonRenewableProduction => "pe_non_renewable_production",
            Indicator::PeNonRenewableProductionEnergetic => {
                "pe_non_renewable_production_energetic"
            }
            Indicator::PeNonRenewableProductionMaterial => {
                "pe_non_renewable_production_material"
            }
            Indicator::PeNonRenewableDisposal => "pe_non_renewable_disposal",
            Indicator::GhgTotal => "ghg_total",
            Indicator::GhgProduction => "ghg_production",
            Indicator::GhgDisposal => "ghg_disposal",
            Indicator::BiogenicCarbon => "biogenic_carbon",
        }
    }
}

/// Metadata for one promoted dataset release
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Version {
    /// Publisher version label, e.g. `2024/1:2024, Version 5`
    pub label: String,
    /// Publication date scraped from the publisher page, when resolvable
    pub publish_date: Option<NaiveDate>,
    /// When this release was promoted to current
    pub ingested_at: DateTime<Utc>,
    pub materials_count: i64,
    /// Whether the current-version pointer references this release
    pub is_current: bool,
}

/// What discovery learned about a downloadable release before ingesting it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateMetadata {
    /// Absolute download URL of the spreadsheet
    pub url: String,
    /// Version label extracted from the link or its surrounding text.
    /// `None` means the comparator cannot classify this candidate.
    pub version_label: Option<String>,
    /// Anchor text of the download link
    pub title: Option<String>,
    /// File size as printed on the page, e.g. `363 kB`
    pub file_size_text: Option<String>,
    pub publish_date: Option<NaiveDate>,
    /// Final path segment of the URL, used as the local download name
    pub filename: String,
}

/// A normalized release waiting for an operator decision.
///
/// At most one of these exists at a time; staging a newer candidate replaces
/// the previous one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingVersion {
    pub candidate: CandidateMetadata,
    pub materials: Vec<Material>,
    pub staged_at: DateTime<Utc>,
}

impl PendingVersion {
    /// Label of the staged release. Staging requires a resolved label, so
    /// this falls back to an empty string only for corrupted rows.
    pub fn label(&self) -> &str {
        self.candidate.version_label.as_deref().unwrap_or_default()
    }
}

/// Operator verdict on a pending version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Approve,
    Reject,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indicator_roundtrip_covers_all_fields() {
        let mut m = Material {
            uuid: "u".into(),
            ..Default::default()
        };
        for (i, ind) in Indicator::ALL.iter().enumerate() {
            m.set_indicator(*ind, Some(i as f64));
        }
        for (i, ind) in Indicator::ALL.iter().enumerate() {
            assert_eq!(m.indicator(*ind), Some(i as f64), "indicator {:?}", ind);
        }
    }

    #[test]
    fn indicator_keys_are_unique() {
        let mut keys: Vec<&str> = Indicator::ALL.iter().map(|i| i.key()).collect();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), Indicator::ALL.len());
    }

    #[test]
    fn display_name_prefers_german_then_french() {
        let mut m = Material {
            uuid: "some-uuid".into(),
            ..Default::default()
        };
        assert_eq!(m.display_name(), "some-uuid");
        m.name_fr = Some("Béton".into());
        assert_eq!(m.display_name(), "Béton");
        m.name_de = Some("Beton".into());
        assert_eq!(m.display_name(), "Beton");
    }

    #[test]
    fn material_serializes_camel_case() {
        let m = Material {
            uuid: "u".into(),
            name_de: Some("Beton".into()),
            ghg_total: Some(0.12),
            ..Default::default()
        };
        let json = serde_json::to_value(&m).unwrap();
        assert_eq!(json["nameDe"], "Beton");
        assert_eq!(json["ghgTotal"], 0.12);
        assert!(json.get("name_de").is_none());
    }

    #[test]
    fn decision_parses_lowercase() {
        let d: Decision = serde_json::from_str("\"approve\"").unwrap();
        assert_eq!(d, Decision::Approve);
        let d: Decision = serde_json::from_str("\"reject\"").unwrap();
        assert_eq!(d, Decision::Reject);
    }

    #[test]
    fn numeric_fields_include_density_bounds_and_indicators() {
        let m = Material::default();
        let fields = m.numeric_fields();
        assert_eq!(fields.len(), 24);
        assert_eq!(fields[0].0, "density_min");
        assert_eq!(fields[1].0, "density_max");
        assert_eq!(fields[2].0, "ubp_total");
    }
}

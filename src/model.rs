use std::fmt;

use serde::{Deserialize, Serialize};

/// Primitive representation declared by a quantitation type. The metadata
/// format declares more representations than the merge supports; encoding
/// rejects anything outside the four supported ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Representation {
    Text,
    Boolean,
    Float,
    Integer,
    Long,
    Char,
}

impl fmt::Display for Representation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Representation::Text => "text",
            Representation::Boolean => "boolean",
            Representation::Float => "float",
            Representation::Integer => "integer",
            Representation::Long => "long",
            Representation::Char => "char",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Scale {
    #[default]
    Linear,
    Log2,
    Log10,
    Ln,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Probe {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence: Option<String>,
}

/// Resolved once its probe set is populated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Platform {
    pub name: String,
    pub short_name: String,
    #[serde(default)]
    pub probes: Vec<Probe>,
}

impl Platform {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            short_name: name.to_string(),
            probes: Vec::new(),
        }
    }

    pub fn is_resolved(&self) -> bool {
        !self.probes.is_empty()
    }
}

/// One sample run. `platform_ref` names the platform it was run on; after
/// resolution every assay in a record references the same platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assay {
    pub name: String,
    #[serde(default)]
    pub platform_ref: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuantitationType {
    pub name: String,
    pub representation: Representation,
    #[serde(default)]
    pub scale: Scale,
}

/// Ordered assay sequence shared by every vector created in one merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssayDimension {
    pub assay_names: Vec<String>,
}

/// Binary-encoded value series for one (probe, quantitation type) pair,
/// aligned to the record's assay dimension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataVector {
    pub probe: String,
    pub quantitation_type: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentRecord {
    pub accession: String,
    #[serde(default)]
    pub name: String,
    pub assays: Vec<Assay>,
    pub quantitation_types: Vec<QuantitationType>,
    #[serde(default)]
    pub platform: Option<Platform>,
    #[serde(default)]
    pub assay_dimension: Option<AssayDimension>,
    #[serde(default)]
    pub vectors: Vec<DataVector>,
}

impl ExperimentRecord {
    pub fn distinct_platform_refs(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for assay in &self.assays {
            if let Some(name) = &assay.platform_ref {
                if !seen.iter().any(|s| s == name) {
                    seen.push(name.clone());
                }
            }
        }
        seen
    }

    pub fn repoint_assays(&mut self, platform_name: &str) {
        for assay in &mut self.assays {
            assay.platform_ref = Some(platform_name.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assay(name: &str, platform: Option<&str>) -> Assay {
        Assay {
            name: name.to_string(),
            platform_ref: platform.map(str::to_string),
        }
    }

    #[test]
    fn distinct_platform_refs_preserve_order() {
        let record = ExperimentRecord {
            accession: "E-MEXP-1".to_string(),
            name: String::new(),
            assays: vec![
                assay("s1", Some("A-AFFY-6")),
                assay("s2", None),
                assay("s3", Some("A-MEXP-10")),
                assay("s4", Some("A-AFFY-6")),
            ],
            quantitation_types: Vec::new(),
            platform: None,
            assay_dimension: None,
            vectors: Vec::new(),
        };
        assert_eq!(record.distinct_platform_refs(), vec!["A-AFFY-6", "A-MEXP-10"]);
    }

    #[test]
    fn repoint_assays_overwrites_partial_references() {
        let mut record = ExperimentRecord {
            accession: "E-MEXP-1".to_string(),
            name: String::new(),
            assays: vec![assay("s1", Some("A-OLD-1")), assay("s2", None)],
            quantitation_types: Vec::new(),
            platform: None,
            assay_dimension: None,
            vectors: Vec::new(),
        };
        record.repoint_assays("A-AFFY-6");
        assert!(
            record
                .assays
                .iter()
                .all(|a| a.platform_ref.as_deref() == Some("A-AFFY-6"))
        );
    }

    #[test]
    fn representation_serde_names() {
        let json = serde_json::to_string(&Representation::Float).unwrap();
        assert_eq!(json, "\"float\"");
        let back: Representation = serde_json::from_str("\"boolean\"").unwrap();
        assert_eq!(back, Representation::Boolean);
    }
}

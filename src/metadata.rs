use std::io::Read;

use serde::Deserialize;

use crate::error::IngestError;
use crate::model::{Assay, ExperimentRecord, QuantitationType, Representation, Scale};

/// Conversion collaborator: turns the repository's structured metadata
/// document into an experiment skeleton (assays and quantitation types,
/// no data vectors yet).
pub trait MetadataConverter: Send + Sync {
    fn convert(&self, reader: &mut dyn Read) -> Result<ExperimentRecord, IngestError>;
}

#[derive(Debug, Deserialize)]
struct MetadataDocument {
    accession: String,
    #[serde(default)]
    name: String,
    assays: Vec<AssayEntry>,
    #[serde(default)]
    quantitation_types: Vec<QuantitationTypeEntry>,
}

#[derive(Debug, Deserialize)]
struct AssayEntry {
    name: String,
    #[serde(default)]
    platform: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QuantitationTypeEntry {
    name: String,
    representation: Representation,
    #[serde(default)]
    scale: Scale,
}

/// Reads the structured metadata JSON document.
#[derive(Debug, Clone, Default)]
pub struct JsonMetadataConverter;

impl MetadataConverter for JsonMetadataConverter {
    fn convert(&self, reader: &mut dyn Read) -> Result<ExperimentRecord, IngestError> {
        let document: MetadataDocument = serde_json::from_reader(reader)
            .map_err(|err| IngestError::MetadataParse(err.to_string()))?;
        if document.assays.is_empty() {
            return Err(IngestError::MetadataParse(
                "metadata declares no assays".to_string(),
            ));
        }

        Ok(ExperimentRecord {
            accession: document.accession,
            name: document.name,
            assays: document
                .assays
                .into_iter()
                .map(|entry| Assay {
                    name: entry.name,
                    platform_ref: entry.platform,
                })
                .collect(),
            quantitation_types: document
                .quantitation_types
                .into_iter()
                .map(|entry| QuantitationType {
                    name: entry.name,
                    representation: entry.representation,
                    scale: entry.scale,
                })
                .collect(),
            platform: None,
            assay_dimension: None,
            vectors: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn converts_a_skeleton_document() {
        let json = r#"{
            "accession": "E-MEXP-297",
            "name": "wild type vs mutant",
            "assays": [
                {"name": "S1", "platform": "A-AFFY-6"},
                {"name": "S2"}
            ],
            "quantitation_types": [
                {"name": "ch1", "representation": "float", "scale": "log2"},
                {"name": "flag", "representation": "boolean"}
            ]
        }"#;
        let record = JsonMetadataConverter
            .convert(&mut json.as_bytes())
            .unwrap();
        assert_eq!(record.accession, "E-MEXP-297");
        assert_eq!(record.assays.len(), 2);
        assert_eq!(record.assays[0].platform_ref.as_deref(), Some("A-AFFY-6"));
        assert_eq!(record.quantitation_types.len(), 2);
        assert_eq!(
            record.quantitation_types[0].representation,
            Representation::Float
        );
        assert_eq!(record.quantitation_types[1].scale, Scale::Linear);
        assert!(record.vectors.is_empty());
    }

    #[test]
    fn rejects_assayless_documents() {
        let json = r#"{"accession": "E-MEXP-1", "assays": [], "quantitation_types": []}"#;
        let err = JsonMetadataConverter
            .convert(&mut json.as_bytes())
            .unwrap_err();
        assert_matches!(err, IngestError::MetadataParse(_));
    }

    #[test]
    fn rejects_malformed_documents() {
        let err = JsonMetadataConverter
            .convert(&mut "not json".as_bytes())
            .unwrap_err();
        assert_matches!(err, IngestError::MetadataParse(_));
    }
}

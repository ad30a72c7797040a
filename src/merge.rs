use std::collections::{HashMap, HashSet};

use tracing::info;

use crate::codec;
use crate::error::IngestError;
use crate::matrix::ProcessedDataTable;
use crate::model::{AssayDimension, DataVector, ExperimentRecord, Probe, QuantitationType};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeSummary {
    pub vectors: usize,
    pub pruned_types: Vec<String>,
}

/// Aligns the consolidated data table against the metadata-derived record and
/// attaches binary-encoded vectors. Any identity mismatch aborts the merge
/// with nothing attached; unused quantitation types are pruned afterwards.
pub fn merge(
    record: &mut ExperimentRecord,
    table: &ProcessedDataTable,
) -> Result<MergeSummary, IngestError> {
    if record.quantitation_types.is_empty() {
        return Err(IngestError::NoQuantitationTypes);
    }
    let platform = record
        .platform
        .as_ref()
        .ok_or_else(|| IngestError::NoPlatform(record.accession.clone()))?;
    if !platform.is_resolved() {
        return Err(IngestError::EmptyPlatform(platform.name.clone()));
    }

    let probe_index: HashMap<&str, &Probe> = platform
        .probes
        .iter()
        .map(|p| (p.name.as_str(), p))
        .collect();
    let type_index: HashMap<&str, &QuantitationType> = record
        .quantitation_types
        .iter()
        .map(|qt| (qt.name.as_str(), qt))
        .collect();
    let assay_index: HashSet<&str> = record.assays.iter().map(|a| a.name.as_str()).collect();

    let mut assay_names = Vec::with_capacity(table.samples().len());
    for sample in table.samples() {
        if !assay_index.contains(sample.as_str()) {
            return Err(IngestError::UnknownSample(sample.clone()));
        }
        assay_names.push(sample.clone());
    }

    let mut vectors = Vec::new();
    let mut used_types: HashSet<String> = HashSet::new();
    for (probe_name, row) in table.iter() {
        let probe = probe_index
            .get(probe_name.as_str())
            .ok_or_else(|| IngestError::UnknownProbe(probe_name.clone()))?;
        for (type_name, values) in row {
            let quantitation_type = type_index
                .get(type_name.as_str())
                .ok_or_else(|| IngestError::UnknownQuantitationType(type_name.clone()))?;
            let data = codec::encode(values, quantitation_type.representation)?;
            vectors.push(DataVector {
                probe: probe.name.clone(),
                quantitation_type: quantitation_type.name.clone(),
                data,
            });
            used_types.insert(quantitation_type.name.clone());
        }
    }

    record.assay_dimension = Some(AssayDimension { assay_names });
    record.vectors = vectors;

    let pruned_types: Vec<String> = record
        .quantitation_types
        .iter()
        .filter(|qt| !used_types.contains(&qt.name))
        .map(|qt| qt.name.clone())
        .collect();
    record
        .quantitation_types
        .retain(|qt| used_types.contains(&qt.name));

    if !pruned_types.is_empty() {
        info!(pruned = ?pruned_types, "removed quantitation types with no data");
    }
    info!(vectors = record.vectors.len(), "merge complete");
    Ok(MergeSummary {
        vectors: record.vectors.len(),
        pruned_types,
    })
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use crate::matrix::parse_matrix;
    use crate::model::{Assay, Platform, Representation, Scale};

    use super::*;

    fn record_with(probes: &[&str], types: &[(&str, Representation)]) -> ExperimentRecord {
        let mut platform = Platform::named("A-AFFY-6");
        platform.probes = probes
            .iter()
            .map(|name| Probe {
                name: name.to_string(),
                description: String::new(),
                sequence: None,
            })
            .collect();
        ExperimentRecord {
            accession: "E-MEXP-1".to_string(),
            name: String::new(),
            assays: vec![
                Assay {
                    name: "S1".to_string(),
                    platform_ref: Some("A-AFFY-6".to_string()),
                },
                Assay {
                    name: "S2".to_string(),
                    platform_ref: Some("A-AFFY-6".to_string()),
                },
            ],
            quantitation_types: types
                .iter()
                .map(|(name, representation)| QuantitationType {
                    name: name.to_string(),
                    representation: *representation,
                    scale: Scale::Linear,
                })
                .collect(),
            platform: Some(platform),
            assay_dimension: None,
            vectors: Vec::new(),
        }
    }

    fn table_from(text: &str) -> ProcessedDataTable {
        let mut table = ProcessedDataTable::new();
        parse_matrix(text.as_bytes(), &mut table).unwrap();
        table
    }

    #[test]
    fn merges_vectors_in_sample_order() {
        let mut record = record_with(&["p1", "p2"], &[("signal", Representation::Float)]);
        let table = table_from("\tS1\tS2\n\tsignal\tsignal\np1\t1.0\t2.0\np2\t3.0\t4.0\n");

        let summary = merge(&mut record, &table).unwrap();
        assert_eq!(summary.vectors, 2);
        assert_eq!(
            record.assay_dimension.as_ref().unwrap().assay_names,
            ["S1", "S2"]
        );
        assert_eq!(record.vectors.len(), 2);
    }

    #[test]
    fn unknown_sample_aborts() {
        let mut record = record_with(&["p1"], &[("signal", Representation::Float)]);
        let table = table_from("\tS9\n\tsignal\np1\t1.0\n");
        let err = merge(&mut record, &table).unwrap_err();
        assert_matches!(err, IngestError::UnknownSample(name) if name == "S9");
        assert!(record.vectors.is_empty());
    }

    #[test]
    fn unknown_probe_aborts_with_zero_vectors() {
        let mut record = record_with(&["p1"], &[("signal", Representation::Float)]);
        let table = table_from("\tS1\n\tsignal\np1\t1.0\nghost\t2.0\n");
        let err = merge(&mut record, &table).unwrap_err();
        assert_matches!(err, IngestError::UnknownProbe(name) if name == "ghost");
        assert!(record.vectors.is_empty());
        assert!(record.assay_dimension.is_none());
    }

    #[test]
    fn unknown_quantitation_type_aborts() {
        let mut record = record_with(&["p1"], &[("signal", Representation::Float)]);
        let table = table_from("\tS1\n\tmystery\np1\t1.0\n");
        let err = merge(&mut record, &table).unwrap_err();
        assert_matches!(err, IngestError::UnknownQuantitationType(name) if name == "mystery");
    }

    #[test]
    fn unused_quantitation_types_are_pruned() {
        let mut record = record_with(
            &["p1"],
            &[
                ("signal", Representation::Float),
                ("background", Representation::Float),
            ],
        );
        let table = table_from("\tS1\n\tsignal\np1\t1.0\n");
        let summary = merge(&mut record, &table).unwrap();
        assert_eq!(summary.pruned_types, ["background"]);
        assert_eq!(record.quantitation_types.len(), 1);
        assert_eq!(record.quantitation_types[0].name, "signal");
    }

    #[test]
    fn zero_quantitation_types_fail_fast() {
        let mut record = record_with(&["p1"], &[]);
        let table = table_from("\tS1\n\tsignal\np1\t1.0\n");
        let err = merge(&mut record, &table).unwrap_err();
        assert_matches!(err, IngestError::NoQuantitationTypes);
    }

    #[test]
    fn unresolved_platform_is_fatal() {
        let mut record = record_with(&[], &[("signal", Representation::Float)]);
        let table = table_from("\tS1\n\tsignal\np1\t1.0\n");
        let err = merge(&mut record, &table).unwrap_err();
        assert_matches!(err, IngestError::EmptyPlatform(_));
    }
}

use std::io::{self, Write};

use serde::Serialize;

use crate::matrix::ProcessedDataTable;
use crate::pipeline::LoadOutcome;

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoadReport {
    pub accession: String,
    pub platform: Option<String>,
    pub assays: usize,
    pub quantitation_types: usize,
    pub vectors: usize,
    pub pruned_types: Vec<String>,
    pub persisted_path: Option<String>,
}

impl LoadReport {
    pub fn from_outcome(outcome: &LoadOutcome) -> Self {
        Self {
            accession: outcome.record.accession.clone(),
            platform: outcome.record.platform.as_ref().map(|p| p.name.clone()),
            assays: outcome.record.assays.len(),
            quantitation_types: outcome.record.quantitation_types.len(),
            vectors: outcome.record.vectors.len(),
            pruned_types: outcome.merge.pruned_types.clone(),
            persisted_path: outcome.persisted.as_ref().map(|p| p.path.clone()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PlatformReport {
    pub platform: String,
    pub probes: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct InspectReport {
    pub samples: Vec<String>,
    pub probes: usize,
    pub uses_reporter_ids: bool,
}

impl InspectReport {
    pub fn from_table(table: &ProcessedDataTable) -> Self {
        Self {
            samples: table.samples().to_vec(),
            probes: table.probe_count(),
            uses_reporter_ids: table.uses_reporter_ids(),
        }
    }
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_load(report: &LoadReport) -> io::Result<()> {
        Self::print_json(report)
    }

    pub fn print_platform(report: &PlatformReport) -> io::Result<()> {
        Self::print_json(report)
    }

    pub fn print_inspect(report: &InspectReport) -> io::Result<()> {
        Self::print_json(report)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

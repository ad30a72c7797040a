use std::collections::BTreeMap;
use std::io::BufRead;

use crate::domain::strip_qualifier;
use crate::error::IngestError;

/// Consolidated probe -> quantitation-type -> raw values table, keyed by
/// sample identity. One table accumulates the results of parsing every
/// processed-data file belonging to an experiment.
#[derive(Debug, Default)]
pub struct ProcessedDataTable {
    samples: Vec<String>,
    probes: BTreeMap<String, BTreeMap<String, Vec<String>>>,
    uses_reporter_ids: bool,
}

impl ProcessedDataTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sample names in file order, deduplicated across all parsed files.
    pub fn samples(&self) -> &[String] {
        &self.samples
    }

    pub fn probe_count(&self) -> usize {
        self.probes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.probes.is_empty()
    }

    /// Whether the matrix keys rows by reporter identifiers rather than
    /// composite-sequence identifiers, judged from the row qualifiers.
    pub fn uses_reporter_ids(&self) -> bool {
        self.uses_reporter_ids
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &BTreeMap<String, Vec<String>>)> {
        self.probes.iter()
    }

    pub fn get(&self, probe: &str) -> Option<&BTreeMap<String, Vec<String>>> {
        self.probes.get(probe)
    }

    fn add_sample(&mut self, name: &str) {
        if !self.samples.iter().any(|s| s == name) {
            self.samples.push(name.to_string());
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MatrixRow {
    SampleHeader,
    TypeHeader,
    Data,
}

/// Per-file parser state. The first row names samples, the second names
/// quantitation types per column, everything after is data.
#[derive(Debug)]
pub struct MatrixState {
    row: MatrixRow,
    line: usize,
    type_columns: Vec<(String, Vec<usize>)>,
}

impl MatrixState {
    pub fn new() -> Self {
        Self {
            row: MatrixRow::SampleHeader,
            line: 0,
            type_columns: Vec::new(),
        }
    }
}

impl Default for MatrixState {
    fn default() -> Self {
        Self::new()
    }
}

/// Consumes one line of a processed-data file, accumulating into `table`.
pub fn parse_line(
    state: &mut MatrixState,
    line: &str,
    table: &mut ProcessedDataTable,
) -> Result<(), IngestError> {
    state.line += 1;
    if line.is_empty() {
        return Ok(());
    }
    let fields: Vec<&str> = line.split('\t').collect();

    match state.row {
        MatrixRow::SampleHeader => {
            // Column 0 is the row-label column; two-channel data repeats a
            // sample name across columns, so dedupe preserving order.
            for name in &fields[1..] {
                if !name.is_empty() {
                    table.add_sample(name);
                }
            }
            state.row = MatrixRow::TypeHeader;
        }
        MatrixRow::TypeHeader => {
            for (idx, token) in fields.iter().enumerate().skip(1) {
                let name = type_name(token);
                match state.type_columns.iter_mut().find(|(n, _)| n == &name) {
                    Some((_, cols)) => cols.push(idx),
                    None => state.type_columns.push((name, vec![idx])),
                }
            }
            state.row = MatrixRow::Data;
        }
        MatrixRow::Data => {
            let raw_probe = fields[0];
            if raw_probe.is_empty() {
                return Err(IngestError::Parse {
                    line: state.line,
                    message: "data row has no probe identifier".to_string(),
                });
            }
            if has_reporter_qualifier(raw_probe) {
                table.uses_reporter_ids = true;
            }
            let probe = strip_qualifier(raw_probe).to_string();

            let mut row = BTreeMap::new();
            for (name, cols) in &state.type_columns {
                let mut values = Vec::with_capacity(cols.len());
                for &col in cols {
                    let Some(value) = fields.get(col) else {
                        return Err(IngestError::Parse {
                            line: state.line,
                            message: format!(
                                "data row has {} fields, expected at least {}",
                                fields.len(),
                                col + 1
                            ),
                        });
                    };
                    values.push(value.to_string());
                }
                row.insert(name.clone(), values);
            }
            // A probe re-parsed from a later file replaces the earlier row.
            table.probes.insert(probe, row);
        }
    }
    Ok(())
}

/// Column-type tokens look like `<sample-qualifier>:<type name>`; a token
/// without a qualifier is the type name itself.
fn type_name(token: &str) -> String {
    let mut parts = token.splitn(3, ':');
    let first = parts.next().unwrap_or_default();
    match parts.next() {
        Some(second) => second.to_string(),
        None => first.to_string(),
    }
}

fn has_reporter_qualifier(raw: &str) -> bool {
    let Some(qualifier_end) = raw.rfind(':') else {
        return false;
    };
    raw[..qualifier_end]
        .split(':')
        .any(|segment| segment.eq_ignore_ascii_case("reporter"))
}

/// Parses one file into `table`; results accumulate across files.
pub fn parse_matrix<R: BufRead>(
    reader: R,
    table: &mut ProcessedDataTable,
) -> Result<(), IngestError> {
    let mut state = MatrixState::new();
    for line in reader.lines() {
        let line = line.map_err(|err| IngestError::Filesystem(err.to_string()))?;
        parse_line(&mut state, &line, table)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn table_from(text: &str) -> ProcessedDataTable {
        let mut table = ProcessedDataTable::new();
        parse_matrix(text.as_bytes(), &mut table).unwrap();
        table
    }

    #[test]
    fn two_channel_matrix() {
        let table = table_from(
            "\tS1\tS1\tS2\n\tratio:ch1\tratio:ch2\tratio:ch1\nprobeA:1\t1.0\t2.0\t3.0\n",
        );
        assert_eq!(table.samples(), ["S1", "S2"]);
        let row = table.get("1").unwrap();
        assert_eq!(row["ch1"], ["1.0", "3.0"]);
        assert_eq!(row["ch2"], ["2.0"]);
    }

    #[test]
    fn unqualified_type_tokens() {
        let table = table_from("\tS1\tS2\n\tVALUE\tVALUE\nprobeA\t1\t2\n");
        let row = table.get("probeA").unwrap();
        assert_eq!(row["VALUE"], ["1", "2"]);
    }

    #[test]
    fn reporter_qualifier_detection() {
        let table = table_from("\tS1\n\tsignal\nebi.ac.uk:Reporter:R-1\t5.5\n");
        assert!(table.uses_reporter_ids());
        assert!(table.get("R-1").is_some());

        let plain = table_from("\tS1\n\tsignal\nae:CompositeSequence:C-1\t5.5\n");
        assert!(!plain.uses_reporter_ids());
    }

    #[test]
    fn accumulates_across_files_with_last_write_wins() {
        let mut table = ProcessedDataTable::new();
        parse_matrix("\tS1\n\tsignal\np1\t1.0\np2\t2.0\n".as_bytes(), &mut table).unwrap();
        parse_matrix("\tS2\n\tsignal\np2\t9.0\n".as_bytes(), &mut table).unwrap();

        assert_eq!(table.samples(), ["S1", "S2"]);
        assert_eq!(table.probe_count(), 2);
        assert_eq!(table.get("p1").unwrap()["signal"], ["1.0"]);
        assert_eq!(table.get("p2").unwrap()["signal"], ["9.0"]);
    }

    #[test]
    fn short_data_row_is_a_parse_error() {
        let mut table = ProcessedDataTable::new();
        let err =
            parse_matrix("\tS1\tS2\n\tv\tv\nprobeA\t1\n".as_bytes(), &mut table).unwrap_err();
        assert_matches!(err, IngestError::Parse { line: 3, .. });
    }
}

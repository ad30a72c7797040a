use std::io::BufRead;

use crate::error::IngestError;

/// Parser state for the sample-description (SDRF) table. Only the
/// `Array Design REF` column is of interest: it names the platform each
/// sample was run on.
#[derive(Debug)]
pub struct SdrfState {
    array_column: Option<usize>,
    saw_header: bool,
    line: usize,
}

impl SdrfState {
    pub fn new() -> Self {
        Self {
            array_column: None,
            saw_header: false,
            line: 0,
        }
    }
}

impl Default for SdrfState {
    fn default() -> Self {
        Self::new()
    }
}

/// Consumes one line, returning the row's platform reference if the file
/// declares one.
pub fn parse_line(state: &mut SdrfState, line: &str) -> Result<Option<String>, IngestError> {
    state.line += 1;
    let fields: Vec<&str> = line.split('\t').collect();

    if !state.saw_header {
        state.array_column = fields.iter().position(|f| f.trim() == "Array Design REF");
        state.saw_header = true;
        return Ok(None);
    }

    let value = state
        .array_column
        .and_then(|idx| fields.get(idx))
        .map(|v| v.trim())
        .filter(|v| !v.is_empty());
    Ok(value.map(str::to_string))
}

/// Distinct platform references in first-seen order.
pub fn platform_refs<R: BufRead>(reader: R) -> Result<Vec<String>, IngestError> {
    let mut state = SdrfState::new();
    let mut refs: Vec<String> = Vec::new();
    for line in reader.lines() {
        let line = line.map_err(|err| IngestError::Filesystem(err.to_string()))?;
        if let Some(value) = parse_line(&mut state, &line)? {
            if !refs.iter().any(|r| r == &value) {
                refs.push(value);
            }
        }
    }
    Ok(refs)
}

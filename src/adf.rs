use std::io::BufRead;

use crate::domain::strip_qualifier;
use crate::error::IngestError;
use crate::model::Probe;

/// Parser state for a platform description (ADF) file. The first row is a
/// header whose column names select the fields used for probe construction;
/// every later row yields at most one probe.
#[derive(Debug)]
pub struct AdfState {
    use_reporter_ids: bool,
    columns: Option<AdfColumns>,
    line: usize,
}

#[derive(Debug, Default)]
struct AdfColumns {
    cs_name: Option<usize>,
    cs_identifier: Option<usize>,
    cs_comment: Option<usize>,
    reporter_identifier: Option<usize>,
    reporter_comment: Option<usize>,
    reporter_sequence: Option<usize>,
}

impl AdfState {
    /// `use_reporter_ids` keys probes by reporter identifier instead of
    /// composite-sequence identifier, matching matrices whose rows are
    /// reporter-based.
    pub fn new(use_reporter_ids: bool) -> Self {
        Self {
            use_reporter_ids,
            columns: None,
            line: 0,
        }
    }

    fn parse_header(&mut self, line: &str) {
        let mut columns = AdfColumns::default();
        for (idx, raw) in line.split('\t').enumerate() {
            // Fixed vocabulary, matched case-insensitively; anything else is
            // ignored. "Reporter Name" and "MetaColumn" are recognized but
            // take no part in probe construction.
            match raw.trim().to_lowercase().as_str() {
                "compositesequence name" => columns.cs_name = Some(idx),
                "compositesequence identifier" => columns.cs_identifier = Some(idx),
                "compositesequence comment" => columns.cs_comment = Some(idx),
                "reporter identifier" => columns.reporter_identifier = Some(idx),
                "reporter comment" => columns.reporter_comment = Some(idx),
                "reporter actual sequence" => columns.reporter_sequence = Some(idx),
                "reporter name" | "metacolumn" => {}
                _ => {}
            }
        }
        self.columns = Some(columns);
    }
}

/// Consumes one line, returning a probe for data rows that produce one.
/// Rows with fewer than two tab-separated fields are skipped.
pub fn parse_line(state: &mut AdfState, line: &str) -> Result<Option<Probe>, IngestError> {
    state.line += 1;

    let Some(columns) = &state.columns else {
        state.parse_header(line);
        return Ok(None);
    };

    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() < 2 {
        return Ok(None);
    }

    let field = |idx: Option<usize>| idx.and_then(|i| fields.get(i)).copied();

    let cs_name = field(columns.cs_name);
    let wants_reporter = state.use_reporter_ids || cs_name == Some("-");

    let source = if wants_reporter {
        field(columns.reporter_identifier)
    } else {
        field(columns.cs_identifier).or(cs_name)
    };
    let Some(source) = source.filter(|s| !s.is_empty()) else {
        return Err(IngestError::Parse {
            line: state.line,
            message: "row has no probe identifier".to_string(),
        });
    };
    let name = strip_qualifier(source).to_string();

    let description = field(columns.cs_comment)
        .filter(|s| !s.is_empty())
        .or_else(|| field(columns.reporter_comment).filter(|s| !s.is_empty()))
        .map(normalize_placeholder)
        .unwrap_or_default();

    let sequence = field(columns.reporter_sequence)
        .map(normalize_placeholder)
        .filter(|s| !s.is_empty());

    Ok(Some(Probe {
        name,
        description,
        sequence,
    }))
}

/// A literal `"-"` is the format's placeholder for "no value".
fn normalize_placeholder(value: &str) -> String {
    if value == "-" {
        String::new()
    } else {
        value.to_string()
    }
}

/// Parses a whole description file, accumulating probes.
pub fn parse_adf<R: BufRead>(reader: R, use_reporter_ids: bool) -> Result<Vec<Probe>, IngestError> {
    let mut state = AdfState::new(use_reporter_ids);
    let mut probes = Vec::new();
    for line in reader.lines() {
        let line = line.map_err(|err| IngestError::Filesystem(err.to_string()))?;
        if let Some(probe) = parse_line(&mut state, &line)? {
            probes.push(probe);
        }
    }
    Ok(probes)
}

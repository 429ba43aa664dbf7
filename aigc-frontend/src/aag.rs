//! Raw AAG (ASCII AIGER) parsing: turns the text format into the flat
//! tables `lower.rs` resolves into a `TransitionSystem`. No symbolic
//! reasoning happens here.

use aigc_ir::ParseError;

#[derive(Debug, Clone, Copy)]
pub struct Header {
    pub max_var_index: u64,
    pub inputs: usize,
    pub latches: usize,
    pub outputs: usize,
    pub ands: usize,
    pub bads: usize,
    pub invariants: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct RawLatch {
    pub var: u64,
    pub next: u64,
    /// `None` means the latch line omitted the initial value; AIGER
    /// defaults an omitted initial value to 0.
    pub init: Option<bool>,
}

#[derive(Debug, Clone, Copy)]
pub struct RawAnd {
    pub lhs: u64,
    pub rhs0: u64,
    pub rhs1: u64,
}

#[derive(Debug, Default)]
pub struct RawAag {
    pub header: Option<Header>,
    pub inputs: Vec<u64>,
    pub latches: Vec<RawLatch>,
    pub outputs: Vec<u64>,
    pub bads: Vec<u64>,
    pub invariants: Vec<u64>,
    pub ands: Vec<RawAnd>,
    /// Symbol-table annotations, in file order, consumed against inputs and
    /// then latches (matching the reference parser's single shared
    /// counter — constraint/output/bad symbol lines are not consumed here).
    pub annotations: Vec<String>,
}

fn parse_u64(field: &str, line_no: usize) -> Result<u64, ParseError> {
    field.parse::<u64>().map_err(|_| ParseError::UnexpectedLine {
        line: line_no,
        content: field.to_string(),
    })
}

/// Parses the textual AAG body. Constraint/fairness/justice properties
/// (headers with more than 7 numeric fields) are explicitly unsupported,
/// matching the scope of the system this was distilled from.
pub fn parse_aag(text: &str) -> Result<RawAag, ParseError> {
    let mut lines = text.lines().enumerate();
    let mut aag = RawAag::default();

    let (header_no, header_line) = lines
        .next()
        .ok_or_else(|| ParseError::MalformedHeader("empty file".to_string()))?;
    let header = parse_header(header_line, header_no)?;
    aag.header = Some(header);

    let mut remaining_inputs = header.inputs;
    let mut remaining_latches = header.latches;
    let mut remaining_outputs = header.outputs;
    let mut remaining_bads = header.bads;
    let mut remaining_invariants = header.invariants;
    let mut remaining_ands = header.ands;

    for (line_no, line) in lines {
        if line.is_empty() {
            continue;
        }
        if remaining_inputs > 0 {
            aag.inputs.push(parse_single(line, line_no)?);
            remaining_inputs -= 1;
        } else if remaining_latches > 0 {
            aag.latches.push(parse_latch(line, line_no)?);
            remaining_latches -= 1;
        } else if remaining_outputs > 0 {
            aag.outputs.push(parse_single(line, line_no)?);
            remaining_outputs -= 1;
        } else if remaining_bads > 0 {
            aag.bads.push(parse_single(line, line_no)?);
            remaining_bads -= 1;
        } else if remaining_invariants > 0 {
            aag.invariants.push(parse_single(line, line_no)?);
            remaining_invariants -= 1;
        } else if remaining_ands > 0 {
            aag.ands.push(parse_and(line, line_no)?);
            remaining_ands -= 1;
        } else if line == "c" || line.starts_with('c') && !line.contains(' ') {
            break; // start of the free-form comment section
        } else if let Some(name) = parse_annotation(line) {
            aag.annotations.push(name);
        }
    }

    Ok(aag)
}

fn parse_header(line: &str, line_no: usize) -> Result<Header, ParseError> {
    let mut fields = line.split_whitespace();
    let magic = fields
        .next()
        .ok_or_else(|| ParseError::MalformedHeader(line.to_string()))?;
    if magic != "aag" {
        return Err(ParseError::MalformedHeader(line.to_string()));
    }
    let nums: Vec<&str> = fields.collect();
    if nums.len() < 5 {
        return Err(ParseError::MalformedHeader(line.to_string()));
    }
    if nums.len() > 7 {
        return Err(ParseError::UnsupportedPropertyClass);
    }
    let n = |i: usize| -> Result<u64, ParseError> {
        nums.get(i)
            .map(|f| parse_u64(f, line_no))
            .unwrap_or(Ok(0))
    };
    Ok(Header {
        max_var_index: n(0)?,
        inputs: n(1)? as usize,
        latches: n(2)? as usize,
        outputs: n(3)? as usize,
        ands: n(4)? as usize,
        bads: n(5)? as usize,
        invariants: n(6)? as usize,
    })
}

fn parse_single(line: &str, line_no: usize) -> Result<u64, ParseError> {
    parse_u64(line.trim(), line_no)
}

fn parse_latch(line: &str, line_no: usize) -> Result<RawLatch, ParseError> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 2 {
        return Err(ParseError::UnexpectedLine {
            line: line_no,
            content: line.to_string(),
        });
    }
    let var = parse_u64(fields[0], line_no)?;
    let next = parse_u64(fields[1], line_no)?;
    let init = match fields.get(2) {
        Some(&"0") => Some(false),
        Some(&"1") => Some(true),
        Some(other) => {
            return Err(ParseError::UnexpectedLine {
                line: line_no,
                content: other.to_string(),
            })
        }
        None => None,
    };
    Ok(RawLatch { var, next, init })
}

fn parse_and(line: &str, line_no: usize) -> Result<RawAnd, ParseError> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() != 3 {
        return Err(ParseError::UnexpectedLine {
            line: line_no,
            content: line.to_string(),
        });
    }
    Ok(RawAnd {
        lhs: parse_u64(fields[0], line_no)?,
        rhs0: parse_u64(fields[1], line_no)?,
        rhs1: parse_u64(fields[2], line_no)?,
    })
}

/// A symbol-table line looks like `i0 reset` or `l3 counter[2]`; we only
/// need the name.
fn parse_annotation(line: &str) -> Option<String> {
    let mut parts = line.splitn(2, ' ');
    let tag = parts.next()?;
    if tag.is_empty() || !matches!(tag.as_bytes()[0], b'i' | b'l' | b'o' | b'b') {
        return None;
    }
    parts.next().map(|s| s.trim().to_string())
}

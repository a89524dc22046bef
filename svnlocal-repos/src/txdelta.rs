//! Windowed text deltas
//!
//! A delta rebuilds a target byte string from a source one. It is split
//! into windows of at most `WINDOW_SIZE` target bytes; window `i` may copy
//! from the source bytes aligned with it, from what it has already produced,
//! or insert new bytes.

use svnlocal_fs::{Error, Result};

/// Target bytes produced per window
pub const WINDOW_SIZE: usize = 100 * 1024;

/// Shortest byte run worth folding into a self-copy
const MIN_RUN: usize = 8;

/// One instruction of a delta window
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeltaOp {
    /// Copy `len` bytes from the window's source view
    Source { offset: usize, len: usize },
    /// Copy `len` bytes from the window's own output; may overlap the
    /// bytes being produced
    Target { offset: usize, len: usize },
    /// Insert literal bytes
    New { data: Vec<u8> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeltaWindow {
    pub source_offset: usize,
    pub source_len: usize,
    pub target_len: usize,
    pub ops: Vec<DeltaOp>,
}

/// An ordered list of windows
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextDelta {
    pub windows: Vec<DeltaWindow>,
}

impl TextDelta {
    /// A delta with no windows. It produces empty output, and is what gets
    /// sent when a text change is reported without its content.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    /// Compute a delta turning `source` into `target`
    pub fn compute(source: &[u8], target: &[u8]) -> Self {
        let windows = target
            .chunks(WINDOW_SIZE)
            .enumerate()
            .map(|(i, chunk)| {
                let start = (i * WINDOW_SIZE).min(source.len());
                let end = (start + WINDOW_SIZE).min(source.len());
                compute_window(start, &source[start..end], chunk)
            })
            .collect();
        Self { windows }
    }

    /// Total number of literal bytes carried by the delta
    pub fn new_data_len(&self) -> usize {
        self.windows
            .iter()
            .flat_map(|w| &w.ops)
            .map(|op| match op {
                DeltaOp::New { data } => data.len(),
                _ => 0,
            })
            .sum()
    }

    /// Rebuild the target from `source`
    pub fn apply(&self, source: &[u8]) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        for (index, window) in self.windows.iter().enumerate() {
            let invalid = |what: String| Error::InvalidDelta(format!("window {}: {}", index, what));

            let view = window
                .source_offset
                .checked_add(window.source_len)
                .and_then(|end| source.get(window.source_offset..end))
                .ok_or_else(|| invalid("source view out of range".to_string()))?;

            let mut produced: Vec<u8> = Vec::with_capacity(window.target_len.min(WINDOW_SIZE));
            for op in &window.ops {
                let len = match op {
                    DeltaOp::Source { len, .. } | DeltaOp::Target { len, .. } => *len,
                    DeltaOp::New { data } => data.len(),
                };
                if produced
                    .len()
                    .checked_add(len)
                    .is_none_or(|end| end > window.target_len)
                {
                    return Err(invalid("output longer than declared".to_string()));
                }
                match op {
                    DeltaOp::Source { offset, len } => {
                        let bytes = offset
                            .checked_add(*len)
                            .and_then(|end| view.get(*offset..end))
                            .ok_or_else(|| invalid(format!("source copy {}+{}", offset, len)))?;
                        produced.extend_from_slice(bytes);
                    }
                    DeltaOp::Target { offset, len } => {
                        if *offset >= produced.len() && *len > 0 {
                            return Err(invalid(format!("target copy {}+{}", offset, len)));
                        }
                        // Byte by byte: the copy may read what it writes.
                        for i in 0..*len {
                            let byte = produced[offset + i];
                            produced.push(byte);
                        }
                    }
                    DeltaOp::New { data } => produced.extend_from_slice(data),
                }
            }
            if produced.len() != window.target_len {
                return Err(invalid(format!(
                    "produced {} bytes, declared {}",
                    produced.len(),
                    window.target_len
                )));
            }
            out.extend_from_slice(&produced);
        }
        Ok(out)
    }
}

fn compute_window(source_offset: usize, view: &[u8], target: &[u8]) -> DeltaWindow {
    let prefix = view
        .iter()
        .zip(target)
        .take_while(|(a, b)| a == b)
        .count();
    let suffix = view[prefix..]
        .iter()
        .rev()
        .zip(target[prefix..].iter().rev())
        .take_while(|(a, b)| a == b)
        .count();

    let mut ops = Vec::new();
    if prefix > 0 {
        ops.push(DeltaOp::Source {
            offset: 0,
            len: prefix,
        });
    }
    push_new(&mut ops, prefix, &target[prefix..target.len() - suffix]);
    if suffix > 0 {
        ops.push(DeltaOp::Source {
            offset: view.len() - suffix,
            len: suffix,
        });
    }

    DeltaWindow {
        source_offset,
        source_len: view.len(),
        target_len: target.len(),
        ops,
    }
}

/// Emit `data` (which starts at window offset `at`), folding long runs of
/// one byte into a single literal plus a self-copy.
fn push_new(ops: &mut Vec<DeltaOp>, at: usize, data: &[u8]) {
    let mut literal = Vec::new();
    let mut i = 0;
    while i < data.len() {
        let run = data[i..].iter().take_while(|&&b| b == data[i]).count();
        if run < MIN_RUN {
            literal.extend_from_slice(&data[i..i + run]);
            i += run;
            continue;
        }
        literal.push(data[i]);
        ops.push(DeltaOp::New {
            data: std::mem::take(&mut literal),
        });
        ops.push(DeltaOp::Target {
            offset: at + i,
            len: run - 1,
        });
        i += run;
    }
    if !literal.is_empty() {
        ops.push(DeltaOp::New { data: literal });
    }
}

use std::fs;
use std::path::Path;

use crate::constants::END_OF_STREAM;
use crate::error::SimError;
use crate::process::ProcessReport;

/// Reference string and bound of one process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSpec {
    pub bound: i32,
    pub references: Vec<i32>,
}

/// One `ProcessSpec` per pid, in pid order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Workload {
    pub processes: Vec<ProcessSpec>,
}

impl Workload {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SimError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| SimError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Parse `bound: r0 r1 r2 ...` lines. Blank lines and `#` comments are skipped;
    /// the n-th remaining line belongs to pid n.
    pub fn parse(content: &str) -> Result<Self, SimError> {
        let mut processes = Vec::new();
        for (lineno, raw) in content.lines().enumerate() {
            let line = raw.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            processes.push(Self::parse_line(line, lineno + 1)?);
        }

        if processes.is_empty() {
            return Err(SimError::Parse("workload file has no processes".to_string()));
        }
        Ok(Workload { processes })
    }

    fn parse_line(line: &str, lineno: usize) -> Result<ProcessSpec, SimError> {
        let (bound, refs) = line
            .split_once(':')
            .ok_or_else(|| SimError::Parse(format!("line {}: expected `bound: refs...`", lineno)))?;

        let bound: i32 = bound
            .trim()
            .parse()
            .map_err(|_| SimError::Parse(format!("line {}: invalid bound: {}", lineno, bound.trim())))?;
        if bound < 0 {
            return Err(SimError::Parse(format!("line {}: bound {} is negative", lineno, bound)));
        }

        let mut references = Vec::new();
        for token in refs.split_whitespace() {
            let page: i32 = token
                .parse()
                .map_err(|_| SimError::Parse(format!("line {}: invalid page reference: {}", lineno, token)))?;
            // the end-of-stream marker can't travel as a page access
            if page == END_OF_STREAM {
                return Err(SimError::Parse(format!(
                    "line {}: page reference {} is reserved for end of stream",
                    lineno, page
                )));
            }
            references.push(page);
        }
        Ok(ProcessSpec { bound, references })
    }

    pub fn len(&self) -> usize {
        self.processes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processes.is_empty()
    }

    /// Largest page number any process references, used to size page tables
    pub fn max_page(&self) -> Option<i32> {
        self.processes.iter().flat_map(|p| p.references.iter().copied()).max()
    }
}

/// One line per process: the reply codes it received, space separated
pub fn format_results(reports: &[ProcessReport]) -> String {
    let mut sorted: Vec<&ProcessReport> = reports.iter().collect();
    sorted.sort_by_key(|r| r.pid);
    sorted
        .iter()
        .map(|r| r.results.iter().map(|c| c.to_string()).collect::<Vec<_>>().join(" "))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn write_results<P: AsRef<Path>>(path: P, reports: &[ProcessReport]) -> Result<(), SimError> {
    let path = path.as_ref();
    let mut content = format_results(reports);
    content.push('\n');
    fs::write(path, content).map_err(|source| SimError::Io {
        path: path.display().to_string(),
        source,
    })
}

use std::path::Path;

use thiserror::Error;

use crate::model::{Part, Problem};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Cannot read {path}: {message}")]
    Io { path: String, message: String },
    #[error("Missing line {line}: expected {expected}")]
    MissingLine { line: usize, expected: &'static str },
    #[error("Line {line}: expected a bracketed list like [1, 2, 3], found {found:?}")]
    ExpectedList { line: usize, found: String },
    #[error("Line {line}: invalid number {text:?}")]
    InvalidNumber { line: usize, text: String },
    #[error("Line {line}: {what} must be positive, got {value}")]
    NonPositive { line: usize, what: &'static str, value: f64 },
    #[error("Line {line}: demand must be a non-negative integer, got {text:?}")]
    InvalidDemand { line: usize, text: String },
    #[error("{lengths} part lengths but {demands} demands")]
    LengthMismatch { lengths: usize, demands: usize },
    #[error("Line {line}: unexpected content after the demand list")]
    TrailingContent { line: usize },
}

/// Reads the three-line problem format:
///
/// ```text
/// 10
/// [3, 4]
/// [2, 2]
/// ```
///
/// material length, part lengths, part demands.
pub struct Parser<'a> {
    lines: Vec<(usize, &'a str)>,
    pos: usize,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str) -> Self {
        let lines = source
            .lines()
            .enumerate()
            .map(|(i, l)| (i + 1, l.trim()))
            .filter(|(_, l)| !l.is_empty())
            .collect();
        Self { lines, pos: 0 }
    }

    pub fn parse(source: &str) -> Result<Problem, ParseError> {
        Parser::new(source).parse_problem()
    }

    pub fn parse_file(path: impl AsRef<Path>) -> Result<Problem, ParseError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| ParseError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::parse(&source)
    }

    fn next_line(&mut self, expected: &'static str) -> Result<(usize, &'a str), ParseError> {
        let line = self.lines.get(self.pos).copied().ok_or(ParseError::MissingLine {
            line: self.pos + 1,
            expected,
        })?;
        self.pos += 1;
        Ok(line)
    }

    fn parse_problem(&mut self) -> Result<Problem, ParseError> {
        let (line, text) = self.next_line("material length")?;
        let material_length = parse_number(line, text)?;
        if material_length <= 0.0 {
            return Err(ParseError::NonPositive {
                line,
                what: "material length",
                value: material_length,
            });
        }

        let (line, text) = self.next_line("part lengths")?;
        let lengths = list_items(line, text)?
            .into_iter()
            .map(|item| {
                let value = parse_number(line, item)?;
                if value <= 0.0 {
                    return Err(ParseError::NonPositive {
                        line,
                        what: "part length",
                        value,
                    });
                }
                Ok(value)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let (line, text) = self.next_line("part demands")?;
        let demands = list_items(line, text)?
            .into_iter()
            .map(|item| parse_demand(line, item))
            .collect::<Result<Vec<_>, _>>()?;

        if let Some(&(line, _)) = self.lines.get(self.pos) {
            return Err(ParseError::TrailingContent { line });
        }

        if lengths.len() != demands.len() {
            return Err(ParseError::LengthMismatch {
                lengths: lengths.len(),
                demands: demands.len(),
            });
        }

        let parts = lengths
            .into_iter()
            .zip(demands)
            .map(|(length, demand)| Part { length, demand })
            .collect();
        Ok(Problem::new(material_length, parts))
    }
}

/// Splits `[a, b, c]` into its trimmed items; `[]` yields none
fn list_items(line: usize, text: &str) -> Result<Vec<&str>, ParseError> {
    let inner = text
        .strip_prefix('[')
        .and_then(|t| t.strip_suffix(']'))
        .ok_or_else(|| ParseError::ExpectedList {
            line,
            found: text.to_string(),
        })?
        .trim();

    if inner.is_empty() {
        return Ok(Vec::new());
    }
    Ok(inner.split(',').map(str::trim).collect())
}

fn parse_number(line: usize, text: &str) -> Result<f64, ParseError> {
    text.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ParseError::InvalidNumber {
            line,
            text: text.to_string(),
        })
}

/// Demands are counts; `5` and `5.0` are accepted, `-1` and `2.5` are not
fn parse_demand(line: usize, text: &str) -> Result<u32, ParseError> {
    if let Ok(n) = text.parse::<u32>() {
        return Ok(n);
    }
    let value = parse_number(line, text)?;
    if value < 0.0 || value.fract() != 0.0 || value > u32::MAX as f64 {
        return Err(ParseError::InvalidDemand {
            line,
            text: text.to_string(),
        });
    }
    Ok(value as u32)
}

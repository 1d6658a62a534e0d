// Breakpoint lists: [0, 10, 20, 30) or [0, 11580, 18120, inf) -> A, B, C

use super::lexer::{identifier, number_literal, string_literal, ws};
use crate::bucket::Breakpoints;
use crate::error::{Error, Result};
use nom::{
    branch::alt,
    bytes::complete::{tag, tag_no_case},
    character::complete::{char, digit1},
    combinator::{all_consuming, map, opt, recognize, value},
    multi::separated_list1,
    sequence::{delimited, pair, preceded},
    IResult,
};

/// Parsed form before validation
#[derive(Debug, Clone, PartialEq)]
pub struct BreaksSpec {
    pub edges: Vec<f64>,
    pub open_ended: bool,
    pub labels: Option<Vec<String>>,
}

fn edge(input: &str) -> IResult<&str, Option<f64>> {
    alt((
        value(None, alt((tag_no_case("infinity"), tag_no_case("inf")))),
        map(number_literal, Some),
    ))(input)
}

fn label(input: &str) -> IResult<&str, String> {
    alt((
        string_literal,
        identifier,
        map(recognize(pair(digit1, opt(tag("+")))), |s: &str| s.to_string()),
    ))(input)
}

/// Parse the bracketed edge list and the optional `-> labels` suffix
pub fn parse_breaks(input: &str) -> IResult<&str, BreaksSpec> {
    let (input, edges) = delimited(ws(char('[')), separated_list1(ws(char(',')), ws(edge)), ws(char(')')))(input)?;
    let (input, labels) = opt(preceded(ws(tag("->")), separated_list1(ws(char(',')), ws(label))))(input)?;

    let open_ended = matches!(edges.last(), Some(None));
    let finite = edges.iter().take(edges.len() - usize::from(open_ended)).copied();
    Ok((
        input,
        BreaksSpec {
            // An `inf` before the last position stays as a non-finite edge and fails validation.
            edges: finite.map(|e| e.unwrap_or(f64::INFINITY)).collect(),
            open_ended,
            labels,
        },
    ))
}

fn number_label(v: f64) -> String {
    crate::data::Value::Number(v).to_string()
}

impl BreaksSpec {
    /// Validate into breakpoints. Without explicit labels, buckets are named `lo-hi`
    /// and the overflow bucket `lo+`.
    pub fn into_breakpoints(self) -> Result<Breakpoints> {
        let buckets = self.edges.len().saturating_sub(1);
        let (labels, overflow) = match self.labels {
            Some(mut labels) => {
                let expected = buckets + usize::from(self.open_ended);
                if labels.len() != expected {
                    return Err(Error::Parse(format!("expected {} labels, got {}", expected, labels.len())));
                }
                let overflow = if self.open_ended { labels.pop() } else { None };
                (labels, overflow)
            }
            None => {
                let labels = self
                    .edges
                    .windows(2)
                    .map(|w| format!("{}-{}", number_label(w[0]), number_label(w[1])))
                    .collect();
                let overflow = if self.open_ended {
                    self.edges.last().map(|e| format!("{}+", number_label(*e)))
                } else {
                    None
                };
                (labels, overflow)
            }
        };
        Breakpoints::new(self.edges, labels, overflow)
    }
}

/// Parse and validate a breakpoint list
pub fn parse_breakpoints(input: &str) -> Result<Breakpoints> {
    let (_, spec) = all_consuming(parse_breaks)(input)
        .map_err(|e| Error::Parse(format!("invalid breakpoints '{}': {}", input, e)))?;
    spec.into_breakpoints()
}

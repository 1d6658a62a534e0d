// Selection strings: borough=Bronx, species="American beech"

use super::lexer::{identifier, string_literal, ws};
use crate::controller::Selection;
use crate::error::{Error, Result};
use nom::{
    branch::alt,
    bytes::complete::take_till1,
    character::complete::char,
    combinator::{all_consuming, map},
    multi::separated_list0,
    sequence::separated_pair,
    IResult,
};

/// An unquoted value runs to the next comma; surrounding spaces are dropped
fn bare_value(input: &str) -> IResult<&str, String> {
    map(take_till1(|c| c == ','), |s: &str| s.trim().to_string())(input)
}

/// Parse one `name=value` pair
pub fn parse_pair(input: &str) -> IResult<&str, (String, String)> {
    separated_pair(ws(identifier), char('='), ws(alt((string_literal, bare_value))))(input)
}

/// Parse a comma-separated list of pairs
pub fn parse_pairs(input: &str) -> IResult<&str, Vec<(String, String)>> {
    separated_list0(char(','), parse_pair)(input)
}

/// Parse a whole selection string. A dimension given twice keeps its last value.
pub fn parse_selection(input: &str) -> Result<Selection> {
    let (_, pairs) = all_consuming(ws(parse_pairs))(input)
        .map_err(|e| Error::Parse(format!("invalid selection '{}': {}", input, e)))?;
    Ok(pairs.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pair() {
        let (rest, pair) = parse_pair("borough = Bronx").unwrap();
        assert_eq!(rest, "");
        assert_eq!(pair, ("borough".to_string(), "Bronx".to_string()));
    }

    #[test]
    fn test_parse_selection_quoted_and_bare() {
        let sel = parse_selection(r#"borough=Staten Island, species="Pin oak""#).unwrap();
        assert_eq!(sel["borough"], "Staten Island");
        assert_eq!(sel["species"], "Pin oak");
    }

    #[test]
    fn test_quoted_value_may_contain_comma() {
        let sel = parse_selection(r#"subgroup="Non-Hispanic white, single race""#).unwrap();
        assert_eq!(sel["subgroup"], "Non-Hispanic white, single race");
    }

    #[test]
    fn test_parse_selection_empty() {
        assert!(parse_selection("").unwrap().is_empty());
        assert!(parse_selection("   ").unwrap().is_empty());
    }

    #[test]
    fn test_last_value_wins() {
        let sel = parse_selection("state=Ohio, state=New York").unwrap();
        assert_eq!(sel["state"], "New York");
        assert_eq!(sel.len(), 1);
    }

    #[test]
    fn test_parse_selection_errors() {
        assert!(parse_selection("borough").is_err());
        assert!(parse_selection("=Bronx").is_err());
        assert!(parse_selection("borough=Bronx,").is_err());
    }
}

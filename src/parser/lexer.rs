// Shared tokens for the selection and breakpoint syntaxes

use nom::{
    branch::alt,
    bytes::complete::{escaped_transform, is_not, tag},
    character::complete::{alpha1, alphanumeric1, char, multispace0},
    combinator::{map, recognize, value},
    multi::many0,
    number::complete::double,
    sequence::{delimited, pair},
    IResult,
};

/// Wrap a parser so it skips surrounding whitespace
pub fn ws<'a, F, O>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    delimited(multispace0, inner, multispace0)
}

/// A column or dimension name: a letter or `_`, then letters, digits or `_`
pub fn identifier(input: &str) -> IResult<&str, String> {
    map(
        recognize(pair(
            alt((alpha1, tag("_"))),
            many0(alt((alphanumeric1, tag("_")))),
        )),
        |s: &str| s.to_string(),
    )(input)
}

/// A double-quoted string with `\"` and `\\` escapes
pub fn string_literal(input: &str) -> IResult<&str, String> {
    alt((
        value(String::new(), tag("\"\"")),
        delimited(
            char('"'),
            escaped_transform(
                is_not("\\\""),
                '\\',
                alt((value("\\", tag("\\")), value("\"", tag("\"")))),
            ),
            char('"'),
        ),
    ))(input)
}

pub fn number_literal(input: &str) -> IResult<&str, f64> {
    double(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier() {
        assert_eq!(identifier("borough=Bronx"), Ok(("=Bronx", "borough".to_string())));
        assert_eq!(identifier("_x1 rest"), Ok((" rest", "_x1".to_string())));
        assert!(identifier("1abc").is_err());
    }

    #[test]
    fn test_string_literal() {
        assert_eq!(string_literal(r#""American beech""#), Ok(("", "American beech".to_string())));
        assert_eq!(string_literal(r#""say \"hi\"""#), Ok(("", "say \"hi\"".to_string())));
        assert_eq!(string_literal(r#""""#), Ok(("", String::new())));
        assert!(string_literal("unquoted").is_err());
    }

    #[test]
    fn test_number_literal() {
        assert_eq!(number_literal("11580,"), Ok((",", 11580.0)));
        assert_eq!(number_literal("-2.5"), Ok(("", -2.5)));
    }

    #[test]
    fn test_ws() {
        let mut p = ws(identifier);
        assert_eq!(p("  x  y"), Ok(("y", "x".to_string())));
    }
}

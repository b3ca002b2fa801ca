use nom::{
    bytes::complete::take_while,
    character::complete::{char, satisfy},
    combinator::recognize,
    sequence::{pair, terminated},
    IResult,
};

/// What the trailing positional arguments ask for
#[derive(Debug, PartialEq)]
pub enum SearchTerms {
    /// A single free-text argument, matched against the log message
    Message(String),

    /// Raw query clauses appended to the generated query as-is
    Clauses(Vec<String>),
}

/// Classifies positional arguments
///
/// A lone argument is free text unless it starts with a `field:` clause.
/// Anything else is passed through as raw clauses.
pub fn parse_terms(args: &[String]) -> Option<SearchTerms> {
    match args {
        [] => None,
        [single] if !is_field_clause(single) => Some(SearchTerms::Message(single.clone())),
        _ => Some(SearchTerms::Clauses(args.to_vec())),
    }
}

/// Whether the input starts with a `field:` prefix
pub fn is_field_clause(input: &str) -> bool {
    field_prefix(input).is_ok()
}

fn field_prefix(input: &str) -> IResult<&str, &str> {
    terminated(field_name, char(':'))(input)
}

fn field_name(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        satisfy(|c| c.is_ascii_alphanumeric() || c == '_' || c == '@'),
        take_while(|c: char| c.is_ascii_alphanumeric() || c == '_' || c == '.'),
    ))(input)
}

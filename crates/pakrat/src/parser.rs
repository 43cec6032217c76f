//! Parse entry points.

use crate::{
    engine::{ActionTable, Matcher, ParseError, Value},
    grammar::Grammar,
};

/// Run one parse of `input` against `grammar`, starting from `start_rule`
/// at position 0 with a fresh memo table.
///
/// Only a match that consumes the input in its entirety is accepted; a
/// partial match is reported as [`ParseError::Incomplete`] even though the
/// start rule itself matched a prefix.
pub fn parse<V: Clone>(
    start_rule: &str,
    input: &str,
    grammar: &Grammar,
    actions: &ActionTable<V>,
) -> Result<Value<V>, ParseError> {
    let span = tracing::trace_span!("parse", rule = start_rule);
    let _entered = span.enter();

    let mut matcher = Matcher::new(grammar, actions, input);
    match matcher.match_rule(start_rule, 0)? {
        Some(matched) if matched.consumed == input.len() => Ok(matched.value),
        Some(matched) => Err(ParseError::Incomplete {
            rule: start_rule.to_owned(),
            consumed: matched.consumed,
            expected: input.len(),
        }),
        None => Err(ParseError::NoMatch {
            rule: start_rule.to_owned(),
        }),
    }
}

/// Like [`parse`], but the grammar is given as text in the grammar
/// language and compiled first. A malformed description fails fast with
/// [`ParseError::Grammar`] before the input is looked at.
pub fn parse_text<V: Clone>(
    start_rule: &str,
    input: &str,
    grammar: &str,
    actions: &ActionTable<V>,
) -> Result<Value<V>, ParseError> {
    let grammar = Grammar::from_str(grammar)?;
    parse(start_rule, input, &grammar, actions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ParseError;

    fn no_actions() -> ActionTable<()> {
        ActionTable::new()
    }

    #[test]
    fn accepts_only_full_matches() {
        let actions = no_actions();

        assert!(parse_text("a", "xx", "a <- 'x'+", &actions).is_ok());

        let err = parse_text("a", "xxy", "a <- 'x'+", &actions).unwrap_err();
        assert!(matches!(
            err,
            ParseError::Incomplete {
                consumed: 2,
                expected: 3,
                ..
            }
        ));
    }

    #[test]
    fn reports_no_match_for_unknown_start_rule() {
        let actions = no_actions();
        let err = parse_text("missing", "x", "a <- 'x'", &actions).unwrap_err();
        assert!(matches!(err, ParseError::NoMatch { .. }));
    }

    #[test]
    fn fails_fast_on_malformed_grammar_text() {
        let actions = no_actions();
        let err = parse_text("a", "x", "a <- ", &actions).unwrap_err();
        assert!(matches!(err, ParseError::Grammar(..)));
    }

    #[test]
    fn each_parse_owns_its_memo() {
        let grammar = Grammar::from_str("a <- 'x'*").unwrap();
        let actions = no_actions();

        let first = parse("a", "xx", &grammar, &actions).unwrap();
        let second = parse("a", "xx", &grammar, &actions).unwrap();
        assert_eq!(first, second);

        // same shared grammar, different input
        assert!(parse("a", "xxx", &grammar, &actions).is_ok());
    }
}

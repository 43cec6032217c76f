//! The implementation of the memoizing recursive matcher.

use crate::{
    grammar::{Alternative, Atom, Grammar, GrammarError},
    memo::MemoTable,
    types::Map,
};

/// A successful match of one atom.
#[derive(Debug, Clone, PartialEq)]
pub struct Match<V> {
    /// Input position the match started at.
    pub start: usize,
    /// Number of bytes consumed.
    pub consumed: usize,
    /// Ordinal of the winning alternative, for rule and choice atoms.
    pub alternative: Option<usize>,
    pub value: Value<V>,
}

impl<V> Match<V> {
    pub fn text(&self) -> Option<&str> {
        self.value.text()
    }

    pub fn into_seq(self) -> Option<Vec<Match<V>>> {
        self.value.into_seq()
    }

    pub fn into_semantic(self) -> Option<V> {
        self.value.into_semantic()
    }
}

/// The value attached to a match.
#[derive(Debug, Clone, PartialEq)]
pub enum Value<V> {
    /// The matched substring of a literal or pattern atom.
    Text(String),
    /// The ordered submatches of a committed alternative or repetition.
    /// Zero-width lookahead results are omitted.
    Seq(Vec<Match<V>>),
    /// The output of a rule's action.
    Semantic(V),
}

impl<V> Value<V> {
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn into_seq(self) -> Option<Vec<Match<V>>> {
        match self {
            Self::Seq(children) => Some(children),
            _ => None,
        }
    }

    pub fn into_semantic(self) -> Option<V> {
        match self {
            Self::Semantic(value) => Some(value),
            _ => None,
        }
    }
}

/// A transform from the raw submatch sequence of a rule to its semantic
/// value. The match passed in always carries a `Value::Seq` and the index
/// of the winning alternative.
pub type Action<V> = Box<dyn Fn(Match<V>) -> anyhow::Result<V>>;

/// Mapping from rule name to its action, scoped to a single parse. Rules
/// without a registered action expose their raw submatch sequence.
pub struct ActionTable<V> {
    actions: Map<String, Action<V>>,
}

impl<V> Default for ActionTable<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> ActionTable<V> {
    pub fn new() -> Self {
        Self {
            actions: Map::default(),
        }
    }

    pub fn insert<F>(&mut self, rule: impl Into<String>, action: F)
    where
        F: Fn(Match<V>) -> anyhow::Result<V> + 'static,
    {
        self.actions.insert(rule.into(), Box::new(action));
    }

    pub fn get(&self, rule: &str) -> Option<&Action<V>> {
        self.actions.get(rule)
    }
}

impl<V> std::fmt::Debug for ActionTable<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionTable")
            .field("rules", &self.actions.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("malformed grammar: {}", _0)]
    Grammar(#[from] GrammarError),

    #[error("action for rule `{}' failed: {}", rule, source)]
    Action {
        rule: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("input does not match rule `{}'", rule)]
    NoMatch { rule: String },

    #[error("rule `{}' matched only {} of {} bytes", rule, consumed, expected)]
    Incomplete {
        rule: String,
        consumed: usize,
        expected: usize,
    },
}

/// The matcher for one parse: borrows the rule table, action table and
/// input, and owns the memo table for this input.
#[derive(Debug)]
pub struct Matcher<'a, V> {
    grammar: &'a Grammar,
    actions: &'a ActionTable<V>,
    input: &'a str,
    memo: MemoTable<V>,
}

impl<'a, V: Clone> Matcher<'a, V> {
    pub fn new(grammar: &'a Grammar, actions: &'a ActionTable<V>, input: &'a str) -> Self {
        Self {
            grammar,
            actions,
            input,
            memo: MemoTable::new(input.len()),
        }
    }

    /// Match the named rule at `pos`.
    ///
    /// `Ok(None)` is the routine failure sentinel; `Err` is reserved for
    /// action failures, which abort the parse. Either way the outcome is
    /// written to the memo cell before returning, so re-entering the same
    /// `(position, rule)` pair is O(1).
    pub fn match_rule(&mut self, name: &str, pos: usize) -> Result<Option<Match<V>>, ParseError> {
        if let Some(entry) = self.memo.get(pos, name) {
            tracing::trace!(rule = name, pos, "memo hit");
            return Ok(entry.clone());
        }

        let result = match self.grammar.alternatives(name) {
            Some(alternatives) => {
                tracing::trace!(rule = name, pos, "evaluating rule");
                match self.match_alternatives(alternatives, pos)? {
                    Some(matched) => Some(self.apply_action(name, matched)?),
                    None => None,
                }
            }
            None => {
                tracing::trace!(rule = name, pos, "undefined rule");
                None
            }
        };

        self.memo.insert(pos, name, result.clone());
        Ok(result)
    }

    /// Match a single atom at `pos`.
    pub fn match_atom(&mut self, atom: &Atom, pos: usize) -> Result<Option<Match<V>>, ParseError> {
        match atom {
            Atom::Literal(text) => Ok(self.input[pos..].starts_with(text.as_str()).then(|| {
                Match {
                    start: pos,
                    consumed: text.len(),
                    alternative: None,
                    value: Value::Text(text.clone()),
                }
            })),

            Atom::Pattern(pattern) => {
                Ok(pattern.match_prefix(&self.input[pos..]).map(|len| Match {
                    start: pos,
                    consumed: len,
                    alternative: None,
                    value: Value::Text(self.input[pos..pos + len].to_owned()),
                }))
            }

            Atom::Rule(name) => self.match_rule(name, pos),

            Atom::Choice(alternatives) => self.match_alternatives(alternatives, pos),

            Atom::Repeat { atom, min, max } => self.match_repeat(atom, *min, *max, pos),

            Atom::Lookahead(inner) => Ok(self
                .match_atom(inner, pos)?
                .map(|_| Self::zero_width(pos))),

            Atom::NegLookahead(inner) => Ok(match self.match_atom(inner, pos)? {
                Some(..) => None,
                None => Some(Self::zero_width(pos)),
            }),
        }
    }

    // Try each alternative in order and commit to the first whose entire
    // atom sequence succeeds. A failure of a later atom fails the whole
    // alternative; already-matched earlier atoms are never re-tried.
    fn match_alternatives(
        &mut self,
        alternatives: &[Alternative],
        pos: usize,
    ) -> Result<Option<Match<V>>, ParseError> {
        'alternatives: for (index, alternative) in alternatives.iter().enumerate() {
            let mut cursor = pos;
            let mut children = Vec::with_capacity(alternative.len());
            for atom in alternative {
                match self.match_atom(atom, cursor)? {
                    Some(matched) => {
                        cursor += matched.consumed;
                        if !atom.is_zero_width() {
                            children.push(matched);
                        }
                    }
                    None => continue 'alternatives,
                }
            }
            return Ok(Some(Match {
                start: pos,
                consumed: cursor - pos,
                alternative: Some(index),
                value: Value::Seq(children),
            }));
        }
        Ok(None)
    }

    fn match_repeat(
        &mut self,
        atom: &Atom,
        min: usize,
        max: Option<usize>,
        pos: usize,
    ) -> Result<Option<Match<V>>, ParseError> {
        let mut cursor = pos;
        let mut children = vec![];
        while max.map_or(true, |max| children.len() < max) {
            match self.match_atom(atom, cursor)? {
                Some(matched) => {
                    let consumed = matched.consumed;
                    cursor += consumed;
                    children.push(matched);
                    if consumed == 0 {
                        // a zero-width inner match would repeat forever
                        break;
                    }
                }
                None => break,
            }
        }

        if children.len() < min {
            return Ok(None);
        }
        Ok(Some(Match {
            start: pos,
            consumed: cursor - pos,
            alternative: None,
            value: Value::Seq(children),
        }))
    }

    fn apply_action(&mut self, name: &str, matched: Match<V>) -> Result<Match<V>, ParseError> {
        let action = match self.actions.get(name) {
            Some(action) => action,
            None => return Ok(matched),
        };
        let (start, consumed, alternative) = (matched.start, matched.consumed, matched.alternative);
        let value = action(matched).map_err(|source| ParseError::Action {
            rule: name.to_owned(),
            source,
        })?;
        Ok(Match {
            start,
            consumed,
            alternative,
            value: Value::Semantic(value),
        })
    }

    fn zero_width(pos: usize) -> Match<V> {
        Match {
            start: pos,
            consumed: 0,
            alternative: None,
            value: Value::Seq(vec![]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_actions() -> ActionTable<()> {
        ActionTable::new()
    }

    fn sample_grammar() -> Grammar {
        Grammar::define(|g| {
            g.rule(
                "pair",
                [vec![Atom::rule("digits"), Atom::literal(","), Atom::rule("digits")]],
            )?;
            g.rule("digits", [vec![Atom::pattern(r"\d+")?]])?;
            Ok(())
        })
        .unwrap()
    }

    #[test]
    fn literal_and_pattern_leaves() {
        let grammar = sample_grammar();
        let actions = no_actions();
        let mut matcher = Matcher::new(&grammar, &actions, "12,34");

        let matched = matcher
            .match_atom(&Atom::literal("12"), 0)
            .unwrap()
            .unwrap();
        assert_eq!(matched.consumed, 2);
        assert_eq!(matched.text(), Some("12"));

        let matched = matcher
            .match_atom(&Atom::pattern(r"\d+").unwrap(), 3)
            .unwrap()
            .unwrap();
        assert_eq!(matched.start, 3);
        assert_eq!(matched.consumed, 2);
        assert_eq!(matched.text(), Some("34"));

        assert!(matcher
            .match_atom(&Atom::literal("99"), 0)
            .unwrap()
            .is_none());
    }

    #[test]
    fn rule_match_commits_and_memoizes_failures() {
        let grammar = sample_grammar();
        let actions = no_actions();
        let mut matcher = Matcher::new(&grammar, &actions, "12,34");

        let matched = matcher.match_rule("pair", 0).unwrap().unwrap();
        assert_eq!(matched.consumed, 5);
        assert_eq!(matched.alternative, Some(0));

        // failure at position 2 (cursor sits on the comma) is memoized
        assert!(matcher.match_rule("digits", 2).unwrap().is_none());
        assert!(matcher.memo_entry("digits", 2).unwrap().is_none());
    }

    #[test]
    fn undefined_rule_fails_without_panicking() {
        let grammar = sample_grammar();
        let actions = no_actions();
        let mut matcher = Matcher::new(&grammar, &actions, "x");
        assert!(matcher.match_rule("nope", 0).unwrap().is_none());
    }

    #[test]
    fn repeat_bounds_are_inclusive() {
        let grammar = sample_grammar();
        let actions = no_actions();
        let mut matcher = Matcher::new(&grammar, &actions, "aaaa");
        let atom = Atom::repeat(Atom::literal("a"), 2, Some(3));

        let matched = matcher.match_atom(&atom, 0).unwrap().unwrap();
        // greedy, but never more than `max`
        assert_eq!(matched.consumed, 3);

        let mut matcher = Matcher::new(&grammar, &actions, "a");
        assert!(matcher.match_atom(&atom, 0).unwrap().is_none());
    }

    #[test]
    fn optional_takes_at_most_one() {
        let grammar = sample_grammar();
        let actions = no_actions();
        let mut matcher = Matcher::new(&grammar, &actions, "aa");
        let matched = matcher
            .match_atom(&Atom::optional(Atom::literal("a")), 0)
            .unwrap()
            .unwrap();
        assert_eq!(matched.consumed, 1);
    }

    #[test]
    fn zero_width_repetition_terminates() {
        let grammar = sample_grammar();
        let actions = no_actions();
        let mut matcher = Matcher::new(&grammar, &actions, "abc");
        let atom = Atom::zero_or_more(Atom::pattern(r"x*").unwrap());

        let matched = matcher.match_atom(&atom, 0).unwrap().unwrap();
        assert_eq!(matched.consumed, 0);
        assert_eq!(matched.value.into_seq().unwrap().len(), 1);
    }

    #[test]
    fn lookaheads_are_zero_width_and_dropped() {
        let grammar = sample_grammar();
        let actions = no_actions();
        let mut matcher = Matcher::new(&grammar, &actions, "ab");

        let atom = Atom::choice([vec![
            Atom::lookahead(Atom::literal("ab")),
            Atom::literal("a"),
            Atom::literal("b"),
        ]]);
        let matched = matcher.match_atom(&atom, 0).unwrap().unwrap();
        assert_eq!(matched.consumed, 2);
        let children = matched.into_seq().unwrap();
        assert_eq!(children.len(), 2);
        assert_eq!(children[0].text(), Some("a"));

        let atom = Atom::not(Atom::literal("b"));
        let matched = matcher.match_atom(&atom, 0).unwrap().unwrap();
        assert_eq!(matched.consumed, 0);
    }

    #[test]
    fn memo_is_sound_under_eager_fill() {
        let grammar = sample_grammar();
        let actions = no_actions();
        let input = "12,34";

        // force-fill every (position, rule) cell, innermost positions first
        let mut eager = Matcher::new(&grammar, &actions, input);
        let rule_names: Vec<String> = grammar.rules().map(|(name, _)| name.to_owned()).collect();
        for pos in (0..=input.len()).rev() {
            for name in &rule_names {
                eager.match_rule(name, pos).unwrap();
            }
        }

        // a fresh matcher computes cells only on demand
        let mut lazy = Matcher::new(&grammar, &actions, input);
        for pos in 0..=input.len() {
            for name in &rule_names {
                assert_eq!(
                    eager.match_rule(name, pos).unwrap(),
                    lazy.match_rule(name, pos).unwrap(),
                    "memo mismatch at ({}, {})",
                    pos,
                    name,
                );
            }
        }
    }

    #[test]
    fn failing_action_aborts_the_parse() {
        let grammar = sample_grammar();
        let mut actions = ActionTable::<u32>::new();
        actions.insert("digits", |_| anyhow::bail!("nope"));
        let mut matcher = Matcher::new(&grammar, &actions, "12,34");

        let err = matcher.match_rule("pair", 0).unwrap_err();
        assert!(matches!(err, ParseError::Action { rule, .. } if rule == "digits"));
    }
}

#[cfg(test)]
impl<'a, V: Clone> Matcher<'a, V> {
    fn memo_entry(&self, rule: &str, pos: usize) -> Option<&Option<Match<V>>> {
        self.memo.get(pos, rule)
    }
}

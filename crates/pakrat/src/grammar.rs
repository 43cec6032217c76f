//! Grammar types.

use crate::types::Map;
use regex::Regex;
use std::{fmt, fs, io, marker::PhantomData, path::Path, sync::Arc};

/// A regular expression atom, anchored at the current input position.
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    regex: Regex,
}

impl Pattern {
    /// Compile a pattern from its source text.
    ///
    /// The pattern is wrapped in `\A(?:...)` so that it only ever matches a
    /// prefix of the remaining input, never searches into it.
    pub fn new(source: &str) -> Result<Self, regex::Error> {
        let regex = Regex::new(&format!(r"\A(?:{})", source))?;
        Ok(Self {
            source: source.to_owned(),
            regex,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Length of the matched prefix of `remaining`, if any.
    pub(crate) fn match_prefix(&self, remaining: &str) -> Option<usize> {
        self.regex.find(remaining).map(|m| m.end())
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

/// One ordered sequence of atoms. An empty sequence is the epsilon
/// alternative and always succeeds without consuming input.
pub type Alternative = Vec<Atom>;

/// A single piece of grammar.
///
/// Atoms are immutable once constructed; composite atoms hold their inner
/// atoms behind `Arc` so they can be shared across alternatives and rules
/// without copying.
#[derive(Debug, Clone, PartialEq)]
pub enum Atom {
    /// Matches an exact substring.
    Literal(String),
    /// Matches a regular expression anchored at the current position.
    Pattern(Pattern),
    /// Matches whatever the named rule matches, through the memo table.
    Rule(String),
    /// Anonymous grouping of ordered alternatives. Same commit semantics as
    /// a rule body, but never memoized and never run through an action.
    Choice(Arc<[Alternative]>),
    /// Greedy repetition of `atom`, between `min` and `max` times
    /// (inclusive). `max = None` means unbounded.
    Repeat {
        atom: Arc<Atom>,
        min: usize,
        max: Option<usize>,
    },
    /// Zero-width positive lookahead.
    Lookahead(Arc<Atom>),
    /// Zero-width negative lookahead.
    NegLookahead(Arc<Atom>),
}

impl Atom {
    pub fn literal(text: impl Into<String>) -> Self {
        Self::Literal(text.into())
    }

    pub fn pattern(source: &str) -> Result<Self, GrammarError> {
        let pattern = Pattern::new(source).map_err(|source_err| GrammarError::Pattern {
            pattern: source.to_owned(),
            source: source_err,
        })?;
        Ok(Self::Pattern(pattern))
    }

    pub fn rule(name: impl Into<String>) -> Self {
        Self::Rule(name.into())
    }

    pub fn choice<I>(alternatives: I) -> Self
    where
        I: IntoIterator<Item = Alternative>,
    {
        Self::Choice(alternatives.into_iter().collect())
    }

    pub fn repeat(atom: Atom, min: usize, max: Option<usize>) -> Self {
        Self::Repeat {
            atom: Arc::new(atom),
            min,
            max,
        }
    }

    /// `atom?` in the textual language.
    pub fn optional(atom: Atom) -> Self {
        Self::repeat(atom, 0, Some(1))
    }

    /// `atom*` in the textual language.
    pub fn zero_or_more(atom: Atom) -> Self {
        Self::repeat(atom, 0, None)
    }

    /// `atom+` in the textual language.
    pub fn one_or_more(atom: Atom) -> Self {
        Self::repeat(atom, 1, None)
    }

    pub fn lookahead(atom: Atom) -> Self {
        Self::Lookahead(Arc::new(atom))
    }

    pub fn not(atom: Atom) -> Self {
        Self::NegLookahead(Arc::new(atom))
    }

    /// Whether this atom never consumes input and contributes no value to
    /// the submatch sequence of a committed alternative.
    pub(crate) fn is_zero_width(&self) -> bool {
        matches!(self, Self::Lookahead(..) | Self::NegLookahead(..))
    }

    // Parenthesize inner atoms whose textual form would not bind as a unit.
    fn fmt_grouped(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(..) | Self::Pattern(..) | Self::Rule(..) | Self::Choice(..) => {
                write!(f, "{}", self)
            }
            _ => write!(f, "({})", self),
        }
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(text) => write!(f, "'{}'", text),
            Self::Pattern(pattern) => write!(f, "/{}/", pattern.source()),
            Self::Rule(name) => f.write_str(name),
            Self::Choice(alternatives) => {
                f.write_str("(")?;
                fmt_alternatives(alternatives, f)?;
                f.write_str(")")
            }
            Self::Repeat { atom, min, max } => {
                atom.fmt_grouped(f)?;
                match (min, max) {
                    (0, Some(1)) => f.write_str("?"),
                    (0, None) => f.write_str("*"),
                    (1, None) => f.write_str("+"),
                    // not expressible in the textual language
                    (min, Some(max)) => write!(f, "{{{},{}}}", min, max),
                    (min, None) => write!(f, "{{{},}}", min),
                }
            }
            Self::Lookahead(atom) => {
                f.write_str("&")?;
                atom.fmt_grouped(f)
            }
            Self::NegLookahead(atom) => {
                f.write_str("!")?;
                atom.fmt_grouped(f)
            }
        }
    }
}

fn fmt_alternatives(alternatives: &[Alternative], f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for (i, alternative) in alternatives.iter().enumerate() {
        if i > 0 {
            f.write_str(" | ")?;
        }
        if alternative.is_empty() {
            f.write_str("epsilon")?;
            continue;
        }
        for (j, atom) in alternative.iter().enumerate() {
            if j > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}", atom)?;
        }
    }
    Ok(())
}

/// The rule table: a mapping from rule name to its ordered alternatives.
///
/// Built once, either programmatically via [`Grammar::define`] or compiled
/// from grammar text, and treated as read-only during a parse.
#[derive(Debug, Clone, PartialEq)]
pub struct Grammar {
    rules: Map<String, Vec<Alternative>>,
}

impl Grammar {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Grammar, GrammarError> {
        let source = fs::read_to_string(path).map_err(GrammarError::Io)?;
        Self::from_str(&source)
    }

    /// Compile a grammar from its textual description.
    pub fn from_str(source: &str) -> Result<Grammar, GrammarError> {
        crate::syntax::parse(source).map_err(GrammarError::Syntax)
    }

    /// Define a grammar using the specified function.
    pub fn define<F>(f: F) -> Result<Self, GrammarError>
    where
        F: FnOnce(&mut GrammarDef) -> Result<(), GrammarError>,
    {
        let mut def = GrammarDef {
            rules: Map::default(),
            _marker: PhantomData,
        };
        f(&mut def)?;
        Ok(Grammar { rules: def.rules })
    }

    /// The ordered alternatives of the named rule, if it is defined.
    pub fn alternatives(&self, name: &str) -> Option<&[Alternative]> {
        self.rules.get(name).map(|alternatives| &alternatives[..])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.rules.contains_key(name)
    }

    pub fn rules(&self) -> impl Iterator<Item = (&str, &[Alternative])> {
        self.rules
            .iter()
            .map(|(name, alternatives)| (name.as_str(), &alternatives[..]))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl fmt::Display for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, alternatives) in self.rules() {
            write!(f, "{} <- ", name)?;
            fmt_alternatives(alternatives, f)?;
            writeln!(f)?;
        }
        Ok(())
    }
}

/// The contextural values for building a `Grammar`.
#[derive(Debug)]
pub struct GrammarDef<'def> {
    rules: Map<String, Vec<Alternative>>,
    _marker: PhantomData<&'def mut ()>,
}

impl<'def> GrammarDef<'def> {
    /// Bind a rule name to its ordered alternatives.
    ///
    /// Binding the same name twice replaces the earlier definition; the
    /// last binding wins, matching the merge behavior of the textual
    /// grammar language.
    pub fn rule<I>(&mut self, name: &str, alternatives: I) -> Result<(), GrammarError>
    where
        I: IntoIterator<Item = Alternative>,
    {
        if !verify_rule_name(name) {
            return Err(GrammarError::RuleName(name.to_owned()));
        }

        let alternatives: Vec<Alternative> = alternatives.into_iter().collect();
        if alternatives.is_empty() {
            return Err(GrammarError::EmptyAlternatives(name.to_owned()));
        }

        if self.rules.insert(name.to_owned(), alternatives).is_some() {
            tracing::trace!(rule = name, "rule redefined, last binding wins");
        }

        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GrammarError {
    #[error("IO error: {}", _0)]
    Io(io::Error),

    #[error("syntax error: {}", _0)]
    Syntax(anyhow::Error),

    #[error("invalid pattern `{}': {}", pattern, source)]
    Pattern {
        pattern: String,
        source: regex::Error,
    },

    #[error("incorrect rule name `{}'", _0)]
    RuleName(String),

    #[error("rule `{}' must have at least one alternative", _0)]
    EmptyAlternatives(String),
}

// Rule names must stay expressible as `identifier` in the textual grammar
// language (word characters), so anything defined programmatically can also
// be referenced from grammar text.
fn verify_rule_name(s: &str) -> bool {
    !s.is_empty()
        && s.chars()
            .all(|ch| ch == '_' || ch.is_ascii_digit() || unicode_ident::is_xid_continue(ch))
}

//! The textual grammar language, bootstrapped through the engine itself.
//!
//! A fixed meta-grammar (an ordinary [`Grammar`]) recognizes grammar
//! descriptions like
//!
//! ```text
//! additive  <- multitive ('+' additive)?
//! multitive <- /\d+/ ('*' multitive)?
//! ```
//!
//! and a fixed meta-action table folds the submatches into a new
//! [`Grammar`] value. The meta-grammar and the grammars it produces are
//! separate immutable values; compiling a grammar never touches the
//! meta-grammar.

use crate::{
    engine::{ActionTable, Match, Matcher, Value},
    grammar::{Atom, Grammar, GrammarError},
};
use anyhow::Context as _;
use once_cell::sync::Lazy;

static META_GRAMMAR: Lazy<Grammar> =
    Lazy::new(|| build_meta_grammar().expect("the meta grammar is fixed and must build"));

/// Intermediate values produced by the meta-actions while folding a grammar
/// description into a rule table.
#[derive(Debug, Clone)]
enum MetaValue {
    /// An identifier or quoted/slashed character run.
    Text(String),
    /// A single compiled atom.
    Atom(Atom),
    /// The atoms of one alternative.
    Sequence(Vec<Atom>),
    /// The ordered alternatives of a rule body.
    Alternatives(Vec<Vec<Atom>>),
    /// One `name <- ...` binding.
    Binding(String, Vec<Vec<Atom>>),
    /// The finished rule table.
    Rules(Grammar),
}

macro_rules! expect_value {
    ($m:expr, $Variant:ident) => {
        match $m.value {
            Value::Semantic(MetaValue::$Variant(inner)) => inner,
            _ => anyhow::bail!(concat!(
                "unexpected submatch, expecting ",
                stringify!($Variant)
            )),
        }
    };
}

/// Compile a textual grammar description into a [`Grammar`].
///
/// The description must conform to the grammar syntax and be consumed in
/// its entirety; anything else is a malformed-grammar error, distinct from
/// a data parse simply not matching.
pub fn parse(source: &str) -> anyhow::Result<Grammar> {
    let span = tracing::trace_span!("compile_grammar");
    let _entered = span.enter();

    let actions = meta_actions();
    let mut matcher = Matcher::new(&META_GRAMMAR, &actions, source);
    let matched = matcher
        .match_rule("grammar", 0)?
        .context("grammar description does not conform to the grammar syntax")?;
    anyhow::ensure!(
        matched.consumed == source.len(),
        "grammar description has trailing content at offset {}",
        matched.consumed,
    );

    match matched.value {
        Value::Semantic(MetaValue::Rules(grammar)) => Ok(grammar),
        _ => anyhow::bail!("unexpected result from the meta grammar"),
    }
}

fn build_meta_grammar() -> Result<Grammar, GrammarError> {
    use Atom as A;
    let nt = |name: &str| Atom::rule(name);
    let lit = |text: &str| Atom::literal(text);

    Grammar::define(|g| {
        g.rule(
            "grammar",
            [vec![nt("whitespace"), A::one_or_more(nt("rule"))]],
        )?;
        g.rule("identifier", [vec![A::pattern(r"\w+")?]])?;
        g.rule(
            "arrow",
            [vec![nt("whitespace"), lit("<-"), nt("whitespace")]],
        )?;
        g.rule("rule", [vec![nt("identifier"), nt("ruleSuffix")]])?;
        g.rule(
            "ruleSuffix",
            [vec![nt("arrow"), nt("ruleRhs"), nt("whitespace")]],
        )?;
        g.rule("ruleRhs", [vec![nt("ruleOption"), nt("ruleRhsSuffix")]])?;
        g.rule(
            "ruleRhsSuffix",
            [
                vec![nt("whitespace"), lit("|"), nt("whitespace"), nt("ruleRhs")],
                vec![],
            ],
        )?;
        g.rule(
            "ruleOption",
            [
                vec![lit("epsilon")],
                vec![nt("fragment"), nt("ruleOptionSuffix")],
            ],
        )?;
        g.rule(
            "ruleOptionSuffix",
            [
                vec![nt("break"), nt("fragment"), nt("ruleOptionSuffix")],
                vec![],
            ],
        )?;
        // A `identifier <-` prefix opens the next rule, never a
        // continuation of the current alternative. This guard is how the
        // line-oriented syntax finds rule boundaries without a terminator.
        g.rule(
            "fragment",
            [vec![
                A::not(A::choice([vec![nt("identifier"), nt("arrow")]])),
                A::choice([vec![nt("repetition")], vec![nt("normalFragment")]]),
            ]],
        )?;
        g.rule(
            "normalFragment",
            [
                vec![lit("!"), nt("fragment")],
                vec![lit("&"), nt("fragment")],
                vec![nt("composite")],
                vec![nt("nonterminal")],
                vec![nt("string")],
                vec![nt("re")],
            ],
        )?;
        g.rule(
            "repetition",
            [vec![
                nt("normalFragment"),
                A::choice([vec![lit("?")], vec![lit("*")], vec![lit("+")]]),
            ]],
        )?;
        g.rule("composite", [vec![lit("("), nt("ruleRhs"), lit(")")]])?;
        g.rule("nonterminal", [vec![nt("identifier")]])?;
        g.rule("string", [vec![lit("'"), nt("chars"), lit("'")]])?;
        g.rule("chars", [vec![A::pattern(r"[^']*")?]])?;
        g.rule("re", [vec![lit("/"), A::pattern(r"[^/]+")?, lit("/")]])?;
        g.rule("whitespace", [vec![A::pattern(r"\s*")?]])?;
        g.rule("break", [vec![A::pattern(r"\s+")?]])?;
        Ok(())
    })
}

fn meta_actions() -> ActionTable<MetaValue> {
    let mut actions = ActionTable::new();

    actions.insert("identifier", |m| {
        Ok(MetaValue::Text(into_text(child(m, 0)?)?))
    });
    actions.insert("chars", |m| Ok(MetaValue::Text(into_text(child(m, 0)?)?)));
    actions.insert("string", |m| {
        let text = expect_value!(child(m, 1)?, Text);
        Ok(MetaValue::Atom(Atom::literal(text)))
    });
    actions.insert("re", |m| {
        let source = into_text(child(m, 1)?)?;
        Ok(MetaValue::Atom(Atom::pattern(&source)?))
    });
    actions.insert("nonterminal", |m| {
        let name = expect_value!(child(m, 0)?, Text);
        Ok(MetaValue::Atom(Atom::rule(name)))
    });
    actions.insert("composite", |m| {
        let alternatives = expect_value!(child(m, 1)?, Alternatives);
        Ok(MetaValue::Atom(Atom::choice(alternatives)))
    });
    actions.insert("repetition", |m| {
        let mut children = into_children(m)?.into_iter();
        let base = children.next().context("missing repetition base")?;
        let suffix = children.next().context("missing repetition suffix")?;
        let atom = expect_value!(base, Atom);
        let marker = into_text(child(suffix, 0)?)?;
        let (min, max) = match marker.as_str() {
            "?" => (0, Some(1)),
            "*" => (0, None),
            "+" => (1, None),
            other => anyhow::bail!("unexpected repetition marker `{}'", other),
        };
        Ok(MetaValue::Atom(Atom::repeat(atom, min, max)))
    });
    actions.insert("fragment", |m| {
        // the leading rule-boundary guard is zero-width and already dropped
        let grouped = child(m, 0)?;
        let inner = child(grouped, 0)?;
        Ok(MetaValue::Atom(expect_value!(inner, Atom)))
    });
    actions.insert("normalFragment", |m| {
        let alternative = m.alternative;
        let last = into_children(m)?.pop().context("empty fragment")?;
        let atom = expect_value!(last, Atom);
        Ok(MetaValue::Atom(match alternative {
            Some(0) => Atom::not(atom),
            Some(1) => Atom::lookahead(atom),
            _ => atom,
        }))
    });
    actions.insert("ruleOption", |m| match m.alternative {
        Some(0) => Ok(MetaValue::Sequence(vec![])),
        Some(1) => {
            let mut children = into_children(m)?.into_iter();
            let atom = expect_value!(children.next().context("missing fragment")?, Atom);
            let rest = expect_value!(children.next().context("missing option suffix")?, Sequence);
            let mut atoms = vec![atom];
            atoms.extend(rest);
            Ok(MetaValue::Sequence(atoms))
        }
        _ => anyhow::bail!("unexpected ruleOption alternative"),
    });
    actions.insert("ruleOptionSuffix", |m| match m.alternative {
        Some(0) => {
            let mut children = into_children(m)?.into_iter();
            let _break = children.next().context("missing break")?;
            let atom = expect_value!(children.next().context("missing fragment")?, Atom);
            let rest = expect_value!(children.next().context("missing option suffix")?, Sequence);
            let mut atoms = vec![atom];
            atoms.extend(rest);
            Ok(MetaValue::Sequence(atoms))
        }
        Some(1) => Ok(MetaValue::Sequence(vec![])),
        _ => anyhow::bail!("unexpected ruleOptionSuffix alternative"),
    });
    actions.insert("ruleRhs", |m| {
        let mut children = into_children(m)?.into_iter();
        let first = expect_value!(children.next().context("missing rule option")?, Sequence);
        let rest = expect_value!(children.next().context("missing rhs suffix")?, Alternatives);
        let mut alternatives = vec![first];
        alternatives.extend(rest);
        Ok(MetaValue::Alternatives(alternatives))
    });
    actions.insert("ruleRhsSuffix", |m| match m.alternative {
        Some(0) => {
            let rhs = child(m, 3)?;
            Ok(MetaValue::Alternatives(expect_value!(rhs, Alternatives)))
        }
        Some(1) => Ok(MetaValue::Alternatives(vec![])),
        _ => anyhow::bail!("unexpected ruleRhsSuffix alternative"),
    });
    actions.insert("ruleSuffix", |m| {
        let rhs = child(m, 1)?;
        Ok(MetaValue::Alternatives(expect_value!(rhs, Alternatives)))
    });
    actions.insert("rule", |m| {
        let mut children = into_children(m)?.into_iter();
        let name = expect_value!(children.next().context("missing rule name")?, Text);
        let alternatives =
            expect_value!(children.next().context("missing rule body")?, Alternatives);
        Ok(MetaValue::Binding(name, alternatives))
    });
    actions.insert("grammar", |m| {
        let bindings = child(m, 1)?;
        let mut rules = Vec::new();
        for binding in into_children(bindings)? {
            match binding.value {
                Value::Semantic(MetaValue::Binding(name, alternatives)) => {
                    rules.push((name, alternatives));
                }
                _ => anyhow::bail!("unexpected submatch, expecting Binding"),
            }
        }
        // duplicate names: the last binding wins when merging
        let grammar = Grammar::define(|g| {
            for (name, alternatives) in rules {
                g.rule(&name, alternatives)?;
            }
            Ok(())
        })?;
        Ok(MetaValue::Rules(grammar))
    });

    actions
}

fn into_children(m: Match<MetaValue>) -> anyhow::Result<Vec<Match<MetaValue>>> {
    match m.value {
        Value::Seq(children) => Ok(children),
        _ => anyhow::bail!("unexpected submatch, expecting a sequence"),
    }
}

fn child(m: Match<MetaValue>, index: usize) -> anyhow::Result<Match<MetaValue>> {
    into_children(m)?
        .into_iter()
        .nth(index)
        .with_context(|| format!("missing submatch at index {}", index))
}

fn into_text(m: Match<MetaValue>) -> anyhow::Result<String> {
    match m.value {
        Value::Text(text) => Ok(text),
        _ => anyhow::bail!("unexpected submatch, expecting matched text"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::Level;

    #[test]
    fn smoketest() {
        tracing_subscriber::fmt()
            .with_ansi(false)
            .with_max_level(Level::TRACE)
            .try_init()
            .ok();

        let input = "\
value   <- object | array | /\\d+/
object  <- '{' members '}'
members <- pair (',' pair)* | epsilon
pair    <- /\"\\w+\"/ ':' value
array   <- '[' (value (',' value)*)? ']'
";
        let grammar = parse(input).unwrap();
        assert_eq!(grammar.len(), 5);
        assert!(grammar.contains("members"));
    }

    #[test]
    fn compiles_to_the_expected_atoms() {
        let compiled = parse("a <- 'x' | 'y'").unwrap();
        let expected = Grammar::define(|g| {
            g.rule(
                "a",
                [vec![Atom::literal("x")], vec![Atom::literal("y")]],
            )
        })
        .unwrap();
        assert_eq!(compiled, expected);
    }

    #[test]
    fn compiles_prefixes_and_suffixes() {
        let compiled = parse("s <- !'b' ('a' | c)+ &/\\d/").unwrap();
        let expected = Grammar::define(|g| {
            g.rule(
                "s",
                [vec![
                    Atom::not(Atom::literal("b")),
                    Atom::one_or_more(Atom::choice([
                        vec![Atom::literal("a")],
                        vec![Atom::rule("c")],
                    ])),
                    Atom::lookahead(Atom::pattern(r"\d")?),
                ]],
            )
        })
        .unwrap();
        assert_eq!(compiled, expected);
    }

    #[test]
    fn epsilon_compiles_to_an_empty_alternative() {
        let compiled = parse("s <- 'a' | epsilon").unwrap();
        assert_eq!(
            compiled.alternatives("s").unwrap(),
            &[vec![Atom::literal("a")], vec![]],
        );
    }

    #[test]
    fn rule_headers_terminate_alternatives() {
        let compiled = parse("a <- 'x'\nb <- 'y'").unwrap();
        assert_eq!(compiled.len(), 2);
        assert_eq!(
            compiled.alternatives("a").unwrap(),
            &[vec![Atom::literal("x")]],
        );
        assert_eq!(
            compiled.alternatives("b").unwrap(),
            &[vec![Atom::literal("y")]],
        );
    }

    #[test]
    fn malformed_descriptions_are_rejected() {
        assert!(parse("").is_err());
        assert!(parse("a <-").is_err());
        assert!(parse("a <- 'x' %%%").is_err());
        assert!(parse("<- 'x'").is_err());
    }

    #[test]
    fn display_output_recompiles() {
        let grammar = parse("s <- !'b' 'a'+ (t | /\\d/) | epsilon\nt <- 'c'?").unwrap();
        let reparsed = parse(&grammar.to_string()).unwrap();
        assert_eq!(grammar, reparsed);
    }
}

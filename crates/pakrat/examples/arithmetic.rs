//! Arithmetic expression evaluator, an ordinary client of the engine:
//! a grammar description, an action table folding digits and operators,
//! and an input expression.
//!
//! ```shell-session
//! $ cargo run --example arithmetic '2*(3+4)'
//! ```

use anyhow::Context as _;
use pakrat::{
    engine::{ActionTable, Match, Value},
    parser::parse_text,
};
use std::env;
use tracing_subscriber::EnvFilter;

const GRAMMAR: &str = "\
additive <- multitive ('+' additive)?
multitive <- primary ('*' multitive)?
primary <- /\\d+/ | '(' additive ')'
";

fn fold(m: Match<i64>, apply: fn(i64, i64) -> i64) -> anyhow::Result<i64> {
    let mut children = m.into_seq().context("expected submatches")?.into_iter();
    let mut value = children
        .next()
        .context("missing left operand")?
        .into_semantic()
        .context("expected semantic value")?;
    let tail = children.next().context("missing operator tail")?;
    for group in tail.into_seq().context("expected repetition")? {
        let operand = group
            .into_seq()
            .context("expected operator group")?
            .pop()
            .context("missing right operand")?
            .into_semantic()
            .context("expected semantic value")?;
        value = apply(value, operand);
    }
    Ok(value)
}

fn actions() -> ActionTable<i64> {
    let mut actions = ActionTable::new();
    actions.insert("additive", |m| fold(m, |lhs, rhs| lhs + rhs));
    actions.insert("multitive", |m| fold(m, |lhs, rhs| lhs * rhs));
    actions.insert("primary", |m| match m.alternative {
        Some(0) => {
            let digits = m
                .into_seq()
                .context("expected submatches")?
                .pop()
                .context("missing digits")?;
            Ok(digits.text().context("expected digit text")?.parse()?)
        }
        Some(1) => {
            let mut children = m.into_seq().context("expected submatches")?.into_iter();
            children
                .nth(1)
                .context("missing inner expression")?
                .into_semantic()
                .context("expected semantic value")
        }
        _ => anyhow::bail!("unexpected primary alternative"),
    });
    actions
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_ansi(true)
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let input = env::args().nth(1).context("missing input expression")?;

    let value = parse_text("additive", input.trim(), GRAMMAR, &actions())?;
    match value {
        Value::Semantic(value) => println!("{} = {}", input.trim(), value),
        _ => anyhow::bail!("expected a semantic value"),
    }

    Ok(())
}

//! A small JSON reader built on top of the engine, including
//! escape-sequence handling in string literals.
//!
//! ```shell-session
//! $ echo '{"a": [1, true, "x\ny"]}' | cargo run --example json
//! ```

use anyhow::Context as _;
use pakrat::{
    engine::{ActionTable, Match, Value},
    parser::parse_text,
};
use std::{env, fs, io};
use tracing_subscriber::EnvFilter;

const GRAMMAR: &str = r#"json <- ws value ws
value <- object | array | string | number | 'true' | 'false' | 'null'
object <- '{' ws (member (ws ',' ws member)*)? ws '}'
member <- string ws ':' ws value
array <- '[' ws (value (ws ',' ws value)*)? ws ']'
string <- '"' (/\\./ | /[^"\\]+/)* '"'
number <- /-?\d+(\.\d+)?([eE][+-]?\d+)?/
ws <- /\s*/
"#;

#[derive(Debug, Clone, PartialEq)]
enum Json {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<Json>),
    Object(Vec<(String, Json)>),
}

fn children(m: Match<Json>) -> anyhow::Result<Vec<Match<Json>>> {
    m.into_seq().context("expected submatches")
}

fn semantic(m: Match<Json>) -> anyhow::Result<Json> {
    m.into_semantic().context("expected semantic value")
}

// `(head (sep item)*)?` groups share this shape: an optional choice match
// holding the head and a repetition of separator groups with the item last.
fn comma_separated(group: Match<Json>) -> anyhow::Result<Vec<Match<Json>>> {
    let mut items = vec![];
    for choice in children(group)? {
        let mut inner = children(choice)?.into_iter();
        items.push(inner.next().context("missing first element")?);
        let rest = inner.next().context("missing element tail")?;
        for separated in children(rest)? {
            let item = children(separated)?
                .pop()
                .context("missing separated element")?;
            items.push(item);
        }
    }
    Ok(items)
}

fn decode_string(pieces: Vec<Match<Json>>) -> anyhow::Result<String> {
    let mut decoded = String::new();
    for piece in pieces {
        let piece = children(piece)?.pop().context("missing string piece")?;
        let text = piece.text().context("expected string piece text")?;
        match text.strip_prefix('\\') {
            None => decoded.push_str(text),
            Some(escaped) => {
                let ch = escaped.chars().next().context("empty escape")?;
                decoded.push(match ch {
                    'n' => '\n',
                    't' => '\t',
                    'r' => '\r',
                    '"' | '\\' | '/' => ch,
                    other => anyhow::bail!("unsupported escape sequence `\\{}'", other),
                });
            }
        }
    }
    Ok(decoded)
}

fn actions() -> ActionTable<Json> {
    let mut actions = ActionTable::new();

    actions.insert("json", |m| semantic(child(m, 1)?));
    actions.insert("value", |m| {
        let value = children(m)?.pop().context("empty value")?;
        match value.value {
            Value::Semantic(value) => Ok(value),
            Value::Text(keyword) => Ok(match keyword.as_str() {
                "true" => Json::Bool(true),
                "false" => Json::Bool(false),
                "null" => Json::Null,
                other => anyhow::bail!("unexpected keyword `{}'", other),
            }),
            Value::Seq(..) => anyhow::bail!("unexpected value submatch"),
        }
    });
    actions.insert("number", |m| {
        let digits = children(m)?.pop().context("missing number text")?;
        Ok(Json::Number(
            digits.text().context("expected number text")?.parse()?,
        ))
    });
    actions.insert("string", |m| {
        let mut parts = children(m)?;
        // drop the closing quote, keep the piece repetition
        parts.pop();
        let pieces = children(parts.pop().context("missing string body")?)?;
        Ok(Json::String(decode_string(pieces)?))
    });
    actions.insert("array", |m| {
        let group = child(m, 2)?;
        let mut elements = vec![];
        for item in comma_separated(group)? {
            elements.push(semantic(item)?);
        }
        Ok(Json::Array(elements))
    });
    actions.insert("object", |m| {
        let group = child(m, 2)?;
        let mut members = vec![];
        for member in comma_separated(group)? {
            // member has no action of its own: [string ws ':' ws value]
            let mut inner = children(member)?.into_iter();
            let key = match semantic(inner.next().context("missing member key")?)? {
                Json::String(key) => key,
                _ => anyhow::bail!("object keys must be strings"),
            };
            let value = semantic(inner.nth(3).context("missing member value")?)?;
            members.push((key, value));
        }
        Ok(Json::Object(members))
    });

    actions
}

fn child(m: Match<Json>, index: usize) -> anyhow::Result<Match<Json>> {
    children(m)?
        .into_iter()
        .nth(index)
        .with_context(|| format!("missing submatch at index {}", index))
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_ansi(true)
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let input = match env::args().nth(1) {
        Some(path) => fs::read_to_string(&path)
            .with_context(|| format!("failed to read from file: {}", path))?,
        None => io::read_to_string(io::stdin()).context("failed to read from stdin")?,
    };

    let parsed = parse_text("json", &input, GRAMMAR, &actions()).context("failed to parse")?;
    println!("parsed: {:?}", parsed);

    Ok(())
}

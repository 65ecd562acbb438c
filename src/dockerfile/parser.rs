//! Dockerfile instruction parser.
//!
//! Turns raw Dockerfile text into an ordered sequence of typed instructions.
//! Handles line continuations, heredocs, comments, exec-form JSON arrays
//! and key/value instructions.

use lazy_static::lazy_static;
use phf::phf_set;
use regex::Regex;
use thiserror::Error;

/// Every instruction keyword the Dockerfile reference defines.
pub static KNOWN_INSTRUCTIONS: phf::Set<&'static str> = phf_set! {
    "ADD", "ARG", "CMD", "COPY", "ENTRYPOINT", "ENV", "EXPOSE", "FROM",
    "HEALTHCHECK", "LABEL", "MAINTAINER", "ONBUILD", "RUN", "SHELL",
    "STOPSIGNAL", "USER", "VOLUME", "WORKDIR",
};

/// Instructions whose arguments are `key=value` pairs.
static KEY_VALUE_INSTRUCTIONS: phf::Set<&'static str> = phf_set! {
    "ENV", "LABEL", "ARG",
};

/// Instructions that may take an exec-form JSON array.
static EXEC_FORM_INSTRUCTIONS: phf::Set<&'static str> = phf_set! {
    "CMD", "ENTRYPOINT", "RUN", "SHELL", "VOLUME", "COPY", "ADD",
};

/// Instructions that accept BuildKit heredocs (`RUN <<EOF`).
static HEREDOC_INSTRUCTIONS: phf::Set<&'static str> = phf_set! {
    "RUN", "COPY", "ADD",
};

lazy_static! {
    static ref HEREDOC_MARKER: Regex =
        Regex::new(r#"<<(-?)["']?([A-Za-z_][A-Za-z0-9_]*)["']?"#).unwrap();
}

/// Errors raised while parsing a Dockerfile.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("dockerfile is empty")]
    Empty,
    #[error("line {line}: {instruction} requires at least one argument")]
    MissingArguments { line: usize, instruction: String },
    #[error("line {line}: line continuation runs past end of file")]
    DanglingContinuation { line: usize },
    #[error("line {line}: heredoc {marker} is never terminated")]
    UnterminatedHeredoc { line: usize, marker: String },
    #[error("line {line}: malformed instruction {text:?}")]
    Malformed { line: usize, text: String },
}

/// Instruction arguments in one of three shapes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstructionArgs {
    /// Shell form or anything else: the raw text.
    Text(String),
    /// Exec form: a JSON array of strings.
    List(Vec<String>),
    /// `ENV`/`LABEL`/`ARG`: ordered key/value pairs. Bare `ARG NAME` has an empty value.
    Map(Vec<(String, String)>),
}

impl InstructionArgs {
    /// Render the arguments as a single string for pattern matching.
    pub fn as_text(&self) -> String {
        match self {
            InstructionArgs::Text(s) => s.clone(),
            InstructionArgs::List(items) => items.join(" "),
            InstructionArgs::Map(pairs) => pairs
                .iter()
                .map(|(k, v)| {
                    if v.is_empty() {
                        k.clone()
                    } else {
                        format!("{}={}", k, v)
                    }
                })
                .collect::<Vec<_>>()
                .join(" "),
        }
    }

    /// Split into whitespace-separated tokens (exec-form items are kept whole).
    pub fn tokens(&self) -> Vec<String> {
        match self {
            InstructionArgs::List(items) => items.clone(),
            other => other
                .as_text()
                .split_whitespace()
                .map(str::to_string)
                .collect(),
        }
    }
}

/// A single parsed Dockerfile instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    /// Upper-cased keyword (e.g. "FROM").
    pub name: String,
    pub args: InstructionArgs,
    /// 1-based line the instruction starts on.
    pub line_number: usize,
}

impl Instruction {
    pub fn is(&self, name: &str) -> bool {
        self.name == name
    }

    pub fn text(&self) -> String {
        self.args.as_text()
    }
}

/// A logical line after joining continuations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LogicalLine {
    pub line_number: usize,
    pub text: String,
}

/// A heredoc terminator still waiting to be seen.
struct PendingHeredoc {
    marker: String,
    strip_tabs: bool,
}

fn heredoc_markers(text: &str) -> Vec<PendingHeredoc> {
    let (keyword, _) = split_keyword(text);
    if !HEREDOC_INSTRUCTIONS.contains(keyword.to_ascii_uppercase().as_str()) {
        return Vec::new();
    }
    HEREDOC_MARKER
        .captures_iter(text)
        .map(|caps| PendingHeredoc {
            marker: caps[2].to_string(),
            strip_tabs: !caps[1].is_empty(),
        })
        .collect()
}

/// Join physical lines into logical instruction lines.
///
/// Comments and blank lines are dropped, including comment lines that appear
/// inside a continuation (Docker ignores those too). Heredoc bodies are kept
/// verbatim, newline-separated, as part of the instruction that opened them.
pub(crate) fn logical_lines(content: &str) -> Result<Vec<LogicalLine>, ParseError> {
    let mut lines = Vec::new();
    let mut current: Option<LogicalLine> = None;
    let mut heredocs: Vec<PendingHeredoc> = Vec::new();

    for (idx, raw) in content.lines().enumerate() {
        let line_number = idx + 1;

        if let Some(pending) = heredocs.first() {
            let candidate = if pending.strip_tabs {
                raw.trim_start_matches('\t')
            } else {
                raw
            };
            let terminated = candidate.trim_end() == pending.marker;
            if let Some(open) = current.as_mut() {
                open.text.push('\n');
                open.text.push_str(raw);
            }
            if terminated {
                heredocs.remove(0);
                if heredocs.is_empty() {
                    if let Some(done) = current.take() {
                        lines.push(done);
                    }
                }
            }
            continue;
        }

        let trimmed = raw.trim();

        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let (body, continues) = match trimmed.strip_suffix('\\') {
            Some(body) => (body.trim_end(), true),
            None => (trimmed, false),
        };

        match current.as_mut() {
            Some(open) => {
                if !body.is_empty() {
                    open.text.push(' ');
                    open.text.push_str(body);
                }
            }
            None => {
                current = Some(LogicalLine {
                    line_number,
                    text: body.to_string(),
                });
            }
        }

        if !continues {
            if let Some(open) = current.as_ref() {
                heredocs = heredoc_markers(&open.text);
            }
            if heredocs.is_empty() {
                if let Some(done) = current.take() {
                    lines.push(done);
                }
            }
        }
    }

    if let Some(open) = current {
        return Err(match heredocs.first() {
            Some(pending) => ParseError::UnterminatedHeredoc {
                line: open.line_number,
                marker: pending.marker.clone(),
            },
            None => ParseError::DanglingContinuation {
                line: open.line_number,
            },
        });
    }

    Ok(lines)
}

/// Split a logical line into keyword and argument text.
pub(crate) fn split_keyword(text: &str) -> (&str, &str) {
    match text.find(char::is_whitespace) {
        Some(pos) => (&text[..pos], text[pos..].trim()),
        None => (text, ""),
    }
}

/// Parse Dockerfile content into instructions.
pub fn parse(content: &str) -> Result<Vec<Instruction>, ParseError> {
    let lines = logical_lines(content)?;
    if lines.is_empty() {
        return Err(ParseError::Empty);
    }

    let mut instructions = Vec::with_capacity(lines.len());
    for line in lines {
        let (keyword, rest) = split_keyword(&line.text);
        if !keyword.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ParseError::Malformed {
                line: line.line_number,
                text: line.text.clone(),
            });
        }

        let name = keyword.to_ascii_uppercase();
        if rest.is_empty() && requires_arguments(&name) {
            return Err(ParseError::MissingArguments {
                line: line.line_number,
                instruction: name,
            });
        }

        let args = parse_args(&name, rest);
        instructions.push(Instruction {
            name,
            args,
            line_number: line.line_number,
        });
    }

    Ok(instructions)
}

fn requires_arguments(name: &str) -> bool {
    !matches!(name, "HEALTHCHECK" | "CMD" | "ENTRYPOINT")
}

fn parse_args(name: &str, rest: &str) -> InstructionArgs {
    if EXEC_FORM_INSTRUCTIONS.contains(name) && rest.starts_with('[') {
        if let Ok(items) = serde_json::from_str::<Vec<String>>(rest) {
            return InstructionArgs::List(items);
        }
    }

    if KEY_VALUE_INSTRUCTIONS.contains(name) {
        return InstructionArgs::Map(parse_key_values(name, rest));
    }

    InstructionArgs::Text(rest.to_string())
}

/// Parse `k=v k2="v 2"` pairs, or the legacy `ENV KEY value with spaces` form.
fn parse_key_values(name: &str, rest: &str) -> Vec<(String, String)> {
    let tokens = shell_words(rest);

    let legacy = name == "ENV"
        && tokens.len() >= 2
        && !tokens[0].contains('=');
    if legacy {
        let value = rest[tokens[0].len()..].trim().to_string();
        return vec![(tokens[0].clone(), unquote(&value))];
    }

    tokens
        .into_iter()
        .map(|tok| match tok.split_once('=') {
            Some((k, v)) => (k.to_string(), unquote(v)),
            None => (tok, String::new()),
        })
        .collect()
}

/// Split on whitespace outside of quotes. Quotes are preserved in the tokens.
fn shell_words(s: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            current.push(ch);
            escaped = false;
            continue;
        }
        match ch {
            '\\' => {
                current.push(ch);
                escaped = true;
            }
            '"' | '\'' => {
                match quote {
                    Some(q) if q == ch => quote = None,
                    None => quote = Some(ch),
                    _ => {}
                }
                current.push(ch);
            }
            c if c.is_whitespace() && quote.is_none() => {
                if !current.is_empty() {
                    words.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

fn unquote(s: &str) -> String {
    let s = s.trim();
    for q in ['"', '\''] {
        if s.len() >= 2 && s.starts_with(q) && s.ends_with(q) {
            return s[1..s.len() - 1].to_string();
        }
    }
    s.to_string()
}

//! Token resolution for template format strings
//!
//! Format strings such as `HDR|{trading_request_id}|{timestamp}|{sheet_name}`
//! are compiled once into literal and token segments, then rendered against a
//! [`TokenContext`]. Rendering is a single pass over the compiled segments, so
//! a context value that itself looks like `{random_6_digits}` is emitted
//! verbatim and never expanded a second time.
//!
//! Lookup order for each token:
//! 1. the context (static run tokens plus call-supplied values)
//! 2. the self-generating random patterns, drawn independently per occurrence
//!
//! Anything else fails with [`XtractError::UnresolvedToken`].

use crate::error::{XtractError, XtractResult};
use chrono::Local;
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::collections::BTreeMap;
use std::fmt;

/// Wall-clock format of the `timestamp` token. Digits only, so it never
/// contains the `.` naming delimiter; the first 8 characters are the date.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S%3f";

pub const TIMESTAMP: &str = "timestamp";
pub const REQUEST_ID: &str = "trading_request_id";
pub const SHEET_NAME: &str = "sheet_name";
pub const ROW_COUNT: &str = "row_count";
pub const FILE_NAME: &str = "file_name";

//==============================================================================
// Random Patterns
//==============================================================================

/// Tokens that generate a fresh value at every occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RandomToken {
    /// `random_6_digits`: 000000-999999, zero padded
    SixDigits,
    /// `random_5_alphanumeric`: five characters from [A-Za-z0-9]
    FiveAlphanumeric,
    /// `random_L5N`: one uppercase letter then 00000-99999
    LetterFiveDigits,
}

impl RandomToken {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "random_6_digits" => Some(RandomToken::SixDigits),
            "random_5_alphanumeric" => Some(RandomToken::FiveAlphanumeric),
            "random_L5N" => Some(RandomToken::LetterFiveDigits),
            _ => None,
        }
    }

    pub fn generate<R: Rng + ?Sized>(self, rng: &mut R) -> String {
        match self {
            RandomToken::SixDigits => format!("{:06}", rng.gen_range(0..=999_999u32)),
            RandomToken::FiveAlphanumeric => (0..5)
                .map(|_| char::from(rng.sample(Alphanumeric)))
                .collect(),
            RandomToken::LetterFiveDigits => {
                let letter = char::from(b'A' + rng.gen_range(0..26u8));
                format!("{}{:05}", letter, rng.gen_range(0..=99_999u32))
            }
        }
    }
}

//==============================================================================
// Token Context
//==============================================================================

/// Token name → value table for one encode or decode run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenContext {
    values: BTreeMap<String, String>,
}

impl TokenContext {
    /// An empty context (only random patterns resolve).
    pub fn new() -> Self {
        Self::default()
    }

    /// Static tokens for a fresh run: the current timestamp and one random
    /// request id shared by every record of the run.
    pub fn for_run() -> Self {
        Self::for_run_with(&mut rand::thread_rng())
    }

    pub fn for_run_with<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let timestamp = Local::now().format(TIMESTAMP_FORMAT).to_string();
        Self::fixed(timestamp, rng.gen_range(100_000..=999_999))
    }

    /// A context with caller-chosen static tokens.
    pub fn fixed(timestamp: impl Into<String>, request_id: u32) -> Self {
        let mut ctx = Self::new();
        ctx.insert(TIMESTAMP, timestamp.into());
        ctx.insert(REQUEST_ID, request_id);
        ctx
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl ToString) {
        self.values.insert(name.into(), value.to_string());
    }

    /// A copy of this context extended with one more token.
    pub fn with(&self, name: impl Into<String>, value: impl ToString) -> Self {
        let mut ctx = self.clone();
        ctx.insert(name, value);
        ctx
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn timestamp(&self) -> Option<&str> {
        self.get(TIMESTAMP)
    }

    pub fn request_id(&self) -> Option<&str> {
        self.get(REQUEST_ID)
    }
}

//==============================================================================
// Compiled Format Strings
//==============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Token(String),
}

/// A format string compiled into literal and token segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatString {
    source: String,
    segments: Vec<Segment>,
}

impl FormatString {
    /// Compile `source`. `{{` and `}}` are literal braces; an unterminated
    /// `{` or an empty `{}` is rejected.
    pub fn parse(source: &str) -> XtractResult<Self> {
        let malformed = |reason: &str| XtractError::MalformedFormat {
            format: source.to_string(),
            reason: reason.to_string(),
        };

        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = source.chars().peekable();

        while let Some(ch) = chars.next() {
            match ch {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    literal.push('{');
                }
                '{' => {
                    let mut name = String::new();
                    let mut closed = false;
                    for inner in chars.by_ref() {
                        match inner {
                            '}' => {
                                closed = true;
                                break;
                            }
                            '{' => return Err(malformed("nested '{' inside a placeholder")),
                            other => name.push(other),
                        }
                    }
                    if !closed {
                        return Err(malformed("unterminated '{'"));
                    }
                    if name.trim().is_empty() {
                        return Err(malformed("empty placeholder '{}'"));
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Token(name));
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    literal.push('}');
                }
                other => literal.push(other),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Token names in order of appearance.
    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|seg| match seg {
            Segment::Token(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    pub fn references(&self, token: &str) -> bool {
        self.tokens().any(|t| t == token)
    }

    pub fn render(&self, ctx: &TokenContext) -> XtractResult<String> {
        self.render_with(ctx, &mut rand::thread_rng())
    }

    /// Render against `ctx`, drawing random-pattern values from `rng`.
    pub fn render_with<R: Rng + ?Sized>(
        &self,
        ctx: &TokenContext,
        rng: &mut R,
    ) -> XtractResult<String> {
        let mut out = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Token(name) => {
                    if let Some(value) = ctx.get(name) {
                        out.push_str(value);
                    } else if let Some(random) = RandomToken::from_name(name) {
                        out.push_str(&random.generate(rng));
                    } else {
                        return Err(XtractError::UnresolvedToken {
                            token: name.clone(),
                            format: self.source.clone(),
                        });
                    }
                }
            }
        }
        Ok(out)
    }
}

impl fmt::Display for FormatString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Compile and render `format` in one step.
pub fn resolve(format: &str, ctx: &TokenContext) -> XtractResult<String> {
    FormatString::parse(format)?.render(ctx)
}

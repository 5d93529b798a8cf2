//! Tokenizer for one path segment of a page file name.
//!
//! A segment such as `post-[id]` or `[[lang]]` is scanned once, left to right,
//! into typed tokens. Each token later maps to a fragment of a route path.

use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};

use crate::errors::ParseError;

/// Characters escaped in static route text. Path separators and the
/// characters `encodeURI` keeps are left alone. Brackets are escaped so
/// only parameters can put them in a path.
const PATH_SEGMENT_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'[')
    .add(b']')
    .add(b'"')
    .add(b'#')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}')
    .add(b'|')
    .add(b'\\')
    .add(b'^');

/// Kind of a route token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Literal text: `about`
    Static,
    /// Required parameter: `[id]`
    Dynamic,
    /// Optional parameter: `[[lang]]`
    Optional,
    /// Catch-all parameter: `[...slug]`
    CatchAll,
}

/// One token of a segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteToken {
    pub kind: TokenKind,
    pub value: String,
}

impl RouteToken {
    /// The route-path fragment this token stands for (without the leading `/`).
    pub fn path_fragment(&self) -> String {
        match self.kind {
            TokenKind::Static => utf8_percent_encode(&self.value, PATH_SEGMENT_SET).to_string(),
            TokenKind::Dynamic => format!(":{}", self.value),
            TokenKind::Optional => format!(":{}?", self.value),
            TokenKind::CatchAll => format!(":{}(.*)*", self.value),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Initial,
    Static,
    Dynamic,
    Optional,
    CatchAll,
}

impl State {
    fn token_kind(self) -> Option<TokenKind> {
        match self {
            State::Initial => None,
            State::Static => Some(TokenKind::Static),
            State::Dynamic => Some(TokenKind::Dynamic),
            State::Optional => Some(TokenKind::Optional),
            State::CatchAll => Some(TokenKind::CatchAll),
        }
    }

    fn is_param(self) -> bool {
        matches!(self, State::Dynamic | State::Optional | State::CatchAll)
    }
}

fn is_param_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '.'
}

/// Splits one file-name segment into route tokens.
///
/// # Errors
///
/// Fails when a parameter is never closed (`[id`) or has no name (`[]`).
///
/// # Examples
///
/// ```
/// use core_smx::routes::{tokenize, TokenKind};
///
/// let tokens = tokenize("[...slug]").unwrap();
/// assert_eq!(tokens[0].kind, TokenKind::CatchAll);
/// assert_eq!(tokens[0].value, "slug");
/// ```
pub fn tokenize(segment: &str) -> Result<Vec<RouteToken>, ParseError> {
    let mut tokens = Vec::new();
    let mut state = State::Initial;
    let mut buffer = String::new();
    let mut previous: Option<char> = None;

    let mut flush = |state: State, buffer: &mut String| {
        if buffer.is_empty() {
            return;
        }
        if let Some(kind) = state.token_kind() {
            tokens.push(RouteToken {
                kind,
                value: std::mem::take(buffer),
            });
        }
    };

    for c in segment.chars() {
        // `Initial` never consumes: it picks the next state and lets that state handle `c`.
        if state == State::Initial {
            buffer.clear();
            if c == '[' {
                state = State::Dynamic;
                previous = Some(c);
                continue;
            }
            state = State::Static;
        }

        match state {
            State::Static => {
                if c == '[' {
                    flush(state, &mut buffer);
                    state = State::Dynamic;
                } else {
                    buffer.push(c);
                }
            }
            State::Dynamic | State::Optional | State::CatchAll => {
                if buffer == "..." {
                    buffer.clear();
                    state = State::CatchAll;
                }
                if c == '[' && state == State::Dynamic {
                    state = State::Optional;
                } else if c == ']' && (state != State::Optional || previous == Some(']')) {
                    if buffer.is_empty() {
                        return Err(ParseError::EmptyParam {
                            segment: segment.to_string(),
                        });
                    }
                    flush(state, &mut buffer);
                    state = State::Initial;
                } else if is_param_char(c) {
                    buffer.push(c);
                }
            }
            State::Initial => unreachable!("initial state hands off before matching"),
        }
        previous = Some(c);
    }

    if state.is_param() {
        return Err(ParseError::UnfinishedParam {
            segment: segment.to_string(),
            param: buffer,
        });
    }
    flush(state, &mut buffer);

    Ok(tokens)
}

/// Concatenation of all token values; used to name routes.
pub fn segment_name(tokens: &[RouteToken]) -> String {
    tokens.iter().map(|t| t.value.as_str()).collect()
}

/// Route path for a whole segment, starting with `/`.
pub fn segment_path(tokens: &[RouteToken]) -> String {
    tokens.iter().fold(String::from("/"), |mut path, token| {
        path.push_str(&token.path_fragment());
        path
    })
}

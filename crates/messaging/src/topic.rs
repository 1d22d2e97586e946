//! Topic filters with `+` (single level) and `#` (multi level) wildcards.
//!
//! A filter is split into literal chunks and wildcard tokens. `+` matches any
//! run of characters that does not contain a `/` and `#`, which may only be the
//! last character, matches whatever remains of the topic. With at most one
//! `+` this is the classic head/tail rule: the topic starts with everything
//! before the `+`, ends with everything after it, and the part in between is
//! a single level. Note that `a/b/#` does not match `a/b`.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

const LEVEL_SEPARATOR: u8 = b'/';
const SINGLE_LEVEL: char = '+';
const MULTI_LEVEL: char = '#';

/// Errors that can occur when parsing topics and filters.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// The filter or topic is empty.
    #[error("topic must not be empty")]
    Empty,

    /// `#` appears somewhere other than the end of the filter.
    #[error("'#' must be the last character of the filter `{0}`")]
    MisplacedMultiLevel(String),

    /// A concrete topic contains wildcard characters.
    #[error("topic `{0}` must not contain '+' or '#'")]
    WildcardInTopic(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Token {
    Literal(String),
    SingleLevel,
    MultiLevel,
}

/// A parsed subscription filter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TopicFilter {
    raw: String,
    tokens: Vec<Token>,
}

impl TopicFilter {
    /// Parses a filter.
    ///
    /// # Errors
    ///
    /// Returns an error if the filter is empty or `#` is not its last character.
    pub fn new(filter: impl Into<String>) -> Result<Self, Error> {
        let raw = filter.into();
        if raw.is_empty() {
            return Err(Error::Empty);
        }

        let mut tokens = Vec::new();
        let mut literal = String::new();
        for (index, c) in raw.char_indices() {
            match c {
                SINGLE_LEVEL => {
                    if !literal.is_empty() {
                        tokens.push(Token::Literal(std::mem::take(&mut literal)));
                    }
                    tokens.push(Token::SingleLevel);
                }
                MULTI_LEVEL => {
                    if index + c.len_utf8() != raw.len() {
                        return Err(Error::MisplacedMultiLevel(raw));
                    }
                    if !literal.is_empty() {
                        tokens.push(Token::Literal(std::mem::take(&mut literal)));
                    }
                    tokens.push(Token::MultiLevel);
                }
                _ => literal.push(c),
            }
        }
        if !literal.is_empty() {
            tokens.push(Token::Literal(literal));
        }

        Ok(Self { raw, tokens })
    }

    /// The filter as configured.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Whether the filter contains any wildcard.
    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        self.tokens
            .iter()
            .any(|token| !matches!(token, Token::Literal(_)))
    }

    /// Whether `topic` is accepted by this filter.
    #[must_use]
    pub fn matches(&self, topic: &str) -> bool {
        if !self.is_wildcard() {
            return self.raw == topic;
        }
        match_tokens(&self.tokens, topic)
    }
}

/// Walks the tokens once, tracking every topic offset the prefix matched so
/// far can end at. Runs in `O(tokens * topic length)`.
fn match_tokens(tokens: &[Token], topic: &str) -> bool {
    let bytes = topic.as_bytes();
    let mut reachable = vec![false; bytes.len() + 1];
    reachable[0] = true;

    for token in tokens {
        match token {
            Token::MultiLevel => return reachable.contains(&true),
            Token::Literal(literal) => {
                let literal = literal.as_bytes();
                let mut next = vec![false; bytes.len() + 1];
                for (start, _) in reachable.iter().enumerate().filter(|(_, reached)| **reached) {
                    if bytes[start..].starts_with(literal) {
                        next[start + literal.len()] = true;
                    }
                }
                reachable = next;
            }
            Token::SingleLevel => {
                // `+` extends a reached offset up to the next separator.
                for end in 1..=bytes.len() {
                    if !reachable[end] && reachable[end - 1] && bytes[end - 1] != LEVEL_SEPARATOR {
                        reachable[end] = true;
                    }
                }
            }
        }
        if !reachable.contains(&true) {
            return false;
        }
    }

    reachable[bytes.len()]
}

impl FromStr for TopicFilter {
    type Err = Error;

    fn from_str(filter: &str) -> Result<Self, Self::Err> {
        Self::new(filter)
    }
}

impl fmt::Display for TopicFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl From<TopicFilter> for String {
    fn from(filter: TopicFilter) -> Self {
        filter.raw
    }
}

/// Checks that `topic` can be published to.
///
/// # Errors
///
/// Returns an error if the topic is empty or contains wildcards.
pub fn validate_topic(topic: &str) -> Result<(), Error> {
    if topic.is_empty() {
        return Err(Error::Empty);
    }
    if topic.contains(SINGLE_LEVEL) || topic.contains(MULTI_LEVEL) {
        return Err(Error::WildcardInTopic(topic.to_string()));
    }
    Ok(())
}

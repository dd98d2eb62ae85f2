//! Wildcard Grammar Parser
//!
//! ```text
//! text        := (literal | brace)*
//! brace       := '{' '@' NAME '}'                      back-reference
//!              | '{' alternative ('|' alternative)* ('@' NAME)? '}'
//! alternative := (literal | brace)* ('::' WEIGHT)?
//! ```
//!
//! `|`, `@` and `::` only act as separators at the nesting level of the
//! brace that owns them. A stray `}` outside any brace is literal text.

use super::WildcardError;

/// A piece of parsed wildcard text.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    /// Literal text (may still contain `__file__` wildcards)
    Text(String),
    /// `{...}` choice expression
    Choice(Choice),
    /// `{@name}` back-reference
    Reference(String),
}

/// A `{a|b|c}` expression with an optional `@name` capture.
#[derive(Debug, Clone, PartialEq)]
pub struct Choice {
    pub alternatives: Vec<Alternative>,
    pub capture: Option<String>,
}

/// One `|`-separated option of a choice.
#[derive(Debug, Clone, PartialEq)]
pub struct Alternative {
    pub segments: Vec<Segment>,
    pub weight: usize,
}

/// Parses wildcard text into segments.
///
/// # Example
/// ```
/// use tweakrunner::wildcards::{parse, Segment};
///
/// let segments = parse("a {b|c}").unwrap();
/// assert_eq!(segments[0], Segment::Text("a ".to_string()));
/// assert!(matches!(segments[1], Segment::Choice(_)));
/// ```
pub fn parse(text: &str) -> Result<Vec<Segment>, WildcardError> {
    let mut parser = Parser {
        chars: text.chars().collect(),
        pos: 0,
    };
    parser.parse_text()
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn parse_text(&mut self) -> Result<Vec<Segment>, WildcardError> {
        let mut segments = Vec::new();
        let mut literal = String::new();

        while let Some(ch) = self.peek() {
            if ch == '{' {
                flush(&mut literal, &mut segments);
                segments.push(self.parse_brace()?);
            } else {
                literal.push(ch);
                self.pos += 1;
            }
        }

        flush(&mut literal, &mut segments);
        Ok(segments)
    }

    /// Parses a `{...}` starting at the current position.
    fn parse_brace(&mut self) -> Result<Segment, WildcardError> {
        let open = self.pos;
        self.pos += 1;

        if self.peek() == Some('@') {
            self.pos += 1;
            let name = self.parse_name(open)?;
            return Ok(Segment::Reference(name));
        }

        let mut alternatives = Vec::new();
        let mut capture = None;

        loop {
            alternatives.push(self.parse_alternative()?);
            match self.peek() {
                Some('|') => self.pos += 1,
                Some('@') => {
                    self.pos += 1;
                    capture = Some(self.parse_name(open)?);
                    break;
                }
                Some('}') => {
                    self.pos += 1;
                    break;
                }
                _ => return Err(WildcardError::Unclosed(open)),
            }
        }

        if let [only] = alternatives.as_slice() {
            if only.segments.is_empty() {
                return Err(WildcardError::EmptyChoice(open));
            }
        }

        Ok(Segment::Choice(Choice {
            alternatives,
            capture,
        }))
    }

    /// Reads a capture or reference name up to and including the closing `}`.
    fn parse_name(&mut self, open: usize) -> Result<String, WildcardError> {
        let mut name = String::new();
        loop {
            match self.peek() {
                Some('}') => {
                    self.pos += 1;
                    break;
                }
                Some(ch @ ('{' | '|')) => {
                    return Err(WildcardError::InvalidFormat(format!(
                        "unexpected '{}' in reference name at position {}",
                        ch, self.pos
                    )))
                }
                Some(ch) => {
                    name.push(ch);
                    self.pos += 1;
                }
                None => return Err(WildcardError::Unclosed(open)),
            }
        }

        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(WildcardError::InvalidFormat(format!(
                "empty reference name in brace at position {}",
                open
            )));
        }
        Ok(name)
    }

    fn parse_alternative(&mut self) -> Result<Alternative, WildcardError> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut weight = 1;

        while let Some(ch) = self.peek() {
            match ch {
                '|' | '}' | '@' => break,
                '{' => {
                    flush(&mut literal, &mut segments);
                    segments.push(self.parse_brace()?);
                }
                ':' if self.peek_at(1) == Some(':') => {
                    self.pos += 2;
                    weight = self.parse_weight()?;
                    break;
                }
                _ => {
                    literal.push(ch);
                    self.pos += 1;
                }
            }
        }

        flush(&mut literal, &mut segments);
        Ok(Alternative { segments, weight })
    }

    fn parse_weight(&mut self) -> Result<usize, WildcardError> {
        let mut token = String::new();
        while let Some(ch) = self.peek() {
            if matches!(ch, '|' | '}' | '@') {
                break;
            }
            token.push(ch);
            self.pos += 1;
        }

        match token.trim().parse::<usize>() {
            Ok(weight) if weight > 0 => Ok(weight),
            _ => Err(WildcardError::InvalidFormat(format!(
                "weight '{}' is not a positive integer",
                token.trim()
            ))),
        }
    }
}

fn flush(literal: &mut String, segments: &mut Vec<Segment>) {
    if !literal.is_empty() {
        segments.push(Segment::Text(std::mem::take(literal)));
    }
}

//! Wildcard Resolution
//!
//! Resolution happens in two passes:
//! 1. Choice expressions are resolved innermost-first, left to right. Every
//!    alternative of a choice is resolved before the weighted draw is made,
//!    and `@name` captures are recorded in a per-call binding table.
//! 2. `{@name}` back-references are substituted once all choices are settled.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;

use super::parser::{parse, Choice, Segment};
use super::WildcardError;
use crate::random::{RandomSource, StdRandom};

/// Matches `__path/to/file__` (word characters and `/` only).
static FILE_WILDCARD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"__(\w+(?:/\w+)*)__").expect("file wildcard pattern is valid"));

/// Extension appended to file wildcard paths.
const WILDCARD_EXTENSION: &str = "txt";

/// Replaces wildcards in text with random choices.
///
/// # Example
/// ```
/// use tweakrunner::wildcards::WildcardProcessor;
///
/// let processor = WildcardProcessor::with_seed(None, 3);
/// let result = processor.process("{red|blue@c} hat, {@c} scarf").unwrap();
/// assert!(result == "red hat, red scarf" || result == "blue hat, blue scarf");
/// ```
#[derive(Clone)]
pub struct WildcardProcessor {
    directory: Option<PathBuf>,
    random: Arc<dyn RandomSource>,
}

impl WildcardProcessor {
    /// Creates a processor reading file wildcards from `directory`.
    pub fn new(directory: Option<PathBuf>, random: Arc<dyn RandomSource>) -> Self {
        Self { directory, random }
    }

    /// Creates a processor with a reproducible random sequence.
    pub fn with_seed(directory: Option<PathBuf>, seed: u64) -> Self {
        Self::new(directory, Arc::new(StdRandom::seeded(seed)))
    }

    /// Directory file wildcards are read from, if configured.
    pub fn directory(&self) -> Option<&Path> {
        self.directory.as_deref()
    }

    /// Resolves every wildcard in `text`.
    pub fn process(&self, text: &str) -> Result<String, WildcardError> {
        let segments = parse(text)?;
        let mut bindings = HashMap::new();

        let mut resolved = String::new();
        for segment in &segments {
            match segment {
                Segment::Text(literal) => {
                    resolved.push_str(&self.expand_file_wildcards(literal)?)
                }
                other => resolved.push_str(&self.resolve_segment(other, &mut bindings)?),
            }
        }

        let mut stack = Vec::new();
        resolve_references(&resolved, &bindings, &mut stack)
    }

    /// Draws one line from the file named by a `__path__` wildcard.
    pub fn evaluate_file_wildcard(&self, wildcard: &str) -> Result<String, WildcardError> {
        let directory = self
            .directory
            .as_ref()
            .ok_or(WildcardError::MissingDirectory)?;

        let inner = wildcard
            .strip_prefix("__")
            .and_then(|rest| rest.strip_suffix("__"))
            .filter(|inner| !inner.is_empty())
            .ok_or_else(|| WildcardError::InvalidFormat(wildcard.to_string()))?;

        let valid = inner
            .split('/')
            .all(|part| !part.is_empty() && part.chars().all(|c| c.is_alphanumeric() || c == '_'));
        if !valid {
            return Err(WildcardError::InvalidFormat(wildcard.to_string()));
        }

        let mut file_path = directory.clone();
        for part in inner.split('/') {
            file_path.push(part);
        }
        file_path.set_extension(WILDCARD_EXTENSION);

        if !file_path.exists() {
            return Err(WildcardError::NotFound(file_path));
        }

        let content = fs::read_to_string(&file_path).map_err(|e| WildcardError::Io {
            path: file_path.clone(),
            message: e.to_string(),
        })?;

        let lines: Vec<&str> = content.lines().filter(|l| !l.trim().is_empty()).collect();
        if lines.is_empty() {
            return Err(WildcardError::EmptyFile(file_path));
        }

        let line = lines[self.random.index(lines.len())];
        debug!("Wildcard {} -> {}", wildcard, line);
        Ok(line.to_string())
    }

    fn resolve_segment(
        &self,
        segment: &Segment,
        bindings: &mut HashMap<String, String>,
    ) -> Result<String, WildcardError> {
        match segment {
            Segment::Text(literal) => Ok(literal.clone()),
            Segment::Reference(name) => Ok(format!("{{@{}}}", name)),
            Segment::Choice(choice) => self.resolve_choice(choice, bindings),
        }
    }

    fn resolve_choice(
        &self,
        choice: &Choice,
        bindings: &mut HashMap<String, String>,
    ) -> Result<String, WildcardError> {
        let mut options = Vec::with_capacity(choice.alternatives.len());
        for alternative in &choice.alternatives {
            let mut value = String::new();
            for segment in &alternative.segments {
                value.push_str(&self.resolve_segment(segment, bindings)?);
            }
            options.push((value.trim().to_string(), alternative.weight));
        }

        let picked = self.weighted_pick(&options)?;
        let result = self.expand_file_wildcards(picked)?;

        if let Some(name) = &choice.capture {
            if bindings.contains_key(name) {
                return Err(WildcardError::DuplicateReference(name.clone()));
            }
            bindings.insert(name.clone(), result.clone());
        }

        Ok(result)
    }

    /// Draws once in `0..total weight` and walks the cumulative weights.
    fn weighted_pick<'a>(&self, options: &'a [(String, usize)]) -> Result<&'a str, WildcardError> {
        let total = options
            .iter()
            .try_fold(0usize, |sum, (_, weight)| sum.checked_add(*weight))
            .ok_or_else(|| {
                WildcardError::InvalidFormat(format!(
                    "weights of {} alternatives add up to more than {}",
                    options.len(),
                    usize::MAX
                ))
            })?;
        if total == 0 {
            return Err(WildcardError::EmptyChoice(0));
        }

        let mut draw = self.random.index(total);
        for (value, weight) in options {
            if draw < *weight {
                return Ok(value.as_str());
            }
            draw -= weight;
        }
        Err(WildcardError::EmptyChoice(0))
    }

    fn expand_file_wildcards(&self, text: &str) -> Result<String, WildcardError> {
        let mut expanded = String::with_capacity(text.len());
        let mut last = 0;
        for found in FILE_WILDCARD.find_iter(text) {
            expanded.push_str(&text[last..found.start()]);
            expanded.push_str(&self.evaluate_file_wildcard(found.as_str())?);
            last = found.end();
        }
        expanded.push_str(&text[last..]);
        Ok(expanded)
    }
}

impl Default for WildcardProcessor {
    fn default() -> Self {
        Self::new(None, Arc::new(StdRandom::from_entropy()))
    }
}

fn resolve_references(
    text: &str,
    bindings: &HashMap<String, String>,
    stack: &mut Vec<String>,
) -> Result<String, WildcardError> {
    let mut output = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find("{@") {
        let Some(length) = rest[start..].find('}') else {
            break;
        };
        output.push_str(&rest[..start]);

        let name = rest[start + 2..start + length].trim();
        if stack.iter().any(|seen| seen == name) {
            return Err(WildcardError::CyclicReference(name.to_string()));
        }
        let value = bindings
            .get(name)
            .ok_or_else(|| WildcardError::UndefinedReference(name.to_string()))?;

        stack.push(name.to_string());
        output.push_str(&resolve_references(value, bindings, stack)?);
        stack.pop();

        rest = &rest[start + length + 1..];
    }

    output.push_str(rest);
    Ok(output)
}

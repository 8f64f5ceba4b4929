//! JSON-path-like field extraction.
//!
//! Supports the subset used by webhook filters: `$`-rooted or bare dotted
//! paths, bare integer segments as sequence indices, and `name[index]`
//! segments (indices may be chained, e.g. `matrix[1][0]`).

use serde_json::Value;

/// Result of walking a path through a payload.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Lookup<'a> {
    /// The path resolved. The value may be `null`.
    Found(&'a Value),
    /// Some segment could not be resolved.
    Missing,
}

impl<'a> Lookup<'a> {
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }

    pub fn value(&self) -> Option<&'a Value> {
        match self {
            Self::Found(v) => Some(v),
            Self::Missing => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Step<'p> {
    Key(&'p str),
    /// `None` marks an index that can never resolve (negative or non-numeric).
    Index(Option<usize>),
}

/// Resolve `path` against `payload`.
///
/// An empty path (or a lone `$`) yields the whole payload.
pub fn lookup<'a>(payload: &'a Value, path: &str) -> Lookup<'a> {
    let mut current = payload;
    for step in parse_path(path) {
        let next = match step {
            Step::Key(key) => match current {
                Value::Object(map) => map.get(key),
                _ => None,
            },
            Step::Index(Some(idx)) => match current {
                Value::Array(items) => items.get(idx),
                _ => None,
            },
            Step::Index(None) => None,
        };
        match next {
            Some(value) => current = value,
            None => return Lookup::Missing,
        }
    }
    Lookup::Found(current)
}

fn strip_root(path: &str) -> &str {
    let path = path.trim();
    if let Some(rest) = path.strip_prefix("$.") {
        rest
    } else if let Some(rest) = path.strip_prefix('$') {
        rest
    } else {
        path
    }
}

fn parse_path(path: &str) -> Vec<Step<'_>> {
    let path = strip_root(path);
    if path.is_empty() {
        return Vec::new();
    }
    let mut steps = Vec::new();
    for segment in path.split('.') {
        parse_segment(segment, &mut steps);
    }
    steps
}

fn parse_segment<'p>(segment: &'p str, steps: &mut Vec<Step<'p>>) {
    if !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit()) {
        steps.push(Step::Index(segment.parse().ok()));
        return;
    }

    let Some(open) = segment.find('[') else {
        steps.push(Step::Key(segment));
        return;
    };
    if !segment.ends_with(']') {
        steps.push(Step::Key(segment));
        return;
    }

    let name = &segment[..open];
    if !name.is_empty() {
        steps.push(Step::Key(name));
    }
    // "[1][2]" -> "1", "2"
    let brackets = &segment[open + 1..segment.len() - 1];
    for raw in brackets.split("][") {
        let index = if !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit()) {
            raw.parse().ok()
        } else {
            None
        };
        steps.push(Step::Index(index));
    }
}

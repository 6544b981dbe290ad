use crate::types::ScalarValue;
use anyhow::{Context, Result};
use serde_json::Value;

/// Outcome of resolving a path expression against a payload document.
/// `Unresolved` means the path had no match at all; a matched `null` comes
/// back as `Primitive(ScalarValue::Nil)`; objects and arrays come back as
/// `Composite` and are never flattened or stringified.
#[derive(Clone, Debug, PartialEq)]
pub enum PathResolution {
    Primitive(ScalarValue),
    Composite,
    Unresolved,
}

impl PathResolution {
    pub fn as_primitive(&self) -> Option<&ScalarValue> {
        match self {
            PathResolution::Primitive(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        !matches!(self, PathResolution::Unresolved)
    }
}

/// Read-only view over a structured payload. Reusable scratch object:
/// `wrap` re-initializes the view for a new payload buffer, so one document
/// serves a whole partition's evaluations. Single-threaded by design.
#[derive(Debug, Default)]
pub struct PayloadDocument {
    root: Option<Value>,
}

impl PayloadDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Point the view at a new payload buffer. Resolution never mutates the
    /// payload; the buffer itself stays opaque bytes on the log. On a buffer
    /// that is not a document the previous view is discarded too, so every
    /// later resolution comes back `Unresolved` instead of reading stale
    /// payload.
    pub fn wrap(&mut self, buffer: &[u8]) -> Result<()> {
        self.root = None;
        let root = serde_json::from_slice(buffer).context("payload buffer is not a document")?;
        self.root = Some(root);
        Ok(())
    }

    /// Lazily resolve a path expression. Grammar: optional `$` root, then
    /// `.`-separated field names with `[index]` subscripts, e.g.
    /// `$.order.items[0].amount`. Malformed expressions resolve to
    /// `Unresolved` rather than erroring: a condition that cannot be read
    /// is a condition that cannot be decided.
    pub fn resolve_path(&self, expression: &str) -> PathResolution {
        let Some(root) = &self.root else {
            return PathResolution::Unresolved;
        };
        let Some(segments) = parse_path(expression) else {
            return PathResolution::Unresolved;
        };

        let mut current = root;
        for segment in segments {
            let next = match segment {
                PathSegment::Field(name) => current.as_object().and_then(|map| map.get(name)),
                PathSegment::Index(i) => current.as_array().and_then(|items| items.get(i)),
            };
            match next {
                Some(value) => current = value,
                None => return PathResolution::Unresolved,
            }
        }
        classify(current)
    }
}

fn classify(value: &Value) -> PathResolution {
    match value {
        Value::Null => PathResolution::Primitive(ScalarValue::Nil),
        Value::Bool(b) => PathResolution::Primitive(ScalarValue::Bool(*b)),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                PathResolution::Primitive(ScalarValue::Int(i))
            } else {
                // u64 overflow or fractional: both live in the float domain.
                PathResolution::Primitive(ScalarValue::Float(n.as_f64().unwrap_or(f64::NAN)))
            }
        }
        Value::String(s) => PathResolution::Primitive(ScalarValue::Str(s.clone())),
        Value::Array(_) | Value::Object(_) => PathResolution::Composite,
    }
}

enum PathSegment<'a> {
    Field(&'a str),
    Index(usize),
}

fn parse_path(expression: &str) -> Option<Vec<PathSegment<'_>>> {
    let mut rest = expression.trim();
    if rest.is_empty() {
        return None;
    }
    if let Some(stripped) = rest.strip_prefix('$') {
        rest = stripped.strip_prefix('.').unwrap_or(stripped);
    }

    let mut segments = Vec::new();
    if rest.is_empty() {
        // Bare `$`: the document root itself.
        return Some(segments);
    }

    for part in rest.split('.') {
        if part.is_empty() {
            return None;
        }
        let (name, mut brackets) = match part.find('[') {
            Some(pos) => (&part[..pos], &part[pos..]),
            None => (part, ""),
        };
        if !name.is_empty() {
            segments.push(PathSegment::Field(name));
        } else if brackets.is_empty() {
            return None;
        }
        while !brackets.is_empty() {
            let end = brackets.find(']')?;
            let index: usize = brackets.get(1..end)?.parse().ok()?;
            segments.push(PathSegment::Index(index));
            brackets = brackets.get(end + 1..)?;
            if !brackets.is_empty() && !brackets.starts_with('[') {
                return None;
            }
        }
    }
    Some(segments)
}

use crate::selection::Selection;

/// Placeholder shown in a fresh editor before any composition is written.
/// Its exact character count doubles as a classification hint: an edit that
/// removes this many characters is assumed to be the placeholder's removal.
pub const PLACEHOLDER_TEXT: &str = "/* Select a measurement to begin composing a query */";

/// A rendered composition plus the extents needed to size its buffer region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Composition {
    /// Newline-joined clause text.
    pub text: String,
    /// Number of lines in `text`.
    pub lines: usize,
    /// Character length of the final line.
    pub last_line_len: usize,
}

/// Render a builder selection into query text.
///
/// Pure and deterministic: the same selection always yields byte-identical
/// text. Identifiers are emitted unescaped; sanitizing them is the caller's
/// responsibility. The time range is deliberately not rendered.
pub fn render(selection: &Selection) -> Composition {
    let mut clauses: Vec<String> = Vec::with_capacity(4);

    if selection.fields.is_empty() {
        clauses.push("SELECT *".to_string());
    } else {
        let fields = selection
            .fields
            .iter()
            .map(|f| format!("\"{f}\""))
            .collect::<Vec<_>>()
            .join(", ");
        clauses.push(format!("SELECT {fields}"));
    }

    let mut source_parts: Vec<String> = Vec::with_capacity(3);
    if let Some(dbrp) = &selection.dbrp {
        source_parts.push(dbrp.database.clone());
        source_parts.push(dbrp.retention_policy.clone());
    }
    if let Some(measurement) = &selection.measurement {
        source_parts.push(format!("\"{measurement}\""));
    }
    if !source_parts.is_empty() {
        clauses.push(format!("FROM {}", source_parts.join(".")));
    }

    if !selection.tag_values.is_empty() {
        let predicate = selection
            .grouped_tag_values()
            .iter()
            .map(|(key, values)| {
                values
                    .iter()
                    .map(|value| format!("\"{key}\" = '{value}'"))
                    .collect::<Vec<_>>()
                    .join(" AND ")
            })
            .collect::<Vec<_>>()
            .join(" AND ");
        clauses.push("WHERE".to_string());
        clauses.push(format!("({predicate})"));
    }

    let lines = clauses.len();
    let last_line_len = clauses.last().map(|l| l.chars().count()).unwrap_or(0);
    Composition {
        text: clauses.join("\n"),
        lines,
        last_line_len,
    }
}

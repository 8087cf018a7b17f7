//! Attribute selectors — the per-field filter expressions scans accept.
//!
//! Each selector compiles to a parameter-bound SQL fragment. Values
//! are always bound through `?` placeholders, never interpolated into
//! query text; only column names (compile-time constants from the
//! shape's DDL) appear literally.
//!
//! `Range` is inclusive on both bounds. A conflicting range
//! (`low > high`) simply matches nothing, keeping pagination loops
//! well-behaved.

use rusqlite::types::Value;

use crate::record::END_OF_TIME;

/// How a column stores its values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// One value per row.
    Scalar,
    /// Multi-valued: a JSON array of scalars. `In`/`NotIn` become
    /// intersect / disjoint tests over the elements.
    SetJson,
}

/// Filter expression evaluated against one field.
#[derive(Debug, Clone)]
pub enum AttributeSelector {
    /// No constraint; the field is omitted from the predicate.
    Any,
    Equal(Value),
    NotEqual(Value),
    /// Inclusive on both bounds. Numeric and timestamp fields only.
    Range { low: Value, high: Value },
    /// Membership. Empty set matches nothing.
    In(Vec<Value>),
    /// Exclusion. Empty set matches everything.
    NotIn(Vec<Value>),
    /// String match, case-sensitive, `*` or `%` wildcards.
    Like(String),
}

/// A selector bound to the column it filters.
#[derive(Debug, Clone)]
pub struct FieldSelector {
    pub column: &'static str,
    pub kind: FieldKind,
    pub selector: AttributeSelector,
}

impl FieldSelector {
    pub fn scalar(column: &'static str, selector: AttributeSelector) -> Self {
        FieldSelector {
            column,
            kind: FieldKind::Scalar,
            selector,
        }
    }

    pub fn set(column: &'static str, selector: AttributeSelector) -> Self {
        FieldSelector {
            column,
            kind: FieldKind::SetJson,
            selector,
        }
    }
}

/// Which era of history a read observes. Every scan applies one of
/// these, so results are always a single point-in-time snapshot and
/// never a mix of eras.
#[derive(Debug, Clone, Copy)]
pub enum LifelineFilter {
    /// Versions visible at `t`: `life_start <= t < life_end`.
    AsOf(i64),
    /// Current live versions only.
    Live,
    /// All history. Used by maintenance and audit reads.
    Any,
}

/// A compiled predicate: SQL text with matching bound parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlFragment {
    pub clause: String,
    pub params: Vec<Value>,
}

impl LifelineFilter {
    pub fn compile(self) -> Option<SqlFragment> {
        match self {
            LifelineFilter::AsOf(t) => Some(SqlFragment {
                clause: "life_start <= ? AND life_end > ?".to_string(),
                params: vec![Value::Integer(t), Value::Integer(t)],
            }),
            LifelineFilter::Live => Some(SqlFragment {
                clause: "life_end = ?".to_string(),
                params: vec![Value::Integer(END_OF_TIME)],
            }),
            LifelineFilter::Any => None,
        }
    }
}

impl FieldSelector {
    /// Compile into a predicate fragment, or `None` when the selector
    /// imposes no constraint.
    pub fn compile(&self) -> Option<SqlFragment> {
        let column = self.column;
        match (&self.selector, self.kind) {
            (AttributeSelector::Any, _) => None,

            (AttributeSelector::Equal(v), _) => Some(SqlFragment {
                clause: format!("{column} = ?"),
                params: vec![v.clone()],
            }),

            (AttributeSelector::NotEqual(v), _) => Some(SqlFragment {
                clause: format!("{column} <> ?"),
                params: vec![v.clone()],
            }),

            (AttributeSelector::Range { low, high }, _) => Some(SqlFragment {
                clause: format!("{column} >= ? AND {column} <= ?"),
                params: vec![low.clone(), high.clone()],
            }),

            (AttributeSelector::In(values), FieldKind::Scalar) => {
                if values.is_empty() {
                    // Empty membership set matches nothing.
                    return Some(SqlFragment {
                        clause: "0 = 1".to_string(),
                        params: vec![],
                    });
                }
                Some(SqlFragment {
                    clause: format!("{column} IN ({})", placeholders(values.len())),
                    params: values.clone(),
                })
            }

            (AttributeSelector::NotIn(values), FieldKind::Scalar) => {
                if values.is_empty() {
                    // Empty exclusion set matches everything.
                    return None;
                }
                Some(SqlFragment {
                    clause: format!("{column} NOT IN ({})", placeholders(values.len())),
                    params: values.clone(),
                })
            }

            // Multi-valued columns: membership means the stored set
            // intersects the selector set; exclusion means disjoint.
            (AttributeSelector::In(values), FieldKind::SetJson) => {
                if values.is_empty() {
                    return Some(SqlFragment {
                        clause: "0 = 1".to_string(),
                        params: vec![],
                    });
                }
                Some(SqlFragment {
                    clause: format!(
                        "EXISTS (SELECT 1 FROM json_each({column}) \
                         WHERE json_each.value IN ({}))",
                        placeholders(values.len())
                    ),
                    params: values.clone(),
                })
            }

            (AttributeSelector::NotIn(values), FieldKind::SetJson) => {
                if values.is_empty() {
                    return None;
                }
                Some(SqlFragment {
                    clause: format!(
                        "NOT EXISTS (SELECT 1 FROM json_each({column}) \
                         WHERE json_each.value IN ({}))",
                        placeholders(values.len())
                    ),
                    params: values.clone(),
                })
            }

            (AttributeSelector::Like(pattern), _) => Some(SqlFragment {
                clause: format!("{column} LIKE ?"),
                // `*` and `%` are both accepted as the many-chars
                // wildcard; SQLite sees only `%`.
                params: vec![Value::Text(pattern.replace('*', "%"))],
            }),
        }
    }
}

fn placeholders(n: usize) -> String {
    let mut s = String::with_capacity(n * 3);
    for i in 0..n {
        if i > 0 {
            s.push_str(", ");
        }
        s.push('?');
    }
    s
}

//! Printable forms of heap values.

use crate::runtime::compare::MAX_RECURSION_DEPTH;
use crate::runtime::object::ObjectData;
use crate::runtime::RuntimeInner;
use crate::value::Value;

/// Formats a number the way `print` shows it: integer-valued numbers print
/// without a decimal point.
pub(crate) fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

impl RuntimeInner {
    /// Renders a value for `print` and `to_string`.
    ///
    /// Strings print raw at the top level and quoted inside containers.
    /// Depth is capped; anything deeper renders as an ellipsis.
    pub(crate) fn display_inner(&self, v: Value, depth: usize, quoted: bool) -> String {
        if depth >= MAX_RECURSION_DEPTH {
            return "...".to_string();
        }
        let Some(obj) = self.objects.get(&v.id()) else {
            return "<dangling>".to_string();
        };
        match &obj.data {
            ObjectData::Number(n) => format_number(*n),
            ObjectData::Bool(b) => b.to_string(),
            ObjectData::Nil => "nil".to_string(),
            ObjectData::Str { bytes, .. } => {
                let s = String::from_utf8_lossy(bytes);
                if quoted {
                    format!("\"{s}\"")
                } else {
                    s.into_owned()
                }
            }
            ObjectData::List(items) => {
                let parts: Vec<String> = items
                    .iter()
                    .map(|item| self.display_inner(*item, depth + 1, true))
                    .collect();
                format!("[{}]", parts.join(", "))
            }
            ObjectData::Tuple(items) => {
                let parts: Vec<String> = items
                    .iter()
                    .map(|item| self.display_inner(*item, depth + 1, true))
                    .collect();
                format!("({})", parts.join(", "))
            }
            ObjectData::Map(table) => {
                let parts: Vec<String> = table
                    .entries()
                    .iter()
                    .map(|(k, val)| {
                        format!(
                            "{}: {}",
                            self.display_inner(*k, depth + 1, true),
                            self.display_inner(*val, depth + 1, true)
                        )
                    })
                    .collect();
                format!("{{{}}}", parts.join(", "))
            }
            ObjectData::Range { start, end, step } => {
                if (*step - 1.0).abs() < f64::EPSILON {
                    format!("range({}, {})", format_number(*start), format_number(*end))
                } else {
                    format!(
                        "range({}, {}, {})",
                        format_number(*start),
                        format_number(*end),
                        format_number(*step)
                    )
                }
            }
            ObjectData::Function { arity, .. } => format!("<function/{arity}>"),
            ObjectData::Channel(handle) => format!("<channel #{handle}>"),
        }
    }
}

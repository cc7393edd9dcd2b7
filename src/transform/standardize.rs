//! String standardization transforms. Non-string columns are left untouched.

use std::borrow::Cow;
use std::collections::HashMap;

use regex::Regex;

use crate::context::RunContext;
use crate::error::{JanitorError, JanitorResult};
use crate::frame::{ColumnMut, Frame};
use crate::pipeline::Transform;

use super::check_every;

/// Strip leading and trailing whitespace.
#[derive(Debug, Clone)]
pub struct Trim {
    column: String,
}

impl Trim {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
        }
    }
}

impl Transform for Trim {
    fn name(&self) -> &str {
        "trim"
    }

    fn apply(&mut self, _ctx: &RunContext, frame: &mut Frame) -> JanitorResult<()> {
        if let Some(ColumnMut::Str(mut c)) = frame.column_mut(&self.column) {
            c.update_present(|s| {
                let t = s.trim();
                if t.len() != s.len() {
                    *s = t.to_string();
                }
            });
        }
        Ok(())
    }
}

/// Lowercase every value.
#[derive(Debug, Clone)]
pub struct Lower {
    column: String,
}

impl Lower {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
        }
    }
}

impl Transform for Lower {
    fn name(&self) -> &str {
        "lower"
    }

    fn apply(&mut self, _ctx: &RunContext, frame: &mut Frame) -> JanitorResult<()> {
        if let Some(ColumnMut::Str(mut c)) = frame.column_mut(&self.column) {
            c.update_present(|s| *s = s.to_lowercase());
        }
        Ok(())
    }
}

/// Replace every match of a regular expression.
///
/// The pattern is compiled on first use; a malformed pattern fails the step with
/// [`JanitorError::InvalidPattern`]. `$1`/`${name}` in the replacement expand capture groups.
#[derive(Debug, Clone)]
pub struct RegexReplace {
    column: String,
    pattern: String,
    replace: String,
    compiled: Option<Regex>,
}

impl RegexReplace {
    pub fn new(column: impl Into<String>, pattern: impl Into<String>, replace: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            pattern: pattern.into(),
            replace: replace.into(),
            compiled: None,
        }
    }

    fn regex(&mut self) -> JanitorResult<&Regex> {
        let re = match self.compiled.take() {
            Some(re) => re,
            None => Regex::new(&self.pattern).map_err(|e| JanitorError::InvalidPattern {
                pattern: self.pattern.clone(),
                message: e.to_string(),
            })?,
        };
        Ok(self.compiled.insert(re))
    }
}

impl Transform for RegexReplace {
    fn name(&self) -> &str {
        "regex_replace"
    }

    fn apply(&mut self, ctx: &RunContext, frame: &mut Frame) -> JanitorResult<()> {
        let Some(ColumnMut::Str(mut c)) = frame.column_mut(&self.column) else {
            return Ok(());
        };
        let replace = self.replace.clone();
        let re = self.regex()?;
        for row in 0..c.len() {
            check_every(ctx, row)?;
            let replaced = match c.get(row).map(|s| re.replace_all(s, replace.as_str())) {
                Some(Cow::Owned(s)) => s,
                _ => continue,
            };
            c.set(row, replaced);
        }
        Ok(())
    }
}

/// Replace exact values using a lookup table. Values not in the table are kept.
#[derive(Debug, Clone)]
pub struct MapValues {
    column: String,
    map: HashMap<String, String>,
}

impl MapValues {
    pub fn new(column: impl Into<String>, map: HashMap<String, String>) -> Self {
        Self {
            column: column.into(),
            map,
        }
    }
}

impl Transform for MapValues {
    fn name(&self) -> &str {
        "map_values"
    }

    fn apply(&mut self, _ctx: &RunContext, frame: &mut Frame) -> JanitorResult<()> {
        if let Some(ColumnMut::Str(mut c)) = frame.column_mut(&self.column) {
            c.update_present(|s| {
                if let Some(to) = self.map.get(s.as_str()) {
                    s.clone_from(to);
                }
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ColumnSchema, Kind, Schema, Value};

    fn names(values: &[Option<&str>]) -> Frame {
        let schema = Schema::new(vec![
            ColumnSchema::new("name", Kind::String),
            ColumnSchema::new("n", Kind::Int),
        ])
        .unwrap();
        let mut f = Frame::new(schema);
        for v in values {
            f.append_row(vec![Value::from(*v), Value::Int(1)]).unwrap();
        }
        f
    }

    fn strings(f: &Frame) -> Vec<Option<String>> {
        (0..f.rows())
            .map(|r| match f.cell(r, "name").unwrap() {
                Some(Value::Str(s)) => Some(s),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn trim_then_lower() {
        let mut f = names(&[Some("  Ada "), None, Some("BOB")]);
        let ctx = RunContext::new();
        Trim::new("name").apply(&ctx, &mut f).unwrap();
        Lower::new("name").apply(&ctx, &mut f).unwrap();
        assert_eq!(strings(&f), vec![Some("ada".into()), None, Some("bob".into())]);
    }

    #[test]
    fn regex_replace_expands_groups() {
        let mut f = names(&[Some("2024-01-02"), Some("n/a")]);
        let mut t = RegexReplace::new("name", r"(\d+)-(\d+)-(\d+)", "$3/$2/$1");
        t.apply(&RunContext::new(), &mut f).unwrap();
        assert_eq!(strings(&f), vec![Some("02/01/2024".into()), Some("n/a".into())]);
    }

    #[test]
    fn regex_replace_reports_bad_pattern() {
        let mut f = names(&[Some("x")]);
        let err = RegexReplace::new("name", "(unclosed", "")
            .apply(&RunContext::new(), &mut f)
            .unwrap_err();
        assert!(matches!(err, JanitorError::InvalidPattern { .. }));
    }

    #[test]
    fn missing_or_non_string_column_is_noop() {
        let mut f = names(&[Some(" a ")]);
        let ctx = RunContext::new();
        Trim::new("absent").apply(&ctx, &mut f).unwrap();
        Lower::new("n").apply(&ctx, &mut f).unwrap();
        RegexReplace::new("absent", "(bad", "").apply(&ctx, &mut f).unwrap();
        assert_eq!(strings(&f), vec![Some(" a ".into())]);
    }

    #[test]
    fn map_values_replaces_exact_matches() {
        let mut f = names(&[Some("y"), Some("n"), Some("maybe")]);
        let map = HashMap::from([
            ("y".to_string(), "yes".to_string()),
            ("n".to_string(), "no".to_string()),
        ]);
        MapValues::new("name", map).apply(&RunContext::new(), &mut f).unwrap();
        assert_eq!(
            strings(&f),
            vec![Some("yes".into()), Some("no".into()), Some("maybe".into())]
        );
    }
}

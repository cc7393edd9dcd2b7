//! Serializable step descriptions.
//!
//! A pipeline can be described as a JSON array of single-key objects, one per step:
//!
//! ```json
//! [
//!   {"trim": {"column": "name"}},
//!   {"impute_mean": {"column": "score"}},
//!   {"validate_range": {"column": "age", "min": 0, "max": 120}}
//! ]
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{JanitorError, JanitorResult};
use crate::pipeline::{Pipeline, Transform};
use crate::types::Value;

use super::{
    CapRange, ImputeConstant, ImputeMean, ImputeMedian, ImputeMode, Lower, MapValues, RegexReplace,
    Trim, ValidateInSet, ValidateRange,
};

/// One pipeline step, keyed by step name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepSpec {
    Trim {
        column: String,
    },
    Lower {
        column: String,
    },
    RegexReplace {
        column: String,
        pattern: String,
        #[serde(default)]
        replace: String,
    },
    MapValues {
        column: String,
        map: HashMap<String, String>,
    },
    ImputeConstant {
        column: String,
        value: serde_json::Value,
    },
    ImputeMean {
        column: String,
    },
    ImputeMedian {
        column: String,
    },
    ImputeMode {
        column: String,
    },
    ValidateIn {
        column: String,
        values: Vec<String>,
    },
    ValidateRange {
        column: String,
        #[serde(default)]
        min: Option<f64>,
        #[serde(default)]
        max: Option<f64>,
    },
    CapRange {
        column: String,
        #[serde(default)]
        min: Option<f64>,
        #[serde(default)]
        max: Option<f64>,
    },
}

impl StepSpec {
    /// Build the transform described by this step.
    pub fn build(&self) -> JanitorResult<Box<dyn Transform>> {
        Ok(match self {
            StepSpec::Trim { column } => Box::new(Trim::new(column)),
            StepSpec::Lower { column } => Box::new(Lower::new(column)),
            StepSpec::RegexReplace {
                column,
                pattern,
                replace,
            } => Box::new(RegexReplace::new(column, pattern, replace)),
            StepSpec::MapValues { column, map } => Box::new(MapValues::new(column, map.clone())),
            StepSpec::ImputeConstant { column, value } => {
                Box::new(ImputeConstant::new(column, constant_value(column, value)?))
            }
            StepSpec::ImputeMean { column } => Box::new(ImputeMean::new(column)),
            StepSpec::ImputeMedian { column } => Box::new(ImputeMedian::new(column)),
            StepSpec::ImputeMode { column } => Box::new(ImputeMode::new(column)),
            StepSpec::ValidateIn { column, values } => {
                Box::new(ValidateInSet::new(column, values.iter().cloned()))
            }
            StepSpec::ValidateRange { column, min, max } => {
                Box::new(ValidateRange::new(column, *min, *max))
            }
            StepSpec::CapRange { column, min, max } => Box::new(CapRange::new(column, *min, *max)),
        })
    }
}

fn constant_value(column: &str, value: &serde_json::Value) -> JanitorResult<Value> {
    match value {
        serde_json::Value::Null => Ok(Value::Null),
        serde_json::Value::Bool(b) => Ok(Value::Bool(*b)),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Ok(Value::Int(i)),
            None => n.as_f64().map(Value::Float).ok_or_else(|| {
                JanitorError::config(format!("impute_constant for '{column}': unsupported number {n}"))
            }),
        },
        serde_json::Value::String(s) => Ok(Value::Str(s.clone())),
        other => Err(JanitorError::config(format!(
            "impute_constant for '{column}': value must be a scalar, got {other}"
        ))),
    }
}

impl Pipeline {
    /// Build a pipeline from step descriptions, in order.
    pub fn from_specs<'a>(specs: impl IntoIterator<Item = &'a StepSpec>) -> JanitorResult<Self> {
        let mut pipeline = Pipeline::new();
        for spec in specs {
            pipeline.push(spec.build()?);
        }
        Ok(pipeline)
    }

    /// Parse a JSON array of step descriptions and build the pipeline.
    pub fn from_json(json: &str) -> JanitorResult<Self> {
        let specs: Vec<StepSpec> = serde_json::from_str(json)?;
        Self::from_specs(&specs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_externally_tagged_steps() {
        let json = r#"[
            {"trim": {"column": "name"}},
            {"regex_replace": {"column": "phone", "pattern": "[^0-9]", "replace": ""}},
            {"impute_constant": {"column": "score", "value": 0}},
            {"validate_range": {"column": "age", "min": 0}},
            {"cap_range": {"column": "age", "max": 120.5}}
        ]"#;
        let specs: Vec<StepSpec> = serde_json::from_str(json).unwrap();
        assert_eq!(
            specs[3],
            StepSpec::ValidateRange {
                column: "age".into(),
                min: Some(0.0),
                max: None
            }
        );
        let pipeline = Pipeline::from_specs(&specs).unwrap();
        assert_eq!(
            pipeline.step_names(),
            vec!["trim", "regex_replace", "impute_constant", "validate_range", "cap_range"]
        );
    }

    #[test]
    fn statistic_steps_need_fit() {
        let p = Pipeline::from_json(r#"[{"lower": {"column": "a"}}, {"impute_median": {"column": "b"}}]"#)
            .unwrap();
        assert_eq!(p.needs_fit(), Some((2, "impute_median")));
    }

    #[test]
    fn rejects_unknown_step_and_non_scalar_constant() {
        assert!(Pipeline::from_json(r#"[{"explode": {"column": "a"}}]"#).is_err());
        let err = Pipeline::from_json(r#"[{"impute_constant": {"column": "a", "value": [1]}}]"#)
            .unwrap_err();
        assert!(matches!(err, JanitorError::Config { .. }));
    }
}

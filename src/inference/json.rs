//! Column kind votes for JSON objects.

use std::collections::HashMap;

use serde_json::{Map, Value as JsonValue};

use crate::error::JanitorResult;
use crate::types::{ColumnSchema, Kind, Schema};

use super::{TextClass, classify_text};

#[derive(Debug, Default, Clone, Copy)]
struct Votes {
    numeric: usize,
    integer: usize,
    boolean: usize,
    string: usize,
}

impl Votes {
    fn cast(&mut self, value: &JsonValue) {
        match value {
            JsonValue::Null => {}
            JsonValue::Bool(_) => self.boolean += 1,
            JsonValue::Number(n) => {
                self.numeric += 1;
                let integral = n.is_i64()
                    || n.is_u64()
                    || n.as_f64().is_some_and(|f| f.is_finite() && f.fract() == 0.0);
                if integral {
                    self.integer += 1;
                }
            }
            JsonValue::String(s) => match classify_text(s) {
                TextClass::Blank => {}
                TextClass::Integer => {
                    self.numeric += 1;
                    self.integer += 1;
                }
                TextClass::Decimal => self.numeric += 1,
                TextClass::BoolLiteral | TextClass::Other => self.string += 1,
            },
            JsonValue::Array(_) | JsonValue::Object(_) => self.string += 1,
        }
    }

    fn decide(&self) -> Kind {
        if self.boolean > self.numeric && self.boolean >= self.string {
            Kind::Bool
        } else if self.numeric > self.string {
            if self.integer == self.numeric {
                Kind::Int
            } else {
                Kind::Float
            }
        } else {
            Kind::String
        }
    }
}

/// Infer a schema from sampled JSON objects.
///
/// Columns are the union of keys in first-seen order. Missing keys and `null` do not vote;
/// nested arrays and objects vote string.
pub fn infer_json_schema(records: &[Map<String, JsonValue>]) -> JanitorResult<Schema> {
    let mut order: Vec<String> = Vec::new();
    let mut votes: HashMap<String, Votes> = HashMap::new();
    for record in records {
        for (key, value) in record {
            let v = votes.entry(key.clone()).or_insert_with(|| {
                order.push(key.clone());
                Votes::default()
            });
            v.cast(value);
        }
    }
    Schema::new(
        order
            .into_iter()
            .map(|name| {
                let kind = votes.get(&name).map_or(Kind::String, Votes::decide);
                ColumnSchema::new(name, kind)
            })
            .collect(),
    )
}

//! Per-job accumulation of progress details.
//!
//! Every event a job emits carries the full set of details reported so far,
//! so a subscriber that joins mid-pipeline (or misses events) still sees the
//! filename, element counts and chunk listing on the next event it receives.

use serde_json::Value;

use crate::types::Details;

/// Returns true for values that carry no information: `null`, `""`, `[]`, `{}`.
///
/// Numbers and booleans are never empty; a reported `0` is a real count.
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

/// Merged details for one job.
///
/// Keys are only ever added or replaced. An empty value never replaces a
/// non-empty one, so "no new info" from a later stage cannot erase what an
/// earlier stage reported.
#[derive(Debug, Clone, Default)]
pub struct DetailAccumulator {
    fields: Details,
}

impl DetailAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the accumulator, e.g. with intake fields like `filename`.
    pub fn with_fields(fields: Details) -> Self {
        let mut acc = Self::new();
        acc.apply(&fields);
        acc
    }

    /// Merge `new_fields` and return a copy of the full map.
    pub fn merge(&mut self, new_fields: &Details) -> Details {
        self.apply(new_fields);
        self.fields.clone()
    }

    /// Merge `new_fields`, returning only the entries that were written.
    pub fn merge_delta(&mut self, new_fields: &Details) -> Details {
        self.apply(new_fields)
    }

    fn apply(&mut self, new_fields: &Details) -> Details {
        let mut written = Details::new();
        for (key, value) in new_fields {
            let keeps_existing = is_empty_value(value)
                && self
                    .fields
                    .get(key)
                    .is_some_and(|existing| !is_empty_value(existing));
            if keeps_existing {
                continue;
            }
            self.fields.insert(key.clone(), value.clone());
            written.insert(key.clone(), value.clone());
        }
        written
    }

    pub fn snapshot(&self) -> Details {
        self.fields.clone()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

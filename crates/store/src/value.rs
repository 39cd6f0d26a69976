//! Result rows returned by the executor.

use bankcheck_core::{StoreError, StoreResult};

/// A single column value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// SQL NULL
    Null,
    /// Integer column
    Int(i64),
    /// Floating point column
    Real(f64),
    /// Text column
    Text(String),
    /// Binary column
    Bytes(Vec<u8>),
}

/// One result row.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    values: Vec<Value>,
}

impl Row {
    /// Wrap column values in select-list order.
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True if the row has no columns.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Raw column value.
    pub fn get(&self, idx: usize) -> StoreResult<&Value> {
        self.values.get(idx).ok_or_else(|| {
            StoreError::Decode(format!(
                "column {} out of range for row of {}",
                idx,
                self.values.len()
            ))
        })
    }

    /// Column as a signed integer.
    ///
    /// Text holding a decimal integer is accepted, since some drivers
    /// return `BIGINT` aggregates and session variables as strings.
    pub fn get_i64(&self, idx: usize) -> StoreResult<i64> {
        match self.get(idx)? {
            Value::Int(v) => Ok(*v),
            Value::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| StoreError::Decode(format!("column {} is not an integer: {}", idx, s))),
            Value::Null => Err(StoreError::Decode(format!("column {} is NULL", idx))),
            other => Err(StoreError::Decode(format!(
                "column {} is not an integer: {:?}",
                idx, other
            ))),
        }
    }

    /// Column as an unsigned integer.
    pub fn get_u64(&self, idx: usize) -> StoreResult<u64> {
        match self.get(idx)? {
            Value::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| StoreError::Decode(format!("column {} is not unsigned: {}", idx, s))),
            _ => {
                let v = self.get_i64(idx)?;
                u64::try_from(v)
                    .map_err(|_| StoreError::Decode(format!("column {} is negative: {}", idx, v)))
            }
        }
    }

    /// Column as text.
    pub fn get_str(&self, idx: usize) -> StoreResult<&str> {
        match self.get(idx)? {
            Value::Text(s) => Ok(s),
            other => Err(StoreError::Decode(format!(
                "column {} is not text: {:?}",
                idx, other
            ))),
        }
    }
}

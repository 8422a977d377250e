//! Sub-document operation specs.
//!
//! Specs travel on the wire, so values are carried as encoded JSON and only
//! decoded store-side into [`SubdocOp`]s.

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::subdoc::PathError;
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LookupOpcode {
    Get,
    Exists,
    Count,
}

/// One path read inside a `lookup_in`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupSpec {
    pub op: LookupOpcode,
    pub path: String,
}

impl LookupSpec {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            op: LookupOpcode::Get,
            path: path.into(),
        }
    }

    pub fn exists(path: impl Into<String>) -> Self {
        Self {
            op: LookupOpcode::Exists,
            path: path.into(),
        }
    }

    pub fn count(path: impl Into<String>) -> Self {
        Self {
            op: LookupOpcode::Count,
            path: path.into(),
        }
    }

    pub fn to_op(&self) -> SubdocOp {
        match self.op {
            LookupOpcode::Get => SubdocOp::Get,
            LookupOpcode::Exists => SubdocOp::Exists,
            LookupOpcode::Count => SubdocOp::Count,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MutateOpcode {
    Insert,
    Upsert,
    Replace,
    Remove,
    ArrayAppend,
    ArrayPrepend,
    ArrayInsert,
    ArrayAddUnique,
    Counter,
}

/// One path write inside a `mutate_in`.
///
/// `value` holds encoded JSON: a single value for object ops, a JSON array
/// of values for the multi-value array ops, the delta for counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutateSpec {
    pub op: MutateOpcode,
    pub path: String,
    pub value: Vec<u8>,
    pub create_path: bool,
}

impl MutateSpec {
    fn new(
        op: MutateOpcode,
        path: impl Into<String>,
        value: Vec<u8>,
    ) -> Self {
        Self {
            op,
            path: path.into(),
            value,
            create_path: false,
        }
    }

    pub fn insert<T: Serialize + ?Sized>(
        path: impl Into<String>,
        value: &T,
    ) -> Result<Self> {
        Ok(Self::new(MutateOpcode::Insert, path, serde_json::to_vec(value)?))
    }

    pub fn upsert<T: Serialize + ?Sized>(
        path: impl Into<String>,
        value: &T,
    ) -> Result<Self> {
        Ok(Self::new(MutateOpcode::Upsert, path, serde_json::to_vec(value)?))
    }

    pub fn replace<T: Serialize + ?Sized>(
        path: impl Into<String>,
        value: &T,
    ) -> Result<Self> {
        Ok(Self::new(MutateOpcode::Replace, path, serde_json::to_vec(value)?))
    }

    pub fn remove(path: impl Into<String>) -> Self {
        Self::new(MutateOpcode::Remove, path, Vec::new())
    }

    pub fn array_append<T: Serialize>(
        path: impl Into<String>,
        values: &[T],
    ) -> Result<Self> {
        Ok(Self::new(MutateOpcode::ArrayAppend, path, serde_json::to_vec(values)?))
    }

    pub fn array_prepend<T: Serialize>(
        path: impl Into<String>,
        values: &[T],
    ) -> Result<Self> {
        Ok(Self::new(MutateOpcode::ArrayPrepend, path, serde_json::to_vec(values)?))
    }

    pub fn array_insert<T: Serialize>(
        path: impl Into<String>,
        values: &[T],
    ) -> Result<Self> {
        Ok(Self::new(MutateOpcode::ArrayInsert, path, serde_json::to_vec(values)?))
    }

    pub fn array_add_unique<T: Serialize + ?Sized>(
        path: impl Into<String>,
        value: &T,
    ) -> Result<Self> {
        Ok(Self::new(MutateOpcode::ArrayAddUnique, path, serde_json::to_vec(value)?))
    }

    /// Adds `delta` to an integer; a negative delta decrements.
    pub fn counter(
        path: impl Into<String>,
        delta: i64,
    ) -> Self {
        Self::new(MutateOpcode::Counter, path, delta.to_string().into_bytes())
    }

    /// Synthesise missing intermediate containers instead of failing.
    pub fn create_path(mut self) -> Self {
        self.create_path = true;
        self
    }

    /// Decodes the spec into an engine operation.
    pub fn to_op(&self) -> std::result::Result<SubdocOp, PathError> {
        let create_path = self.create_path;
        let op = match self.op {
            MutateOpcode::Insert => SubdocOp::Insert {
                value: decode_value(&self.value)?,
                create_path,
            },
            MutateOpcode::Upsert => SubdocOp::Upsert {
                value: decode_value(&self.value)?,
                create_path,
            },
            MutateOpcode::Replace => SubdocOp::Replace {
                value: decode_value(&self.value)?,
            },
            MutateOpcode::Remove => SubdocOp::Remove,
            MutateOpcode::ArrayAppend => SubdocOp::ArrayAppend {
                values: decode_values(&self.value)?,
                create_path,
            },
            MutateOpcode::ArrayPrepend => SubdocOp::ArrayPrepend {
                values: decode_values(&self.value)?,
                create_path,
            },
            MutateOpcode::ArrayInsert => SubdocOp::ArrayInsert {
                values: decode_values(&self.value)?,
            },
            MutateOpcode::ArrayAddUnique => SubdocOp::ArrayAddUnique {
                value: decode_value(&self.value)?,
                create_path,
            },
            MutateOpcode::Counter => {
                let delta = decode_value(&self.value)?
                    .as_i64()
                    .ok_or_else(|| PathError::ValueInvalid("counter delta must be an integer".into()))?;
                SubdocOp::Counter { delta, create_path }
            }
        };
        Ok(op)
    }
}

fn decode_value(raw: &[u8]) -> std::result::Result<Value, PathError> {
    serde_json::from_slice(raw).map_err(|e| PathError::ValueInvalid(e.to_string()))
}

fn decode_values(raw: &[u8]) -> std::result::Result<Vec<Value>, PathError> {
    match decode_value(raw)? {
        Value::Array(values) if !values.is_empty() => Ok(values),
        Value::Array(_) => Err(PathError::ValueInvalid("at least one value required".into())),
        _ => Err(PathError::ValueInvalid("expected a list of values".into())),
    }
}

/// Operation the path engine applies at a single path.
#[derive(Debug, Clone, PartialEq)]
pub enum SubdocOp {
    Get,
    Exists,
    Count,
    Insert { value: Value, create_path: bool },
    Upsert { value: Value, create_path: bool },
    Replace { value: Value },
    Remove,
    ArrayAppend { values: Vec<Value>, create_path: bool },
    ArrayPrepend { values: Vec<Value>, create_path: bool },
    ArrayInsert { values: Vec<Value> },
    ArrayAddUnique { value: Value, create_path: bool },
    Counter { delta: i64, create_path: bool },
}

impl SubdocOp {
    pub fn is_lookup(&self) -> bool {
        matches!(self, SubdocOp::Get | SubdocOp::Exists | SubdocOp::Count)
    }

    pub fn create_path(&self) -> bool {
        match self {
            SubdocOp::Insert { create_path, .. }
            | SubdocOp::Upsert { create_path, .. }
            | SubdocOp::ArrayAppend { create_path, .. }
            | SubdocOp::ArrayPrepend { create_path, .. }
            | SubdocOp::ArrayAddUnique { create_path, .. }
            | SubdocOp::Counter { create_path, .. } => *create_path,
            _ => false,
        }
    }
}

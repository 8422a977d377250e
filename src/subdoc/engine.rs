use serde_json::Map;
use serde_json::Value;

use super::LookupSpec;
use super::MutateSpec;
use super::PathError;
use super::PathSegment;
use super::SubdocOp;
use super::SubdocPath;

/// What a path operation produced.
#[derive(Debug, Clone, PartialEq)]
pub enum PathResult {
    /// Lookups and counters yield a value
    Value(Value),
    /// Plain mutations only report that they were applied
    Applied,
}

impl PathResult {
    pub fn into_value(self) -> Option<Value> {
        match self {
            PathResult::Value(v) => Some(v),
            PathResult::Applied => None,
        }
    }
}

/// Applies `op` at `path` inside `document`.
///
/// On error the document is left exactly as it was, including any
/// containers `create_path` would have synthesised.
pub fn apply(
    document: &mut Value,
    path: &SubdocPath,
    op: &SubdocOp,
) -> Result<PathResult, PathError> {
    if op.is_lookup() {
        return lookup(document, path, op);
    }
    if op.create_path() {
        let mut scratch = document.clone();
        let result = apply_in_place(&mut scratch, path, op)?;
        *document = scratch;
        return Ok(result);
    }
    apply_in_place(document, path, op)
}

/// Evaluates a read-only operation.
pub fn lookup(
    document: &Value,
    path: &SubdocPath,
    op: &SubdocOp,
) -> Result<PathResult, PathError> {
    match op {
        SubdocOp::Get => resolve(document, path.segments()).map(|v| PathResult::Value(v.clone())),
        SubdocOp::Exists => match resolve(document, path.segments()) {
            Ok(_) => Ok(PathResult::Value(Value::Bool(true))),
            Err(PathError::NotFound) => Ok(PathResult::Value(Value::Bool(false))),
            Err(e) => Err(e),
        },
        SubdocOp::Count => match resolve(document, path.segments())? {
            Value::Array(arr) => Ok(PathResult::Value(Value::from(arr.len()))),
            Value::Object(map) => Ok(PathResult::Value(Value::from(map.len()))),
            other => Err(mismatch("array or object", other)),
        },
        _ => Err(PathError::Invalid("mutation passed to lookup".into())),
    }
}

/// Runs every lookup spec independently; one failing path does not fail
/// the others.
pub fn lookup_all(
    document: &Value,
    specs: &[LookupSpec],
) -> Vec<Result<Value, PathError>> {
    specs
        .iter()
        .map(|spec| -> Result<Value, PathError> {
            let path = SubdocPath::parse(&spec.path)?;
            let result = lookup(document, &path, &spec.to_op())?;
            Ok(result.into_value().unwrap_or(Value::Null))
        })
        .collect()
}

/// Applies all mutation specs or none of them.
///
/// On failure returns the index of the offending spec; `document` is
/// untouched in that case.
pub fn mutate_all(
    document: &mut Value,
    specs: &[MutateSpec],
) -> Result<Vec<Option<Value>>, (usize, PathError)> {
    let mut scratch = document.clone();
    let mut results = Vec::with_capacity(specs.len());
    for (index, spec) in specs.iter().enumerate() {
        let path = SubdocPath::parse(&spec.path).map_err(|e| (index, e))?;
        let op = spec.to_op().map_err(|e| (index, e))?;
        let result = apply_in_place(&mut scratch, &path, &op).map_err(|e| (index, e))?;
        results.push(result.into_value());
    }
    *document = scratch;
    Ok(results)
}

fn apply_in_place(
    document: &mut Value,
    path: &SubdocPath,
    op: &SubdocOp,
) -> Result<PathResult, PathError> {
    match op {
        SubdocOp::Get | SubdocOp::Exists | SubdocOp::Count => lookup(document, path, op),

        SubdocOp::Insert { value, create_path } => {
            if path.is_root() {
                return Err(PathError::Exists);
            }
            let (parent, last) = parent_mut(document, path, *create_path)?;
            match last {
                PathSegment::Key(key) => {
                    let found = type_name(parent);
                    let map = parent
                        .as_object_mut()
                        .ok_or_else(|| PathError::Mismatch(format!("expected object, found {found}")))?;
                    if map.contains_key(key) {
                        return Err(PathError::Exists);
                    }
                    map.insert(key.clone(), value.clone());
                    Ok(PathResult::Applied)
                }
                _ => Err(PathError::Invalid(
                    "insert cannot address an array element, use array_insert".into(),
                )),
            }
        }

        SubdocOp::Upsert { value, create_path } => {
            if path.is_root() {
                *document = value.clone();
                return Ok(PathResult::Applied);
            }
            let (parent, last) = parent_mut(document, path, *create_path)?;
            match last {
                PathSegment::Key(key) => {
                    let found = type_name(parent);
                    let map = parent
                        .as_object_mut()
                        .ok_or_else(|| PathError::Mismatch(format!("expected object, found {found}")))?;
                    map.insert(key.clone(), value.clone());
                }
                segment => *step_mut(parent, segment, None)? = value.clone(),
            }
            Ok(PathResult::Applied)
        }

        SubdocOp::Replace { value } => {
            let target = target_mut(document, path, false, None)?;
            *target = value.clone();
            Ok(PathResult::Applied)
        }

        SubdocOp::Remove => {
            let (parent, last) = parent_mut(document, path, false)?;
            let found = type_name(parent);
            match (last, parent) {
                (PathSegment::Key(key), Value::Object(map)) => {
                    map.remove(key).ok_or(PathError::NotFound)?;
                }
                (PathSegment::Index(idx), Value::Array(arr)) => {
                    if *idx >= arr.len() {
                        return Err(PathError::NotFound);
                    }
                    arr.remove(*idx);
                }
                (PathSegment::Last, Value::Array(arr)) => {
                    arr.pop().ok_or(PathError::NotFound)?;
                }
                (PathSegment::Key(_), _) => {
                    return Err(PathError::Mismatch(format!("expected object, found {found}")))
                }
                _ => return Err(PathError::Mismatch(format!("expected array, found {found}"))),
            }
            Ok(PathResult::Applied)
        }

        SubdocOp::ArrayAppend { values, create_path } => {
            let arr = target_array(document, path, *create_path)?;
            arr.extend(values.iter().cloned());
            Ok(PathResult::Applied)
        }

        SubdocOp::ArrayPrepend { values, create_path } => {
            let arr = target_array(document, path, *create_path)?;
            arr.splice(0..0, values.iter().cloned());
            Ok(PathResult::Applied)
        }

        SubdocOp::ArrayInsert { values } => {
            let idx = match path.last_segment() {
                Some(PathSegment::Index(idx)) => *idx,
                _ => {
                    return Err(PathError::Invalid(
                        "array_insert path must end with a positive index".into(),
                    ))
                }
            };
            let (parent, _) = parent_mut(document, path, false)?;
            let found = type_name(parent);
            let arr = parent
                .as_array_mut()
                .ok_or_else(|| PathError::Mismatch(format!("expected array, found {found}")))?;
            if idx > arr.len() {
                return Err(PathError::NotFound);
            }
            arr.splice(idx..idx, values.iter().cloned());
            Ok(PathResult::Applied)
        }

        SubdocOp::ArrayAddUnique { value, create_path } => {
            if !is_primitive(value) {
                return Err(PathError::ValueInvalid(
                    "array_add_unique only accepts primitive values".into(),
                ));
            }
            let arr = target_array(document, path, *create_path)?;
            if arr.iter().any(|v| !is_primitive(v)) {
                return Err(PathError::Mismatch("array contains non-primitive values".into()));
            }
            if arr.contains(value) {
                return Err(PathError::Exists);
            }
            arr.push(value.clone());
            Ok(PathResult::Applied)
        }

        SubdocOp::Counter { delta, create_path } => {
            if *delta == 0 {
                return Err(PathError::ValueInvalid("counter delta must be non-zero".into()));
            }
            // a missing leaf starts from zero
            let target = target_mut(document, path, *create_path, Some(zero))?;
            let current = match &*target {
                Value::Number(n) => n
                    .as_i64()
                    .ok_or_else(|| PathError::Mismatch("counter target is not a 64-bit integer".into()))?,
                other => return Err(mismatch("integer", other)),
            };
            let next = current.checked_add(*delta).ok_or(PathError::DeltaRange)?;
            *target = Value::from(next);
            Ok(PathResult::Value(Value::from(next)))
        }
    }
}

fn resolve<'a>(
    document: &'a Value,
    segments: &[PathSegment],
) -> Result<&'a Value, PathError> {
    let mut current = document;
    for segment in segments {
        current = match (segment, current) {
            (PathSegment::Key(key), Value::Object(map)) => map.get(key).ok_or(PathError::NotFound)?,
            (PathSegment::Index(idx), Value::Array(arr)) => arr.get(*idx).ok_or(PathError::NotFound)?,
            (PathSegment::Last, Value::Array(arr)) => arr.last().ok_or(PathError::NotFound)?,
            (PathSegment::Key(_), other) => return Err(mismatch("object", other)),
            (_, other) => return Err(mismatch("array", other)),
        };
    }
    Ok(current)
}

/// Steps one segment down. With `fill`, a missing object key is created
/// holding `fill()`; array indices are never created.
fn step_mut<'a>(
    value: &'a mut Value,
    segment: &PathSegment,
    fill: Option<fn() -> Value>,
) -> Result<&'a mut Value, PathError> {
    let found = type_name(value);
    match (segment, value) {
        (PathSegment::Key(key), Value::Object(map)) => match fill {
            Some(make) => Ok(map.entry(key.clone()).or_insert_with(make)),
            None => map.get_mut(key).ok_or(PathError::NotFound),
        },
        (PathSegment::Index(idx), Value::Array(arr)) => arr.get_mut(*idx).ok_or(PathError::NotFound),
        (PathSegment::Last, Value::Array(arr)) => arr.last_mut().ok_or(PathError::NotFound),
        (PathSegment::Key(_), _) => Err(PathError::Mismatch(format!("expected object, found {found}"))),
        _ => Err(PathError::Mismatch(format!("expected array, found {found}"))),
    }
}

/// Walks to the container holding the last segment.
fn parent_mut<'a, 'p>(
    document: &'a mut Value,
    path: &'p SubdocPath,
    create_path: bool,
) -> Result<(&'a mut Value, &'p PathSegment), PathError> {
    let segments = path.segments();
    let (last, parents) = segments
        .split_last()
        .ok_or_else(|| PathError::Invalid("operation cannot target the document root".into()))?;

    let mut current = document;
    for (i, segment) in parents.iter().enumerate() {
        let fill = create_path.then(|| container_for(&segments[i + 1]));
        current = step_mut(current, segment, fill)?;
    }
    Ok((current, last))
}

/// Resolves the value the path addresses; the root path addresses the
/// whole document. `leaf` fills a missing final object key.
fn target_mut<'a>(
    document: &'a mut Value,
    path: &SubdocPath,
    create_path: bool,
    leaf: Option<fn() -> Value>,
) -> Result<&'a mut Value, PathError> {
    if path.is_root() {
        return Ok(document);
    }
    let (parent, last) = parent_mut(document, path, create_path)?;
    step_mut(parent, last, leaf)
}

fn target_array<'a>(
    document: &'a mut Value,
    path: &SubdocPath,
    create_path: bool,
) -> Result<&'a mut Vec<Value>, PathError> {
    let leaf = create_path.then_some(empty_array as fn() -> Value);
    let target = target_mut(document, path, create_path, leaf)?;
    let found = type_name(target);
    target
        .as_array_mut()
        .ok_or_else(|| PathError::Mismatch(format!("expected array, found {found}")))
}

fn container_for(next: &PathSegment) -> fn() -> Value {
    if next.is_index() {
        empty_array
    } else {
        empty_object
    }
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

fn empty_array() -> Value {
    Value::Array(Vec::new())
}

fn zero() -> Value {
    Value::from(0)
}

fn is_primitive(value: &Value) -> bool {
    !matches!(value, Value::Array(_) | Value::Object(_))
}

fn mismatch(
    expected: &str,
    found: &Value,
) -> PathError {
    PathError::Mismatch(format!("expected {expected}, found {}", type_name(found)))
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

//! Key Derivation Module
//!
//! Turns a callable's qualified identity plus its call arguments into a
//! fixed-size hex key.
//!
//! Arguments are first lowered to a canonical `serde_json::Value` (object keys
//! sorted at every depth), so keyword order never changes the key and the
//! representation is identical across process runs. The canonical bytes are
//! then hashed with BLAKE2b, prefixed by the callable's namespace digest.
//! NaN and the infinities have no JSON form and are rejected up front.

use std::any::type_name;
use std::collections::BTreeMap;
use std::fmt;

use blake2::digest::consts::{U16, U8};
use blake2::{Blake2b, Digest};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::cache::finite::ensure_finite;
use crate::error::{CacheError, Result};

type Blake2b64 = Blake2b<U8>;
type Blake2b128 = Blake2b<U16>;

// == Callable Identity ==
/// The (module, qualified name) pair naming a memoized callable.
///
/// Free functions, methods, associated functions and closures all collapse
/// into this one shape. The namespace digest is computed once here and reused
/// for every key the callable produces.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallableId {
    module: String,
    qualname: String,
    namespace: String,
}

impl CallableId {
    /// Creates an identity from an explicit module path and qualified name.
    pub fn new(module: impl Into<String>, qualname: impl Into<String>) -> Self {
        let module = module.into();
        let qualname = qualname.into();

        let mut hasher = Blake2b64::new();
        update_prefixed(&mut hasher, module.as_bytes());
        update_prefixed(&mut hasher, qualname.as_bytes());
        let namespace = hex::encode(hasher.finalize());

        Self {
            module,
            qualname,
            namespace,
        }
    }

    /// Splits a `a::b::name` path at its last segment.
    pub fn from_path(path: &str) -> Self {
        let (module, name) = split_path(path);
        Self::new(module, name)
    }

    /// Identity of a function item, taken from its type name.
    ///
    /// Closures defined in the same function share one type-name prefix
    /// (`...::{{closure}}`), so give closures an explicit [`CallableId::new`].
    pub fn of_fn<F>(_f: &F) -> Self {
        Self::from_path(type_name::<F>())
    }

    /// Identity of method `name` on type `T`, e.g. `shapes::Circle::area`.
    ///
    /// The receiver itself is not part of the identity; pass it as the first
    /// positional argument so distinct instances get distinct keys.
    pub fn method<T: ?Sized>(name: &str) -> Self {
        let (module, ty) = split_path(type_name::<T>());
        Self::new(module, format!("{}::{}", ty, name))
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn qualname(&self) -> &str {
        &self.qualname
    }

    /// Hex digest scoping every key (and on-disk artifact) of this callable.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }
}

impl fmt::Display for CallableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.module.is_empty() {
            write!(f, "{}", self.qualname)
        } else {
            write!(f, "{}::{}", self.module, self.qualname)
        }
    }
}

// == Cache Key ==
/// Opaque 128-bit key rendered as 32 lowercase hex characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Wraps an already derived hex key, rejecting anything malformed.
    pub fn from_hex(hex_key: &str) -> Option<Self> {
        let valid = hex_key.len() == 32
            && hex_key
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        valid.then(|| CacheKey(hex_key.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// == Keyword Arguments ==
/// Named arguments with heterogeneous values.
///
/// Any `Serialize` type that lowers to a map works as keyword arguments
/// (structs, `HashMap`, `BTreeMap`); this is a convenience for ad hoc calls.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Kwargs(BTreeMap<String, Value>);

impl Kwargs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a named argument, failing if it has no JSON representation.
    pub fn arg<T: Serialize + ?Sized>(mut self, name: &str, value: &T) -> Result<Self> {
        ensure_finite(value)?;
        self.0.insert(name.to_string(), serde_json::to_value(value)?);
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// == Derive ==
/// Derives the key for one call.
///
/// `positional` is hashed in order (tuples lower to arrays). `keyword` must
/// lower to a map or to unit/`None`; its entries are sorted by name first.
///
/// # Errors
/// [`CacheError::KeyDerivation`] when an argument cannot be represented,
/// e.g. a map keyed by tuples or a NaN float.
pub fn derive<P, K>(id: &CallableId, positional: &P, keyword: &K) -> Result<CacheKey>
where
    P: Serialize + ?Sized,
    K: Serialize + ?Sized,
{
    let canonical = canonical_bytes(positional, keyword)?;

    let mut hasher = Blake2b128::new();
    hasher.update(id.namespace().as_bytes());
    hasher.update(&canonical);

    Ok(CacheKey(hex::encode(hasher.finalize())))
}

/// Canonical byte form of a call's arguments.
pub fn canonical_bytes<P, K>(positional: &P, keyword: &K) -> Result<Vec<u8>>
where
    P: Serialize + ?Sized,
    K: Serialize + ?Sized,
{
    ensure_finite(positional)?;
    ensure_finite(keyword)?;

    let positional = sorted(serde_json::to_value(positional)?);
    let keyword = match sorted(serde_json::to_value(keyword)?) {
        Value::Null => Value::Object(Map::new()),
        map @ Value::Object(_) => map,
        other => {
            return Err(CacheError::KeyDerivation(format!(
                "keyword arguments must serialize to a map, got {}",
                kind_of(&other)
            )))
        }
    };

    Ok(serde_json::to_vec(&Value::Array(vec![positional, keyword]))?)
}

// == Helpers ==
/// Rebuilds objects with keys inserted in sorted order, at every depth.
fn sorted(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(entries.into_iter().map(|(k, v)| (k, sorted(v))).collect())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sorted).collect()),
        other => other,
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn update_prefixed(hasher: &mut Blake2b64, bytes: &[u8]) {
    hasher.update((bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
}

/// Splits at the last `::` outside generic brackets.
fn split_path(path: &str) -> (&str, &str) {
    let head_end = path.find('<').unwrap_or(path.len());
    match path[..head_end].rfind("::") {
        Some(idx) => (&path[..idx], &path[idx + 2..]),
        None => ("", path),
    }
}

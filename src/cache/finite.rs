//! Finite Float Guard
//!
//! JSON has no encoding for NaN or the infinities: `serde_json` quietly turns
//! all three into `null`, which would let different arguments share one key.
//! This module walks a value through serde's data model before it is lowered
//! and rejects any non-finite `f32`/`f64`, at any depth, including map keys.

use std::fmt::Display;

use serde::ser::{self, Serialize};
use thiserror::Error;

use crate::error::{CacheError, Result};

/// Fails with [`CacheError::KeyDerivation`] if `value` contains a NaN or an
/// infinity anywhere inside it.
pub(crate) fn ensure_finite<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    value
        .serialize(FiniteGuard)
        .map_err(|e| CacheError::KeyDerivation(e.to_string()))
}

#[derive(Debug, Error)]
#[error("{0}")]
struct GuardError(String);

impl ser::Error for GuardError {
    fn custom<T: Display>(msg: T) -> Self {
        GuardError(msg.to_string())
    }
}

type GuardResult = std::result::Result<(), GuardError>;

fn check(value: f64) -> GuardResult {
    if value.is_finite() {
        Ok(())
    } else {
        Err(GuardError(format!(
            "non-finite float {} has no canonical form",
            value
        )))
    }
}

// == Serializer ==
/// Serializer that produces nothing and only inspects floats.
struct FiniteGuard;

impl ser::Serializer for FiniteGuard {
    type Ok = ();
    type Error = GuardError;
    type SerializeSeq = Self;
    type SerializeTuple = Self;
    type SerializeTupleStruct = Self;
    type SerializeTupleVariant = Self;
    type SerializeMap = Self;
    type SerializeStruct = Self;
    type SerializeStructVariant = Self;

    fn serialize_f32(self, v: f32) -> GuardResult {
        check(f64::from(v))
    }

    fn serialize_f64(self, v: f64) -> GuardResult {
        check(v)
    }

    fn serialize_bool(self, _v: bool) -> GuardResult {
        Ok(())
    }

    fn serialize_i8(self, _v: i8) -> GuardResult {
        Ok(())
    }

    fn serialize_i16(self, _v: i16) -> GuardResult {
        Ok(())
    }

    fn serialize_i32(self, _v: i32) -> GuardResult {
        Ok(())
    }

    fn serialize_i64(self, _v: i64) -> GuardResult {
        Ok(())
    }

    fn serialize_i128(self, _v: i128) -> GuardResult {
        Ok(())
    }

    fn serialize_u8(self, _v: u8) -> GuardResult {
        Ok(())
    }

    fn serialize_u16(self, _v: u16) -> GuardResult {
        Ok(())
    }

    fn serialize_u32(self, _v: u32) -> GuardResult {
        Ok(())
    }

    fn serialize_u64(self, _v: u64) -> GuardResult {
        Ok(())
    }

    fn serialize_u128(self, _v: u128) -> GuardResult {
        Ok(())
    }

    fn serialize_char(self, _v: char) -> GuardResult {
        Ok(())
    }

    fn serialize_str(self, _v: &str) -> GuardResult {
        Ok(())
    }

    fn serialize_bytes(self, _v: &[u8]) -> GuardResult {
        Ok(())
    }

    fn serialize_none(self) -> GuardResult {
        Ok(())
    }

    fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> GuardResult {
        value.serialize(self)
    }

    fn serialize_unit(self) -> GuardResult {
        Ok(())
    }

    fn serialize_unit_struct(self, _name: &'static str) -> GuardResult {
        Ok(())
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
    ) -> GuardResult {
        Ok(())
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        value: &T,
    ) -> GuardResult {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        value: &T,
    ) -> GuardResult {
        value.serialize(self)
    }

    fn serialize_seq(self, _len: Option<usize>) -> std::result::Result<Self, GuardError> {
        Ok(self)
    }

    fn serialize_tuple(self, _len: usize) -> std::result::Result<Self, GuardError> {
        Ok(self)
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> std::result::Result<Self, GuardError> {
        Ok(self)
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> std::result::Result<Self, GuardError> {
        Ok(self)
    }

    fn serialize_map(self, _len: Option<usize>) -> std::result::Result<Self, GuardError> {
        Ok(self)
    }

    fn serialize_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> std::result::Result<Self, GuardError> {
        Ok(self)
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> std::result::Result<Self, GuardError> {
        Ok(self)
    }
}

// == Compound Types ==
impl ser::SerializeSeq for FiniteGuard {
    type Ok = ();
    type Error = GuardError;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> GuardResult {
        value.serialize(FiniteGuard)
    }

    fn end(self) -> GuardResult {
        Ok(())
    }
}

impl ser::SerializeTuple for FiniteGuard {
    type Ok = ();
    type Error = GuardError;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> GuardResult {
        value.serialize(FiniteGuard)
    }

    fn end(self) -> GuardResult {
        Ok(())
    }
}

impl ser::SerializeTupleStruct for FiniteGuard {
    type Ok = ();
    type Error = GuardError;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> GuardResult {
        value.serialize(FiniteGuard)
    }

    fn end(self) -> GuardResult {
        Ok(())
    }
}

impl ser::SerializeTupleVariant for FiniteGuard {
    type Ok = ();
    type Error = GuardError;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> GuardResult {
        value.serialize(FiniteGuard)
    }

    fn end(self) -> GuardResult {
        Ok(())
    }
}

impl ser::SerializeMap for FiniteGuard {
    type Ok = ();
    type Error = GuardError;

    fn serialize_key<T: ?Sized + Serialize>(&mut self, key: &T) -> GuardResult {
        key.serialize(FiniteGuard)
    }

    fn serialize_value<T: ?Sized + Serialize>(&mut self, value: &T) -> GuardResult {
        value.serialize(FiniteGuard)
    }

    fn end(self) -> GuardResult {
        Ok(())
    }
}

impl ser::SerializeStruct for FiniteGuard {
    type Ok = ();
    type Error = GuardError;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        _key: &'static str,
        value: &T,
    ) -> GuardResult {
        value.serialize(FiniteGuard)
    }

    fn end(self) -> GuardResult {
        Ok(())
    }
}

impl ser::SerializeStructVariant for FiniteGuard {
    type Ok = ();
    type Error = GuardError;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        _key: &'static str,
        value: &T,
    ) -> GuardResult {
        value.serialize(FiniteGuard)
    }

    fn end(self) -> GuardResult {
        Ok(())
    }
}

//! Serde serializer that builds a [`StateValue`] tree directly.
//!
//! Going through `serde_json::Value` would turn NaN and infinities into
//! null, which the wire encoder then drops. Floats stay floats here.

use std::collections::BTreeMap;
use std::fmt;

use serde::ser::{self, Serialize, Serializer};

use crate::state::{ReflectError, StateValue};

impl ser::Error for ReflectError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        ReflectError(msg.to_string())
    }
}

pub(crate) fn to_state_value<T>(value: &T) -> Result<StateValue, ReflectError>
where
    T: ?Sized + Serialize,
{
    value.serialize(ValueSerializer)
}

fn tagged(variant: &'static str, value: StateValue) -> StateValue {
    StateValue::Mapping(BTreeMap::from([(variant.to_string(), value)]))
}

fn map_key(key: StateValue) -> Result<String, ReflectError> {
    match key {
        StateValue::Text(s) => Ok(s),
        StateValue::Int(i) => Ok(i.to_string()),
        StateValue::Bool(b) => Ok(b.to_string()),
        StateValue::Float(f) => Ok(f.to_string()),
        other => Err(ReflectError(format!("unsupported map key: {other:?}"))),
    }
}

struct ValueSerializer;

impl ser::Serializer for ValueSerializer {
    type Ok = StateValue;
    type Error = ReflectError;
    type SerializeSeq = SeqBuilder;
    type SerializeTuple = SeqBuilder;
    type SerializeTupleStruct = SeqBuilder;
    type SerializeTupleVariant = SeqBuilder;
    type SerializeMap = MapBuilder;
    type SerializeStruct = MapBuilder;
    type SerializeStructVariant = MapBuilder;

    fn serialize_bool(self, v: bool) -> Result<StateValue, ReflectError> {
        Ok(StateValue::Bool(v))
    }

    fn serialize_i8(self, v: i8) -> Result<StateValue, ReflectError> {
        Ok(StateValue::Int(v.into()))
    }

    fn serialize_i16(self, v: i16) -> Result<StateValue, ReflectError> {
        Ok(StateValue::Int(v.into()))
    }

    fn serialize_i32(self, v: i32) -> Result<StateValue, ReflectError> {
        Ok(StateValue::Int(v.into()))
    }

    fn serialize_i64(self, v: i64) -> Result<StateValue, ReflectError> {
        Ok(StateValue::Int(v))
    }

    fn serialize_u8(self, v: u8) -> Result<StateValue, ReflectError> {
        Ok(StateValue::Int(v.into()))
    }

    fn serialize_u16(self, v: u16) -> Result<StateValue, ReflectError> {
        Ok(StateValue::Int(v.into()))
    }

    fn serialize_u32(self, v: u32) -> Result<StateValue, ReflectError> {
        Ok(StateValue::Int(v.into()))
    }

    fn serialize_u64(self, v: u64) -> Result<StateValue, ReflectError> {
        Ok(i64::try_from(v)
            .map(StateValue::Int)
            .unwrap_or(StateValue::Float(v as f64)))
    }

    fn serialize_f32(self, v: f32) -> Result<StateValue, ReflectError> {
        Ok(StateValue::Float(v.into()))
    }

    fn serialize_f64(self, v: f64) -> Result<StateValue, ReflectError> {
        Ok(StateValue::Float(v))
    }

    fn serialize_char(self, v: char) -> Result<StateValue, ReflectError> {
        Ok(StateValue::Text(v.to_string()))
    }

    fn serialize_str(self, v: &str) -> Result<StateValue, ReflectError> {
        Ok(StateValue::Text(v.to_string()))
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<StateValue, ReflectError> {
        Ok(StateValue::Sequence(
            v.iter().map(|b| StateValue::Int((*b).into())).collect(),
        ))
    }

    fn serialize_none(self) -> Result<StateValue, ReflectError> {
        Ok(StateValue::Null)
    }

    fn serialize_some<T>(self, value: &T) -> Result<StateValue, ReflectError>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<StateValue, ReflectError> {
        Ok(StateValue::Null)
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<StateValue, ReflectError> {
        Ok(StateValue::Null)
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
    ) -> Result<StateValue, ReflectError> {
        Ok(StateValue::Text(variant.to_string()))
    }

    fn serialize_newtype_struct<T>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<StateValue, ReflectError>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T>(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<StateValue, ReflectError>
    where
        T: ?Sized + Serialize,
    {
        Ok(tagged(variant, to_state_value(value)?))
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<SeqBuilder, ReflectError> {
        Ok(SeqBuilder {
            items: Vec::with_capacity(len.unwrap_or(0)),
            variant: None,
        })
    }

    fn serialize_tuple(self, len: usize) -> Result<SeqBuilder, ReflectError> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        len: usize,
    ) -> Result<SeqBuilder, ReflectError> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<SeqBuilder, ReflectError> {
        Ok(SeqBuilder {
            items: Vec::with_capacity(len),
            variant: Some(variant),
        })
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<MapBuilder, ReflectError> {
        Ok(MapBuilder::default())
    }

    fn serialize_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<MapBuilder, ReflectError> {
        Ok(MapBuilder::default())
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<MapBuilder, ReflectError> {
        Ok(MapBuilder {
            variant: Some(variant),
            ..MapBuilder::default()
        })
    }
}

struct SeqBuilder {
    items: Vec<StateValue>,
    variant: Option<&'static str>,
}

impl SeqBuilder {
    fn push<T>(&mut self, value: &T) -> Result<(), ReflectError>
    where
        T: ?Sized + Serialize,
    {
        self.items.push(to_state_value(value)?);
        Ok(())
    }

    fn finish(self) -> StateValue {
        let sequence = StateValue::Sequence(self.items);
        match self.variant {
            Some(variant) => tagged(variant, sequence),
            None => sequence,
        }
    }
}

impl ser::SerializeSeq for SeqBuilder {
    type Ok = StateValue;
    type Error = ReflectError;

    fn serialize_element<T>(&mut self, value: &T) -> Result<(), ReflectError>
    where
        T: ?Sized + Serialize,
    {
        self.push(value)
    }

    fn end(self) -> Result<StateValue, ReflectError> {
        Ok(self.finish())
    }
}

impl ser::SerializeTuple for SeqBuilder {
    type Ok = StateValue;
    type Error = ReflectError;

    fn serialize_element<T>(&mut self, value: &T) -> Result<(), ReflectError>
    where
        T: ?Sized + Serialize,
    {
        self.push(value)
    }

    fn end(self) -> Result<StateValue, ReflectError> {
        Ok(self.finish())
    }
}

impl ser::SerializeTupleStruct for SeqBuilder {
    type Ok = StateValue;
    type Error = ReflectError;

    fn serialize_field<T>(&mut self, value: &T) -> Result<(), ReflectError>
    where
        T: ?Sized + Serialize,
    {
        self.push(value)
    }

    fn end(self) -> Result<StateValue, ReflectError> {
        Ok(self.finish())
    }
}

impl ser::SerializeTupleVariant for SeqBuilder {
    type Ok = StateValue;
    type Error = ReflectError;

    fn serialize_field<T>(&mut self, value: &T) -> Result<(), ReflectError>
    where
        T: ?Sized + Serialize,
    {
        self.push(value)
    }

    fn end(self) -> Result<StateValue, ReflectError> {
        Ok(self.finish())
    }
}

#[derive(Default)]
struct MapBuilder {
    entries: BTreeMap<String, StateValue>,
    next_key: Option<String>,
    variant: Option<&'static str>,
}

impl MapBuilder {
    fn insert<T>(&mut self, key: String, value: &T) -> Result<(), ReflectError>
    where
        T: ?Sized + Serialize,
    {
        self.entries.insert(key, to_state_value(value)?);
        Ok(())
    }

    fn finish(self) -> StateValue {
        let mapping = StateValue::Mapping(self.entries);
        match self.variant {
            Some(variant) => tagged(variant, mapping),
            None => mapping,
        }
    }
}

impl ser::SerializeMap for MapBuilder {
    type Ok = StateValue;
    type Error = ReflectError;

    fn serialize_key<T>(&mut self, key: &T) -> Result<(), ReflectError>
    where
        T: ?Sized + Serialize,
    {
        self.next_key = Some(map_key(to_state_value(key)?)?);
        Ok(())
    }

    fn serialize_value<T>(&mut self, value: &T) -> Result<(), ReflectError>
    where
        T: ?Sized + Serialize,
    {
        let key = self
            .next_key
            .take()
            .ok_or_else(|| ReflectError("map value without a key".to_string()))?;
        self.insert(key, value)
    }

    fn end(self) -> Result<StateValue, ReflectError> {
        Ok(self.finish())
    }
}

impl ser::SerializeStruct for MapBuilder {
    type Ok = StateValue;
    type Error = ReflectError;

    fn serialize_field<T>(&mut self, key: &'static str, value: &T) -> Result<(), ReflectError>
    where
        T: ?Sized + Serialize,
    {
        self.insert(key.to_string(), value)
    }

    fn end(self) -> Result<StateValue, ReflectError> {
        Ok(self.finish())
    }
}

impl ser::SerializeStructVariant for MapBuilder {
    type Ok = StateValue;
    type Error = ReflectError;

    fn serialize_field<T>(&mut self, key: &'static str, value: &T) -> Result<(), ReflectError>
    where
        T: ?Sized + Serialize,
    {
        self.insert(key.to_string(), value)
    }

    fn end(self) -> Result<StateValue, ReflectError> {
        Ok(self.finish())
    }
}

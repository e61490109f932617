//! Options-aware decoding of result nodes into typed items.
//!
//! Items are decoded through a deserializer over [`serde_json::Value`] that
//! applies [`DecodeOptions`] on the way down:
//!
//! - field converters rewrite matching object values before the target type
//!   sees them
//! - enum variants are resolved from GraphQL enum names (`"IN_PROGRESS"`
//!   matches `InProgress`) or from integer ordinals

use std::fmt;
use std::sync::Arc;

use serde::de::value::StringDeserializer;
use serde::de::{
    self, DeserializeOwned, DeserializeSeed, Deserializer, EnumAccess, IntoDeserializer,
    MapAccess, SeqAccess, Unexpected, VariantAccess, Visitor,
};
use serde_json::{Map, Value};

use crate::envelope::ResultNode;
use crate::error::{Error, Result, ScalarDecodeError};
use crate::scalar::{ScalarConverter, decode_unix_date_time, scalar_token};

/// Settings applied while decoding result items.
#[derive(Clone)]
pub struct DecodeOptions {
    enum_as_string: bool,
    converters: Vec<(String, Arc<dyn ScalarConverter>)>,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            enum_as_string: true,
            converters: Vec::new(),
        }
    }
}

impl DecodeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept enum values as names (the default).
    ///
    /// When disabled, enums decode from integer ordinals only.
    pub fn enum_as_string(mut self, enabled: bool) -> Self {
        self.enum_as_string = enabled;
        self
    }

    /// Register a converter for every object field named `field`.
    ///
    /// Converters are consulted in registration order; the first one
    /// registered for a field wins.
    pub fn converter(
        mut self,
        field: impl Into<String>,
        converter: impl ScalarConverter + 'static,
    ) -> Self {
        self.converters.push((field.into(), Arc::new(converter)));
        self
    }

    pub fn is_enum_as_string(&self) -> bool {
        self.enum_as_string
    }

    fn converter_for(&self, field: &str) -> Option<&dyn ScalarConverter> {
        self.converters
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, converter)| converter.as_ref())
    }

    fn convert_field(&self, field: &str, value: Value) -> std::result::Result<Value, DecodeError> {
        match self.converter_for(field) {
            Some(converter) => {
                tracing::trace!(
                    target: crate::logging::targets::DECODE,
                    field,
                    converter = converter.name(),
                    "applying scalar converter"
                );
                converter.convert(value).map_err(DecodeError::Scalar)
            }
            None => Ok(value),
        }
    }
}

impl fmt::Debug for DecodeOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodeOptions")
            .field("enum_as_string", &self.enum_as_string)
            .field(
                "converters",
                &self
                    .converters
                    .iter()
                    .map(|(field, c)| (field.as_str(), c.name()))
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Decode one result node into `T`.
pub fn decode_node<T: DeserializeOwned>(node: &ResultNode, options: &DecodeOptions) -> Result<T> {
    decode_value(node.to_value()?, options)
}

/// Decode a JSON value into `T`.
pub fn decode_value<T: DeserializeOwned>(value: Value, options: &DecodeOptions) -> Result<T> {
    T::deserialize(ValueDeserializer { value, options }).map_err(|e| match e {
        DecodeError::Scalar(e) => Error::ScalarDecode(e),
        DecodeError::Serde(e) => Error::Decode(e),
    })
}

#[derive(Debug)]
enum DecodeError {
    Scalar(ScalarDecodeError),
    Serde(serde_json::Error),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(e) => e.fmt(f),
            Self::Serde(e) => e.fmt(f),
        }
    }
}

impl std::error::Error for DecodeError {}

impl de::Error for DecodeError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Self::Serde(<serde_json::Error as de::Error>::custom(msg))
    }
}

struct ValueDeserializer<'a> {
    value: Value,
    options: &'a DecodeOptions,
}

impl<'de> Deserializer<'de> for ValueDeserializer<'_> {
    type Error = DecodeError;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> std::result::Result<V::Value, DecodeError> {
        let options = self.options;
        match self.value {
            Value::Null => visitor.visit_unit(),
            Value::Bool(b) => visitor.visit_bool(b),
            Value::Number(n) => {
                if let Some(u) = n.as_u64() {
                    visitor.visit_u64(u)
                } else if let Some(i) = n.as_i64() {
                    visitor.visit_i64(i)
                } else if let Some(f) = n.as_f64() {
                    visitor.visit_f64(f)
                } else {
                    Err(de::Error::custom(format!("unsupported number {n}")))
                }
            }
            Value::String(s) => visitor.visit_string(s),
            Value::Array(items) => {
                let len = items.len();
                let mut seq = SeqDeserializer {
                    iter: items.into_iter(),
                    options,
                };
                let out = visitor.visit_seq(&mut seq)?;
                if seq.iter.len() == 0 {
                    Ok(out)
                } else {
                    Err(de::Error::invalid_length(len, &"fewer elements in array"))
                }
            }
            Value::Object(map) => visitor.visit_map(MapDeserializer::new(map, options)),
        }
    }

    fn deserialize_option<V: Visitor<'de>>(
        self,
        visitor: V,
    ) -> std::result::Result<V::Value, DecodeError> {
        match self.value {
            Value::Null => visitor.visit_none(),
            _ => visitor.visit_some(self),
        }
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        name: &'static str,
        visitor: V,
    ) -> std::result::Result<V::Value, DecodeError> {
        // Epoch dates fail here with their typed error before the visitor
        // flattens it into a message.
        if let Some(nullable) = scalar_token(name) {
            decode_unix_date_time(&self.value, nullable).map_err(DecodeError::Scalar)?;
        }
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        name: &'static str,
        variants: &'static [&'static str],
        visitor: V,
    ) -> std::result::Result<V::Value, DecodeError> {
        let options = self.options;
        let (variant, value) = match self.value {
            Value::String(s) if options.enum_as_string => (resolve_variant(s, variants), None),
            Value::String(s) => {
                return Err(de::Error::invalid_type(
                    Unexpected::Str(&s),
                    &"an enum ordinal (enum_as_string is disabled)",
                ));
            }
            Value::Number(n) => {
                let variant = n
                    .as_u64()
                    .and_then(|idx| usize::try_from(idx).ok())
                    .and_then(|idx| variants.get(idx))
                    .ok_or_else(|| {
                        de::Error::invalid_value(
                            Unexpected::Other(&format!("ordinal {n}")),
                            &format!("an ordinal of enum {name} below {}", variants.len()).as_str(),
                        )
                    })?;
                ((*variant).to_owned(), None)
            }
            Value::Object(map) => {
                let mut entries = map.into_iter();
                let (Some((key, value)), None) = (entries.next(), entries.next()) else {
                    return Err(de::Error::invalid_type(
                        Unexpected::Map,
                        &"a single-key object naming the variant",
                    ));
                };
                let variant = if options.enum_as_string {
                    resolve_variant(key, variants)
                } else {
                    key
                };
                (variant, Some(value))
            }
            other => {
                return Err(de::Error::invalid_type(
                    unexpected(&other),
                    &"an enum name, ordinal or single-key object",
                ));
            }
        };
        visitor.visit_enum(EnumDeserializer {
            variant,
            value,
            options,
        })
    }

    fn deserialize_ignored_any<V: Visitor<'de>>(
        self,
        visitor: V,
    ) -> std::result::Result<V::Value, DecodeError> {
        visitor.visit_unit()
    }

    serde::forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string
        bytes byte_buf unit unit_struct seq tuple tuple_struct map struct
        identifier
    }
}

/// Match a GraphQL enum name against the target's variant names.
///
/// Exact matches win; otherwise case, `_` and `-` are ignored. Unknown names
/// are returned unchanged so the target reports them.
fn resolve_variant(name: String, variants: &'static [&'static str]) -> String {
    if variants.contains(&name.as_str()) {
        return name;
    }
    let wanted = normalize(&name);
    variants
        .iter()
        .find(|variant| normalize(variant) == wanted)
        .map_or(name, |variant| (*variant).to_owned())
}

fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

fn unexpected(value: &Value) -> Unexpected<'_> {
    match value {
        Value::Null => Unexpected::Unit,
        Value::Bool(b) => Unexpected::Bool(*b),
        Value::Number(_) => Unexpected::Other("number"),
        Value::String(s) => Unexpected::Str(s),
        Value::Array(_) => Unexpected::Seq,
        Value::Object(_) => Unexpected::Map,
    }
}

struct SeqDeserializer<'a> {
    iter: std::vec::IntoIter<Value>,
    options: &'a DecodeOptions,
}

impl<'de> SeqAccess<'de> for SeqDeserializer<'_> {
    type Error = DecodeError;

    fn next_element_seed<T: DeserializeSeed<'de>>(
        &mut self,
        seed: T,
    ) -> std::result::Result<Option<T::Value>, DecodeError> {
        match self.iter.next() {
            Some(value) => seed
                .deserialize(ValueDeserializer {
                    value,
                    options: self.options,
                })
                .map(Some),
            None => Ok(None),
        }
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.iter.len())
    }
}

struct MapDeserializer<'a> {
    iter: serde_json::map::IntoIter,
    value: Option<Value>,
    options: &'a DecodeOptions,
}

impl<'a> MapDeserializer<'a> {
    fn new(map: Map<String, Value>, options: &'a DecodeOptions) -> Self {
        Self {
            iter: map.into_iter(),
            value: None,
            options,
        }
    }
}

impl<'de> MapAccess<'de> for MapDeserializer<'_> {
    type Error = DecodeError;

    fn next_key_seed<K: DeserializeSeed<'de>>(
        &mut self,
        seed: K,
    ) -> std::result::Result<Option<K::Value>, DecodeError> {
        match self.iter.next() {
            Some((key, value)) => {
                self.value = Some(self.options.convert_field(&key, value)?);
                let key: StringDeserializer<DecodeError> = key.into_deserializer();
                seed.deserialize(key).map(Some)
            }
            None => Ok(None),
        }
    }

    fn next_value_seed<V: DeserializeSeed<'de>>(
        &mut self,
        seed: V,
    ) -> std::result::Result<V::Value, DecodeError> {
        let value = self
            .value
            .take()
            .ok_or_else(|| de::Error::custom("map value requested before its key"))?;
        seed.deserialize(ValueDeserializer {
            value,
            options: self.options,
        })
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.iter.len())
    }
}

struct EnumDeserializer<'a> {
    variant: String,
    value: Option<Value>,
    options: &'a DecodeOptions,
}

impl<'de, 'a> EnumAccess<'de> for EnumDeserializer<'a> {
    type Error = DecodeError;
    type Variant = VariantDeserializer<'a>;

    fn variant_seed<V: DeserializeSeed<'de>>(
        self,
        seed: V,
    ) -> std::result::Result<(V::Value, Self::Variant), DecodeError> {
        let variant: StringDeserializer<DecodeError> = self.variant.into_deserializer();
        let tag = seed.deserialize(variant)?;
        Ok((
            tag,
            VariantDeserializer {
                value: self.value,
                options: self.options,
            },
        ))
    }
}

struct VariantDeserializer<'a> {
    value: Option<Value>,
    options: &'a DecodeOptions,
}

impl<'a> VariantDeserializer<'a> {
    fn content(self, expected: &'static str) -> std::result::Result<ValueDeserializer<'a>, DecodeError> {
        match self.value {
            Some(value) => Ok(ValueDeserializer {
                value,
                options: self.options,
            }),
            None => Err(de::Error::invalid_type(Unexpected::UnitVariant, &expected)),
        }
    }
}

impl<'de> VariantAccess<'de> for VariantDeserializer<'_> {
    type Error = DecodeError;

    fn unit_variant(self) -> std::result::Result<(), DecodeError> {
        match self.value {
            None | Some(Value::Null) => Ok(()),
            Some(other) => Err(de::Error::invalid_type(unexpected(&other), &"unit variant")),
        }
    }

    fn newtype_variant_seed<T: DeserializeSeed<'de>>(
        self,
        seed: T,
    ) -> std::result::Result<T::Value, DecodeError> {
        seed.deserialize(self.content("newtype variant")?)
    }

    fn tuple_variant<V: Visitor<'de>>(
        self,
        _len: usize,
        visitor: V,
    ) -> std::result::Result<V::Value, DecodeError> {
        self.content("tuple variant")?.deserialize_seq(visitor)
    }

    fn struct_variant<V: Visitor<'de>>(
        self,
        _fields: &'static [&'static str],
        visitor: V,
    ) -> std::result::Result<V::Value, DecodeError> {
        self.content("struct variant")?.deserialize_map(visitor)
    }
}

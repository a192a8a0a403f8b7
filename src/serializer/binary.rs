//! Self-describing binary codec (MessagePack).

use serde_json::Value;

use super::Serializer;
use crate::error::CacheError;

/// MessagePack codec, the default payload format.
///
/// Self-describing and compact: integers and floats keep their distinction,
/// strings stay UTF-8, and payloads are typically smaller than JSON text.
/// Payloads are not human-readable; prefer [`super::JsonSerializer`] when
/// operators need to inspect keys with external tooling, and treat payloads
/// from untrusted writers with the same suspicion as any decoded input.
#[derive(Debug, Default, Clone, Copy)]
pub struct BinarySerializer;

impl BinarySerializer {
    pub fn new() -> Self {
        Self
    }
}

impl Serializer for BinarySerializer {
    fn name(&self) -> &str {
        "binary"
    }

    fn serialize(&self, value: &Value) -> Result<Vec<u8>, CacheError> {
        rmp_serde::to_vec(value).map_err(|e| CacheError::serialization(self.name(), e))
    }

    fn deserialize(&self, data: &[u8]) -> Result<Value, CacheError> {
        rmp_serde::from_slice(data).map_err(|e| CacheError::serialization(self.name(), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn round_trips_composite_values() {
        let codec = BinarySerializer::new();
        let value = json!({
            "user": {"id": 7, "name": "Ada"},
            "scores": [1, 2.5, -3],
            "active": true,
            "note": null,
        });

        let bytes = codec.serialize(&value).unwrap();
        assert_eq!(codec.deserialize(&bytes).unwrap(), value);
    }

    #[test]
    fn preserves_integer_float_distinction() {
        let codec = BinarySerializer::new();

        let int_back = codec
            .deserialize(&codec.serialize(&json!(10)).unwrap())
            .unwrap();
        assert!(int_back.is_i64() || int_back.is_u64());

        let float_back = codec
            .deserialize(&codec.serialize(&json!(10.0)).unwrap())
            .unwrap();
        assert!(float_back.is_f64());
    }

    #[test]
    fn garbage_input_is_a_serialization_error() {
        let codec = BinarySerializer::new();
        // 0xc1 is a reserved, never-used MessagePack marker.
        let err = codec.deserialize(&[0xc1, 0x00]).unwrap_err();
        match err {
            CacheError::Serialization { serializer, key, .. } => {
                assert_eq!(serializer, "binary");
                assert_eq!(key, None);
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }
}

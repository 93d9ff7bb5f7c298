//! Per-sink record-to-payload transformation.
//!
//! A transformer must be referentially transparent: the same record always
//! yields the same payload. Transform failures are terminal for the
//! (record, sink) pair — see [`crate::orchestrator`] — no send is attempted.
//!
//! Payloads are `Vec<u8>` rather than `String`: most built-in transformers
//! produce UTF-8 text, but [`BinaryHeaderTransformer`] does not, and the
//! `Sink` contract should not assume text.

use std::collections::HashMap;
use std::sync::Arc;

use crate::role::SinkRole;

/// Pure `record -> payload` mapping, one instance per sink role.
pub trait Transformer: Send + Sync {
    /// Transforms a record into a sink-specific payload. An `Err` is
    /// classified by the caller as a terminal transform failure.
    fn transform(&self, record: &str) -> Result<Vec<u8>, String>;
}

/// Returns the record unchanged. The default for any role without a
/// registered transformer.
#[derive(Debug, Default)]
pub struct PassthroughTransformer;

impl Transformer for PassthroughTransformer {
    fn transform(&self, record: &str) -> Result<Vec<u8>, String> {
        Ok(record.as_bytes().to_vec())
    }
}

/// Wraps the record under a `"body"` key, emitting `{}` for an empty record.
#[derive(Debug, Default)]
pub struct JsonEnvelopeTransformer;

impl Transformer for JsonEnvelopeTransformer {
    fn transform(&self, record: &str) -> Result<Vec<u8>, String> {
        if record.is_empty() {
            return Ok(b"{}".to_vec());
        }
        Ok(format!(r#"{{"body":{}}}"#, record).into_bytes())
    }
}

/// Wraps the record in a single `<record>` element, emitting `<record/>` for
/// an empty record.
#[derive(Debug, Default)]
pub struct XmlWrapTransformer;

impl Transformer for XmlWrapTransformer {
    fn transform(&self, record: &str) -> Result<Vec<u8>, String> {
        if record.is_empty() {
            return Ok(b"<record/>".to_vec());
        }
        Ok(format!("<record>{}</record>", record).into_bytes())
    }
}

/// Prefixes a fixed 4-byte magic header to the UTF-8 bytes of the record.
#[derive(Debug, Default)]
pub struct BinaryHeaderTransformer;

const BINARY_HEADER_MAGIC: [u8; 4] = [0xDE, 0xAD, 0xBE, 0xEF];

impl Transformer for BinaryHeaderTransformer {
    fn transform(&self, record: &str) -> Result<Vec<u8>, String> {
        let mut bytes = BINARY_HEADER_MAGIC.to_vec();
        bytes.extend_from_slice(record.as_bytes());
        Ok(bytes)
    }
}

/// Maps sink role to its registered transformer; roles with no registration
/// fall back to [`PassthroughTransformer`].
pub struct TransformerRegistry {
    transformers: HashMap<SinkRole, Arc<dyn Transformer>>,
    default: Arc<dyn Transformer>,
}

impl TransformerRegistry {
    pub fn new() -> Self {
        Self { transformers: HashMap::new(), default: Arc::new(PassthroughTransformer) }
    }

    /// Registers the conventional built-in transformer for each role: JSON
    /// envelope for REST, XML wrap for GRPC, binary header for MQ, and
    /// passthrough for DB.
    pub fn with_builtin_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(SinkRole::Rest, Arc::new(JsonEnvelopeTransformer));
        registry.register(SinkRole::Grpc, Arc::new(XmlWrapTransformer));
        registry.register(SinkRole::Mq, Arc::new(BinaryHeaderTransformer));
        registry.register(SinkRole::Db, Arc::new(PassthroughTransformer));
        registry
    }

    pub fn register(&mut self, role: SinkRole, transformer: Arc<dyn Transformer>) {
        self.transformers.insert(role, transformer);
    }

    pub fn for_role(&self, role: SinkRole) -> Arc<dyn Transformer> {
        self.transformers.get(&role).cloned().unwrap_or_else(|| self.default.clone())
    }
}

impl Default for TransformerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_envelope_wraps_under_body_key() {
        let t = JsonEnvelopeTransformer;
        assert_eq!(t.transform(r#"{"a":1}"#).unwrap(), br#"{"body":{"a":1}}"#.to_vec());
    }

    #[test]
    fn json_envelope_empty_record_yields_empty_object() {
        let t = JsonEnvelopeTransformer;
        assert_eq!(t.transform("").unwrap(), b"{}".to_vec());
    }

    #[test]
    fn xml_wrap_wraps_record_element() {
        let t = XmlWrapTransformer;
        assert_eq!(t.transform("hello").unwrap(), b"<record>hello</record>".to_vec());
        assert_eq!(t.transform("").unwrap(), b"<record/>".to_vec());
    }

    #[test]
    fn binary_header_prefixes_magic_bytes() {
        let t = BinaryHeaderTransformer;
        let out = t.transform("x").unwrap();
        assert_eq!(&out[..4], &[0xDE, 0xAD, 0xBE, 0xEF]);
        assert_eq!(&out[4..], b"x");
    }

    #[test]
    fn passthrough_returns_record_unchanged() {
        let t = PassthroughTransformer;
        assert_eq!(t.transform("unchanged").unwrap(), b"unchanged".to_vec());
    }

    #[test]
    fn registry_falls_back_to_passthrough_for_unregistered_role() {
        let registry = TransformerRegistry::new();
        let out = registry.for_role(SinkRole::Rest).transform("x").unwrap();
        assert_eq!(out, b"x".to_vec());
    }

    #[test]
    fn builtin_defaults_registers_one_transformer_per_role() {
        let registry = TransformerRegistry::with_builtin_defaults();
        assert_eq!(registry.for_role(SinkRole::Rest).transform("1").unwrap(), br#"{"body":1}"#.to_vec());
        assert_eq!(registry.for_role(SinkRole::Grpc).transform("1").unwrap(), b"<record>1</record>".to_vec());
        assert_eq!(registry.for_role(SinkRole::Db).transform("1").unwrap(), b"1".to_vec());
    }
}

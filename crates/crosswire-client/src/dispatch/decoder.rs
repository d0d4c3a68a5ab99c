//! Response decoding contract.
//!
//! The complete server-response grammar is owned by an external decoder;
//! the dispatcher only needs the ability to turn an `//OK` payload into a
//! return value and an `//EX` payload into a thrown value. The default
//! implementation reads the same value-stream grammar the core writer
//! produces, which is what the contract tests and fixtures speak.

use std::sync::Arc;

use crosswire_core::error::Result;
use crosswire_core::wire::{
    FieldTableRegistry, ProtocolVersion, RpcType, RpcValue, ThrownValue, WireReader,
};

pub trait ResponseDecoder: Send + Sync {
    fn decode_ok(
        &self,
        payload: &str,
        return_type: Option<&RpcType>,
        version: ProtocolVersion,
    ) -> Result<RpcValue>;

    fn decode_thrown(&self, payload: &str) -> Result<ThrownValue>;
}

/// Default decoder over the core token grammar.
pub struct WireResponseDecoder {
    tables: Arc<FieldTableRegistry>,
}

impl WireResponseDecoder {
    pub fn new(tables: Arc<FieldTableRegistry>) -> Self {
        Self { tables }
    }
}

impl ResponseDecoder for WireResponseDecoder {
    fn decode_ok(
        &self,
        payload: &str,
        return_type: Option<&RpcType>,
        version: ProtocolVersion,
    ) -> Result<RpcValue> {
        let Some(ty) = return_type else {
            // Void method: the payload carries no value.
            return Ok(RpcValue::Null);
        };
        let mut reader = WireReader::from_value_stream(payload, version)?.with_tables(&self.tables);
        reader.read_value(ty)
    }

    fn decode_thrown(&self, payload: &str) -> Result<ThrownValue> {
        ThrownValue::decode(payload)
    }
}

//! GWT-RPC wire grammar: token-stream payloads, string table, type
//! signatures, and the request encoder.
//!
//! The grammar is reproduced bit-for-bit, including version quirks: the
//! legacy container signature override (version 6) and the long-as-doubles
//! scheme (version 5).

pub mod encoder;
pub mod escape;
pub mod reader;
pub mod registry;
pub mod response;
pub mod value;
pub mod writer;

use serde::Deserialize;

/// Token separator of the flat payload grammar.
pub const SEPARATOR: char = '|';

/// Flag bit: an out-of-band RPC token is attached to the request.
pub const FLAG_RPC_TOKEN_INCLUDED: u32 = 0x2;

/// Marker prefix of a successful response body.
pub const OK_PREFIX: &str = "//OK";

/// Marker prefix of a response body carrying a thrown value.
pub const EX_PREFIX: &str = "//EX";

/// Content type of request payloads.
pub const RPC_CONTENT_TYPE: &str = "text/x-gwt-rpc; charset=utf-8";

/// Serialization stream versions supported by the encoder.
///
/// `V7` is the current protocol. `V6` is the legacy version whose container
/// signatures must come from the policy file. `V5` is the oldest supported
/// version, which still splits longs into two double components.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolVersion {
    V5,
    V6,
    #[default]
    V7,
}

impl ProtocolVersion {
    /// The version number emitted in the payload header.
    pub fn number(self) -> u32 {
        match self {
            ProtocolVersion::V5 => 5,
            ProtocolVersion::V6 => 6,
            ProtocolVersion::V7 => 7,
        }
    }

    /// Longs are radix-64 tokens from version 6 on; version 5 writes two
    /// double components instead.
    pub fn longs_as_base64(self) -> bool {
        !matches!(self, ProtocolVersion::V5)
    }

    /// Whether the policy-declared signature replaces the locally computed
    /// one for container-family types. A narrow compatibility shim: applies
    /// to version 6 only.
    pub fn container_signature_from_policy(self) -> bool {
        matches!(self, ProtocolVersion::V6)
    }
}

pub use encoder::{EncoderSink, RequestContext, WireEncoder};
pub use reader::{RequestEnvelope, WireReader};
pub use registry::{
    CustomFieldSerializer, CustomSerializerRegistry, FieldDescriptor, FieldTableRegistry,
    TypeShape, TypeTable,
};
pub use response::{classify, ResponseClass, ThrownValue, TOKEN_FAULT_TYPE};
pub use value::{RpcType, RpcValue};
pub use writer::PayloadWriter;

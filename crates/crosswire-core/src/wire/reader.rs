//! Token cursor over a wire payload.
//!
//! The full response decoder lives outside this system; this reader covers
//! the contract the dispatcher and the test suite rely on: it can read back
//! every value shape the encoder emits, both from complete request payloads
//! and from bare value streams (response bodies).

use crate::error::{CrosswireError, Result};
use crate::policy::model::SerializationPolicy;
use crate::wire::escape::unescape;
use crate::wire::registry::{client_visible_fields, FieldTableRegistry, TypeShape};
use crate::wire::value::{
    decode_long, is_container, long_from_doubles, signature_base, type_from_binary_name, RpcType,
    RpcValue,
};
use crate::wire::{ProtocolVersion, FLAG_RPC_TOKEN_INCLUDED, SEPARATOR};

/// Parsed request header: everything before the argument values.
#[derive(Debug, Clone)]
pub struct RequestEnvelope {
    pub version: ProtocolVersion,
    pub flags: u32,
    pub module_base_url: String,
    pub policy_id: String,
    pub rpc_token: Option<String>,
    pub service_interface: String,
    pub method_name: String,
    pub arg_signatures: Vec<String>,
}

pub struct WireReader<'a> {
    version: ProtocolVersion,
    table: Vec<String>,
    tokens: Vec<String>,
    pos: usize,
    tables: Option<&'a FieldTableRegistry>,
    policy: Option<&'a SerializationPolicy>,
}

impl<'a> WireReader<'a> {
    /// Parse a complete request payload; the returned reader is positioned
    /// at the first argument value.
    pub fn from_request(payload: &str) -> Result<(RequestEnvelope, Self)> {
        let mut reader = Self::tokenize(payload, ProtocolVersion::V7)?;
        let version = match reader.read_u32()? {
            5 => ProtocolVersion::V5,
            6 => ProtocolVersion::V6,
            7 => ProtocolVersion::V7,
            v => {
                return Err(CrosswireError::Protocol(format!(
                    "unsupported stream version: {v}"
                )))
            }
        };
        reader.version = version;
        let flags = reader.read_u32()?;
        reader.read_table()?;

        let module_base_url = reader.require_string_ref()?;
        let policy_id = reader.require_string_ref()?;
        let rpc_token = if flags & FLAG_RPC_TOKEN_INCLUDED != 0 {
            Some(reader.require_string_ref()?)
        } else {
            None
        };
        let service_interface = reader.require_string_ref()?;
        let method_name = reader.require_string_ref()?;
        let arg_count = reader.read_u32()?;
        let mut arg_signatures = Vec::with_capacity(arg_count as usize);
        for _ in 0..arg_count {
            arg_signatures.push(reader.require_string_ref()?);
        }

        Ok((
            RequestEnvelope {
                version,
                flags,
                module_base_url,
                policy_id,
                rpc_token,
                service_interface,
                method_name,
                arg_signatures,
            },
            reader,
        ))
    }

    /// Parse a bare value stream (`N|table...|body...|`), as used for
    /// response payloads.
    pub fn from_value_stream(payload: &str, version: ProtocolVersion) -> Result<Self> {
        let mut reader = Self::tokenize(payload, version)?;
        reader.read_table()?;
        Ok(reader)
    }

    pub fn with_tables(mut self, tables: &'a FieldTableRegistry) -> Self {
        self.tables = Some(tables);
        self
    }

    pub fn with_policy(mut self, policy: &'a SerializationPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    fn tokenize(payload: &str, version: ProtocolVersion) -> Result<Self> {
        let mut tokens: Vec<String> = payload.split(SEPARATOR).map(String::from).collect();
        // The grammar terminates every token with the separator, so a
        // well-formed payload splits into tokens plus one trailing empty.
        match tokens.pop() {
            Some(t) if t.is_empty() => {}
            _ => return Err(CrosswireError::Protocol("payload not separator-terminated".into())),
        }
        Ok(Self {
            version,
            table: Vec::new(),
            tokens,
            pos: 0,
            tables: None,
            policy: None,
        })
    }

    fn read_table(&mut self) -> Result<()> {
        let n = self.read_u32()? as usize;
        let mut table = Vec::with_capacity(n);
        for _ in 0..n {
            let raw = self.next_token()?;
            table.push(unescape(&raw)?);
        }
        self.table = table;
        Ok(())
    }

    fn next_token(&mut self) -> Result<String> {
        let t = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or_else(|| CrosswireError::Protocol("unexpected end of payload".into()))?;
        self.pos += 1;
        Ok(t)
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let t = self.next_token()?;
        t.parse()
            .map_err(|_| CrosswireError::Protocol(format!("bad integer token: {t:?}")))
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        let t = self.next_token()?;
        t.parse()
            .map_err(|_| CrosswireError::Protocol(format!("bad integer token: {t:?}")))
    }

    fn read_f64(&mut self) -> Result<f64> {
        let t = self.next_token()?;
        match t.as_str() {
            "NaN" => Ok(f64::NAN),
            "Infinity" => Ok(f64::INFINITY),
            "-Infinity" => Ok(f64::NEG_INFINITY),
            _ => t
                .parse()
                .map_err(|_| CrosswireError::Protocol(format!("bad double token: {t:?}"))),
        }
    }

    /// Read a long in the scheme of the active protocol version.
    pub fn read_long(&mut self) -> Result<i64> {
        if self.version.longs_as_base64() {
            let t = self.next_token()?;
            decode_long(&t)
        } else {
            let low = self.read_f64()?;
            let high = self.read_f64()?;
            Ok(long_from_doubles(low, high))
        }
    }

    /// Read a string reference; `Ok(None)` is the null string (index zero).
    pub fn read_string_ref(&mut self) -> Result<Option<String>> {
        let idx = self.read_u32()? as usize;
        if idx == 0 {
            return Ok(None);
        }
        self.table
            .get(idx - 1)
            .cloned()
            .map(Some)
            .ok_or_else(|| CrosswireError::Protocol(format!("string index {idx} out of table")))
    }

    fn require_string_ref(&mut self) -> Result<String> {
        self.read_string_ref()?
            .ok_or_else(|| CrosswireError::Protocol("null string in payload header".into()))
    }

    /// Read one value of the given declared type.
    pub fn read_value(&mut self, declared: &RpcType) -> Result<RpcValue> {
        match declared {
            t if t.is_primitive() => self.read_primitive(t),
            RpcType::String => Ok(match self.read_string_ref()? {
                Some(s) => RpcValue::String(s),
                None => RpcValue::Null,
            }),
            _ => self.read_dynamic(),
        }
    }

    fn read_primitive(&mut self, ty: &RpcType) -> Result<RpcValue> {
        Ok(match ty {
            RpcType::Bool => match self.next_token()?.as_str() {
                "1" => RpcValue::Bool(true),
                "0" => RpcValue::Bool(false),
                t => return Err(CrosswireError::Protocol(format!("bad bool token: {t:?}"))),
            },
            RpcType::Byte => RpcValue::Byte(self.read_i32()? as i8),
            RpcType::Char => {
                let code = self.read_u32()?;
                RpcValue::Char(char::from_u32(code).ok_or_else(|| {
                    CrosswireError::Protocol(format!("bad char code: {code}"))
                })?)
            }
            RpcType::Short => RpcValue::Short(self.read_i32()? as i16),
            RpcType::Int => RpcValue::Int(self.read_i32()?),
            RpcType::Long => RpcValue::Long(self.read_long()?),
            RpcType::Float => RpcValue::Float(self.read_f64()? as f32),
            RpcType::Double => RpcValue::Double(self.read_f64()?),
            _ => return Err(CrosswireError::Protocol("not a primitive type".into())),
        })
    }

    /// Read a value prefixed by its runtime type token.
    pub fn read_dynamic(&mut self) -> Result<RpcValue> {
        let Some(signature) = self.read_string_ref()? else {
            return Ok(RpcValue::Null);
        };
        let base = signature_base(&signature).to_string();

        match base.as_str() {
            "java.lang.Boolean" => return self.read_primitive(&RpcType::Bool),
            "java.lang.Byte" => return self.read_primitive(&RpcType::Byte),
            "java.lang.Character" => return self.read_primitive(&RpcType::Char),
            "java.lang.Short" => return self.read_primitive(&RpcType::Short),
            "java.lang.Integer" => return self.read_primitive(&RpcType::Int),
            "java.lang.Long" => return Ok(RpcValue::Long(self.read_long()?)),
            "java.lang.Float" => return self.read_primitive(&RpcType::Float),
            "java.lang.Double" => return self.read_primitive(&RpcType::Double),
            "java.lang.String" => {
                return Ok(match self.read_string_ref()? {
                    Some(s) => RpcValue::String(s),
                    None => RpcValue::Null,
                })
            }
            "java.util.Date" => {
                // Built-in custom wire format: epoch millis.
                let ms = self.read_long()?;
                return Ok(RpcValue::Object {
                    type_name: base,
                    fields: vec![RpcValue::Long(ms)],
                });
            }
            _ => {}
        }

        if base.starts_with('[') {
            let RpcType::Array(elem) = type_from_binary_name(&base)? else {
                return Err(CrosswireError::Protocol(format!("bad array signature: {base}")));
            };
            let len = self.read_u32()? as usize;
            let mut items = Vec::with_capacity(len);
            for _ in 0..len {
                items.push(self.read_value(&elem)?);
            }
            return Ok(RpcValue::Array { elem: *elem, items });
        }

        if is_container(&base) {
            let len = self.read_u32()? as usize;
            let mut items = Vec::with_capacity(len);
            for _ in 0..len {
                items.push(self.read_dynamic()?);
            }
            return Ok(RpcValue::Collection {
                type_name: base,
                items,
            });
        }

        let tables = self.tables.ok_or_else(|| {
            CrosswireError::Protocol(format!("no field tables to read type {base}"))
        })?;
        let table = tables.object_table(&base)?;
        match &table.shape {
            TypeShape::Enum { constants } => {
                let ordinal = self.read_i32()?;
                let constant = constants
                    .get(ordinal as usize)
                    .cloned()
                    .ok_or_else(|| {
                        CrosswireError::Protocol(format!("{base}: enum ordinal {ordinal} out of range"))
                    })?;
                Ok(RpcValue::Enum {
                    type_name: base,
                    constant,
                    ordinal,
                })
            }
            TypeShape::Exception => Ok(RpcValue::Exception {
                type_name: base,
                message: self.read_string_ref()?,
            }),
            TypeShape::Object { .. } => {
                let empty = SerializationPolicy::default();
                let policy = self.policy.unwrap_or(&empty);
                let descriptors = client_visible_fields(tables, policy, &base)?;
                let mut fields = Vec::with_capacity(descriptors.len());
                for (desc, placeholder) in &descriptors {
                    if *placeholder {
                        // Skip the server-only-fields alignment slot.
                        let slot = self.next_token()?;
                        if slot != "0" {
                            return Err(CrosswireError::Protocol(format!(
                                "{base}: expected placeholder slot, got {slot:?}"
                            )));
                        }
                    }
                    fields.push(self.read_value(&desc.ty)?);
                }
                Ok(RpcValue::Object {
                    type_name: base,
                    fields,
                })
            }
        }
    }
}

//! Request encoder: serializes one method invocation into the flat token
//! stream the server-side decoder expects.
//!
//! Stream order: `version | flags | string table | moduleBaseUrl | policyId |
//! [rpcToken] | serviceInterface | methodName | argCount | arg type
//! signatures | arg values`. Header strings and every string in the body go
//! through the deduplicated table.
//!
//! Whitelist failures surface as `CrosswireError::Encoding` before the
//! payload is finalized, so a bad value never reaches the network.

use crate::error::{CrosswireError, Result};
use crate::policy::model::SerializationPolicy;
use crate::wire::registry::{
    client_visible_fields, CustomSerializerRegistry, FieldTableRegistry,
};
use crate::wire::value::{
    builtin_signature, encode_long, fmt_double, fmt_float, is_container, long_as_doubles, RpcType,
    RpcValue,
};
use crate::wire::writer::PayloadWriter;
use crate::wire::{ProtocolVersion, FLAG_RPC_TOKEN_INCLUDED};

/// Request-level identifiers, all interned through the string table.
#[derive(Debug, Clone, Copy)]
pub struct RequestContext<'a> {
    pub module_base_url: &'a str,
    pub policy_id: &'a str,
    pub service_interface: &'a str,
    pub method_name: &'a str,
    /// Out-of-band anti-forgery token; sets the flag bit when present.
    pub rpc_token: Option<&'a str>,
}

/// Wire encoder bound to one resolved policy.
pub struct WireEncoder<'a> {
    version: ProtocolVersion,
    policy: &'a SerializationPolicy,
    tables: &'a FieldTableRegistry,
    custom: &'a CustomSerializerRegistry,
}

impl<'a> WireEncoder<'a> {
    pub fn new(
        version: ProtocolVersion,
        policy: &'a SerializationPolicy,
        tables: &'a FieldTableRegistry,
        custom: &'a CustomSerializerRegistry,
    ) -> Self {
        Self {
            version,
            policy,
            tables,
            custom,
        }
    }

    /// Encode a complete request payload.
    pub fn encode_request(
        &self,
        req: &RequestContext<'_>,
        arg_types: &[RpcType],
        args: &[RpcValue],
    ) -> Result<String> {
        if arg_types.len() != args.len() {
            return Err(CrosswireError::Encoding(format!(
                "{} declared argument types but {} values",
                arg_types.len(),
                args.len()
            )));
        }

        let mut w = PayloadWriter::new();
        w.string_ref(req.module_base_url);
        w.string_ref(req.policy_id);
        if let Some(token) = req.rpc_token {
            w.string_ref(token);
        }
        w.string_ref(req.service_interface);
        w.string_ref(req.method_name);
        w.token(arg_types.len().to_string());

        // Type signatures come before any value token.
        for ty in arg_types {
            let sig = self.declared_signature(ty)?;
            w.string_ref(&sig);
        }

        let mut sink = EncoderSink {
            version: self.version,
            policy: self.policy,
            tables: self.tables,
            custom: self.custom,
            w: &mut w,
        };
        for (ty, value) in arg_types.iter().zip(args) {
            sink.write_declared(ty, value)?;
        }

        let flags = if req.rpc_token.is_some() {
            FLAG_RPC_TOKEN_INCLUDED
        } else {
            0
        };
        Ok(w.finalize_request(self.version.number(), flags))
    }

    /// Wire signature of a declared argument type.
    fn declared_signature(&self, ty: &RpcType) -> Result<String> {
        if let Some(tok) = ty.primitive_token() {
            return Ok(tok.to_string());
        }
        Ok(signature_for(
            self.version,
            self.policy,
            self.tables,
            &ty.binary_name(),
        ))
    }
}

/// Wire signature of a class, by local name.
///
/// Under the legacy version the policy-declared signature replaces the
/// locally computed one for container-family types: containers use generic
/// field serializers, so a structural hash mismatch between client and
/// server must not break compatibility. The server-declared signature always
/// wins; the override is never applied outside the legacy version or the
/// container family.
fn signature_for(
    version: ProtocolVersion,
    policy: &SerializationPolicy,
    tables: &FieldTableRegistry,
    binary_name: &str,
) -> String {
    if version.container_signature_from_policy() && is_container(binary_name) {
        if let Some(id) = policy.type_id(binary_name) {
            return id.to_string();
        }
    }
    if let Some(id) = tables.type_id(binary_name) {
        return id.to_string();
    }
    if let Some(sig) = builtin_signature(binary_name) {
        return sig.to_string();
    }
    binary_name.to_string()
}

/// Value-writing surface handed to custom serializers, positioned in the
/// body of the payload under construction.
pub struct EncoderSink<'a> {
    version: ProtocolVersion,
    policy: &'a SerializationPolicy,
    tables: &'a FieldTableRegistry,
    custom: &'a CustomSerializerRegistry,
    w: &'a mut PayloadWriter,
}

impl EncoderSink<'_> {
    /// Write a value whose declared type is known. Primitives and strings
    /// write their token directly; everything else carries a runtime type
    /// token first.
    pub fn write_declared(&mut self, ty: &RpcType, value: &RpcValue) -> Result<()> {
        match ty {
            t if t.is_primitive() => self.write_primitive(t, value),
            RpcType::String => match value {
                RpcValue::String(s) => {
                    self.w.string_ref(s);
                    Ok(())
                }
                RpcValue::Null => {
                    self.w.null_ref();
                    Ok(())
                }
                other => Err(type_mismatch("String", other)),
            },
            _ => self.write_dynamic(value),
        }
    }

    /// Write a value dispatched by its runtime type. Primitives box into
    /// their wrapper classes here.
    pub fn write_dynamic(&mut self, value: &RpcValue) -> Result<()> {
        match value {
            RpcValue::Null => {
                self.w.token("0");
                Ok(())
            }
            RpcValue::Bool(v) => self.boxed("java.lang.Boolean", if *v { "1" } else { "0" }),
            RpcValue::Byte(v) => self.boxed("java.lang.Byte", &v.to_string()),
            RpcValue::Char(v) => self.boxed("java.lang.Character", &(*v as u32).to_string()),
            RpcValue::Short(v) => self.boxed("java.lang.Short", &v.to_string()),
            RpcValue::Int(v) => self.boxed("java.lang.Integer", &v.to_string()),
            RpcValue::Long(v) => {
                self.type_token("java.lang.Long");
                self.write_long(*v)
            }
            RpcValue::Float(v) => self.boxed("java.lang.Float", &fmt_float(*v)),
            RpcValue::Double(v) => self.boxed("java.lang.Double", &fmt_double(*v)),
            RpcValue::String(s) => {
                self.type_token("java.lang.String");
                self.w.string_ref(s);
                Ok(())
            }
            RpcValue::Array { elem, items } => self.write_array(elem, items),
            RpcValue::Collection { type_name, items } => self.write_collection(type_name, items),
            RpcValue::Object { type_name, fields } => self.write_object(type_name, fields),
            RpcValue::Enum {
                type_name, ordinal, ..
            } => {
                self.ensure_serializable(type_name)?;
                self.type_token(type_name);
                self.w.token(ordinal.to_string());
                Ok(())
            }
            RpcValue::Exception { type_name, message } => {
                self.ensure_serializable(type_name)?;
                self.type_token(type_name);
                match message {
                    Some(m) => self.w.string_ref(m),
                    None => self.w.null_ref(),
                }
                Ok(())
            }
        }
    }

    /// Write a long token in the scheme of the active protocol version.
    pub fn write_long(&mut self, v: i64) -> Result<()> {
        if self.version.longs_as_base64() {
            self.w.token(encode_long(v));
        } else {
            let (low, high) = long_as_doubles(v);
            self.w.token(fmt_double(low));
            self.w.token(fmt_double(high));
        }
        Ok(())
    }

    fn write_primitive(&mut self, ty: &RpcType, value: &RpcValue) -> Result<()> {
        let token = match (ty, value) {
            (RpcType::Bool, RpcValue::Bool(v)) => if *v { "1".into() } else { "0".into() },
            (RpcType::Byte, RpcValue::Byte(v)) => v.to_string(),
            (RpcType::Char, RpcValue::Char(v)) => (*v as u32).to_string(),
            (RpcType::Short, RpcValue::Short(v)) => v.to_string(),
            (RpcType::Int, RpcValue::Int(v)) => v.to_string(),
            (RpcType::Long, RpcValue::Long(v)) => return self.write_long(*v),
            (RpcType::Float, RpcValue::Float(v)) => fmt_float(*v),
            (RpcType::Double, RpcValue::Double(v)) => fmt_double(*v),
            (ty, other) => return Err(type_mismatch(&ty.binary_name(), other)),
        };
        self.w.token(token);
        Ok(())
    }

    fn write_array(&mut self, elem: &RpcType, items: &[RpcValue]) -> Result<()> {
        let name = RpcType::Array(Box::new(elem.clone())).binary_name();
        self.ensure_serializable(&name)?;
        self.type_token(&name);
        self.w.token(items.len().to_string());
        for item in items {
            if elem.is_primitive() {
                self.write_primitive(elem, item)?;
            } else if matches!(elem, RpcType::String) {
                self.write_declared(&RpcType::String, item)?;
            } else {
                self.write_dynamic(item)?;
            }
        }
        Ok(())
    }

    fn write_collection(&mut self, type_name: &str, items: &[RpcValue]) -> Result<()> {
        self.ensure_serializable(type_name)?;
        self.type_token(type_name);
        self.w.token(items.len().to_string());
        for item in items {
            self.write_dynamic(item)?;
        }
        Ok(())
    }

    fn write_object(&mut self, type_name: &str, fields: &[RpcValue]) -> Result<()> {
        self.ensure_serializable(type_name)?;
        self.type_token(type_name);

        if let Some(ser) = self.custom.get(type_name) {
            let ser = ser.clone();
            return ser.serialize(self, &RpcValue::Object {
                type_name: type_name.to_string(),
                fields: fields.to_vec(),
            });
        }

        let descriptors = client_visible_fields(self.tables, self.policy, type_name)?;
        if descriptors.len() != fields.len() {
            return Err(CrosswireError::Encoding(format!(
                "{type_name}: {} client-visible fields expected, {} values given",
                descriptors.len(),
                fields.len()
            )));
        }
        for ((desc, placeholder), value) in descriptors.iter().zip(fields) {
            if *placeholder {
                // Server-only extra fields: one null slot keeps field
                // offsets aligned with the server's richer schema.
                self.w.null_ref();
            }
            self.write_declared(&desc.ty, value)?;
        }
        Ok(())
    }

    fn boxed(&mut self, class: &str, token: &str) -> Result<()> {
        self.type_token(class);
        self.w.token(token);
        Ok(())
    }

    /// Write the runtime type token of an object value (its signature,
    /// through the string table).
    fn type_token(&mut self, binary_name: &str) {
        let sig = signature_for(self.version, self.policy, self.tables, binary_name);
        self.w.string_ref(&sig);
    }

    /// Whitelist gate: the runtime type must be flagged field-serializable.
    fn ensure_serializable(&self, type_name: &str) -> Result<()> {
        match self.policy.entry(type_name) {
            Some(entry) if entry.field_serializable => Ok(()),
            Some(_) => Err(CrosswireError::Encoding(format!(
                "type {type_name} is not field-serializable under the current policy"
            ))),
            None => Err(CrosswireError::Encoding(format!(
                "type {type_name} is absent from the serialization policy"
            ))),
        }
    }
}

fn type_mismatch(declared: &str, value: &RpcValue) -> CrosswireError {
    CrosswireError::Encoding(format!(
        "declared type {declared} does not accept value {value:?}"
    ))
}

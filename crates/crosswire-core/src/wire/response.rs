//! Response body classification and the thrown-value contract.
//!
//! A response body is `//OK<payload>`, `//EX<payload>`, or unknown. The full
//! return-value decoder is an external collaborator; what this module fixes
//! is the classification rule and the shape of a decoded thrown value, which
//! the dispatcher needs to route token-validation faults.

use crate::error::{CrosswireError, Result};
use crate::wire::escape::{escape, unescape};
use crate::wire::{EX_PREFIX, OK_PREFIX, SEPARATOR};

/// Classified response body, with the marker prefix stripped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseClass<'a> {
    Ok(&'a str),
    Thrown(&'a str),
    Unknown,
}

/// Classify a raw response body.
pub fn classify(body: &str) -> ResponseClass<'_> {
    if let Some(rest) = body.strip_prefix(OK_PREFIX) {
        ResponseClass::Ok(rest)
    } else if let Some(rest) = body.strip_prefix(EX_PREFIX) {
        ResponseClass::Thrown(rest)
    } else {
        ResponseClass::Unknown
    }
}

/// Exception type signaled when an anti-forgery token failed server-side
/// validation.
pub const TOKEN_FAULT_TYPE: &str = "com.google.gwt.user.client.rpc.RpcTokenException";

/// A thrown value decoded from an `//EX` payload: type name plus message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThrownValue {
    pub type_name: String,
    pub message: Option<String>,
}

impl ThrownValue {
    /// Whether this fault is a token-validation failure, which a proxy may
    /// route to a dedicated handler instead of the failure continuation.
    pub fn is_token_fault(&self) -> bool {
        self.type_name == TOKEN_FAULT_TYPE
    }

    /// Decode from an `//EX` payload (marker already stripped): a value
    /// stream whose body is the thrown type's signature token followed by
    /// the message reference.
    pub fn decode(payload: &str) -> Result<Self> {
        let mut tokens: Vec<&str> = payload.split(SEPARATOR).collect();
        match tokens.pop() {
            Some("") => {}
            _ => {
                return Err(CrosswireError::Protocol(
                    "thrown payload not separator-terminated".into(),
                ))
            }
        }
        let mut iter = tokens.into_iter();
        let n: usize = iter
            .next()
            .and_then(|t| t.parse().ok())
            .ok_or_else(|| CrosswireError::Protocol("thrown payload missing table size".into()))?;
        let mut table = Vec::with_capacity(n);
        for _ in 0..n {
            let raw = iter
                .next()
                .ok_or_else(|| CrosswireError::Protocol("thrown payload table truncated".into()))?;
            table.push(unescape(raw)?);
        }
        let mut string_ref = |iter: &mut dyn Iterator<Item = &str>| -> Result<Option<String>> {
            let idx: usize = iter
                .next()
                .and_then(|t| t.parse().ok())
                .ok_or_else(|| CrosswireError::Protocol("thrown payload truncated".into()))?;
            if idx == 0 {
                return Ok(None);
            }
            table
                .get(idx - 1)
                .cloned()
                .map(Some)
                .ok_or_else(|| CrosswireError::Protocol(format!("string index {idx} out of table")))
        };

        let signature = string_ref(&mut iter)?
            .ok_or_else(|| CrosswireError::Protocol("thrown payload missing type token".into()))?;
        let message = string_ref(&mut iter)?;
        let type_name = crate::wire::value::signature_base(&signature).to_string();
        Ok(Self { type_name, message })
    }

    /// Encode as an `//EX` payload in the same grammar `decode` accepts.
    /// Real servers produce these bodies; this helper exists for fixtures
    /// and contract tests.
    pub fn encode(&self) -> String {
        let mut table = vec![self.type_name.clone()];
        let msg_idx = match &self.message {
            Some(m) => {
                if m != &self.type_name {
                    table.push(m.clone());
                }
                table.iter().position(|s| s == m).map(|p| p + 1).unwrap_or(0)
            }
            None => 0,
        };
        let mut out = String::from(EX_PREFIX);
        let mut push = |t: &str| {
            out.push_str(t);
            out.push(SEPARATOR);
        };
        push(&table.len().to_string());
        for entry in &table {
            push(&escape(entry));
        }
        push("1");
        push(&msg_idx.to_string());
        out
    }
}

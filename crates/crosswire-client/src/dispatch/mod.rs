//! Invocation dispatch: service metadata, per-call state, and the
//! dispatcher driving encode → send → interpret → retry.

pub mod decoder;
pub mod dispatcher;

use crosswire_core::error::{CrosswireError, Result};
use crosswire_core::wire::{RpcType, RpcValue, ThrownValue};

pub use decoder::{ResponseDecoder, WireResponseDecoder};
pub use dispatcher::InvocationDispatcher;

/// Declared signature of one synchronous service method.
#[derive(Debug, Clone)]
pub struct MethodDescriptor {
    pub name: String,
    pub arg_types: Vec<RpcType>,
    /// `None` means void.
    pub return_type: Option<RpcType>,
}

impl MethodDescriptor {
    pub fn new(name: impl Into<String>, arg_types: Vec<RpcType>, return_type: Option<RpcType>) -> Self {
        Self {
            name: name.into(),
            arg_types,
            return_type,
        }
    }
}

/// Metadata of one remote service: the synchronous interface name, its
/// declared default entry point, and its method signatures. Calls made
/// through the asynchronous counterpart interface resolve against these
/// synchronous signatures by name and arity.
#[derive(Debug, Clone)]
pub struct ServiceDescriptor {
    pub interface: String,
    pub default_entry_point: Option<String>,
    pub methods: Vec<MethodDescriptor>,
}

impl ServiceDescriptor {
    pub fn new(interface: impl Into<String>, default_entry_point: Option<String>) -> Self {
        Self {
            interface: interface.into(),
            default_entry_point,
            methods: Vec::new(),
        }
    }

    pub fn with_method(mut self, method: MethodDescriptor) -> Self {
        self.methods.push(method);
        self
    }

    /// Name+arity lookup of the synchronous counterpart.
    pub fn method(&self, name: &str, arity: usize) -> Result<&MethodDescriptor> {
        self.methods
            .iter()
            .find(|m| m.name == name && m.arg_types.len() == arity)
            .ok_or_else(|| {
                CrosswireError::Configuration(format!(
                    "no method {name}/{arity} on service {}",
                    self.interface
                ))
            })
    }
}

/// Per-call state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    Pending,
    Encoded,
    Sent,
    Retrying,
    Succeeded,
    Failed,
}

/// The method-call context kept alive across the async boundary.
#[derive(Debug)]
pub struct PendingInvocation {
    pub method: String,
    pub arity: usize,
    /// Policy id used for the attempt in flight.
    pub policy_id: String,
    pub state: CallState,
    pub attempt: u32,
    /// Set when a dedicated token-fault handler consumed the response, so a
    /// concurrently scheduled follow-up does not double-deliver.
    pub response_ignored: bool,
}

impl PendingInvocation {
    pub fn new(method: &str, arity: usize) -> Self {
        Self {
            method: method.to_string(),
            arity,
            policy_id: String::new(),
            state: CallState::Pending,
            attempt: 0,
            response_ignored: false,
        }
    }
}

/// Final result of a dispatched call.
#[derive(Debug, Clone, PartialEq)]
pub enum CallOutcome {
    Returned(RpcValue),
    /// A registered token-fault handler consumed the response; the normal
    /// failure path did not fire.
    Suppressed,
}

/// Dedicated receiver for token-validation faults.
pub trait TokenFaultHandler: Send + Sync {
    fn on_token_fault(&self, fault: &ThrownValue);
}

/// Per-call authentication hook.
pub trait Authenticator: Send + Sync {
    /// Header name and value to attach, if any.
    fn header(&self) -> Option<(String, String)>;
}

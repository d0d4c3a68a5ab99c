//! Field-table and custom-serializer registries.
//!
//! Instead of walking runtime metadata per call, serializable types are
//! described once by a [`TypeTable`]: an ordered field list (plus supertype
//! link), the wire type id, and the shape (plain object, enum, exception).
//! Custom wire formats are a typed registry keyed by class name, populated at
//! startup and queried by lookup.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{CrosswireError, Result};
use crate::wire::encoder::EncoderSink;
use crate::wire::value::{RpcType, RpcValue};

/// One serializable field: name and declared type, in serialization order.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    pub name: String,
    pub ty: RpcType,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, ty: RpcType) -> Self {
        Self { name: name.into(), ty }
    }
}

/// How a registered type serializes.
#[derive(Debug, Clone)]
pub enum TypeShape {
    Object {
        fields: Vec<FieldDescriptor>,
        supertype: Option<String>,
    },
    Enum {
        constants: Vec<String>,
    },
    Exception,
}

/// Per-type descriptor table, built once at startup.
#[derive(Debug, Clone)]
pub struct TypeTable {
    pub type_name: String,
    /// Wire-visible signature (`name/hash`). When absent, the bare class
    /// name is emitted.
    pub type_id: Option<String>,
    pub shape: TypeShape,
}

impl TypeTable {
    pub fn object(
        type_name: impl Into<String>,
        type_id: Option<String>,
        fields: Vec<FieldDescriptor>,
        supertype: Option<String>,
    ) -> Self {
        Self {
            type_name: type_name.into(),
            type_id,
            shape: TypeShape::Object { fields, supertype },
        }
    }

    pub fn enumeration(
        type_name: impl Into<String>,
        type_id: Option<String>,
        constants: Vec<String>,
    ) -> Self {
        Self {
            type_name: type_name.into(),
            type_id,
            shape: TypeShape::Enum { constants },
        }
    }

    pub fn exception(type_name: impl Into<String>, type_id: Option<String>) -> Self {
        Self {
            type_name: type_name.into(),
            type_id,
            shape: TypeShape::Exception,
        }
    }
}

/// Registry of type tables, indexed by class name.
#[derive(Debug, Default)]
pub struct FieldTableRegistry {
    tables: HashMap<String, Arc<TypeTable>>,
}

impl FieldTableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, table: TypeTable) {
        self.tables
            .insert(table.type_name.clone(), Arc::new(table));
    }

    pub fn get(&self, type_name: &str) -> Option<&TypeTable> {
        self.tables.get(type_name).map(Arc::as_ref)
    }

    /// The locally recorded wire signature for a class, if any.
    pub fn type_id(&self, type_name: &str) -> Option<&str> {
        self.get(type_name).and_then(|t| t.type_id.as_deref())
    }

    /// The table of a plain-object type, or an encoding error naming the
    /// type when it was never registered.
    pub fn object_table(&self, type_name: &str) -> Result<&TypeTable> {
        self.get(type_name).ok_or_else(|| {
            CrosswireError::Encoding(format!("no field table registered for {type_name}"))
        })
    }
}

/// Ordered client-visible fields of a type and its supertypes, walked the
/// way the wire lays them out: own fields first, then supertype fields,
/// stopping at the first supertype the policy does not flag as
/// field-serializable. The boolean marks the field that must be preceded by
/// the server-only-fields placeholder slot.
pub fn client_visible_fields(
    tables: &FieldTableRegistry,
    policy: &crate::policy::model::SerializationPolicy,
    type_name: &str,
) -> Result<Vec<(FieldDescriptor, bool)>> {
    let mut out = Vec::new();
    let mut current = Some(type_name.to_string());
    let mut is_root = true;

    while let Some(name) = current {
        // The root is whitelist-checked by the caller; supertypes must be
        // flagged field-serializable themselves or the walk stops.
        if !is_root && !policy.field_serializable(&name) {
            break;
        }
        is_root = false;

        let table = tables.object_table(&name)?;
        let TypeShape::Object { fields, supertype } = &table.shape else {
            return Err(CrosswireError::Encoding(format!(
                "{name} is not a plain object type"
            )));
        };

        let visible = policy.client_fields(&name);
        let mut first_field = true;
        for desc in fields {
            if let Some(visible) = visible {
                if !visible.iter().any(|f| f == &desc.name) {
                    continue;
                }
            }
            out.push((desc.clone(), first_field && visible.is_some()));
            first_field = false;
        }
        current = supertype.clone();
    }
    Ok(out)
}

/// A type that declares its own wire format. The sink positions the stream
/// right after the type token; the serializer writes the remaining payload.
pub trait CustomFieldSerializer: Send + Sync {
    fn serialize(&self, sink: &mut EncoderSink<'_>, value: &RpcValue) -> Result<()>;
}

/// Typed serializer registry keyed by class name.
#[derive(Default)]
pub struct CustomSerializerRegistry {
    by_type: HashMap<String, Arc<dyn CustomFieldSerializer>>,
}

impl CustomSerializerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with the built-in JRE formats.
    pub fn with_builtins() -> Self {
        let mut reg = Self::new();
        reg.register("java.util.Date", Arc::new(DateSerializer));
        reg
    }

    pub fn register(&mut self, type_name: impl Into<String>, ser: Arc<dyn CustomFieldSerializer>) {
        self.by_type.insert(type_name.into(), ser);
    }

    pub fn get(&self, type_name: &str) -> Option<&Arc<dyn CustomFieldSerializer>> {
        self.by_type.get(type_name)
    }
}

/// `java.util.Date` crosses the wire as its epoch-millis long.
struct DateSerializer;

impl CustomFieldSerializer for DateSerializer {
    fn serialize(&self, sink: &mut EncoderSink<'_>, value: &RpcValue) -> Result<()> {
        match value {
            RpcValue::Object { fields, .. } => match fields.as_slice() {
                [RpcValue::Long(ms)] => sink.write_long(*ms),
                _ => Err(CrosswireError::Encoding(
                    "java.util.Date expects a single long field".into(),
                )),
            },
            _ => Err(CrosswireError::Encoding(
                "java.util.Date serializer given a non-object value".into(),
            )),
        }
    }
}

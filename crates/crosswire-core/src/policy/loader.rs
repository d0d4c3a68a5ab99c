//! Policy manifest parser (line-oriented `.gwt.rpc` grammar).
//!
//! Accepted line forms:
//! - `typeName,instantiableFlag` — short form; presence in the manifest
//!   whitelists the type for field serialization both ways, the flag gates
//!   instantiation only (abstract supertypes ship as `typeName,false`).
//! - `typeName,fieldSer,instantiableSer,fieldDeser,instantiableDeser,typeId`
//!   — long form, whitespace trimmed around each field.
//! - `@ClientFields,typeName,field1,field2,...` — marks a type that carries
//!   server-only extra fields; only the listed fields are client-visible.
//!
//! An entry with neither field flag set must be a service-interface marker
//! (its type id names the interface itself); anything else rejects the
//! manifest. Marker entries are how services are mapped to a policy id, so
//! the loader also returns the embedded service names.

use std::collections::HashMap;

use crate::error::{CrosswireError, Result};
use crate::policy::model::{SerializationPolicy, TypePolicy};

/// A parsed manifest: the whitelist plus the service interfaces embedded in
/// marker entries.
#[derive(Debug, Clone)]
pub struct LoadedPolicy {
    pub policy: SerializationPolicy,
    pub services: Vec<String>,
}

/// Parse the full manifest text.
pub fn load_manifest(text: &str) -> Result<LoadedPolicy> {
    let mut types: HashMap<String, TypePolicy> = HashMap::new();
    let mut client_fields: HashMap<String, Vec<String>> = HashMap::new();
    let mut services = Vec::new();

    for (lineno, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(rest) = line.strip_prefix("@ClientFields,") {
            let mut parts = rest.split(',').map(str::trim);
            let type_name = parts
                .next()
                .filter(|t| !t.is_empty())
                .ok_or_else(|| bad_line(lineno, "@ClientFields without a type name"))?;
            let fields: Vec<String> = parts.map(String::from).collect();
            client_fields.insert(type_name.to_string(), fields);
            continue;
        }

        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        let entry = match fields.as_slice() {
            [type_name, flag] => {
                let instantiable = parse_flag(lineno, flag)?;
                (
                    type_name.to_string(),
                    TypePolicy {
                        field_serializable: true,
                        field_deserializable: true,
                        instantiable_ser: instantiable,
                        instantiable_deser: instantiable,
                        type_id: type_name.to_string(),
                        client_fields: None,
                    },
                )
            }
            [type_name, f_ser, i_ser, f_deser, i_deser, type_id] => (
                type_name.to_string(),
                TypePolicy {
                    field_serializable: parse_flag(lineno, f_ser)?,
                    instantiable_ser: parse_flag(lineno, i_ser)?,
                    field_deserializable: parse_flag(lineno, f_deser)?,
                    instantiable_deser: parse_flag(lineno, i_deser)?,
                    type_id: type_id.to_string(),
                    client_fields: None,
                },
            ),
            _ => {
                return Err(bad_line(
                    lineno,
                    &format!("expected 2 or 6 fields, got {}", fields.len()),
                ))
            }
        };

        let (type_name, policy) = entry;
        if !policy.field_serializable && !policy.field_deserializable {
            // Only the service-interface marker may be neither serializable
            // nor deserializable: its type id names the interface itself.
            if policy.type_id != type_name {
                return Err(bad_line(
                    lineno,
                    &format!("type {type_name} is neither serializable nor a service marker"),
                ));
            }
            services.push(type_name.clone());
        }
        types.insert(type_name, policy);
    }

    for (type_name, fields) in client_fields {
        match types.get_mut(&type_name) {
            Some(entry) => entry.client_fields = Some(fields),
            None => {
                return Err(CrosswireError::PolicyLoad(format!(
                    "@ClientFields for unknown type {type_name}"
                )))
            }
        }
    }

    Ok(LoadedPolicy {
        policy: SerializationPolicy::new(types),
        services,
    })
}

fn parse_flag(lineno: usize, s: &str) -> Result<bool> {
    match s {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(bad_line(lineno, &format!("bad flag value: {other:?}"))),
    }
}

fn bad_line(lineno: usize, msg: &str) -> CrosswireError {
    CrosswireError::PolicyLoad(format!("line {}: {msg}", lineno + 1))
}

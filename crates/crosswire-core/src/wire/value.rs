//! Typed value model of the wire grammar.
//!
//! `RpcType` is the declared (static) type of a method argument or field;
//! `RpcValue` is the runtime value flowing through the encoder. This table-
//! driven model replaces the original's reflection walks: field layout comes
//! from the registry (`wire::registry`), never from runtime metadata.

use crate::error::{CrosswireError, Result};

/// Declared type of an argument, field, or return value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RpcType {
    Bool,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
    String,
    /// Java array with a fixed element type, e.g. `int[]`.
    Array(Box<RpcType>),
    /// Any class type, referenced by fully-qualified name. Container-family
    /// classes (`java.util.*`) are `Object` types with dynamic elements.
    Object(String),
}

impl RpcType {
    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            RpcType::Bool
                | RpcType::Byte
                | RpcType::Char
                | RpcType::Short
                | RpcType::Int
                | RpcType::Long
                | RpcType::Float
                | RpcType::Double
        )
    }

    /// JNI-style token used for primitives in the method signature section.
    pub fn primitive_token(&self) -> Option<&'static str> {
        match self {
            RpcType::Bool => Some("Z"),
            RpcType::Byte => Some("B"),
            RpcType::Char => Some("C"),
            RpcType::Short => Some("S"),
            RpcType::Int => Some("I"),
            RpcType::Long => Some("J"),
            RpcType::Float => Some("F"),
            RpcType::Double => Some("D"),
            _ => None,
        }
    }

    /// The local (binary) class name, e.g. `[I` for `int[]` or
    /// `[Ljava.lang.String;` for `String[]`.
    pub fn binary_name(&self) -> String {
        match self {
            RpcType::Bool => "Z".into(),
            RpcType::Byte => "B".into(),
            RpcType::Char => "C".into(),
            RpcType::Short => "S".into(),
            RpcType::Int => "I".into(),
            RpcType::Long => "J".into(),
            RpcType::Float => "F".into(),
            RpcType::Double => "D".into(),
            RpcType::String => "java.lang.String".into(),
            RpcType::Array(elem) => match elem.as_ref() {
                e if e.is_primitive() => format!("[{}", e.binary_name()),
                RpcType::Array(_) => format!("[{}", elem.binary_name()),
                RpcType::String => "[Ljava.lang.String;".into(),
                RpcType::Object(name) => format!("[L{name};"),
                _ => format!("[L{};", elem.binary_name()),
            },
            RpcType::Object(name) => name.clone(),
        }
    }
}

/// Runtime value carried by an invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum RpcValue {
    Null,
    Bool(bool),
    Byte(i8),
    Char(char),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
    /// Java array: fixed element type, length-prefixed on the wire.
    Array { elem: RpcType, items: Vec<RpcValue> },
    /// `java.util` collection/map family: length-prefixed, dynamic elements.
    /// Map entries are flattened as alternating key/value items.
    Collection {
        type_name: String,
        items: Vec<RpcValue>,
    },
    /// Plain object: field values in registry walk order (own fields first,
    /// then supertype fields).
    Object {
        type_name: String,
        fields: Vec<RpcValue>,
    },
    Enum {
        type_name: String,
        constant: String,
        ordinal: i32,
    },
    /// Error/exception types cross the wire as message text only.
    Exception {
        type_name: String,
        message: Option<String>,
    },
}

/// Wire-visible signatures of well-known JRE types. These are part of the
/// fixed protocol surface; unknown types get their signature from the policy
/// or the field-table registry.
const BUILTIN_SIGNATURES: &[(&str, &str)] = &[
    ("java.lang.String", "java.lang.String/2004016611"),
    ("java.lang.Integer", "java.lang.Integer/3438268394"),
    ("java.lang.Long", "java.lang.Long/4227064769"),
    ("java.lang.Short", "java.lang.Short/551743396"),
    ("java.lang.Byte", "java.lang.Byte/1571082439"),
    ("java.lang.Boolean", "java.lang.Boolean/476441737"),
    ("java.lang.Double", "java.lang.Double/858496421"),
    ("java.lang.Float", "java.lang.Float/1718559123"),
    ("java.lang.Character", "java.lang.Character/2663399736"),
    ("java.util.ArrayList", "java.util.ArrayList/4159755760"),
    ("java.util.LinkedList", "java.util.LinkedList/3953877921"),
    ("java.util.Vector", "java.util.Vector/3057315478"),
    ("java.util.HashSet", "java.util.HashSet/3273092938"),
    ("java.util.HashMap", "java.util.HashMap/1797211028"),
    ("java.util.LinkedHashMap", "java.util.LinkedHashMap/3008245022"),
    ("java.util.Date", "java.util.Date/3385151746"),
    ("[I", "[I/2970817851"),
    ("[J", "[J/2845826458"),
    ("[Z", "[Z/3226265864"),
    ("[B", "[B/3308590456"),
    ("[S", "[S/2527318155"),
    ("[C", "[C/2127925939"),
    ("[F", "[F/1839694005"),
    ("[D", "[D/2961165253"),
    ("[Ljava.lang.String;", "[Ljava.lang.String;/2600011424"),
];

/// Look up the fixed signature of a well-known JRE type.
pub fn builtin_signature(binary_name: &str) -> Option<&'static str> {
    BUILTIN_SIGNATURES
        .iter()
        .find(|(name, _)| *name == binary_name)
        .map(|(_, sig)| *sig)
}

/// Container-family classes subject to the legacy signature override. Kept
/// deliberately narrow: the `java.util` collection/map family only.
const CONTAINER_CLASSES: &[&str] = &[
    "java.util.ArrayList",
    "java.util.LinkedList",
    "java.util.Vector",
    "java.util.Stack",
    "java.util.HashSet",
    "java.util.LinkedHashSet",
    "java.util.TreeSet",
    "java.util.HashMap",
    "java.util.IdentityHashMap",
    "java.util.LinkedHashMap",
    "java.util.TreeMap",
    "java.util.Arrays$ArrayList",
    "java.util.Collections$EmptyList",
    "java.util.Collections$EmptyMap",
    "java.util.Collections$EmptySet",
    "java.util.Collections$SingletonList",
];

/// Whether a class belongs to the container family.
pub fn is_container(type_name: &str) -> bool {
    CONTAINER_CLASSES.contains(&type_name)
}

/// Parse a binary class name back into a declared type. Inverse of
/// [`RpcType::binary_name`] for the names the encoder emits.
pub fn type_from_binary_name(name: &str) -> Result<RpcType> {
    match name {
        "Z" => return Ok(RpcType::Bool),
        "B" => return Ok(RpcType::Byte),
        "C" => return Ok(RpcType::Char),
        "S" => return Ok(RpcType::Short),
        "I" => return Ok(RpcType::Int),
        "J" => return Ok(RpcType::Long),
        "F" => return Ok(RpcType::Float),
        "D" => return Ok(RpcType::Double),
        "java.lang.String" => return Ok(RpcType::String),
        _ => {}
    }
    if let Some(rest) = name.strip_prefix('[') {
        let elem = if let Some(class) = rest.strip_prefix('L').and_then(|r| r.strip_suffix(';')) {
            if class == "java.lang.String" {
                RpcType::String
            } else {
                RpcType::Object(class.to_string())
            }
        } else {
            type_from_binary_name(rest)?
        };
        return Ok(RpcType::Array(Box::new(elem)));
    }
    Ok(RpcType::Object(name.to_string()))
}

/// Strip the structural hash from a wire signature, giving the local name.
pub fn signature_base(signature: &str) -> &str {
    signature.split('/').next().unwrap_or(signature)
}

/// Radix-64 digit alphabet of the long-integer token format.
const LONG_ALPHABET: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789$_";

/// Encode a long as a radix-64 token (most significant digit first, no
/// leading zero digits). Note the digit alignment differs from RFC 4648
/// base64: digits are positional from the least significant end.
pub fn encode_long(v: i64) -> String {
    let mut bits = v as u64;
    let mut digits = [0u8; 11];
    let mut n = 0;
    loop {
        digits[n] = LONG_ALPHABET[(bits & 0x3f) as usize];
        n += 1;
        bits >>= 6;
        if bits == 0 {
            break;
        }
    }
    digits[..n].iter().rev().map(|&b| b as char).collect()
}

/// Decode a radix-64 long token.
pub fn decode_long(token: &str) -> Result<i64> {
    if token.is_empty() || token.len() > 11 {
        return Err(CrosswireError::Protocol(format!(
            "bad long token: {token:?}"
        )));
    }
    let mut bits: u64 = 0;
    for b in token.bytes() {
        let digit = LONG_ALPHABET
            .iter()
            .position(|&a| a == b)
            .ok_or_else(|| CrosswireError::Protocol(format!("bad long digit: {}", b as char)))?;
        bits = (bits << 6) | digit as u64;
    }
    Ok(bits as i64)
}

/// Split a long into the two double components of the version-5 scheme:
/// `(low 32 bits, high 32 bits * 2^32)`, both non-negative.
pub fn long_as_doubles(v: i64) -> (f64, f64) {
    let bits = v as u64;
    let low = (bits & 0xffff_ffff) as f64;
    let high = ((bits >> 32) as u32 as f64) * 4_294_967_296.0;
    (low, high)
}

/// Recombine the version-5 double pair into a long.
pub fn long_from_doubles(low: f64, high: f64) -> i64 {
    let low = low as u64 & 0xffff_ffff;
    let high = ((high / 4_294_967_296.0) as u64) << 32;
    (high | low) as i64
}

/// Format a double the way the server-side reader expects: integral values
/// keep a trailing `.0`, non-finite values use the Java spellings.
pub fn fmt_double(v: f64) -> String {
    if v.is_nan() {
        return "NaN".into();
    }
    if v.is_infinite() {
        return if v > 0.0 { "Infinity".into() } else { "-Infinity".into() };
    }
    if v == v.trunc() && v.abs() < 1e15 {
        format!("{v:.1}")
    } else {
        format!("{v}")
    }
}

/// Float variant of [`fmt_double`]. Formats at `f32` precision so the token
/// matches the shortest single-precision spelling.
pub fn fmt_float(v: f32) -> String {
    if v.is_nan() {
        return "NaN".into();
    }
    if v.is_infinite() {
        return if v > 0.0 { "Infinity".into() } else { "-Infinity".into() };
    }
    if v == v.trunc() && v.abs() < 1e15 {
        format!("{v:.1}")
    } else {
        format!("{v}")
    }
}

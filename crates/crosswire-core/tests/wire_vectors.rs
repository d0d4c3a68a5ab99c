//! Wire-grammar vector tests: golden payloads and encode/read round trips.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use crosswire_core::error::ErrorKind;
use crosswire_core::policy::{load_manifest, SerializationPolicy};
use crosswire_core::wire::value::{decode_long, encode_long, long_as_doubles, long_from_doubles};
use crosswire_core::wire::{
    CustomSerializerRegistry, FieldDescriptor, FieldTableRegistry, ProtocolVersion,
    RequestContext, RpcType, RpcValue, TypeTable, WireEncoder, WireReader,
};

const BASE: &str = "http://ex.org/app/";
const POLICY_ID: &str = "policy123";
const SVC: &str = "com.ex.EchoService";

fn policy(manifest: &str) -> SerializationPolicy {
    load_manifest(manifest).unwrap().policy
}

fn ctx<'a>(method: &'a str, rpc_token: Option<&'a str>) -> RequestContext<'a> {
    RequestContext {
        module_base_url: BASE,
        policy_id: POLICY_ID,
        service_interface: SVC,
        method_name: method,
        rpc_token,
    }
}

fn encode(
    version: ProtocolVersion,
    policy: &SerializationPolicy,
    tables: &FieldTableRegistry,
    method: &str,
    rpc_token: Option<&str>,
    arg_types: &[RpcType],
    args: &[RpcValue],
) -> crosswire_core::Result<String> {
    let custom = CustomSerializerRegistry::with_builtins();
    let enc = WireEncoder::new(version, policy, tables, &custom);
    enc.encode_request(&ctx(method, rpc_token), arg_types, args)
}

#[test]
fn golden_echo_string() {
    let p = policy("");
    let tables = FieldTableRegistry::new();
    let payload = encode(
        ProtocolVersion::V7,
        &p,
        &tables,
        "echo",
        None,
        &[RpcType::String],
        &[RpcValue::String("hello".into())],
    )
    .unwrap();
    assert_eq!(
        payload,
        "7|0|6|http://ex.org/app/|policy123|com.ex.EchoService|echo|java.lang.String/2004016611|hello|1|2|3|4|1|5|6|"
    );
}

#[test]
fn golden_string_table_dedup() {
    let p = policy("");
    let tables = FieldTableRegistry::new();
    let payload = encode(
        ProtocolVersion::V7,
        &p,
        &tables,
        "echo",
        None,
        &[RpcType::String, RpcType::String],
        &[
            RpcValue::String("dup".into()),
            RpcValue::String("dup".into()),
        ],
    )
    .unwrap();
    // Both the repeated signature and the repeated value intern once.
    assert_eq!(
        payload,
        "7|0|6|http://ex.org/app/|policy123|com.ex.EchoService|echo|java.lang.String/2004016611|dup|1|2|3|4|2|5|5|6|6|"
    );
}

#[test]
fn golden_rpc_token_sets_flag_and_slot() {
    let p = policy("");
    let tables = FieldTableRegistry::new();
    let payload = encode(
        ProtocolVersion::V7,
        &p,
        &tables,
        "ping",
        Some("tok-9"),
        &[],
        &[],
    )
    .unwrap();
    // Flag bit 0x2, token interned between policy id and interface.
    assert_eq!(
        payload,
        "7|2|5|http://ex.org/app/|policy123|tok-9|com.ex.EchoService|ping|1|2|3|4|5|0|"
    );
}

#[test]
fn golden_legacy_container_signature_from_policy() {
    let p = policy("java.util.ArrayList,true,true,true,true,java.util.ArrayList/9876543210\n");
    let tables = FieldTableRegistry::new();
    let arg = RpcValue::Collection {
        type_name: "java.util.ArrayList".into(),
        items: vec![RpcValue::Int(7)],
    };
    let payload = encode(
        ProtocolVersion::V6,
        &p,
        &tables,
        "echo",
        None,
        &[RpcType::Object("java.util.ArrayList".into())],
        &[arg],
    )
    .unwrap();
    // The server-declared signature replaces the locally known one.
    assert_eq!(
        payload,
        "6|0|6|http://ex.org/app/|policy123|com.ex.EchoService|echo|java.util.ArrayList/9876543210|java.lang.Integer/3438268394|1|2|3|4|1|5|5|1|6|7|"
    );
}

#[test]
fn current_version_ignores_container_override() {
    let p = policy("java.util.ArrayList,true,true,true,true,java.util.ArrayList/9876543210\n");
    let tables = FieldTableRegistry::new();
    let arg = RpcValue::Collection {
        type_name: "java.util.ArrayList".into(),
        items: vec![RpcValue::Int(7)],
    };
    let payload = encode(
        ProtocolVersion::V7,
        &p,
        &tables,
        "echo",
        None,
        &[RpcType::Object("java.util.ArrayList".into())],
        &[arg],
    )
    .unwrap();
    assert_eq!(
        payload,
        "7|0|6|http://ex.org/app/|policy123|com.ex.EchoService|echo|java.util.ArrayList/4159755760|java.lang.Integer/3438268394|1|2|3|4|1|5|5|1|6|7|"
    );
}

#[test]
fn golden_long_as_doubles_v5() {
    let p = policy("");
    let tables = FieldTableRegistry::new();
    let payload = encode(
        ProtocolVersion::V5,
        &p,
        &tables,
        "setStamp",
        None,
        &[RpcType::Long],
        &[RpcValue::Long(4_294_967_297)],
    )
    .unwrap();
    // 2^32 + 1 splits into low-then-high double components.
    assert_eq!(
        payload,
        "5|0|5|http://ex.org/app/|policy123|com.ex.EchoService|setStamp|J|1|2|3|4|1|5|1.0|4294967296.0|"
    );
}

#[test]
fn golden_long_radix64_v7() {
    let p = policy("");
    let tables = FieldTableRegistry::new();
    let payload = encode(
        ProtocolVersion::V7,
        &p,
        &tables,
        "setStamp",
        None,
        &[RpcType::Long],
        &[RpcValue::Long(4_294_967_297)],
    )
    .unwrap();
    assert_eq!(
        payload,
        "7|0|5|http://ex.org/app/|policy123|com.ex.EchoService|setStamp|J|1|2|3|4|1|5|EAAAAB|"
    );
}

#[test]
fn long_radix64_digits() {
    assert_eq!(encode_long(0), "A");
    assert_eq!(encode_long(1), "B");
    assert_eq!(encode_long(123_456_789), "HW80V");
    // -1 is all-ones: 10 full digits plus a 4-bit top digit.
    assert_eq!(encode_long(-1), "P__________");

    for v in [0, 1, -1, 63, 64, i64::MAX, i64::MIN, 123_456_789] {
        assert_eq!(decode_long(&encode_long(v)).unwrap(), v, "v={v}");
    }
    assert!(decode_long("").is_err());
    assert!(decode_long("*").is_err());
}

#[test]
fn long_double_split() {
    for v in [0, 1, -1, i64::MAX, i64::MIN, 4_294_967_297] {
        let (low, high) = long_as_doubles(v);
        assert!(low >= 0.0 && high >= 0.0, "v={v}");
        assert_eq!(long_from_doubles(low, high), v, "v={v}");
    }
}

#[test]
fn golden_client_fields_placeholder() {
    let p = policy(
        "com.ex.Person,true,true,true,true,com.ex.Person/111\n\
         @ClientFields,com.ex.Person,name\n",
    );
    let mut tables = FieldTableRegistry::new();
    tables.register(TypeTable::object(
        "com.ex.Person",
        Some("com.ex.Person/111".into()),
        vec![
            FieldDescriptor::new("name", RpcType::String),
            FieldDescriptor::new("age", RpcType::Int),
        ],
        None,
    ));
    let arg = RpcValue::Object {
        type_name: "com.ex.Person".into(),
        fields: vec![RpcValue::String("Ada".into())],
    };
    let payload = encode(
        ProtocolVersion::V7,
        &p,
        &tables,
        "save",
        None,
        &[RpcType::Object("com.ex.Person".into())],
        &[arg],
    )
    .unwrap();
    // Server-only `age` dropped; one null slot before the visible fields.
    assert_eq!(
        payload,
        "7|0|6|http://ex.org/app/|policy123|com.ex.EchoService|save|com.ex.Person/111|Ada|1|2|3|4|1|5|5|0|6|"
    );
}

#[test]
fn rejects_type_absent_from_policy() {
    let p = policy("");
    let tables = FieldTableRegistry::new();
    let arg = RpcValue::Object {
        type_name: "com.ex.Secret".into(),
        fields: vec![],
    };
    let err = encode(
        ProtocolVersion::V7,
        &p,
        &tables,
        "leak",
        None,
        &[RpcType::Object("com.ex.Secret".into())],
        &[arg],
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Encoding);
    assert!(err.to_string().contains("com.ex.Secret"));
}

#[test]
fn rejects_type_not_field_serializable() {
    let p = policy("com.ex.Secret,false,true,true,true,com.ex.Secret/1\n");
    let tables = FieldTableRegistry::new();
    let arg = RpcValue::Object {
        type_name: "com.ex.Secret".into(),
        fields: vec![],
    };
    let err = encode(
        ProtocolVersion::V7,
        &p,
        &tables,
        "leak",
        None,
        &[RpcType::Object("com.ex.Secret".into())],
        &[arg],
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Encoding);
    assert!(err.to_string().contains("not field-serializable"));
}

#[test]
fn rejects_arity_mismatch() {
    let p = policy("");
    let tables = FieldTableRegistry::new();
    let err = encode(
        ProtocolVersion::V7,
        &p,
        &tables,
        "echo",
        None,
        &[RpcType::String],
        &[],
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Encoding);
}

#[test]
fn rejects_field_count_mismatch() {
    let p = policy("com.ex.Person,true,true,true,true,com.ex.Person/111\n");
    let mut tables = FieldTableRegistry::new();
    tables.register(TypeTable::object(
        "com.ex.Person",
        Some("com.ex.Person/111".into()),
        vec![
            FieldDescriptor::new("name", RpcType::String),
            FieldDescriptor::new("age", RpcType::Int),
        ],
        None,
    ));
    let arg = RpcValue::Object {
        type_name: "com.ex.Person".into(),
        fields: vec![RpcValue::String("Ada".into())],
    };
    let err = encode(
        ProtocolVersion::V7,
        &p,
        &tables,
        "save",
        None,
        &[RpcType::Object("com.ex.Person".into())],
        &[arg],
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Encoding);
    assert!(err.to_string().contains("2 client-visible fields"));
}

fn roundtrip(
    version: ProtocolVersion,
    p: &SerializationPolicy,
    tables: &FieldTableRegistry,
    arg_types: &[RpcType],
    args: &[RpcValue],
) {
    let payload = encode(version, p, tables, "call", None, arg_types, args).unwrap();
    let (env, reader) = WireReader::from_request(&payload).unwrap();
    assert_eq!(env.version, version);
    assert_eq!(env.arg_signatures.len(), arg_types.len());
    let mut reader = reader.with_tables(tables).with_policy(p);
    for (ty, expected) in arg_types.iter().zip(args) {
        let got = reader.read_value(ty).unwrap();
        assert_eq!(&got, expected, "type={ty:?}");
    }
}

#[test]
fn roundtrip_scalars() {
    let p = policy("");
    let tables = FieldTableRegistry::new();
    roundtrip(
        ProtocolVersion::V7,
        &p,
        &tables,
        &[
            RpcType::Bool,
            RpcType::Byte,
            RpcType::Char,
            RpcType::Short,
            RpcType::Int,
            RpcType::Long,
            RpcType::Float,
            RpcType::Double,
            RpcType::String,
        ],
        &[
            RpcValue::Bool(true),
            RpcValue::Byte(-7),
            RpcValue::Char('Z'),
            RpcValue::Short(-300),
            RpcValue::Int(1_000_000),
            RpcValue::Long(-9_876_543_210),
            RpcValue::Float(1.5),
            RpcValue::Double(-2.25),
            RpcValue::String("héllo|world".into()),
        ],
    );
}

#[test]
fn roundtrip_long_v5() {
    let p = policy("");
    let tables = FieldTableRegistry::new();
    roundtrip(
        ProtocolVersion::V5,
        &p,
        &tables,
        &[RpcType::Long, RpcType::Long],
        &[RpcValue::Long(i64::MIN), RpcValue::Long(42)],
    );
}

#[test]
fn roundtrip_envelope_header() {
    let p = policy("");
    let tables = FieldTableRegistry::new();
    let payload = encode(
        ProtocolVersion::V7,
        &p,
        &tables,
        "ping",
        Some("tok"),
        &[],
        &[],
    )
    .unwrap();
    let (env, _) = WireReader::from_request(&payload).unwrap();
    assert_eq!(env.module_base_url, BASE);
    assert_eq!(env.policy_id, POLICY_ID);
    assert_eq!(env.rpc_token.as_deref(), Some("tok"));
    assert_eq!(env.service_interface, SVC);
    assert_eq!(env.method_name, "ping");
    assert_eq!(env.flags, 2);
}

#[test]
fn roundtrip_int_array() {
    let p = policy("[I,true,true,true,true,[I/2970817851\n");
    let tables = FieldTableRegistry::new();
    roundtrip(
        ProtocolVersion::V7,
        &p,
        &tables,
        &[RpcType::Array(Box::new(RpcType::Int))],
        &[RpcValue::Array {
            elem: RpcType::Int,
            items: vec![RpcValue::Int(1), RpcValue::Int(-2), RpcValue::Int(3)],
        }],
    );
}

#[test]
fn roundtrip_string_array_with_null_slot() {
    let p = policy("[Ljava.lang.String;,true,true,true,true,[Ljava.lang.String;/2600011424\n");
    let tables = FieldTableRegistry::new();
    roundtrip(
        ProtocolVersion::V7,
        &p,
        &tables,
        &[RpcType::Array(Box::new(RpcType::String))],
        &[RpcValue::Array {
            elem: RpcType::String,
            items: vec![RpcValue::String("a".into()), RpcValue::Null],
        }],
    );
}

#[test]
fn roundtrip_collection_mixed() {
    let p = policy("java.util.ArrayList,true,true,true,true,java.util.ArrayList/4159755760\n");
    let tables = FieldTableRegistry::new();
    roundtrip(
        ProtocolVersion::V7,
        &p,
        &tables,
        &[RpcType::Object("java.util.ArrayList".into())],
        &[RpcValue::Collection {
            type_name: "java.util.ArrayList".into(),
            items: vec![
                RpcValue::Int(1),
                RpcValue::String("x".into()),
                RpcValue::Null,
            ],
        }],
    );
}

#[test]
fn roundtrip_object_graph_with_supertype() {
    let p = policy(
        "com.ex.Person,true,true,true,true,com.ex.Person/1146469838\n\
         com.ex.Entity,true,true,true,true,com.ex.Entity/2134356109\n",
    );
    let mut tables = FieldTableRegistry::new();
    tables.register(TypeTable::object(
        "com.ex.Person",
        Some("com.ex.Person/1146469838".into()),
        vec![
            FieldDescriptor::new("name", RpcType::String),
            FieldDescriptor::new("age", RpcType::Int),
        ],
        Some("com.ex.Entity".into()),
    ));
    tables.register(TypeTable::object(
        "com.ex.Entity",
        Some("com.ex.Entity/2134356109".into()),
        vec![FieldDescriptor::new("id", RpcType::Long)],
        None,
    ));
    roundtrip(
        ProtocolVersion::V7,
        &p,
        &tables,
        &[RpcType::Object("com.ex.Person".into())],
        &[RpcValue::Object {
            type_name: "com.ex.Person".into(),
            fields: vec![
                RpcValue::String("Ada".into()),
                RpcValue::Int(36),
                RpcValue::Long(99),
            ],
        }],
    );
}

#[test]
fn supertype_listed_short_form_false_still_contributes_fields() {
    // An abstract supertype appears in the manifest as `typeName,false`:
    // non-instantiable, but its fields must still be walked when a
    // concrete subclass is encoded.
    let p = policy(
        "com.ex.Person,true,true,true,true,com.ex.Person/1146469838\n\
         com.ex.Entity,false\n",
    );
    let mut tables = FieldTableRegistry::new();
    tables.register(TypeTable::object(
        "com.ex.Person",
        Some("com.ex.Person/1146469838".into()),
        vec![
            FieldDescriptor::new("name", RpcType::String),
            FieldDescriptor::new("age", RpcType::Int),
        ],
        Some("com.ex.Entity".into()),
    ));
    tables.register(TypeTable::object(
        "com.ex.Entity",
        None,
        vec![FieldDescriptor::new("id", RpcType::Long)],
        None,
    ));
    roundtrip(
        ProtocolVersion::V7,
        &p,
        &tables,
        &[RpcType::Object("com.ex.Person".into())],
        &[RpcValue::Object {
            type_name: "com.ex.Person".into(),
            fields: vec![
                RpcValue::String("Ada".into()),
                RpcValue::Int(36),
                RpcValue::Long(99),
            ],
        }],
    );
}

#[test]
fn roundtrip_enum_constant() {
    let p = policy("com.ex.Color,true,true,true,true,com.ex.Color/1539052183\n");
    let mut tables = FieldTableRegistry::new();
    tables.register(TypeTable::enumeration(
        "com.ex.Color",
        Some("com.ex.Color/1539052183".into()),
        vec!["RED".into(), "GREEN".into(), "BLUE".into()],
    ));
    roundtrip(
        ProtocolVersion::V7,
        &p,
        &tables,
        &[RpcType::Object("com.ex.Color".into())],
        &[RpcValue::Enum {
            type_name: "com.ex.Color".into(),
            constant: "GREEN".into(),
            ordinal: 1,
        }],
    );
}

#[test]
fn roundtrip_exception_message_only() {
    let p = policy("com.ex.AppException,true,true,true,true,com.ex.AppException/903517559\n");
    let mut tables = FieldTableRegistry::new();
    tables.register(TypeTable::exception(
        "com.ex.AppException",
        Some("com.ex.AppException/903517559".into()),
    ));
    roundtrip(
        ProtocolVersion::V7,
        &p,
        &tables,
        &[RpcType::Object("com.ex.AppException".into())],
        &[RpcValue::Exception {
            type_name: "com.ex.AppException".into(),
            message: Some("boom".into()),
        }],
    );
}

#[test]
fn roundtrip_date_epoch_millis() {
    let p = policy("java.util.Date,true,true,true,true,java.util.Date/3385151746\n");
    let tables = FieldTableRegistry::new();
    roundtrip(
        ProtocolVersion::V7,
        &p,
        &tables,
        &[RpcType::Object("java.util.Date".into())],
        &[RpcValue::Object {
            type_name: "java.util.Date".into(),
            fields: vec![RpcValue::Long(1_700_000_000_000)],
        }],
    );
}

#[test]
fn roundtrip_null_object() {
    let p = policy("");
    let tables = FieldTableRegistry::new();
    roundtrip(
        ProtocolVersion::V7,
        &p,
        &tables,
        &[RpcType::Object("com.ex.Person".into())],
        &[RpcValue::Null],
    );
}

#[test]
fn reader_rejects_untruncated_payload() {
    assert!(WireReader::from_request("7|0|0|1").is_err());
    assert!(WireReader::from_request("9|0|0|").is_err());
}

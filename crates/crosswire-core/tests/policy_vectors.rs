//! Policy manifest vector tests: grammar acceptance, rejection, and the
//! registry merge semantics.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::fs;

use crosswire_core::error::ErrorKind;
use crosswire_core::policy::{load_manifest, PolicyStore};

fn load(name: &str) -> String {
    fs::read_to_string(format!("tests/vectors/{name}")).unwrap()
}

#[test]
fn parse_account_manifest() {
    let loaded = load_manifest(&load("account.gwt.rpc")).unwrap();
    assert_eq!(loaded.services, vec!["com.ex.AccountService"]);
    assert_eq!(loaded.policy.len(), 6);

    let person = loaded.policy.entry("com.ex.Person").unwrap();
    assert!(person.field_serializable && person.field_deserializable);
    assert_eq!(person.type_id, "com.ex.Person/1146469838");
    assert_eq!(
        loaded.policy.client_fields("com.ex.Person").unwrap(),
        ["name".to_string(), "age".to_string()]
    );

    // Short form: presence whitelists the fields, the flag gates
    // instantiation.
    let color = loaded.policy.entry("com.ex.Color").unwrap();
    assert!(color.field_serializable);
    assert!(color.instantiable_deser);
    assert_eq!(color.type_id, "com.ex.Color");

    // Types without a @ClientFields line expose all fields.
    assert!(loaded.policy.client_fields("com.ex.Entity").is_none());
}

#[test]
fn whitespace_and_blank_lines_tolerated() {
    let loaded = load_manifest(
        "  com.ex.Thing , true , true , true , true , com.ex.Thing/42  \n\n\n",
    )
    .unwrap();
    assert_eq!(
        loaded.policy.type_id("com.ex.Thing").unwrap(),
        "com.ex.Thing/42"
    );
    assert!(loaded.services.is_empty());
}

#[test]
fn short_form_false_stays_whitelisted_not_a_service_marker() {
    // Abstract supertypes ship as `typeName,false`: their fields still
    // cross the wire, only instantiation is denied.
    let loaded = load_manifest("com.ex.AbstractBase,false\n").unwrap();
    assert!(loaded.services.is_empty());

    let base = loaded.policy.entry("com.ex.AbstractBase").unwrap();
    assert!(base.field_serializable && base.field_deserializable);
    assert!(!base.instantiable_ser && !base.instantiable_deser);
}

#[test]
fn rejects_bad_flag() {
    let err = load_manifest("com.ex.Thing,yes\n").unwrap_err();
    assert_eq!(err.kind().as_str(), "POLICY_LOAD");
    assert!(err.to_string().contains("line 1"));
}

#[test]
fn rejects_wrong_field_count() {
    let err = load_manifest("com.ex.Thing,true,true\n").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PolicyLoad);
    assert!(err.to_string().contains("expected 2 or 6"));
}

#[test]
fn rejects_non_marker_without_capabilities() {
    // Neither field flag set, yet the type id is not the interface name:
    // not a valid service marker.
    let err =
        load_manifest("com.ex.Thing,false,false,false,false,com.ex.Thing/123\n").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PolicyLoad);
    assert!(err.to_string().contains("service marker"));
}

#[test]
fn rejects_client_fields_for_unknown_type() {
    let err = load_manifest("@ClientFields,com.ex.Ghost,name\n").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PolicyLoad);
    assert!(err.to_string().contains("com.ex.Ghost"));
}

#[test]
fn line_numbers_are_one_based() {
    let err = load_manifest("com.ex.Ok,true\n\ncom.ex.Bad,maybe\n").unwrap_err();
    assert!(err.to_string().contains("line 3"));
}

#[test]
fn store_registers_both_naming_forms() {
    let store = PolicyStore::new();
    store.install("P1", load_manifest(&load("account.gwt.rpc")).unwrap());

    assert_eq!(store.policy_id_for("com.ex.AccountService").as_deref(), Some("P1"));
    assert_eq!(
        store.policy_id_for("com.ex.AccountServiceAsync").as_deref(),
        Some("P1")
    );
    assert!(store.policy_id_for("com.ex.Unknown").is_none());
    assert!(store.policy("P1").is_some());
}

#[test]
fn store_merge_writer_wins_without_erasing_others() {
    let store = PolicyStore::new();
    store.install("P1", load_manifest(&load("account.gwt.rpc")).unwrap());
    store.install("P2", load_manifest(&load("reports.gwt.rpc")).unwrap());

    // Distinct services from distinct manifests coexist.
    assert_eq!(store.policy_id_for("com.ex.AccountService").as_deref(), Some("P1"));
    assert_eq!(store.policy_id_for("com.ex.ReportService").as_deref(), Some("P2"));

    // A re-fetch that names an already-known service overwrites its mapping
    // but leaves unmentioned services alone.
    store.install("P3", load_manifest(&load("account.gwt.rpc")).unwrap());
    assert_eq!(store.policy_id_for("com.ex.AccountService").as_deref(), Some("P3"));
    assert_eq!(store.policy_id_for("com.ex.ReportService").as_deref(), Some("P2"));
}

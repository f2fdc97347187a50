//! Integration tests for INSERT/UPDATE/SELECT clause derivation.

#![allow(missing_docs)]

mod common;

use common::{Contractor, Delivery, Dispatch, Gauge, Note, ProposalTask, Proposal, PurchaseOrder};
use omnia_orm::{
    Error, Key, Persistable, RefValue, Value, insert_clause, select_clause, update_clause,
};

fn proposal() -> Proposal {
    let mut proposal = Proposal::sample(Some(Contractor::with_key(Key::of("sc_key", 1))));
    proposal.set_key(Key::of("pri_key", 233));
    proposal.prop_name = Some("TestingName".to_string());
    proposal
}

// SELECT tests

#[test]
fn select_proposal() {
    assert_eq!(
        select_clause::<Proposal>(&[]),
        r#"sc_key,dist as "distance",prop_date,prop_id,proposal_name as "prop_name",submit_deadline"#
    );
}

#[test]
fn select_note_with_custom_column() {
    assert_eq!(
        select_clause::<Note>(&["n_key"]),
        r#"n_key,note_date as "date_taken",additional as "extra",note as "note_content",progress_id"#
    );
}

#[test]
fn select_purchase_order() {
    // labeled references contribute nothing, a reference to a type without a
    // primary key falls back to `<member>_id`
    assert_eq!(
        select_clause::<PurchaseOrder>(&[]),
        r#"some_fake_field as "fake_field",long_id as "long_id",n_key,po_number_id as "po_number_id",primitive_id as "primitive_example_id",requester as "requester",supplier_id"#
    );
}

// INSERT tests

#[test]
fn insert_proposal() {
    let insert = insert_clause(&proposal()).unwrap();

    assert_eq!(
        insert.clause(),
        "(sc_key,dist,prop_date,prop_id,proposal_name,submit_deadline) VALUES (?,?,?,?,?,?)"
    );
    assert_eq!(insert.values().len(), 6);
    assert_eq!(insert.values()[0], Value::BigInt(Some(1)));
    assert_eq!(insert.values()[1], Value::Int(Some(344)));
    assert_eq!(insert.values()[4], Value::from("TestingName"));
}

#[test]
fn insert_omits_unset_reference() {
    let proposal = Proposal::sample(None);
    let insert = insert_clause(&proposal).unwrap();

    assert_eq!(
        insert.clause(),
        "(dist,prop_date,prop_id,proposal_name,submit_deadline) VALUES (?,?,?,?,?)"
    );
}

#[test]
fn insert_omits_unsaved_reference() {
    let proposal = Proposal::sample(Some(Contractor::named("Acme")));
    let insert = insert_clause(&proposal).unwrap();
    assert!(!insert.clause().contains("sc_key"));
}

#[test]
fn insert_purchase_order() {
    let order = PurchaseOrder {
        requester: Some("Requester Name".to_string()),
        ..PurchaseOrder::with_key(Key::of("id", 233))
    };
    let insert = insert_clause(&order).unwrap();

    assert_eq!(
        insert.clause(),
        "(some_fake_field,long_id,po_number_id,primitive_id,requester) VALUES (?,?,?,?,?)"
    );
    // unset scalars are bound as NULL
    assert_eq!(insert.values()[1], Value::BigInt(None));
    assert_eq!(insert.values()[4], Value::from("Requester Name"));
}

#[test]
fn insert_labeled_reference() {
    let delivery = Delivery {
        tracking: Some("TRK-1".to_string()),
        supplier_ref: Some(RefValue::new("Bolts Ltd", "supplier_id", 3)),
        ..Delivery::default()
    };
    let insert = insert_clause(&delivery).unwrap();

    assert_eq!(insert.clause(), "(supplier_id,tracking) VALUES (?,?)");
    assert_eq!(insert.values()[0], Value::BigInt(Some(3)));
}

#[test]
fn insert_incomplete_labeled_reference() {
    let order = PurchaseOrder {
        supplier_ref_invalid: Some(RefValue::new("Bolts Ltd", "supplier_id", 3)),
        ..PurchaseOrder::default()
    };

    let Err(Error::Configuration(message)) = insert_clause(&order) else {
        panic!("should fail with a configuration error");
    };
    assert!(message.contains("PurchaseOrder.supplier_ref_invalid"), "{message}");
}

#[test]
fn insert_labeled_reference_with_label_override() {
    // the override names the label, the value column is still written
    let dispatch = Dispatch {
        supplier_ref: Some(RefValue::new("Bolts Ltd", "supplier_id", 3)),
        ..Dispatch::default()
    };
    let insert = insert_clause(&dispatch).unwrap();

    assert_eq!(insert.clause(), "(supplier_id) VALUES (?)");
    assert_eq!(insert.values(), [Value::BigInt(Some(3))]);
}

#[test]
fn insert_labeled_reference_without_value_column() {
    let order = PurchaseOrder {
        supplier_ref_invalid_again: Some(RefValue::new("Bolts Ltd", "supplier_id", 3)),
        ..PurchaseOrder::default()
    };

    let Err(Error::Configuration(message)) = insert_clause(&order) else {
        panic!("should fail with a configuration error");
    };
    assert!(message.contains("PurchaseOrder.supplier_ref_invalid_again"), "{message}");
}

#[test]
fn insert_nothing_bound() {
    let Err(Error::Configuration(message)) = insert_clause(&ProposalTask::default()) else {
        panic!("should fail with a configuration error");
    };
    assert_eq!(message, "nothing to insert for ProposalTask");
}

// UPDATE tests

#[test]
fn update_proposal() {
    let update = update_clause(&proposal()).unwrap();

    assert_eq!(
        update.clause(),
        "SET sc_key=?,dist=?,prop_date=?,prop_id=?,proposal_name=?,submit_deadline=? WHERE pri_key=?"
    );
    assert_eq!(update.values().len(), 7);
    assert_eq!(update.values().last(), Some(&Value::BigInt(Some(233))));
}

#[test]
fn update_purchase_order() {
    let order = PurchaseOrder {
        note: Some(Note::default()),
        ..PurchaseOrder::with_key(Key::of("id", 233))
    };
    let update = update_clause(&order).unwrap();

    assert_eq!(
        update.clause(),
        "SET some_fake_field=?,long_id=?,po_number_id=?,primitive_id=?,requester=? WHERE id=?"
    );
}

#[test]
fn update_labeled_reference_with_label_override() {
    let dispatch = Dispatch {
        supplier_ref: Some(RefValue::new("Bolts Ltd", "supplier_id", 3)),
        ..Dispatch::with_key(Key::of("dp_key", 8))
    };
    let update = update_clause(&dispatch).unwrap();

    assert_eq!(update.clause(), "SET supplier_id=? WHERE dp_key=?");
    assert_eq!(update.values(), [Value::BigInt(Some(3)), Value::BigInt(Some(8))]);
}

#[test]
fn update_labeled_reference_without_value_column() {
    let order = PurchaseOrder {
        supplier_ref_invalid_again: Some(RefValue::new("Bolts Ltd", "supplier_id", 3)),
        ..PurchaseOrder::with_key(Key::of("id", 233))
    };
    assert!(matches!(update_clause(&order), Err(Error::Configuration(_))));
}

#[test]
fn update_uses_primary_entry_of_composite_key() {
    let mut note = Note {
        note_content: Some("checked".to_string()),
        ..Note::default()
    };
    note.set_key(Key::of("n_key", 5).add("rev", 2));

    let update = update_clause(&note).unwrap();
    assert!(update.clause().ends_with("WHERE n_key=?"));
    assert_eq!(update.values().last(), Some(&Value::BigInt(Some(5))));
}

#[test]
fn update_without_key() {
    let Err(Error::Configuration(message)) = update_clause(&Proposal::sample(None)) else {
        panic!("should fail with a configuration error");
    };
    assert_eq!(message, "cannot update Proposal: key has no primary entry");
}

// Derive and runtime resolution

#[test]
fn derived_accessors_follow_mapping() {
    fn check<E: Persistable>(entity: &E) {
        for member in E::mapping().members() {
            let read = entity.read(member.name());
            assert_eq!(
                read.is_err(),
                member.is_skipped(),
                "{}.{} is skipped at runtime but not by the derive, or vice versa",
                E::mapping().entity(),
                member.name()
            );
        }
    }

    check(&proposal());
    check(&Gauge::default());
    check(&Dispatch::default());
    check(&PurchaseOrder::default());
}

#[test]
fn accessor_directives_from_derive() {
    let gauge = Gauge {
        active: Some(true),
        unit_count: Some(12),
        reading: Some(40),
        ..Gauge::default()
    };

    assert_eq!(select_clause::<Gauge>(&[]), r#"reading,units as "unit_count""#);
    let insert = insert_clause(&gauge).unwrap();
    assert_eq!(insert.clause(), "(reading,units) VALUES (?,?)");
    assert_eq!(insert.values(), [Value::BigInt(Some(40)), Value::Int(Some(12))]);
}

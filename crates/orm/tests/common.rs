//! Common test fixtures shared across integration tests.
#![allow(dead_code)]
#![allow(missing_docs)]

use chrono::{NaiveDate, NaiveDateTime};
use omnia_orm::{ConnectOptions, Key, Persistable, RefValue, SqliteExecutor};
use tracing_subscriber::EnvFilter;

// Common test entities used across multiple test files

#[derive(Debug, Clone, Default, PartialEq, Eq, Persistable)]
#[persist(primary_key = "sc_key")]
pub struct Contractor {
    pub key: Key,
    #[persist(column = "sc_name")]
    pub name: Option<String>,
    pub contact: Option<String>,
    pub phone1: Option<String>,
    pub fax: Option<String>,
    pub email: Option<String>,
}

impl Contractor {
    pub fn named(name: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            email: Some(format!("{}@example.com", name.to_lowercase())),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Persistable)]
#[persist(table = "est_proposal", primary_key = "pr_key")]
#[persist(accessor(name = "getDistance", column = "dist"))]
pub struct Proposal {
    pub key: Key,
    #[persist(column = "proposal_name")]
    pub prop_name: Option<String>,
    pub prop_date: Option<NaiveDateTime>,
    pub distance: Option<i32>,
    pub submit_deadline: Option<NaiveDate>,
    pub prop_id: Option<String>,
    #[persist(skip)]
    pub skip_me_iam_worthless: Option<String>,
    #[persist(reference)]
    pub contractor: Option<Contractor>,
    #[persist(skip)]
    pub tasks: Vec<ProposalTask>,
}

impl Proposal {
    pub fn sample(contractor: Option<Contractor>) -> Self {
        Self {
            prop_name: Some("Harbour bridge".to_string()),
            prop_date: NaiveDate::from_ymd_opt(2024, 1, 15).and_then(|d| d.and_hms_opt(10, 30, 45)),
            distance: Some(344),
            submit_deadline: NaiveDate::from_ymd_opt(2024, 3, 1),
            prop_id: Some("P-100".to_string()),
            contractor,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Persistable)]
#[persist(primary_key = "t_key")]
pub struct Task {
    pub key: Key,
    pub task_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Persistable)]
#[persist(primary_key = "pt_key")]
pub struct ProposalTask {
    pub key: Key,
    #[persist(reference)]
    pub task: Option<Task>,
    #[persist(reference)]
    pub proposal: Option<Proposal>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Persistable)]
#[persist(primary_key = "progress_id")]
pub struct Progress {
    pub key: Key,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Persistable)]
#[persist(primary_key = "n_key")]
pub struct Note {
    pub key: Key,
    #[persist(column = "note")]
    pub note_content: Option<String>,
    #[persist(column = "additional")]
    pub extra: Option<String>,
    #[persist(column = "note_date")]
    pub date_taken: Option<NaiveDate>,
    #[persist(reference, column = "progress_id")]
    pub progress: Option<Progress>,
    #[persist(skip)]
    pub no_good: Option<String>,
}

/// No declared primary key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Persistable)]
pub struct Supplier {
    pub key: Key,
    pub sup_name: Option<String>,
    pub contact: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Persistable)]
pub struct PurchaseOrder {
    pub key: Key,
    #[persist(column = "requester")]
    pub requester: Option<String>,
    #[persist(column = "po_number_id")]
    pub po_number_id: Option<i32>,
    #[persist(column = "primitive_id")]
    pub primitive_example_id: i32,
    #[persist(column = "long_id")]
    pub long_id: Option<i64>,
    #[persist(column = "some_fake_field")]
    pub fake_field: i32,
    #[persist(reference)]
    pub note: Option<Note>,
    #[persist(reference)]
    pub supplier: Option<Supplier>,
    #[persist(reference(value = "supplier_id", label = "sup_name"))]
    pub supplier_ref: Option<RefValue>,
    // missing label column
    #[persist(reference(value = "supplier_id"))]
    pub supplier_ref_invalid: Option<RefValue>,
    // missing value column
    #[persist(column = "supplier_id")]
    pub supplier_ref_invalid_again: Option<RefValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Persistable)]
#[persist(primary_key = "d_key")]
pub struct Delivery {
    pub key: Key,
    pub tracking: Option<String>,
    #[persist(reference(value = "supplier_id", label = "sup_name"))]
    pub supplier_ref: Option<RefValue>,
}

/// Labeled reference whose label comes from the column override.
#[derive(Debug, Clone, Default, PartialEq, Eq, Persistable)]
#[persist(primary_key = "dp_key")]
pub struct Dispatch {
    pub key: Key,
    #[persist(reference(value = "supplier_id"), column = "sup_name")]
    pub supplier_ref: Option<RefValue>,
}

/// Directives declared only through bean-style accessors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Persistable)]
#[persist(primary_key = "g_key")]
#[persist(accessor(name = "isActive", skip), accessor(name = "getUnitCount", column = "units"))]
pub struct Gauge {
    pub key: Key,
    pub active: Option<bool>,
    pub unit_count: Option<i32>,
    pub reading: Option<i64>,
}

pub const SCHEMA: &str = "
    CREATE TABLE contractor (
        sc_key INTEGER PRIMARY KEY AUTOINCREMENT,
        sc_name TEXT, contact TEXT, phone1 TEXT, fax TEXT, email TEXT
    );
    CREATE TABLE est_proposal (
        pr_key INTEGER PRIMARY KEY AUTOINCREMENT,
        proposal_name TEXT, prop_date TEXT, dist INTEGER, submit_deadline TEXT,
        prop_id TEXT, sc_key INTEGER REFERENCES contractor (sc_key)
    );
    CREATE TABLE progress (
        progress_id INTEGER PRIMARY KEY AUTOINCREMENT,
        status TEXT
    );
    CREATE TABLE note (
        n_key INTEGER PRIMARY KEY AUTOINCREMENT,
        note TEXT, additional TEXT, note_date TEXT,
        progress_id INTEGER REFERENCES progress (progress_id)
    );
    CREATE TABLE supplier (
        supplier_id INTEGER PRIMARY KEY AUTOINCREMENT,
        sup_name TEXT, contact TEXT
    );
    CREATE TABLE delivery (
        d_key INTEGER PRIMARY KEY AUTOINCREMENT,
        tracking TEXT,
        supplier_id INTEGER REFERENCES supplier (supplier_id)
    );
";

/// Installs a test subscriber honouring `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A private in-memory database without tables.
pub fn empty_executor() -> SqliteExecutor {
    init_tracing();
    SqliteExecutor::connect_with(ConnectOptions {
        database: ":memory:".to_string(),
    })
    .expect("should connect")
}

/// A private in-memory database with the fixture schema.
pub fn executor() -> SqliteExecutor {
    let executor = empty_executor();
    executor.execute_batch(SCHEMA).expect("should create schema");
    executor
}

/// Normalize SQL by collapsing whitespace.
fn normalize_sql(sql: &str) -> String {
    sql.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Assert that SQL contains all expected fragments in order.
///
/// Whitespace is normalized on both sides so fragments can be written
/// without matching the exact spacing of the rendered SQL.
#[allow(clippy::missing_panics_doc)]
pub fn assert_sql_contains(actual: &str, fragments: &[&str]) {
    let actual = normalize_sql(actual);
    let mut search_start = 0usize;

    for fragment in fragments {
        let fragment = normalize_sql(fragment);
        if fragment.is_empty() {
            continue;
        }

        match actual[search_start..].find(&fragment) {
            Some(pos) => search_start += pos + fragment.len(),
            None => panic!("expected SQL fragment `{fragment}` not found in `{actual}`"),
        }
    }
}

/// The derived primary key of a saved entity.
pub fn saved_id<E: Persistable>(entity: &E) -> i64 {
    entity.id().expect("entity should have a primary key")
}

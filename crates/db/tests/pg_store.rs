//! Integration tests for `PgStore` against PostgreSQL.
//!
//! Each test gets a fresh database from `#[sqlx::test]` (driven by
//! `DATABASE_URL`) and seeds the tables it needs.

use fieldguard_core::{
    ConstraintSet, Filter, Record, Schema, StoreClient, Validator, ViolationKind,
};
use fieldguard_db::{health_check, PgStore};
use serde_json::json;
use sqlx::PgPool;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn seed(pool: &PgPool) {
    sqlx::query("CREATE TABLE users (id BIGINT PRIMARY KEY, email TEXT NOT NULL)")
        .execute(pool)
        .await
        .unwrap();
    sqlx::query("CREATE TABLE roles (id BIGINT PRIMARY KEY, name TEXT NOT NULL)")
        .execute(pool)
        .await
        .unwrap();
    sqlx::query("INSERT INTO users (id, email) VALUES (1, 'a@b.com')")
        .execute(pool)
        .await
        .unwrap();
    sqlx::query("INSERT INTO roles (id, name) VALUES (1, 'admin'), (2, 'user')")
        .execute(pool)
        .await
        .unwrap();
}

fn record(value: serde_json::Value) -> Record {
    value.as_object().cloned().unwrap()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = false)]
async fn health_check_passes(pool: PgPool) {
    let store = PgStore::new(pool);
    health_check(store.pool()).await.unwrap();
}

#[sqlx::test(migrations = false)]
async fn get_matches_on_json_equality(pool: PgPool) {
    seed(&pool).await;
    let store = PgStore::new(pool);

    let mut filter = Filter::new();
    filter.insert("id".into(), json!(2));
    let result = store.get("roles", &filter).await.unwrap();
    assert_eq!(result.rows, vec![json!({"id": 2, "name": "user"})]);

    filter.insert("id".into(), json!(9));
    assert!(store.get("roles", &filter).await.unwrap().is_empty());
}

#[sqlx::test(migrations = false)]
async fn validator_checks_postgres_rows(pool: PgPool) {
    seed(&pool).await;
    let validator = Validator::new(PgStore::new(pool).with_row_limit(1));
    let schema = Schema::new()
        .field("email", ConstraintSet::new().unique_in("users"))
        .field("roleId", ConstraintSet::new().exists_in("roles", "id"));

    let result = validator
        .validate(&record(json!({"email": "a@b.com", "roleId": 7})), &schema)
        .await
        .unwrap();
    assert_eq!(result.count_of(ViolationKind::UniquenessViolation), 1);
    assert_eq!(result.count_of(ViolationKind::ExistenceViolation), 1);

    let result = validator
        .validate(&record(json!({"email": "new@b.com", "roleId": 1})), &schema)
        .await
        .unwrap();
    assert!(result.is_valid);
}

#[sqlx::test(migrations = false)]
async fn missing_table_becomes_store_failure(pool: PgPool) {
    let validator = Validator::new(PgStore::new(pool));
    let schema = Schema::new().field("email", ConstraintSet::new().unique_in("users"));

    let result = validator
        .validate(&record(json!({"email": "a@b.com"})), &schema)
        .await
        .unwrap();
    assert_eq!(result.count_of(ViolationKind::StoreProbeFailed), 1);
}

#[sqlx::test(migrations = false)]
async fn invalid_collection_becomes_store_failure(pool: PgPool) {
    seed(&pool).await;
    let validator = Validator::new(PgStore::new(pool));
    let schema = Schema::new().field(
        "email",
        ConstraintSet::new().unique_in("users; DROP TABLE users"),
    );

    let result = validator
        .validate(&record(json!({"email": "a@b.com"})), &schema)
        .await
        .unwrap();
    assert_eq!(result.count_of(ViolationKind::StoreProbeFailed), 1);
}

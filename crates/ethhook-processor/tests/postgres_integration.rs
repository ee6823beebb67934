//! Exercises `MetadataStore` against a real Postgres instance. Skipped by
//! default; run with `cargo test -- --ignored` against a database reachable
//! at `TEST_DATABASE_URL`.

use std::env;

use ethhook_processor::store::MetadataStore;
use sqlx::PgPool;
use uuid::Uuid;

fn test_database_url() -> String {
    env::var("TEST_DATABASE_URL")
        .expect("Missing TEST_DATABASE_URL environment variable for postgres integration test")
}

async fn seed_schema(pool: &PgPool) {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS applications (
            application_id UUID PRIMARY KEY,
            hmac_secret BYTEA NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await
    .expect("create applications table");

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS endpoints (
            endpoint_id UUID PRIMARY KEY,
            application_id UUID NOT NULL REFERENCES applications(application_id),
            is_active BOOLEAN NOT NULL,
            chain_ids BIGINT[] NOT NULL,
            contract_addresses TEXT[] NOT NULL,
            topic_filters TEXT[] NOT NULL,
            webhook_url TEXT NOT NULL,
            rate_limit_per_sec INT NOT NULL,
            max_retries INT NOT NULL,
            timeout_ms BIGINT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await
    .expect("create endpoints table");
}

#[ignore]
#[tokio::test]
async fn load_active_endpoints_excludes_inactive_rows() {
    let database_url = test_database_url();
    let pool = PgPool::connect(&database_url).await.expect("connect setup pool");
    seed_schema(&pool).await;

    let application_id = Uuid::new_v4();
    sqlx::query("INSERT INTO applications (application_id, hmac_secret) VALUES ($1, $2)")
        .bind(application_id)
        .bind(b"a secret at least thirty two bytes long".as_slice())
        .execute(&pool)
        .await
        .expect("insert application");

    let active_id = Uuid::new_v4();
    let inactive_id = Uuid::new_v4();
    for (endpoint_id, is_active) in [(active_id, true), (inactive_id, false)] {
        sqlx::query(
            r#"
            INSERT INTO endpoints
                (endpoint_id, application_id, is_active, chain_ids, contract_addresses,
                 topic_filters, webhook_url, rate_limit_per_sec, max_retries, timeout_ms)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(endpoint_id)
        .bind(application_id)
        .bind(is_active)
        .bind(vec![1i64])
        .bind(Vec::<String>::new())
        .bind(Vec::<Option<String>>::new())
        .bind("https://x.example/h")
        .bind(10)
        .bind(5)
        .bind(30_000i64)
        .execute(&pool)
        .await
        .expect("insert endpoint");
    }

    let store = MetadataStore::connect(&database_url).await.expect("connect store");
    let endpoints = store.load_active_endpoints().await.expect("load_active_endpoints");

    assert!(endpoints.iter().any(|e| e.endpoint_id == active_id));
    assert!(!endpoints.iter().any(|e| e.endpoint_id == inactive_id));

    sqlx::query("DELETE FROM endpoints WHERE application_id = $1")
        .bind(application_id)
        .execute(&pool)
        .await
        .ok();
    sqlx::query("DELETE FROM applications WHERE application_id = $1")
        .bind(application_id)
        .execute(&pool)
        .await
        .ok();
}

//! Runs against a real PostgreSQL instance.
//!
//!   DATABASE_URL=postgres://... cargo test -p keyvault-store -- --ignored

use std::time::Duration;

use keyvault_crypto::SecretEnvelope;
use keyvault_store::{CallerIdentity, PgVaultStore, VaultStore};

async fn store() -> PgVaultStore {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for postgres tests");
    let store = PgVaultStore::connect(&url, Duration::from_secs(5))
        .await
        .unwrap();
    store.migrate().await.unwrap();
    store
}

fn unique_identity(label: &str) -> CallerIdentity {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    CallerIdentity::new(format!("test-{}-{}-{}", label, std::process::id(), nanos))
}

#[tokio::test]
#[ignore]
async fn test_upsert_and_clear() {
    let store = store().await;
    let id = unique_identity("upsert");

    assert!(store.get(&id).await.unwrap().is_none());

    store
        .put(&id, Some(&SecretEnvelope::from_encoded("first")))
        .await
        .unwrap();
    store
        .put(&id, Some(&SecretEnvelope::from_encoded("second")))
        .await
        .unwrap();
    assert_eq!(
        store.get(&id).await.unwrap(),
        Some(SecretEnvelope::from_encoded("second"))
    );

    store.put(&id, None).await.unwrap();
    assert!(store.get(&id).await.unwrap().is_none());

    let record = store.record(&id).await.unwrap().expect("record is kept after clear");
    assert!(record.envelope.is_none());
}

#[tokio::test]
#[ignore]
async fn test_migrate_is_idempotent() {
    let store = store().await;
    store.migrate().await.unwrap();
    store.migrate().await.unwrap();
}

#[tokio::test]
#[ignore]
async fn test_identities_are_isolated() {
    let store = store().await;
    let a = unique_identity("a");
    let b = unique_identity("b");

    store
        .put(&a, Some(&SecretEnvelope::from_encoded("a-envelope")))
        .await
        .unwrap();

    assert!(store.get(&b).await.unwrap().is_none());
}

#[tokio::test]
#[ignore]
async fn test_empty_column_is_an_envelope_not_absence() {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for postgres tests");
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(1)
        .connect(&url)
        .await
        .unwrap();
    let store = PgVaultStore::from_pool(pool.clone());
    store.migrate().await.unwrap();

    // Written behind the store's back, as a damaged row would be
    let id = unique_identity("empty");
    sqlx::query("INSERT INTO vault_secrets (id, encrypted_secret) VALUES ($1, '')")
        .bind(id.as_str())
        .execute(&pool)
        .await
        .unwrap();

    let envelope = store.get(&id).await.unwrap().expect("empty text is not a cleared row");
    assert_eq!(envelope.as_str(), "");

    let key = keyvault_crypto::SymmetricKey::generate().unwrap();
    assert!(keyvault_crypto::decrypt(&key, &envelope).is_err());
}

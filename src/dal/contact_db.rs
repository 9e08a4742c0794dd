use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::contact::Contact;

pub async fn contact_exists(identity_key: &str, pool: &PgPool) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>(
        r#"
        select exists (
            select 1 from contact where identity_key = $1
        )
        "#,
    )
    .bind(identity_key)
    .fetch_one(pool)
    .await
}

/// Insert-only: a conflicting identity key leaves the existing row untouched
/// and reports false, so a dedup race never corrupts state.
pub async fn insert_contact(contact: &Contact, pool: &PgPool) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        insert into contact
            (id, identity_key, name, email_found, email, domain, observed_at)
        values
            ($1, $2, $3, $4, $5, $6, $7)
        on conflict (identity_key) do nothing
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&contact.identity_key)
    .bind(&contact.name)
    .bind(contact.email_found)
    .bind(&contact.email)
    .bind(&contact.domain)
    .bind(contact.observed_at)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

pub async fn delete_older_than(
    cutoff: DateTime<Utc>,
    pool: &PgPool,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        delete from contact where observed_at < $1
        "#,
    )
    .bind(cutoff)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

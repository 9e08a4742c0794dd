use sqlx::PgPool;

pub async fn get_page_cursor(query_key: &str, pool: &PgPool) -> Result<Option<i32>, sqlx::Error> {
    sqlx::query_scalar::<_, i32>(
        r#"
        select page_number from page_cursor where query_key = $1
        "#,
    )
    .bind(query_key)
    .fetch_optional(pool)
    .await
}

/// Upsert with greatest() so the cursor never moves backwards within a run,
/// and re-advancing to the same page is a no-op.
pub async fn upsert_page_cursor(
    query_key: &str,
    page_number: i32,
    pool: &PgPool,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        insert into page_cursor
            (query_key, page_number, updated_at)
        values
            ($1, $2, now())
        on conflict (query_key) do update set
            page_number = greatest(page_cursor.page_number, excluded.page_number),
            updated_at = now()
        "#,
    )
    .bind(query_key)
    .bind(page_number)
    .execute(pool)
    .await?;

    Ok(())
}

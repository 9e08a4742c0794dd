use sqlx::PgPool;

use crate::dal::cursor_db;

/// Last completed page per query. Absence is a normal state (page 1), and a
/// failed advance is non-fatal: the next run re-processes the un-advanced
/// page, which the dedup gate makes cheap.
#[allow(async_fn_in_trait)]
pub trait CursorStore {
    async fn get_cursor(&self, query_key: &str) -> u32;
    async fn advance_cursor(&self, query_key: &str, page_number: u32) -> bool;
}

pub struct PgCursorStore {
    pool: PgPool,
}

impl PgCursorStore {
    pub fn new(pool: PgPool) -> Self {
        PgCursorStore { pool }
    }
}

impl CursorStore for PgCursorStore {
    async fn get_cursor(&self, query_key: &str) -> u32 {
        match cursor_db::get_page_cursor(query_key, &self.pool).await {
            Ok(Some(page_number)) => page_number.max(1) as u32,
            Ok(None) => 1,
            Err(e) => {
                log::error!("Failed to read cursor for {:?}: {:?}", query_key, e);
                1
            }
        }
    }

    async fn advance_cursor(&self, query_key: &str, page_number: u32) -> bool {
        match cursor_db::upsert_page_cursor(query_key, page_number as i32, &self.pool).await {
            Ok(()) => true,
            Err(e) => {
                log::error!(
                    "Failed to advance cursor for {:?} to page {}: {:?}",
                    query_key,
                    page_number,
                    e
                );
                false
            }
        }
    }
}

use chrono::Utc;
use sqlx::PgPool;

use crate::dal::contact_db;
use crate::domain::contact::Contact;

/// Persistent store of processed prospects, keyed by identity key. Backend
/// failures are absorbed here so a flaky store slows the pipeline down
/// instead of stopping it.
#[allow(async_fn_in_trait)]
pub trait ContactLedger {
    async fn exists(&self, identity_key: &str) -> bool;
    async fn record(&self, contact: &Contact) -> bool;
    async fn expire_older_than(&self, window: chrono::Duration) -> u64;
}

pub struct PgContactLedger {
    pool: PgPool,
    fail_open: bool,
}

impl PgContactLedger {
    pub fn new(pool: PgPool, fail_open: bool) -> Self {
        PgContactLedger { pool, fail_open }
    }
}

impl ContactLedger for PgContactLedger {
    async fn exists(&self, identity_key: &str) -> bool {
        match contact_db::contact_exists(identity_key, &self.pool).await {
            Ok(found) => found,
            Err(e) => {
                log::error!("Failed to check contact {}: {:?}", identity_key, e);
                // fail-open reports "not seen" and risks a duplicate;
                // fail-closed reports "seen" and skips the candidate.
                !self.fail_open
            }
        }
    }

    async fn record(&self, contact: &Contact) -> bool {
        match contact_db::insert_contact(contact, &self.pool).await {
            Ok(true) => true,
            Ok(false) => {
                log::warn!(
                    "Contact {} was already recorded, leaving existing row untouched",
                    contact.identity_key
                );
                false
            }
            Err(e) => {
                log::error!("Failed to record contact {}: {:?}", contact.identity_key, e);
                false
            }
        }
    }

    async fn expire_older_than(&self, window: chrono::Duration) -> u64 {
        let cutoff = Utc::now() - window;
        match contact_db::delete_older_than(cutoff, &self.pool).await {
            Ok(count) => {
                log::info!("Expired {} contacts older than {}", count, cutoff);
                count
            }
            Err(e) => {
                log::error!("Failed to expire old contacts: {:?}", e);
                0
            }
        }
    }
}

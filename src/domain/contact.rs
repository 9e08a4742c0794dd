use chrono::{DateTime, Utc};

use super::email::EmailResult;

/// A processed prospect. Append-only: once recorded under its identity key it
/// is never mutated, only expired by the retention sweep.
#[derive(Debug, Clone, PartialEq)]
pub struct Contact {
    pub identity_key: String,
    pub name: String,
    pub email_found: bool,
    pub email: Option<String>,
    pub domain: Option<String>,
    pub observed_at: DateTime<Utc>,
}

impl Contact {
    pub fn from_resolution(
        identity_key: String,
        name: &str,
        company: &str,
        result: &EmailResult,
    ) -> Self {
        Contact {
            identity_key,
            name: name.to_string(),
            email_found: result.found,
            email: result.email.clone(),
            domain: Some(company.to_string()),
            observed_at: Utc::now(),
        }
    }
}

/// A raw, unverified name/company tuple extracted from one source page.
/// Transient: lives for a single pipeline iteration and is never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateRecord {
    pub name: String,
    pub company: String,
}

impl CandidateRecord {
    pub fn identity_key(&self) -> String {
        normalize_identity(&self.name)
    }
}

/// Lowercase, whitespace-collapsed. Deterministic, so the same person seen on
/// different pages maps to the same ledger key.
pub fn normalize_identity(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_key_lowercases_and_collapses_whitespace() {
        let candidate = CandidateRecord {
            name: "  Jane \t DOE ".to_string(),
            company: "Acme".to_string(),
        };
        assert_eq!(candidate.identity_key(), "jane doe");
    }

    #[test]
    fn identity_key_is_deterministic_across_spellings() {
        assert_eq!(normalize_identity("Jane Doe"), normalize_identity("jane   doe"));
    }
}

/// Normalized output of the email resolution layer. Provider payload shapes
/// (flat field, nested success flag, enrichment object) are all mapped into
/// this one type by the provider adapters.
#[derive(Debug, Clone, PartialEq)]
pub struct EmailResult {
    pub email: Option<String>,
    pub found: bool,
}

impl EmailResult {
    pub fn found(email: String) -> Self {
        EmailResult {
            email: Some(email),
            found: true,
        }
    }

    pub fn not_found() -> Self {
        EmailResult {
            email: None,
            found: false,
        }
    }
}

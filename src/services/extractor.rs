use scraper::{Html, Selector};

use crate::domain::candidate::CandidateRecord;

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("extraction failed: {0}")]
    Failed(String),
}

/// Turns raw page markup into candidate records. The HTML implementation is
/// lenient (unexpected markup just yields no candidates); remote extraction
/// backends can surface real failures through the error.
pub trait RecordExtractor {
    fn extract(&self, raw_content: &str) -> Result<Vec<CandidateRecord>, ExtractError>;
}

const CARD_SELECTOR: &str = "div.entity-result__item";
const NAME_SELECTOR: &str = "span.entity-result__title-text";
const COMPANY_SELECTOR: &str = "div.entity-result__primary-subtitle";

pub struct HtmlExtractor {
    card_selector: Selector,
    name_selector: Selector,
    company_selector: Selector,
}

impl Default for HtmlExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl HtmlExtractor {
    pub fn new() -> Self {
        HtmlExtractor {
            card_selector: Selector::parse(CARD_SELECTOR).unwrap(),
            name_selector: Selector::parse(NAME_SELECTOR).unwrap(),
            company_selector: Selector::parse(COMPANY_SELECTOR).unwrap(),
        }
    }
}

impl RecordExtractor for HtmlExtractor {
    fn extract(&self, raw_content: &str) -> Result<Vec<CandidateRecord>, ExtractError> {
        let document = Html::parse_document(raw_content);
        let mut candidates = vec![];

        for card in document.select(&self.card_selector) {
            let name = card
                .select(&self.name_selector)
                .next()
                .map(|tag| tag.text().collect::<String>().trim().to_string())
                .unwrap_or_default();
            let company = card
                .select(&self.company_selector)
                .next()
                .map(|tag| tag.text().collect::<String>().trim().to_string())
                .unwrap_or_default();

            if name.is_empty() || company.is_empty() {
                continue;
            }

            candidates.push(CandidateRecord {
                name,
                company: clean_company(&company),
            });
        }

        Ok(candidates)
    }
}

fn clean_company(company: &str) -> String {
    company
        .replace(" at ", " ")
        .replace(" @ ", " ")
        .trim()
        .to_string()
}

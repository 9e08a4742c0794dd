use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use coldreach::configuration::PipelineSettings;
use coldreach::domain::{CandidateRecord, Contact, EmailResult};
use coldreach::services::{
    AcquisitionLoop, ContactLedger, CursorStore, DispatchError, EmailLookup, EmailResolver,
    ExtractError, MessageDispatcher, Outbound, ProviderError, RecordExtractor, SourceConnector,
    SourceError,
};

#[derive(Clone, Default)]
struct ScriptedSource {
    pages: HashMap<(String, u32), String>,
    failures: HashSet<(String, u32)>,
    fetched: Arc<Mutex<Vec<(String, u32)>>>,
}

impl ScriptedSource {
    fn with_page(mut self, query: &str, page: u32, content: &str) -> Self {
        self.pages
            .insert((query.to_string(), page), content.to_string());
        self
    }

    fn with_failure(mut self, query: &str, page: u32) -> Self {
        self.failures.insert((query.to_string(), page));
        self
    }

    fn fetched(&self) -> Vec<(String, u32)> {
        self.fetched.lock().unwrap().clone()
    }
}

impl SourceConnector for ScriptedSource {
    async fn fetch_page(&self, query: &str, page_number: u32) -> Result<String, SourceError> {
        let key = (query.to_string(), page_number);
        self.fetched.lock().unwrap().push(key.clone());
        if self.failures.contains(&key) {
            return Err(SourceError::PageNotAvailable(page_number));
        }
        self.pages
            .get(&key)
            .cloned()
            .ok_or(SourceError::PageNotAvailable(page_number))
    }
}

/// Parses "Name|Company" lines; a page reading "!!" simulates a page the
/// extractor cannot make sense of.
struct LineExtractor;

impl RecordExtractor for LineExtractor {
    fn extract(&self, raw_content: &str) -> Result<Vec<CandidateRecord>, ExtractError> {
        if raw_content.trim() == "!!" {
            return Err(ExtractError::Failed("unreadable page".to_string()));
        }
        Ok(raw_content
            .lines()
            .filter_map(|line| {
                let (name, company) = line.split_once('|')?;
                Some(CandidateRecord {
                    name: name.trim().to_string(),
                    company: company.trim().to_string(),
                })
            })
            .collect())
    }
}

#[derive(Clone, Default)]
struct MemoryLedger {
    contacts: Arc<Mutex<HashMap<String, Contact>>>,
    expiry_windows: Arc<Mutex<Vec<chrono::Duration>>>,
}

impl MemoryLedger {
    fn seed(&self, contact: Contact) {
        self.contacts
            .lock()
            .unwrap()
            .insert(contact.identity_key.clone(), contact);
    }

    fn get(&self, identity_key: &str) -> Option<Contact> {
        self.contacts.lock().unwrap().get(identity_key).cloned()
    }

    fn len(&self) -> usize {
        self.contacts.lock().unwrap().len()
    }
}

impl ContactLedger for MemoryLedger {
    async fn exists(&self, identity_key: &str) -> bool {
        self.contacts.lock().unwrap().contains_key(identity_key)
    }

    async fn record(&self, contact: &Contact) -> bool {
        let mut contacts = self.contacts.lock().unwrap();
        if contacts.contains_key(&contact.identity_key) {
            return false;
        }
        contacts.insert(contact.identity_key.clone(), contact.clone());
        true
    }

    async fn expire_older_than(&self, window: chrono::Duration) -> u64 {
        self.expiry_windows.lock().unwrap().push(window);
        let cutoff = Utc::now() - window;
        let mut contacts = self.contacts.lock().unwrap();
        let before = contacts.len();
        contacts.retain(|_, contact| contact.observed_at >= cutoff);
        (before - contacts.len()) as u64
    }
}

#[derive(Clone, Default)]
struct MemoryCursors {
    cursors: Arc<Mutex<HashMap<String, u32>>>,
    advances: Arc<Mutex<Vec<(String, u32)>>>,
}

impl MemoryCursors {
    fn seed(&self, query_key: &str, page_number: u32) {
        self.cursors
            .lock()
            .unwrap()
            .insert(query_key.to_string(), page_number);
    }

    fn advances(&self) -> Vec<(String, u32)> {
        self.advances.lock().unwrap().clone()
    }

    fn cursor(&self, query_key: &str) -> Option<u32> {
        self.cursors.lock().unwrap().get(query_key).copied()
    }
}

impl CursorStore for MemoryCursors {
    async fn get_cursor(&self, query_key: &str) -> u32 {
        self.cursors
            .lock()
            .unwrap()
            .get(query_key)
            .copied()
            .unwrap_or(1)
    }

    async fn advance_cursor(&self, query_key: &str, page_number: u32) -> bool {
        let mut cursors = self.cursors.lock().unwrap();
        let entry = cursors.entry(query_key.to_string()).or_insert(1);
        *entry = (*entry).max(page_number);
        self.advances
            .lock()
            .unwrap()
            .push((query_key.to_string(), page_number));
        true
    }
}

#[derive(Clone, Default)]
struct RecordingDispatcher {
    sent: Arc<Mutex<Vec<(String, String, String)>>>,
    fail: bool,
}

impl RecordingDispatcher {
    fn failing() -> Self {
        RecordingDispatcher {
            fail: true,
            ..Default::default()
        }
    }

    fn sent(&self) -> Vec<(String, String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

impl MessageDispatcher for RecordingDispatcher {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), DispatchError> {
        if self.fail {
            return Err(DispatchError::Smtp("relay said no".to_string()));
        }
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), subject.to_string(), body.to_string()));
        Ok(())
    }
}

#[derive(Clone, Default)]
struct CountingProvider {
    emails: HashMap<String, String>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl CountingProvider {
    fn with_email(mut self, name: &str, email: &str) -> Self {
        self.emails.insert(name.to_string(), email.to_string());
        self
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl EmailLookup for CountingProvider {
    fn label(&self) -> &str {
        "counting"
    }

    async fn lookup(&self, name: &str, _company: &str) -> Result<Option<String>, ProviderError> {
        self.calls.lock().unwrap().push(name.to_string());
        Ok(self.emails.get(name).cloned())
    }
}

fn settings(page_ceiling: u32) -> PipelineSettings {
    PipelineSettings {
        retention_days: 14,
        contact_budget: 0,
        skip_offset: 0,
        page_ceiling,
        candidate_delay_secs: 0,
        page_delay_secs: 0,
        dedup_fail_open: true,
    }
}

fn resolver(provider: CountingProvider) -> EmailResolver<CountingProvider> {
    EmailResolver::new(vec![provider], Duration::from_secs(1))
}

fn no_outbound() -> Option<Outbound<RecordingDispatcher>> {
    None
}

fn past_contact(identity_key: &str, days_ago: i64) -> Contact {
    Contact {
        identity_key: identity_key.to_string(),
        name: identity_key.to_string(),
        email_found: false,
        email: None,
        domain: None,
        observed_at: Utc::now() - chrono::Duration::days(days_ago),
    }
}

#[tokio::test]
async fn single_page_run_persists_contact_and_advances_cursor() {
    let source = ScriptedSource::default().with_page("recruiter", 1, "Jane Doe|Acme");
    let provider = CountingProvider::default().with_email("Jane Doe", "jane@acme.com");
    let ledger = MemoryLedger::default();
    let cursors = MemoryCursors::default();

    let mut pipeline = AcquisitionLoop::new(
        source,
        LineExtractor,
        resolver(provider),
        ledger.clone(),
        cursors.clone(),
        no_outbound(),
        vec!["recruiter".to_string()],
        settings(1),
    );
    let summary = pipeline.run().await;

    let contact = ledger.get("jane doe").expect("contact persisted");
    assert!(contact.email_found);
    assert_eq!(contact.email.as_deref(), Some("jane@acme.com"));
    assert_eq!(cursors.cursor("recruiter"), Some(2));
    assert_eq!(summary.persisted, 1);
    assert_eq!(summary.emails_found, 1);
    assert_eq!(summary.dispatched, 0);
}

#[tokio::test]
async fn resume_reprocesses_only_pages_at_or_after_the_cursor() {
    let source = ScriptedSource::default()
        .with_page("recruiter", 1, "Jane Doe|Acme")
        .with_page("recruiter", 2, "John Roe|Globex");
    let provider = CountingProvider::default();
    let ledger = MemoryLedger::default();
    ledger.seed(past_contact("jane doe", 1));
    let cursors = MemoryCursors::default();
    cursors.seed("recruiter", 2);

    let mut pipeline = AcquisitionLoop::new(
        source.clone(),
        LineExtractor,
        resolver(provider.clone()),
        ledger.clone(),
        cursors.clone(),
        no_outbound(),
        vec!["recruiter".to_string()],
        settings(2),
    );
    pipeline.run().await;

    assert_eq!(source.fetched(), vec![("recruiter".to_string(), 2)]);
    assert_eq!(provider.calls(), vec!["John Roe".to_string()]);
    // The pre-existing contact is untouched.
    assert!(!ledger.get("jane doe").unwrap().email_found);
    assert!(ledger.get("john roe").is_some());
}

#[tokio::test]
async fn same_identity_across_pages_is_persisted_once() {
    let source = ScriptedSource::default()
        .with_page("recruiter", 1, "Jane Doe|Acme")
        .with_page("recruiter", 2, "jane   DOE|Acme\nJohn Roe|Globex");
    let provider = CountingProvider::default().with_email("Jane Doe", "jane@acme.com");
    let ledger = MemoryLedger::default();
    let cursors = MemoryCursors::default();

    let mut pipeline = AcquisitionLoop::new(
        source,
        LineExtractor,
        resolver(provider.clone()),
        ledger.clone(),
        cursors.clone(),
        no_outbound(),
        vec!["recruiter".to_string()],
        settings(2),
    );
    let summary = pipeline.run().await;

    assert_eq!(ledger.len(), 2);
    assert_eq!(summary.deduped, 1);
    // The re-encounter triggered no second provider call.
    assert_eq!(
        provider.calls(),
        vec!["Jane Doe".to_string(), "John Roe".to_string()]
    );
}

#[tokio::test]
async fn contact_budget_halts_the_entire_run() {
    let source = ScriptedSource::default()
        .with_page("recruiter", 1, "A One|Acme\nB Two|Acme\nC Three|Acme")
        .with_page("recruiter", 2, "D Four|Acme\nE Five|Acme");
    let provider = CountingProvider::default();
    let ledger = MemoryLedger::default();
    let cursors = MemoryCursors::default();
    let mut config = settings(2);
    config.contact_budget = 2;

    let mut pipeline = AcquisitionLoop::new(
        source,
        LineExtractor,
        resolver(provider.clone()),
        ledger.clone(),
        cursors.clone(),
        no_outbound(),
        vec!["recruiter".to_string()],
        config,
    );
    let summary = pipeline.run().await;

    assert_eq!(ledger.len(), 2);
    assert_eq!(summary.processed, 2);
    assert!(summary.budget_exhausted);
    // The third candidate never reached a provider.
    assert_eq!(provider.calls().len(), 2);
    // The run stopped mid-page, so the page was never marked complete.
    assert!(cursors.advances().is_empty());
}

#[tokio::test]
async fn skip_offset_counts_candidates_without_touching_providers() {
    let source = ScriptedSource::default().with_page("recruiter", 1, "A One|Acme\nB Two|Acme");
    let provider = CountingProvider::default();
    let ledger = MemoryLedger::default();
    let cursors = MemoryCursors::default();
    let mut config = settings(1);
    config.skip_offset = 1;

    let mut pipeline = AcquisitionLoop::new(
        source,
        LineExtractor,
        resolver(provider.clone()),
        ledger.clone(),
        cursors.clone(),
        no_outbound(),
        vec!["recruiter".to_string()],
        config,
    );
    let summary = pipeline.run().await;

    assert_eq!(summary.offset_skipped, 1);
    assert_eq!(summary.processed, 2);
    assert_eq!(ledger.len(), 1);
    assert_eq!(provider.calls(), vec!["B Two".to_string()]);
}

#[tokio::test]
async fn unresolved_candidate_is_persisted_as_negative_and_not_retried() {
    let source = ScriptedSource::default()
        .with_page("recruiter", 1, "Jane Doe|Acme")
        .with_page("recruiter", 2, "Jane Doe|Acme");
    let provider = CountingProvider::default();
    let ledger = MemoryLedger::default();
    let cursors = MemoryCursors::default();

    let mut pipeline = AcquisitionLoop::new(
        source,
        LineExtractor,
        resolver(provider.clone()),
        ledger.clone(),
        cursors.clone(),
        no_outbound(),
        vec!["recruiter".to_string()],
        settings(2),
    );
    pipeline.run().await;

    let contact = ledger.get("jane doe").unwrap();
    assert!(!contact.email_found);
    assert_eq!(contact.email, None);
    assert_eq!(provider.calls().len(), 1);
}

#[tokio::test]
async fn fetch_failure_stops_that_query_only() {
    let source = ScriptedSource::default()
        .with_failure("alpha", 1)
        .with_page("beta", 1, "Jane Doe|Acme");
    let provider = CountingProvider::default();
    let ledger = MemoryLedger::default();
    let cursors = MemoryCursors::default();

    let mut pipeline = AcquisitionLoop::new(
        source,
        LineExtractor,
        resolver(provider),
        ledger.clone(),
        cursors.clone(),
        no_outbound(),
        vec!["alpha".to_string(), "beta".to_string()],
        settings(1),
    );
    let summary = pipeline.run().await;

    assert_eq!(summary.pages_fetched, 1);
    assert!(ledger.get("jane doe").is_some());
    assert_eq!(cursors.cursor("beta"), Some(2));
    assert_eq!(cursors.cursor("alpha"), None);
}

#[tokio::test]
async fn unreadable_page_is_skipped_but_the_query_continues() {
    let source = ScriptedSource::default()
        .with_page("recruiter", 1, "!!")
        .with_page("recruiter", 2, "Jane Doe|Acme");
    let provider = CountingProvider::default();
    let ledger = MemoryLedger::default();
    let cursors = MemoryCursors::default();

    let mut pipeline = AcquisitionLoop::new(
        source,
        LineExtractor,
        resolver(provider),
        ledger.clone(),
        cursors.clone(),
        no_outbound(),
        vec!["recruiter".to_string()],
        settings(2),
    );
    let summary = pipeline.run().await;

    assert_eq!(summary.candidates_seen, 1);
    assert!(ledger.get("jane doe").is_some());
    assert_eq!(cursors.cursor("recruiter"), Some(3));
}

#[tokio::test]
async fn found_email_is_dispatched_with_rendered_template() {
    let source = ScriptedSource::default().with_page("recruiter", 1, "Jane Doe|Acme");
    let provider = CountingProvider::default().with_email("Jane Doe", "jane@acme.com");
    let ledger = MemoryLedger::default();
    let cursors = MemoryCursors::default();
    let dispatcher = RecordingDispatcher::default();

    let mut pipeline = AcquisitionLoop::new(
        source,
        LineExtractor,
        resolver(provider),
        ledger.clone(),
        cursors,
        Some(Outbound {
            dispatcher: dispatcher.clone(),
            subject: "Quick Chat?".to_string(),
            template: "Hi {{recipient_name}}!".to_string(),
        }),
        vec!["recruiter".to_string()],
        settings(1),
    );
    let summary = pipeline.run().await;

    assert_eq!(summary.dispatched, 1);
    let sent = dispatcher.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "jane@acme.com");
    assert_eq!(sent[0].1, "Quick Chat?");
    assert_eq!(sent[0].2, "Hi Jane Doe!");
}

#[tokio::test]
async fn dispatch_failure_does_not_block_persistence() {
    let source = ScriptedSource::default().with_page("recruiter", 1, "Jane Doe|Acme");
    let provider = CountingProvider::default().with_email("Jane Doe", "jane@acme.com");
    let ledger = MemoryLedger::default();
    let cursors = MemoryCursors::default();

    let mut pipeline = AcquisitionLoop::new(
        source,
        LineExtractor,
        resolver(provider),
        ledger.clone(),
        cursors,
        Some(Outbound {
            dispatcher: RecordingDispatcher::failing(),
            subject: "Quick Chat?".to_string(),
            template: "Hi {{recipient_name}}!".to_string(),
        }),
        vec!["recruiter".to_string()],
        settings(1),
    );
    let summary = pipeline.run().await;

    assert_eq!(summary.dispatched, 0);
    let contact = ledger.get("jane doe").unwrap();
    assert!(contact.email_found);
}

#[tokio::test]
async fn run_completion_expires_contacts_beyond_the_retention_window() {
    let source = ScriptedSource::default().with_page("recruiter", 1, "");
    let provider = CountingProvider::default();
    let ledger = MemoryLedger::default();
    ledger.seed(past_contact("old timer", 15));
    ledger.seed(past_contact("recent one", 13));
    let cursors = MemoryCursors::default();

    let mut pipeline = AcquisitionLoop::new(
        source,
        LineExtractor,
        resolver(provider),
        ledger.clone(),
        cursors,
        no_outbound(),
        vec!["recruiter".to_string()],
        settings(1),
    );
    let summary = pipeline.run().await;

    assert_eq!(summary.expired, 1);
    assert!(ledger.get("old timer").is_none());
    assert!(ledger.get("recent one").is_some());
    assert_eq!(
        *ledger.expiry_windows.lock().unwrap(),
        vec![chrono::Duration::days(14)]
    );
}

#[tokio::test]
async fn resolver_falls_back_to_negative_result_for_unknown_names() {
    let provider = CountingProvider::default();
    let resolver = resolver(provider);
    assert_eq!(
        resolver.resolve("Nobody Here", "Acme").await,
        EmailResult::not_found()
    );
}

use std::time::Duration;

use rand::Rng;

use crate::configuration::PipelineSettings;
use crate::domain::candidate::CandidateRecord;
use crate::domain::contact::Contact;

use super::cursor::CursorStore;
use super::dispatcher::{render_template, MessageDispatcher};
use super::extractor::RecordExtractor;
use super::ledger::ContactLedger;
use super::resolver::{EmailLookup, EmailResolver};
use super::source::SourceConnector;

/// Outbound side of the pipeline: dispatcher plus the rendered-message
/// inputs. Absent when dispatch is disabled.
pub struct Outbound<D> {
    pub dispatcher: D,
    pub subject: String,
    pub template: String,
}

#[derive(Debug, Default)]
pub struct RunSummary {
    pub pages_fetched: u32,
    pub candidates_seen: u32,
    pub processed: u32,
    pub deduped: u32,
    pub offset_skipped: u32,
    pub emails_found: u32,
    pub dispatched: u32,
    pub persisted: u32,
    pub expired: u64,
    pub budget_exhausted: bool,
}

enum CandidateOutcome {
    Skipped,
    OffsetSkipped,
    Processed,
    BudgetExhausted,
}

/// The top-level controller. One logical worker per run: queries, pages and
/// candidates are processed strictly in sequence, with pacing delays between
/// candidates and between pages throttling the external services.
pub struct AcquisitionLoop<S, X, L, C, D, P> {
    source: S,
    extractor: X,
    resolver: EmailResolver<P>,
    ledger: L,
    cursors: C,
    outbound: Option<Outbound<D>>,
    queries: Vec<String>,
    settings: PipelineSettings,
    // Run-scoped: counts every candidate this run has handled, including
    // offset skips. Never survives the run.
    processed: u32,
}

impl<S, X, L, C, D, P> AcquisitionLoop<S, X, L, C, D, P>
where
    S: SourceConnector,
    X: RecordExtractor,
    L: ContactLedger,
    C: CursorStore,
    D: MessageDispatcher,
    P: EmailLookup,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        source: S,
        extractor: X,
        resolver: EmailResolver<P>,
        ledger: L,
        cursors: C,
        outbound: Option<Outbound<D>>,
        queries: Vec<String>,
        settings: PipelineSettings,
    ) -> Self {
        AcquisitionLoop {
            source,
            extractor,
            resolver,
            ledger,
            cursors,
            outbound,
            queries,
            settings,
            processed: 0,
        }
    }

    pub async fn run(&mut self) -> RunSummary {
        let mut summary = RunSummary::default();
        let queries = self.queries.clone();

        'queries: for query in &queries {
            let start_page = self.cursors.get_cursor(query).await;
            log::info!("Query {:?}: resuming at page {}", query, start_page);

            for page_number in start_page..=self.settings.page_ceiling {
                let raw_content = match self.source.fetch_page(query, page_number).await {
                    Ok(raw_content) => raw_content,
                    Err(e) => {
                        // Source failures are deterministic (end of results,
                        // expired session); retrying the same page would loop.
                        log::error!(
                            "Fetch failed for {:?} page {}, stopping this query: {}",
                            query,
                            page_number,
                            e
                        );
                        continue 'queries;
                    }
                };
                summary.pages_fetched += 1;

                match self.extractor.extract(&raw_content) {
                    Ok(candidates) => {
                        summary.candidates_seen += candidates.len() as u32;
                        for candidate in &candidates {
                            match self.process_candidate(candidate, &mut summary).await {
                                CandidateOutcome::Skipped | CandidateOutcome::OffsetSkipped => {}
                                CandidateOutcome::Processed => {
                                    self.pause(self.settings.candidate_delay()).await;
                                }
                                CandidateOutcome::BudgetExhausted => {
                                    log::info!(
                                        "Contact budget of {} reached, stopping the run",
                                        self.settings.contact_budget
                                    );
                                    summary.budget_exhausted = true;
                                    break 'queries;
                                }
                            }
                        }
                    }
                    Err(e) => {
                        log::error!(
                            "Extraction failed for {:?} page {}: {}",
                            query,
                            page_number,
                            e
                        );
                    }
                }

                if !self.cursors.advance_cursor(query, page_number + 1).await {
                    log::warn!(
                        "Cursor for {:?} stuck at page {}; next run re-processes it",
                        query,
                        page_number
                    );
                }
                self.pause(self.settings.page_delay()).await;
            }
        }

        summary.expired = self
            .ledger
            .expire_older_than(self.settings.retention_window())
            .await;

        summary.processed = self.processed;
        log::info!(
            "Run complete: {} pages, {} candidates seen, {} processed, {} persisted, {} emails found",
            summary.pages_fetched,
            summary.candidates_seen,
            summary.processed,
            summary.persisted,
            summary.emails_found
        );
        summary
    }

    /// Decommission the loop and hand back the source so the caller can shut
    /// the browser session down.
    pub fn into_source(self) -> S {
        self.source
    }

    async fn process_candidate(
        &mut self,
        candidate: &CandidateRecord,
        summary: &mut RunSummary,
    ) -> CandidateOutcome {
        let identity_key = candidate.identity_key();
        if identity_key.is_empty() {
            log::warn!("Dropping candidate with blank name from {:?}", candidate.company);
            return CandidateOutcome::Skipped;
        }

        if self.ledger.exists(&identity_key).await {
            log::info!("Skipping {} - already processed", candidate.name);
            summary.deduped += 1;
            return CandidateOutcome::Skipped;
        }

        if self.settings.contact_budget > 0 && self.processed >= self.settings.contact_budget {
            return CandidateOutcome::BudgetExhausted;
        }

        if self.processed < self.settings.skip_offset {
            self.processed += 1;
            summary.offset_skipped += 1;
            return CandidateOutcome::OffsetSkipped;
        }

        log::info!("Processing {} from {}", candidate.name, candidate.company);
        let result = self
            .resolver
            .resolve(&candidate.name, &candidate.company)
            .await;

        if let Some(email) = &result.email {
            summary.emails_found += 1;
            if let Some(outbound) = &self.outbound {
                let body = render_template(&outbound.template, &candidate.name);
                match outbound.dispatcher.send(email, &outbound.subject, &body).await {
                    Ok(()) => {
                        log::info!("Dispatched message to {} at {}", candidate.name, email);
                        summary.dispatched += 1;
                    }
                    Err(e) => {
                        log::error!("Dispatch to {} failed: {}", email, e);
                    }
                }
            }
        } else {
            log::info!("No email found for {}", candidate.name);
        }

        // Recorded even with no email, so permanently unresolvable prospects
        // are not re-attempted on later runs.
        let contact =
            Contact::from_resolution(identity_key, &candidate.name, &candidate.company, &result);
        if self.ledger.record(&contact).await {
            summary.persisted += 1;
        }

        self.processed += 1;
        CandidateOutcome::Processed
    }

    async fn pause(&self, base: Duration) {
        if base.is_zero() {
            return;
        }
        let jitter = rand::thread_rng().gen_range(0..=500);
        tokio::time::sleep(base + Duration::from_millis(jitter)).await;
    }
}

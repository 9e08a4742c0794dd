use std::time::Duration;

use anyhow::Context;
use coldreach::{
    configuration::get_configuration,
    services::{
        AcquisitionLoop, BrowserSource, EmailResolver, HtmlExtractor, Outbound, PgContactLedger,
        PgCursorStore, SmtpDispatcher,
    },
};
use env_logger::Env;
use sqlx::postgres::PgPoolOptions;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let configuration = get_configuration().expect("Failed to read configuration.");

    let pool_options = PgPoolOptions::new()
        .max_connections(20)
        .min_connections(5)
        .acquire_timeout(Duration::from_secs(10))
        .idle_timeout(Duration::from_secs(15 * 60)) // 15 minutes
        .max_lifetime(None);
    let connection_pool = pool_options.connect_lazy_with(configuration.database.with_db());

    // Misconfiguration is fatal before any processing begins.
    let resolver = EmailResolver::from_settings(&configuration.providers)?;
    let outbound = if configuration.dispatch.enabled {
        let template = std::fs::read_to_string(&configuration.dispatch.template_path)
            .with_context(|| {
                format!(
                    "Failed to read message template at {}",
                    configuration.dispatch.template_path
                )
            })?;
        Some(Outbound {
            dispatcher: SmtpDispatcher::new(&configuration.dispatch),
            subject: configuration.dispatch.subject.clone(),
            template,
        })
    } else {
        None
    };

    let source = BrowserSource::authenticate(configuration.source.clone()).await?;
    let extractor = HtmlExtractor::new();
    let ledger = PgContactLedger::new(
        connection_pool.clone(),
        configuration.pipeline.dedup_fail_open,
    );
    let cursors = PgCursorStore::new(connection_pool);

    let mut pipeline = AcquisitionLoop::new(
        source,
        extractor,
        resolver,
        ledger,
        cursors,
        outbound,
        configuration.source.queries.clone(),
        configuration.pipeline.clone(),
    );
    let summary = pipeline.run().await;
    log::info!("{:?}", summary);

    if let Err(e) = pipeline.into_source().close().await {
        log::warn!("Failed to shut the browser session down: {}", e);
    }

    Ok(())
}

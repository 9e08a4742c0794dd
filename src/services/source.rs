use std::time::Duration;

use thirtyfour::prelude::*;
use thirtyfour::DesiredCapabilities;
use url::Url;

use crate::configuration::SourceSettings;

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("webdriver error: {0}")]
    Driver(#[from] thirtyfour::error::WebDriverError),
    #[error("login did not complete within {0:?}")]
    LoginTimeout(Duration),
    #[error("invalid search url: {0}")]
    BadUrl(#[from] url::ParseError),
    #[error("no results container on page {0}")]
    PageNotAvailable(u32),
}

/// Renders pages of the remote search UI. One authenticated session per run;
/// not shareable across concurrent callers.
#[allow(async_fn_in_trait)]
pub trait SourceConnector {
    async fn fetch_page(&self, query: &str, page_number: u32) -> Result<String, SourceError>;
}

pub struct BrowserSource {
    driver: WebDriver,
    settings: SourceSettings,
}

impl BrowserSource {
    /// Opens the login page and blocks until a human finishes logging in,
    /// detected by the search input showing up.
    pub async fn authenticate(settings: SourceSettings) -> Result<Self, SourceError> {
        let caps = DesiredCapabilities::chrome();
        let driver = WebDriver::new(&settings.webdriver_url, caps).await?;
        driver.maximize_window().await?;

        driver.goto(&settings.login_url).await?;
        log::info!("Please log in manually in the browser window...");

        let logged_in = driver
            .query(By::Css(settings.login_ready_selector.clone()))
            .wait(settings.login_timeout(), Duration::from_secs(2))
            .exists()
            .await?;
        if !logged_in {
            driver.quit().await?;
            return Err(SourceError::LoginTimeout(settings.login_timeout()));
        }
        log::info!("Successfully logged in");

        Ok(BrowserSource { driver, settings })
    }

    pub async fn close(self) -> Result<(), SourceError> {
        self.driver.quit().await?;
        Ok(())
    }
}

impl SourceConnector for BrowserSource {
    async fn fetch_page(&self, query: &str, page_number: u32) -> Result<String, SourceError> {
        let url = Url::parse_with_params(
            &self.settings.search_url,
            &[("keywords", query), ("page", &page_number.to_string())],
        )?;
        self.driver.goto(url.as_str()).await?;

        let loaded = self
            .driver
            .query(By::Css(self.settings.page_ready_selector.clone()))
            .wait(Duration::from_secs(10), Duration::from_millis(500))
            .exists()
            .await?;
        if !loaded {
            return Err(SourceError::PageNotAvailable(page_number));
        }

        // Let lazily rendered cards settle before grabbing the source.
        tokio::time::sleep(self.settings.page_settle()).await;

        Ok(self.driver.source().await?)
    }
}

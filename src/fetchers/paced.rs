use super::{FetchRequest, PageFetcher};
use crate::error::FetchError;
use async_trait::async_trait;
use std::time::Duration;

/// Wraps a fetcher with a delay between consecutive fetches and a bounded
/// number of retries per page. With `retries == 0` a failed fetch is returned
/// as is, which ends pagination.
pub struct Paced<F> {
    inner: F,
    delay: Duration,
    retries: u32,
    fetched: bool,
}

impl<F> Paced<F> {
    pub fn new(inner: F, delay: Duration, retries: u32) -> Self {
        Self {
            inner,
            delay,
            retries,
            fetched: false,
        }
    }
}

#[async_trait]
impl<F: PageFetcher> PageFetcher for Paced<F> {
    async fn open(&mut self) -> Result<(), FetchError> {
        self.inner.open().await
    }

    async fn fetch(&mut self, request: &FetchRequest) -> Result<String, FetchError> {
        let mut attempt = 0;
        loop {
            if self.fetched && !self.delay.is_zero() {
                ::log::debug!("Waiting {:?} before fetching {}", self.delay, request.url);
                tokio::time::sleep(self.delay).await;
            }
            self.fetched = true;

            match self.inner.fetch(request).await {
                Ok(markup) => return Ok(markup),
                Err(e) if attempt < self.retries => {
                    attempt += 1;
                    ::log::warn!(
                        "Fetch of {} failed ({}), retry {} of {}",
                        request.url,
                        e,
                        attempt,
                        self.retries
                    );
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn close(&mut self) -> Result<(), FetchError> {
        self.inner.close().await
    }
}

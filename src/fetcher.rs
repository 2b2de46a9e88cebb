use std::time::Duration;

use reqwest::{header, Client, StatusCode};
use tracing::{debug, info, warn};

use crate::config::ParserConfig;
use crate::extractor::Extractor;
use crate::models::CandidateProduct;
use crate::utils::error::Result;

// The origin rejects obvious bots; requests present a realistic browser
// identity and a referrer of the catalog origin.
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8";
const ACCEPT_LANGUAGE: &str = "ru-RU,ru;q=0.9,en;q=0.8";

/// Everything gathered by one page walk. Partial results after a
/// transport error are valid output, not an error.
#[derive(Debug, Default)]
pub struct FetchOutcome {
    pub products: Vec<CandidateProduct>,
    pub pages_fetched: u32,
    pub cards_skipped: usize,
}

/// Walks the paginated listing sequentially, feeding each page through
/// the extractor and preserving page order and within-page order.
pub struct PageFetcher {
    client: Client,
    extractor: Extractor,
    config: ParserConfig,
    referer: String,
}

impl PageFetcher {
    pub fn new(config: ParserConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout))
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()?;
        let extractor = Extractor::new(&config.url)?;
        let referer = format!("{}/", extractor.origin());

        Ok(Self {
            client,
            extractor,
            config,
            referer,
        })
    }

    /// Fetch pages `start_page..=end_page` (open-ended walks are bounded
    /// by the configured maximum). Stops on 404 or an empty page (end of
    /// catalog) and on any other transport error, returning whatever was
    /// gathered so far.
    pub async fn fetch_pages(&self, start_page: u32, end_page: Option<u32>) -> FetchOutcome {
        let mut outcome = FetchOutcome::default();
        let max_page = end_page.unwrap_or(self.config.max_pages);
        let mut page = start_page.max(1);

        info!(start_page, ?end_page, "starting catalog walk");

        while page <= max_page {
            let body = match self.fetch_page(page).await {
                Ok(Some(body)) => body,
                Ok(None) => {
                    info!(page, "page not found, reached end of catalog");
                    break;
                }
                Err(e) => {
                    warn!(page, error = %e, "stopping walk after transport error");
                    break;
                }
            };

            let extract = self.extractor.extract(&body);
            outcome.pages_fetched += 1;
            outcome.cards_skipped += extract.skipped;

            if extract.products.is_empty() {
                debug!(page, "no products on page, stopping");
                break;
            }
            debug!(page, count = extract.products.len(), "extracted products");
            outcome.products.extend(extract.products);

            if page >= max_page {
                break;
            }
            page += 1;
            // inter-page delay, never after the last page
            tokio::time::sleep(Duration::from_secs(self.config.page_delay_seconds)).await;
        }

        info!(
            pages = outcome.pages_fetched,
            products = outcome.products.len(),
            skipped = outcome.cards_skipped,
            "catalog walk finished"
        );
        outcome
    }

    /// `Ok(None)` means 404: the terminal pagination signal.
    async fn fetch_page(&self, page: u32) -> Result<Option<String>> {
        let response = self
            .client
            .get(self.page_url(page))
            .header(header::USER_AGENT, USER_AGENT)
            .header(header::ACCEPT, ACCEPT)
            .header(header::ACCEPT_LANGUAGE, ACCEPT_LANGUAGE)
            .header(header::REFERER, &self.referer)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = response.error_for_status()?;
        Ok(Some(response.text().await?))
    }

    fn page_url(&self, page: u32) -> String {
        if page == 1 {
            self.config.url.clone()
        } else {
            format!("{}&page={}", self.config.url, page)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    fn test_config(base: &str) -> ParserConfig {
        ParserConfig {
            url: format!("{}/catalog?limit=4", base),
            interval_seconds: 120,
            page_delay_seconds: 0,
            max_pages: 100,
            request_timeout: 5,
        }
    }

    fn listing_page(names: &[&str]) -> String {
        let cards: String = names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                format!(
                    r#"<div class="product-layout">
                        <h4><a href="/{name}-{i}">{name}</a></h4>
                        <meta itemprop="price" content="{price}">
                        <div class="cart"><a>Buy</a></div>
                    </div>"#,
                    name = name,
                    i = i,
                    price = 1000 * (i + 1),
                )
            })
            .collect();
        format!("<html><body>{}</body></html>", cards)
    }

    fn without_page_param(request: &Request) -> bool {
        !request.url.query_pairs().any(|(key, _)| key == "page")
    }

    #[tokio::test]
    async fn test_not_found_terminates_walk_with_partial_results() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/catalog"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_string(listing_page(&["b1", "b2"])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/catalog"))
            .and(query_param("page", "3"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/catalog"))
            .and(without_page_param)
            .respond_with(ResponseTemplate::new(200).set_body_string(listing_page(&["a1", "a2"])))
            .mount(&server)
            .await;

        let fetcher = PageFetcher::new(test_config(&server.uri())).unwrap();
        let outcome = fetcher.fetch_pages(1, None).await;

        assert_eq!(outcome.pages_fetched, 2);
        assert_eq!(outcome.products.len(), 4);
        // page order, then card order within the page
        assert_eq!(outcome.products[0].name, "a1");
        assert_eq!(outcome.products[3].name, "b2");
    }

    #[tokio::test]
    async fn test_server_error_returns_partial_results() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/catalog"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/catalog"))
            .and(without_page_param)
            .respond_with(ResponseTemplate::new(200).set_body_string(listing_page(&["only"])))
            .mount(&server)
            .await;

        let fetcher = PageFetcher::new(test_config(&server.uri())).unwrap();
        let outcome = fetcher.fetch_pages(1, None).await;

        assert_eq!(outcome.pages_fetched, 1);
        assert_eq!(outcome.products.len(), 1);
        assert_eq!(outcome.products[0].name, "only");
    }

    #[tokio::test]
    async fn test_empty_page_terminates_walk() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/catalog"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string("<html><body></body></html>"),
            )
            .mount(&server)
            .await;

        let fetcher = PageFetcher::new(test_config(&server.uri())).unwrap();
        let outcome = fetcher.fetch_pages(1, None).await;

        assert_eq!(outcome.pages_fetched, 1);
        assert!(outcome.products.is_empty());
    }

    #[tokio::test]
    async fn test_end_page_bound_is_respected() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/catalog"))
            .respond_with(ResponseTemplate::new(200).set_body_string(listing_page(&["x"])))
            .expect(2)
            .mount(&server)
            .await;

        let fetcher = PageFetcher::new(test_config(&server.uri())).unwrap();
        let outcome = fetcher.fetch_pages(1, Some(2)).await;

        assert_eq!(outcome.pages_fetched, 2);
        assert_eq!(outcome.products.len(), 2);
    }

    #[tokio::test]
    async fn test_requests_carry_browser_identity() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/catalog"))
            // wiremock's `header` matcher splits header values on commas,
            // so it can never exact-match this user agent; compare raw.
            .and(|request: &Request| {
                request
                    .headers
                    .get("user-agent")
                    .is_some_and(|v| v == USER_AGENT)
            })
            .and(wiremock::matchers::header_exists("referer"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string("<html><body></body></html>"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = PageFetcher::new(test_config(&server.uri())).unwrap();
        fetcher.fetch_pages(1, None).await;
    }

    #[test]
    fn test_page_url_scheme() {
        let config = test_config("https://best-magazin.com");
        let fetcher = PageFetcher::new(config).unwrap();

        assert_eq!(
            fetcher.page_url(1),
            "https://best-magazin.com/catalog?limit=4"
        );
        assert_eq!(
            fetcher.page_url(3),
            "https://best-magazin.com/catalog?limit=4&page=3"
        );
    }
}

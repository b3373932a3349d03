// src/services/listings.rs

//! Listing page scraper.
//!
//! Fetches the tender or project listing page for a search and extracts one
//! record per listing item using the configured CSS selectors.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{Category, FilterSpec, ListingSelectors, Record, SourceConfig};
use crate::services::{DataSource, SourceProvider};
use crate::utils::http::{create_async_client, fetch_text};
use crate::utils::{normalize_whitespace, resolve_url};

const UNKNOWN: &str = "Unknown";

/// Opens [`ListingSource`] sessions from the source configuration.
pub struct ListingSourceProvider {
    config: Arc<SourceConfig>,
}

impl ListingSourceProvider {
    pub fn new(config: Arc<SourceConfig>) -> Self {
        Self { config }
    }
}

#[async_trait]
impl SourceProvider for ListingSourceProvider {
    async fn open(&self) -> Result<Box<dyn DataSource>> {
        let client = create_async_client(&self.config)?;
        log::info!("Opened listing session for {}", self.config.base_url);
        Ok(Box::new(ListingSource::new(Arc::clone(&self.config), client)))
    }
}

/// HTTP session against the listing site.
pub struct ListingSource {
    config: Arc<SourceConfig>,
    client: Option<Client>,
    requests: usize,
}

impl ListingSource {
    pub fn new(config: Arc<SourceConfig>, client: Client) -> Self {
        Self {
            config,
            client: Some(client),
            requests: 0,
        }
    }

    /// Listing page URL with the filter's country and sector as query parameters.
    pub fn listing_url(&self, category: Category, filter: &FilterSpec) -> Result<Url> {
        let mut url = Url::parse(&self.config.base_url)?.join(self.config.path_for(category))?;
        {
            let mut query = url.query_pairs_mut();
            if let Some(country) = &filter.country {
                query.append_pair(&self.config.country_param, country);
            }
            if let Some(sector) = &filter.sector {
                query.append_pair(&self.config.sector_param, sector);
            }
        }
        if url.query() == Some("") {
            url.set_query(None);
        }
        Ok(url)
    }

    async fn fetch_listing(&mut self, category: Category, filter: &FilterSpec) -> Result<Vec<Record>> {
        let context = format!("{category}/{}", filter.name);
        let client = self
            .client
            .clone()
            .ok_or_else(|| AppError::source_fetch(&context, "session already closed"))?;
        let url = self.listing_url(category, filter)?;

        let delay = Duration::from_millis(self.config.request_delay_ms);
        if self.requests > 0 && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.requests += 1;

        log::info!("Searching {category} with filters: {filter:?}");
        let html = fetch_text(&client, url.as_str())
            .await
            .map_err(|e| AppError::source_fetch(&context, e))?;

        let records = parse_listing(&html, &url, self.config.selectors_for(category))?;
        log::info!("Extracted {} {category} results", records.len());

        let matched = filter_by_status(records, filter);
        log::info!(
            "Found {} {category} matching the criteria for {}",
            matched.len(),
            filter.name
        );
        Ok(matched)
    }
}

#[async_trait]
impl DataSource for ListingSource {
    async fn search_tenders(&mut self, filter: &FilterSpec) -> Result<Vec<Record>> {
        self.fetch_listing(Category::Tenders, filter).await
    }

    async fn search_projects(&mut self, filter: &FilterSpec) -> Result<Vec<Record>> {
        self.fetch_listing(Category::Projects, filter).await
    }

    async fn close(&mut self) -> Result<()> {
        if self.client.take().is_some() {
            log::info!("Closed listing session after {} requests", self.requests);
        }
        Ok(())
    }
}

/// Keep only records whose status equals the filter's status, if one is set.
fn filter_by_status(records: Vec<Record>, filter: &FilterSpec) -> Vec<Record> {
    match &filter.status {
        Some(status) => records
            .into_iter()
            .filter(|r| r.status() == Some(status.as_str()))
            .collect(),
        None => records,
    }
}

/// Extract records from a listing page.
///
/// Items without a title are skipped.
pub fn parse_listing(html: &str, page_url: &Url, selectors: &ListingSelectors) -> Result<Vec<Record>> {
    let item_sel = parse_selector(&selectors.item)?;
    let title_sel = parse_selector(&selectors.title)?;
    let status_sel = selectors.status.as_deref().map(parse_selector).transpose()?;
    let metadata_sel = selectors.metadata.as_deref().map(parse_selector).transpose()?;
    let field_sels = selectors
        .fields
        .iter()
        .map(|f| parse_selector(&f.selector).map(|sel| (f.field.as_str(), sel)))
        .collect::<Result<Vec<_>>>()?;

    let document = Html::parse_document(html);
    let mut records = Vec::new();
    let mut skipped = 0usize;

    for item in document.select(&item_sel) {
        let Some(title_elem) = item.select(&title_sel).next() else {
            skipped += 1;
            continue;
        };
        let title = element_text(&title_elem);
        let link = title_elem
            .value()
            .attr(&selectors.link_attr)
            .map(|href| resolve_url(page_url, href))
            .unwrap_or_default();
        let status = status_sel
            .as_ref()
            .and_then(|sel| item.select(sel).next())
            .map(|el| element_text(&el))
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| UNKNOWN.to_string());

        let mut record = match Record::new(title, link, status) {
            Ok(record) => record,
            Err(e) => {
                log::warn!("Skipping listing item: {e}");
                skipped += 1;
                continue;
            }
        };

        for (field, sel) in &field_sels {
            let value = item
                .select(sel)
                .next()
                .map(|el| element_text(&el))
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| UNKNOWN.to_string());
            record = record.with_field(*field, value);
        }

        if let Some(sel) = &metadata_sel {
            for line in item.select(sel).map(|el| element_text(&el)) {
                if let Some((key, value)) = line.split_once(':') {
                    let key = key.trim();
                    if !key.is_empty() {
                        record = record.with_field(key, value.trim());
                    }
                }
            }
        }

        records.push(record);
    }

    if skipped > 0 {
        log::warn!("Skipped {skipped} listing items without a title");
    }
    Ok(records)
}

fn element_text(element: &ElementRef) -> String {
    normalize_whitespace(&element.text().collect::<String>())
}

fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}

//! Listing sources.
//!
//! A [`SourceProvider`] opens one [`DataSource`] session per run. Sessions
//! hold exclusive resources and are used sequentially, never shared between
//! concurrent searches.

mod listings;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Category, FilterSpec, Record};

pub use listings::{ListingSource, ListingSourceProvider, parse_listing};

/// One open session against the listing site.
#[async_trait]
pub trait DataSource: Send {
    /// Current tender listings matching `filter`.
    ///
    /// An empty result means the site listed nothing; failures are errors.
    async fn search_tenders(&mut self, filter: &FilterSpec) -> Result<Vec<Record>>;

    /// Current project listings matching `filter`.
    async fn search_projects(&mut self, filter: &FilterSpec) -> Result<Vec<Record>>;

    /// Dispatch on category.
    async fn search(&mut self, category: Category, filter: &FilterSpec) -> Result<Vec<Record>> {
        match category {
            Category::Tenders => self.search_tenders(filter).await,
            Category::Projects => self.search_projects(filter).await,
        }
    }

    /// Release the session. Called once, after the last search of a run.
    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Opens data source sessions.
#[async_trait]
pub trait SourceProvider: Send + Sync {
    async fn open(&self) -> Result<Box<dyn DataSource>>;
}

// src/lib.rs

//! tenderwatch library
//!
//! Scrapes tender and project listings on a schedule, keeps every scrape as an
//! immutable snapshot and mails a digest of listings that were not present in
//! the previous snapshot of the same search.

pub mod config;
pub mod error;
pub mod models;
pub mod notify;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;

//! Integration tests against a mock HTTP API

mod crawl_tests;
mod fetch_tests;

//! Unit and integration tests for the Sentinel SDK
//!
//! HTTP legs run against WireMock servers; in-process legs use the fakes in
//! `fakes`.

pub mod config_tests;
pub mod fakes;

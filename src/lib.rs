//! Label trends over a static export of voice-of-customer records.
//!
//! The core is pure: [`aggregate`] turns records into zero-filled month and
//! day buckets, [`selection`] and [`details`] project them onto the current
//! filter, and [`dashboard::Dashboard`] keeps those views in step with UI
//! events. [`ui`] renders them in the terminal.

pub mod aggregate;
pub mod config;
pub mod dashboard;
pub mod details;
pub mod domain;
pub mod selection;
pub mod storage;
pub mod ui;

#![deny(clippy::unwrap_used)]

pub mod bulk;
pub mod catalog;
pub mod control;
pub mod presenter;
pub mod query;
pub mod report;
pub mod settings;

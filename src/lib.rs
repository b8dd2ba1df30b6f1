// src/lib.rs

//! Classifieds crawler library.
//!
//! Polls classifieds sites for new listings that match user filters and
//! hands matches to a [`services::Notifier`]. Start with
//! [`pipeline::build_scheduler`].

pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod sites;
pub mod storage;
pub mod utils;

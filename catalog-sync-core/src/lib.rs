#![doc = "catalog-sync-core: core logic library for catalog-sync."]

//! This crate contains the staging-and-publish pipeline for product photos:
//! SKU resolution, per-SKU staging, image normalization onto a fixed canvas,
//! and the safe partial update of a git-backed image store.
//!
//! # Usage
//! Build a [`config::PipelineConfig`], pick a [`contract::RemoteStore`]
//! (normally [`git::GitCli`]) and a [`contract::ProgressSink`], then call
//! [`pipeline::run_pipeline`].

pub mod config;
pub mod contract;
pub mod error;
pub mod git;
pub mod normalize;
pub mod pipeline;
pub mod publish;
pub mod sku;
pub mod stage;

pub use error::{PipelineError, RemoteError};
pub use sku::Sku;

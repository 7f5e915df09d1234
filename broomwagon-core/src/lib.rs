#![doc = "broomwagon-core: ticket distribution engine and exactly-once file pipeline."]

//! This crate holds all of broomwagon's business logic: resolving the weekly
//! driver roster, the rotation-aware fair-share allocator, the processing
//! ledger and the per-file pipeline that ties them together.
//!
//! # Usage
//! Build a [`pipeline::Pipeline`] from a [`config::PipelineConfig`] and the
//! collaborators declared in [`contract`], then call
//! [`pipeline::Pipeline::run`]. [`tabular::TabularFormat`] picks the CSV or
//! `.xlsx` codec for a given input extension.

pub mod config;
pub mod contract;
pub mod dataset;
pub mod error;
pub mod formatter;
pub mod ledger;
pub mod pipeline;
pub mod roster;
pub mod rotation;
pub mod tabular;

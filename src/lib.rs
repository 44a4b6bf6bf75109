#![forbid(unsafe_code)]

//! # rubric-harness
//!
//! Evaluation harness for an LLM assistant that answers questions about a
//! metadata catalog of opioid-overdose data measures. The harness is a
//! linear batch pipeline: generate candidate prompts per topic, filter to
//! one per topic, run each prompt against the assistant with the catalog
//! attached, judge every response against a fixed four-question rubric,
//! and tally yes/no scores. A separate entry point computes inter-rater
//! agreement (Fleiss'/Cohen's kappa) over a human/LLM review sheet.
//!
//! Stages run strictly one LLM call at a time and communicate only through
//! artifact files, so any stage can be re-run in isolation.

pub mod agreement;
pub mod artifacts;
pub mod config;
pub mod evaluate;
pub mod execute;
pub mod extract;
pub mod filter;
pub mod gateway;
pub mod generate;
pub mod metadata;
pub mod prompts;
pub mod tally;
pub mod transcript;

pub use config::HarnessConfig;
pub use gateway::{ChatGateway, OpenAiAdapter, ProviderGateway};

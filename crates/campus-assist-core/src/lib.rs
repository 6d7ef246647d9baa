//! # Campus Assist Core
//!
//! Pure, I/O-free logic for Campus Assist: data models, tokenization and
//! language detection, the lexical (TF-IDF) index and retriever, the rule
//! router, and answer-text helpers.
//!
//! This crate performs no filesystem or network access. Loading the
//! knowledge base, calling generation providers, and orchestrating the
//! answer pipeline live in the `campus-assist` app crate.

pub mod answer;
pub mod index;
pub mod models;
pub mod rules;
pub mod text;

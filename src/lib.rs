//! # Campus Assist
//!
//! Student-services question answering over a local knowledge base, in
//! Arabic and English.
//!
//! A question first meets a small rule router (greetings and ambiguous
//! requests get canned answers), then lexical TF-IDF retrieval. Confident
//! matches are answered from the sources, by a grounded generator when one
//! is configured and by extracting the best entry otherwise; weak matches
//! get a clearly marked general answer or a request for clarification.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────────┐
//! │ kb.jsonl     │──▶│ Knowledge    │──▶│  Orchestrator    │
//! │ (hot reload) │   │ base (index) │   │ rules → ladder   │
//! └──────────────┘   └──────────────┘   └────────┬─────────┘
//!                                                │
//!                      ┌──────────────┬──────────┤
//!                      ▼              ▼          ▼
//!                 ┌──────────┐  ┌──────────┐ ┌────────────┐
//!                 │   CLI    │  │   HTTP   │ │ Generators │
//!                 │ (assist) │  │  (axum)  │ │ (LLM APIs) │
//!                 └──────────┘  └──────────┘ └────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`knowledge_base`] | JSONL loading, source selection, hot reload |
//! | [`generation`] | Generation providers and model candidate fallback |
//! | [`orchestrator`] | The staged answer pipeline |
//! | [`assistant`] | Shared facade: snapshots, status, settings reload |
//! | [`server`] | HTTP adapter |
//!
//! Pure text processing, indexing, and rule routing live in the
//! `campus-assist-core` crate.

pub mod assistant;
pub mod config;
pub mod generation;
pub mod knowledge_base;
pub mod orchestrator;
pub mod server;

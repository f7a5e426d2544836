//! # Car Scout
//!
//! Collects vehicle listings from a generative search source, keeps them in
//! SQLite without duplicates, and groups each cycle's new arrivals with
//! stored cars of similar price.
//!
//! The domain logic (models, dedup gate, grouping, ingestion cycle) lives in
//! the [`car_scout_core`] crate. This crate supplies the SQLite store, the
//! candidate sources, configuration, the `scout` CLI, and the HTTP API.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────────┐   ┌──────────┐
//! │   Source     │──▶│  Ingestion cycle │──▶│  SQLite  │
//! │ OpenAI/File  │   │ validate+dedup   │   │ cars +   │
//! └──────────────┘   │ group by price   │   │ history  │
//!                    └──────────────────┘   └────┬─────┘
//!                                                │
//!                         ┌──────────────────────┤
//!                         ▼                      ▼
//!                    ┌──────────┐          ┌──────────┐
//!                    │   CLI    │          │   HTTP   │
//!                    │ (scout)  │          │  (/api)  │
//!                    └──────────┘          └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! scout init                              # create database
//! scout ingest "new sports cars 2025"     # run one cycle
//! scout ingest --from-file response.json  # replay a saved response
//! scout list                              # stored cars + stats
//! scout similar --price 51000             # price window lookup
//! scout serve                             # start HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | SQLite record store |
//! | [`source`] | OpenAI and file candidate sources |
//! | [`ingest`] | Ingestion command |
//! | [`cars`] | Listing, history, similarity, and single-car admission |
//! | [`stats`] | Database statistics |
//! | [`format`] | Price and timestamp display helpers |
//! | [`server`] | HTTP API server |

pub mod cars;
pub mod config;
pub mod db;
pub mod format;
pub mod ingest;
pub mod migrate;
pub mod server;
pub mod source;
pub mod sqlite_store;
pub mod stats;

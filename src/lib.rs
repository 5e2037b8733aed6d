//! # omnizient
//!
//! On-device document indexing and multi-strategy search.
//!
//! A crawler walks a directory tree, extracts text from each file (plain
//! text, PDF pages, office documents, OCR over images), embeds every unit
//! of text, and stores it in SQLite. Searches combine file-name matches,
//! full-text matches, and semantic similarity into one list.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────┐   ┌───────────┐   ┌─────────────┐
//! │ Crawler  │──▶│ Extractor │──▶│ Embedding │──▶│ Index Store │
//! │ walkdir  │   │ pdf/ooxml │   │ provider  │   │   SQLite    │
//! └──────────┘   │ ocr/text  │   └───────────┘   └──────┬──────┘
//!                └───────────┘                          │
//!                                     ┌─────────────────┤
//!                                     ▼                 ▼
//!                               ┌───────────┐    ┌────────────┐
//!                               │  Search   │◀───│ CLI / HTTP │
//!                               │  Engine   │    │  mirror    │
//!                               └───────────┘    └────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! omnizient init                  # create database
//! omnizient crawl                 # index the configured root
//! omnizient search invoice --ext pdf
//! omnizient sweep                 # drop documents whose files are gone
//! omnizient serve                 # read-only web page on 127.0.0.1:8080
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Documents, index entries, id derivation |
//! | [`error`] | Error taxonomy |
//! | [`classify`] | Media-type classification |
//! | [`extract`] | Content extraction per format |
//! | [`embedding`] | Embedding providers and vector utilities |
//! | [`store`] | Index Store trait, SQLite and in-memory backends |
//! | [`crawler`] | Full crawl and deletion sweep |
//! | [`search`] | Name, full-text, and semantic search |
//! | [`server`] | Read-only HTTP mirror |
//! | [`commands`] | CLI command implementations |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema creation |

pub mod classify;
pub mod commands;
pub mod config;
pub mod crawler;
pub mod db;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod migrate;
pub mod models;
pub mod search;
pub mod server;
pub mod store;

//! API Auto Docs - documentation records and example responses for Rust web projects.
//!
//! Routes come from a [`catalog::RouteCatalog`]: either discovered from the
//! source of an Axum or Actix-Web project, or registered by hand. Each route
//! is turned into a [`doc::Doc`] carrying its URI, methods, handler, doc
//! comments, path parameters and the validation rules of its request type.
//! Example response bodies are produced from entity factories and their
//! relations inside a throwaway store.
//!
//! # Architecture
//!
//! 1. [`scanner`] and [`parser`] - find and parse the project's Rust files
//! 2. [`detector`] - detect which web frameworks are used
//! 3. [`catalog`] - the route table, discovered from source or static
//! 4. [`rules`] - validation rules from registered schemas or from source
//! 5. [`assembler`] - filters routes and builds documentation records
//! 6. [`grouping`] - sorting and grouping of records
//! 7. [`mock`] - entities, fake data, relation graphs and the scratch store
//! 8. [`response`] - example responses with static overrides
//! 9. [`pipeline`] - the public operations tying it together
//! 10. [`serializer`] - YAML or JSON output
//!
//! # Example Usage
//!
//! ```no_run
//! use api_auto_docs::catalog::source::SourceProject;
//! use api_auto_docs::config::DocsConfig;
//! use api_auto_docs::grouping::GroupBy;
//! use api_auto_docs::pipeline::{ApiDocs, DocsQuery};
//! use api_auto_docs::serializer::serialize_json;
//! use std::path::Path;
//!
//! let project = SourceProject::load(Path::new("./my-project")).unwrap();
//! let api_docs = ApiDocs::from_project(DocsConfig::default(), &project, None).unwrap();
//!
//! let docs = api_docs
//!     .docs(&DocsQuery {
//!         group_by: Some(GroupBy::ApiUri),
//!         ..DocsQuery::default()
//!     })
//!     .unwrap();
//! println!("{}", serialize_json(&docs).unwrap());
//! ```
//!
//! # Command-Line Interface
//!
//! See the [`cli`] module.

pub mod assembler;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod detector;
pub mod doc;
pub mod error;
pub mod grouping;
pub mod mock;
pub mod overrides;
pub mod parser;
pub mod pipeline;
pub mod response;
pub mod rules;
pub mod scanner;
pub mod serializer;
pub mod source_index;

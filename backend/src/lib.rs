//! # Cadastro - customer intake validation and reconciliation
//!
//! Cadastro reads a customer intake spreadsheet, validates each customer
//! (CPF check digits, full name, age, e-mail, phone, CEP), compares the
//! survivors with the system of record and produces the registration API
//! payload plus a spreadsheet of rejected customers.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │ XLSX / CSV  │────▶│  Validator  │────▶│  Reconciler │────▶│ JSON + XLSX │
//! │  (intake)   │     │ (+ ViaCEP)  │     │  (system)   │     │  (outputs)  │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use cadastro::{process_files, ProcessOptions};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() {
//!     let report = process_files(
//!         Path::new("dados.xlsx"),
//!         Path::new("sistema.xlsx"),
//!         &ProcessOptions::default(),
//!     ).await.unwrap();
//!     println!("{} accepted", report.stats.accepted);
//! }
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`models`] - Domain models (Cell, Field, CustomerRecord, detach reasons)
//! - [`parser`] - Spreadsheet and CSV reading with auto-detection
//! - [`cep`] - Postal code lookup
//! - [`validation`] - Field checks and payload schema
//! - [`transform`] - Normalization, reconciliation and pipeline
//! - [`export`] - Payload JSON and rejected spreadsheet
//! - [`api`] - HTTP API server

// Core modules
pub mod error;
pub mod models;

// Input
pub mod parser;

// Postal lookup
pub mod cep;

// Validation
pub mod validation;

// Transformation
pub mod transform;

// Output
pub mod export;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    ExportError, LookupError, PipelineError, PipelineResult, ServerError, SheetError,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{
    AcceptedRecord, Cell, Check, CustomerRecord, DetachReason, DetachedRecord, Field, RawRecord,
    Tipo, ValidationResult,
};

// =============================================================================
// Re-exports - Input
// =============================================================================

pub use parser::{read_table, read_table_bytes, Table};

// =============================================================================
// Re-exports - Validation
// =============================================================================

pub use cep::{CepLookup, CepOutcome, ViaCepClient};
pub use validation::{validate_payload, FieldValidator};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use transform::pipeline::{
    check_file, process_files, run, DirectorySink, FileSource, MemorySink, MemorySource,
    OutputSink, ProcessOptions, ProcessReport, RecordSource, RunStats,
};
pub use transform::{normalize, partition, reconcile, Partition, Reconciliation};

// =============================================================================
// Re-exports - Output
// =============================================================================

pub use export::{to_api_payload, to_rejected_export, RegistrationPayload, RejectedFormat};

// Server
pub mod server {
    pub use crate::api::server::start_server;
}

//! High-level pipeline API: intake spreadsheets in, payload and rejected sheet out.
//!
//! The run is an explicit function over three seams:
//!
//! - [`RecordSource`] - where the incoming and system-of-record rows come from
//! - [`OutputSink`] - where the payload and the rejected records go
//! - [`FieldValidator`] - the checks, with its injected postal lookup
//!
//! ```text
//! incoming ──partition──▶ accepted ──reconcile(system)──▶ I / A ──▶ payload
//!              │                          │
//!              └──────── rejected ◀───────┘ update / duplicate ──▶ rejected sheet
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use cadastro::transform::pipeline::{process_files, ProcessOptions};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let report = process_files(
//!         Path::new("dados.xlsx"),
//!         Path::new("sistema.xlsx"),
//!         &ProcessOptions::default(),
//!     ).await?;
//!
//!     println!("{} inserts", report.stats.inserts);
//!     Ok(())
//! }
//! ```

use chrono::{Local, NaiveDate};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use super::normalize::{normalize, partition};
use super::reconcile::reconcile;
use crate::api::logs::{log_error, log_info, log_info_indent, log_success, log_warning};
use crate::cep::{CepLookup, ViaCepClient};
use crate::error::{ExportResult, PipelineError, PipelineResult, SheetResult};
use crate::export::{
    payload_filename, rejected_filename, to_api_payload, write_payload, write_rejected,
    RegistrationPayload, RejectedFormat,
};
use crate::models::{CustomerRecord, DetachReason, DetachedRecord, RawRecord, Tipo, ValidationResult};
use crate::parser::read_table;
use crate::validation::{validate_payload, FieldValidator};

// =============================================================================
// Seams
// =============================================================================

/// Provides the two input datasets.
pub trait RecordSource {
    /// Rows of the intake spreadsheet.
    fn incoming(&self) -> SheetResult<Vec<RawRecord>>;

    /// Rows of the system-of-record export.
    fn system(&self) -> SheetResult<Vec<RawRecord>>;
}

/// Receives the two run outputs.
pub trait OutputSink {
    fn write_payload(&mut self, payload: &[RegistrationPayload]) -> ExportResult<()>;

    fn write_rejected(&mut self, rejected: &[DetachedRecord]) -> ExportResult<()>;
}

/// Reads both datasets from spreadsheet or CSV files.
#[derive(Debug, Clone)]
pub struct FileSource {
    pub incoming: PathBuf,
    pub system: PathBuf,
}

impl FileSource {
    pub fn new(incoming: impl Into<PathBuf>, system: impl Into<PathBuf>) -> Self {
        Self {
            incoming: incoming.into(),
            system: system.into(),
        }
    }

    fn read(path: &Path) -> SheetResult<Vec<RawRecord>> {
        let table = read_table(path)?;
        log_info_indent(format!("{}: {} rows", path.display(), table.records.len()), 1);
        if let Some(encoding) = &table.encoding {
            log_info_indent(format!("Encoding: {}", encoding), 2);
        }
        Ok(table.records)
    }
}

impl RecordSource for FileSource {
    fn incoming(&self) -> SheetResult<Vec<RawRecord>> {
        Self::read(&self.incoming)
    }

    fn system(&self) -> SheetResult<Vec<RawRecord>> {
        Self::read(&self.system)
    }
}

/// Datasets already in memory (uploads, tests).
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    pub incoming: Vec<RawRecord>,
    pub system: Vec<RawRecord>,
}

impl RecordSource for MemorySource {
    fn incoming(&self) -> SheetResult<Vec<RawRecord>> {
        Ok(self.incoming.clone())
    }

    fn system(&self) -> SheetResult<Vec<RawRecord>> {
        Ok(self.system.clone())
    }
}

/// Writes date-stamped files into a directory.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
    date: NaiveDate,
    format: RejectedFormat,
    pub payload_path: Option<PathBuf>,
    pub rejected_path: Option<PathBuf>,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>, date: NaiveDate, format: RejectedFormat) -> Self {
        Self {
            dir: dir.into(),
            date,
            format,
            payload_path: None,
            rejected_path: None,
        }
    }

    fn target(&self, file_name: String) -> ExportResult<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        Ok(self.dir.join(file_name))
    }
}

impl OutputSink for DirectorySink {
    fn write_payload(&mut self, payload: &[RegistrationPayload]) -> ExportResult<()> {
        let path = self.target(payload_filename(self.date))?;
        write_payload(&path, payload)?;
        log_success(format!("Payload written to {}", path.display()));
        self.payload_path = Some(path);
        Ok(())
    }

    fn write_rejected(&mut self, rejected: &[DetachedRecord]) -> ExportResult<()> {
        let path = self.target(rejected_filename(self.date, self.format))?;
        write_rejected(&path, rejected, self.format)?;
        log_success(format!("Rejected records written to {}", path.display()));
        self.rejected_path = Some(path);
        Ok(())
    }
}

/// Keeps the outputs in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    pub payload: Vec<RegistrationPayload>,
    pub rejected: Vec<DetachedRecord>,
}

impl OutputSink for MemorySink {
    fn write_payload(&mut self, payload: &[RegistrationPayload]) -> ExportResult<()> {
        self.payload = payload.to_vec();
        Ok(())
    }

    fn write_rejected(&mut self, rejected: &[DetachedRecord]) -> ExportResult<()> {
        self.rejected = rejected.to_vec();
        Ok(())
    }
}

// =============================================================================
// Options & results
// =============================================================================

/// Options for a file-to-file run
#[derive(Debug, Clone)]
pub struct ProcessOptions {
    /// Directory receiving both output files
    pub output_dir: PathBuf,

    /// Reference date for the age check and the filename stamps (default: today)
    pub run_date: Option<NaiveDate>,

    /// Format of the rejected records file
    pub rejected_format: RejectedFormat,

    /// Skip the payload schema self-check
    pub skip_schema_check: bool,
}

impl Default for ProcessOptions {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            run_date: None,
            rejected_format: RejectedFormat::Xlsx,
            skip_schema_check: false,
        }
    }
}

impl ProcessOptions {
    pub fn run_date(&self) -> NaiveDate {
        self.run_date.unwrap_or_else(|| Local::now().date_naive())
    }
}

/// Counters of one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStats {
    pub incoming_rows: usize,
    pub system_rows: usize,
    pub accepted: usize,
    pub inserts: usize,
    pub alterations: usize,
    pub rejected: usize,
    pub failed_validation: usize,
    pub already_registered: usize,
    pub duplicate_cpf: usize,
    pub schema_violations: usize,
}

/// Result of [`process_files`].
#[derive(Debug, Clone)]
pub struct ProcessReport {
    pub stats: RunStats,
    pub payload_path: Option<PathBuf>,
    pub rejected_path: Option<PathBuf>,
}

// =============================================================================
// Run
// =============================================================================

/// Check every payload object against the embedded schema.
///
/// Returns the number of objects with violations; each one is logged.
pub fn check_payload(payload: &[RegistrationPayload]) -> usize {
    let mut violations = 0;

    for item in payload {
        let errors = match serde_json::to_value(item) {
            Ok(value) => validate_payload(&value).err(),
            Err(e) => Some(vec![e.to_string()]),
        };

        if let Some(errors) = errors {
            violations += 1;
            if violations <= 5 {
                log_warning(format!("Payload {} does not match the schema:", item.id));
                for err in errors.iter().take(3) {
                    log_info_indent(format!("- {}", err), 1);
                }
            }
        }
    }

    if violations > 0 {
        log_warning(format!("{} payload objects with schema violations", violations));
    }
    violations
}

/// Run the full pipeline.
///
/// 1. Read the incoming and system datasets
/// 2. Partition incoming rows on the field checks
/// 3. Reconcile accepted records against the system of record
/// 4. Build the payload (and self-check it unless disabled)
/// 5. Hand both outputs to the sink
pub async fn run<S, K, L>(
    source: &S,
    sink: &mut K,
    validator: &FieldValidator<L>,
    options: &ProcessOptions,
) -> PipelineResult<RunStats>
where
    S: RecordSource,
    K: OutputSink,
    L: CepLookup,
{
    log_info("📄 Reading input data...");
    let incoming = source.incoming()?;
    if incoming.is_empty() {
        log_error("Incoming dataset has no rows");
        return Err(PipelineError::EmptyInput);
    }
    let system: Vec<CustomerRecord> = source.system()?.iter().map(normalize).collect();
    log_success(format!(
        "{} incoming rows, {} registered customers",
        incoming.len(),
        system.len()
    ));

    let partitioned = partition(&incoming, validator).await;
    let failed_validation = partitioned.rejected.len();

    let reconciliation = reconcile(partitioned, &system);

    log_info("📦 Building registration payload...");
    let payload = to_api_payload(&reconciliation.accepted);
    let schema_violations = if options.skip_schema_check {
        0
    } else {
        check_payload(&payload)
    };

    log_info("💾 Writing outputs...");
    sink.write_payload(&payload)?;
    sink.write_rejected(&reconciliation.rejected)?;

    let stats = RunStats {
        incoming_rows: incoming.len(),
        system_rows: system.len(),
        accepted: reconciliation.accepted.len(),
        inserts: reconciliation.count(Tipo::Insert),
        alterations: reconciliation.count(Tipo::Alteration),
        rejected: reconciliation.rejected.len(),
        failed_validation,
        already_registered: reconciliation.count_reason(DetachReason::AlreadyRegistered),
        duplicate_cpf: reconciliation.count_reason(DetachReason::DuplicateCpf),
        schema_violations,
    };

    log_success(format!(
        "Done: {} accepted, {} rejected",
        stats.accepted, stats.rejected
    ));
    Ok(stats)
}

/// Process two files on disk against the configured postal service.
///
/// Outputs land in `options.output_dir`, stamped with the run date.
pub async fn process_files(
    incoming: &Path,
    system: &Path,
    options: &ProcessOptions,
) -> PipelineResult<ProcessReport> {
    let date = options.run_date();
    let source = FileSource::new(incoming, system);
    let mut sink = DirectorySink::new(&options.output_dir, date, options.rejected_format);
    let validator = FieldValidator::new(ViaCepClient::from_env()).with_today(date);

    let stats = run(&source, &mut sink, &validator, options).await?;

    Ok(ProcessReport {
        stats,
        payload_path: sink.payload_path,
        rejected_path: sink.rejected_path,
    })
}

/// Run only the field checks over a file.
///
/// Returns one result per row, in file order.
pub async fn check_file<L: CepLookup>(
    path: &Path,
    validator: &FieldValidator<L>,
) -> PipelineResult<Vec<ValidationResult>> {
    let table = read_table(path)?;
    if table.records.is_empty() {
        return Err(PipelineError::EmptyInput);
    }

    let mut results = Vec::with_capacity(table.records.len());
    for raw in &table.records {
        results.push(validator.validate_all(&normalize(raw)).await);
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cep::testing::KnownCeps;
    use crate::models::{Cell, Check, Field};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 18).unwrap()
    }

    fn validator() -> FieldValidator<KnownCeps> {
        FieldValidator::new(KnownCeps::new(&["01310100", "20040002"])).with_today(today())
    }

    fn raw(pairs: &[(&str, &str)]) -> RawRecord {
        pairs.iter().map(|(k, v)| (k.to_string(), Cell::text(*v))).collect()
    }

    fn intake(nome: &str, cpf: &str, phone: &str, cep: &str) -> RawRecord {
        raw(&[
            ("NOME", nome),
            ("CPF", cpf),
            ("Data de Nascimento", "15/03/1990"),
            ("Email", "aluno@x.com"),
            ("CEP", cep),
            ("Endereço", "Avenida Paulista"),
            ("Numero", "1000"),
            ("Bairro", "Bela Vista"),
            ("Cidade", "São Paulo"),
            ("Estado", "SP"),
            ("Telefone", phone),
            ("RA", "2023001"),
            ("Curso", "Direito"),
            ("Faculdade", "USP"),
        ])
    }

    /// The same customer as exported by the system of record.
    fn registered(nome: &str, cpf: &str, phone: &str, cep: &str) -> RawRecord {
        intake(nome, cpf, phone, cep)
            .into_iter()
            .filter_map(|(column, cell)| {
                Field::from_column(&column).map(|f| (f.as_str().to_string(), cell))
            })
            .collect()
    }

    fn source() -> MemorySource {
        MemorySource {
            incoming: vec![
                intake("Ana Silva", "529.982.247-25", "(11) 91234-5678", "01310-100"),
                intake("Bruno Costa", "111.444.777-35", "(21) 99876-5432", "20040-002"),
                intake("Carla Souza", "123.456.789-09", "11 91234-5678", "01310-100"),
            ],
            system: vec![registered(
                "Ana Silva",
                "52998224725",
                "(11) 91234-5678",
                "01310-100",
            )],
        }
    }

    #[tokio::test]
    async fn test_run_end_to_end() {
        let mut sink = MemorySink::default();
        let stats = run(&source(), &mut sink, &validator(), &ProcessOptions::default())
            .await
            .unwrap();

        assert_eq!(stats.incoming_rows, 3);
        assert_eq!(stats.system_rows, 1);
        assert_eq!(stats.inserts, 1);
        assert_eq!(stats.alterations, 0);
        assert_eq!(stats.failed_validation, 1);
        assert_eq!(stats.already_registered, 1);
        assert_eq!(stats.schema_violations, 0);
        assert_eq!(stats.accepted + stats.rejected, stats.incoming_rows);

        // Bruno is new
        assert_eq!(sink.payload.len(), 1);
        assert_eq!(sink.payload[0].id, "usp-11144477735");
        assert_eq!(sink.payload[0].tipo, "I");

        // Carla fails the phone format, Ana is unchanged
        assert_eq!(sink.rejected.len(), 2);
        assert_eq!(
            sink.rejected[0].detach_reason,
            vec![DetachReason::Failed(Check::Phone)]
        );
        assert_eq!(sink.rejected[1].reasons_text(), "update_validation");
    }

    #[tokio::test]
    async fn test_changed_customer_is_alteration() {
        let mut source = source();
        source.system = vec![registered(
            "Ana Silva",
            "52998224725",
            "(11) 90000-0000",
            "01310-100",
        )];

        let mut sink = MemorySink::default();
        let stats = run(&source, &mut sink, &validator(), &ProcessOptions::default())
            .await
            .unwrap();

        assert_eq!(stats.alterations, 1);
        assert_eq!(stats.inserts, 1);
        let ana = sink.payload.iter().find(|p| p.cpf == "52998224725").unwrap();
        assert_eq!(ana.tipo, "A");
    }

    #[tokio::test]
    async fn test_empty_incoming_is_an_error() {
        let source = MemorySource::default();
        let mut sink = MemorySink::default();

        let result = run(&source, &mut sink, &validator(), &ProcessOptions::default()).await;
        assert!(matches!(result, Err(PipelineError::EmptyInput)));
    }

    #[tokio::test]
    async fn test_directory_sink_writes_stamped_files() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let mut sink = DirectorySink::new(&out, today(), RejectedFormat::Csv);

        run(&source(), &mut sink, &validator(), &ProcessOptions::default())
            .await
            .unwrap();

        let payload_path = sink.payload_path.unwrap();
        let rejected_path = sink.rejected_path.unwrap();
        assert_eq!(payload_path, out.join("dados-20261018.json"));
        assert_eq!(rejected_path, out.join("dados_descartados-20261018.csv"));

        let json = std::fs::read_to_string(payload_path).unwrap();
        assert!(json.contains("\"nome\": \"BRUNO COSTA\""));
        let csv = std::fs::read_to_string(rejected_path).unwrap();
        assert!(csv.lines().next().unwrap().ends_with(";detach_reason"));
        assert_eq!(csv.lines().count(), 3);
    }

    #[tokio::test]
    async fn test_check_file_reports_each_row() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dados.csv");
        std::fs::write(
            &path,
            "NOME;CPF;Data de Nascimento;Email;CEP;Telefone\n\
             Ana Silva;529.982.247-25;15/03/1990;ana@x.com;01310-100;(11) 91234-5678\n\
             Carla;111.111.111-11;2015-01-01;carla;00000-000;11 91234-5678\n",
        )
        .unwrap();

        let results = check_file(&path, &validator()).await.unwrap();

        assert_eq!(results.len(), 2);
        assert!(results[0].all_passed());
        assert_eq!(results[1].failed(), Check::ALL.to_vec());
    }

    #[test]
    fn test_options_default_date_is_today() {
        let options = ProcessOptions::default();
        assert_eq!(options.run_date(), Local::now().date_naive());

        let pinned = ProcessOptions {
            run_date: Some(today()),
            ..ProcessOptions::default()
        };
        assert_eq!(pinned.run_date(), today());
    }
}

//! Domain models for the cadastro pipeline.
//!
//! This module contains the core data structures passed between stages:
//!
//! - [`Cell`] - A raw spreadsheet scalar (text, number, date or empty)
//! - [`Field`] - Canonical customer field names and the column rename table
//! - [`CustomerRecord`] - A customer keyed by canonical field
//! - [`Check`] / [`ValidationResult`] - Named outcomes of the field validator
//! - [`DetachedRecord`] - A rejected customer with its detach reasons
//! - [`AcceptedRecord`] - A customer classified as insert or alteration

use chrono::NaiveDate;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

// =============================================================================
// Cell
// =============================================================================

/// A raw scalar read from an input table.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(untagged)]
pub enum Cell {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Date(NaiveDate),
}

impl Cell {
    /// Build a cell from text, mapping blank strings to [`Cell::Empty`].
    pub fn text(value: impl Into<String>) -> Self {
        let value = value.into();
        if value.trim().is_empty() {
            Cell::Empty
        } else {
            Cell::Text(value)
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }

    /// Keep only the ASCII digits of the rendered value.
    ///
    /// Numeric cells are left-padded with zeros up to `width`, since
    /// spreadsheets drop the leading zeros of CPFs and CEPs stored as numbers.
    pub fn digits(&self, width: usize) -> String {
        let digits: String = self.to_string().chars().filter(|c| c.is_ascii_digit()).collect();
        match self {
            Cell::Number(_) if digits.len() < width => format!("{:0>width$}", digits, width = width),
            _ => digits,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Empty => Ok(()),
            Cell::Text(s) => write!(f, "{}", s),
            Cell::Number(n) if n.fract() == 0.0 && n.abs() < i64::MAX as f64 => {
                write!(f, "{}", *n as i64)
            }
            Cell::Number(n) => write!(f, "{}", n),
            Cell::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
        }
    }
}

/// A source row keyed by the column names of the input file.
pub type RawRecord = BTreeMap<String, Cell>;

// =============================================================================
// Canonical fields
// =============================================================================

/// Canonical customer field names, in canonical column order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Nome,
    Cpf,
    DataNasc,
    Email,
    Cep,
    Endereco,
    Numero,
    Bairro,
    Cidade,
    Estado,
    Celular,
    Ra,
    Curso,
    Faculdade,
}

impl Field {
    pub const ALL: [Field; 14] = [
        Field::Nome,
        Field::Cpf,
        Field::DataNasc,
        Field::Email,
        Field::Cep,
        Field::Endereco,
        Field::Numero,
        Field::Bairro,
        Field::Cidade,
        Field::Estado,
        Field::Celular,
        Field::Ra,
        Field::Curso,
        Field::Faculdade,
    ];

    /// Canonical name used in outputs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Nome => "nome",
            Field::Cpf => "cpf",
            Field::DataNasc => "data_nasc",
            Field::Email => "email",
            Field::Cep => "cep",
            Field::Endereco => "endereco",
            Field::Numero => "numero",
            Field::Bairro => "bairro",
            Field::Cidade => "cidade",
            Field::Estado => "estado",
            Field::Celular => "celular",
            Field::Ra => "ra",
            Field::Curso => "curso",
            Field::Faculdade => "faculdade",
        }
    }

    /// Column header used by the intake spreadsheet.
    pub fn source_column(&self) -> &'static str {
        match self {
            Field::Nome => "NOME",
            Field::Cpf => "CPF",
            Field::DataNasc => "Data de Nascimento",
            Field::Email => "Email",
            Field::Cep => "CEP",
            Field::Endereco => "Endereço",
            Field::Numero => "Numero",
            Field::Bairro => "Bairro",
            Field::Cidade => "Cidade",
            Field::Estado => "Estado",
            Field::Celular => "Telefone",
            Field::Ra => "RA",
            Field::Curso => "Curso",
            Field::Faculdade => "Faculdade",
        }
    }

    /// Resolve a column header through the rename table.
    ///
    /// Headers already carrying a canonical name map to themselves.
    pub fn from_column(column: &str) -> Option<Self> {
        let column = column.trim();
        Self::ALL
            .into_iter()
            .find(|f| f.source_column() == column || f.as_str() == column)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Customer record
// =============================================================================

/// A customer keyed by canonical field.
///
/// A field is "present" when its column existed in the source, even if the
/// cell was blank.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct CustomerRecord {
    fields: BTreeMap<Field, Cell>,
}

impl CustomerRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, field: Field, cell: Cell) -> Self {
        self.fields.insert(field, cell);
        self
    }

    pub fn insert(&mut self, field: Field, cell: Cell) {
        self.fields.insert(field, cell);
    }

    pub fn get(&self, field: Field) -> Option<&Cell> {
        self.fields.get(&field)
    }

    pub fn contains(&self, field: Field) -> bool {
        self.fields.contains_key(&field)
    }

    /// Rendered, non-blank text of a field.
    pub fn text(&self, field: Field) -> Option<String> {
        self.get(field)
            .filter(|c| !c.is_empty())
            .map(|c| c.to_string())
    }

    /// Present fields in canonical order.
    pub fn fields(&self) -> impl Iterator<Item = Field> + '_ {
        self.fields.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Field, &Cell)> {
        self.fields.iter().map(|(f, c)| (*f, c))
    }

    /// Identity key: the CPF reduced to its digits.
    pub fn cpf_key(&self) -> Option<String> {
        self.get(Field::Cpf)
            .map(|c| c.digits(11))
            .filter(|d| !d.is_empty())
    }
}

impl FromIterator<(Field, Cell)> for CustomerRecord {
    fn from_iter<I: IntoIterator<Item = (Field, Cell)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

// =============================================================================
// Validation outcome
// =============================================================================

/// The six field checks, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Check {
    Cpf,
    Name,
    BirthdateAndAge,
    Email,
    Phone,
    Cep,
}

impl Check {
    pub const ALL: [Check; 6] = [
        Check::Cpf,
        Check::Name,
        Check::BirthdateAndAge,
        Check::Email,
        Check::Phone,
        Check::Cep,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Check::Cpf => "cpf_validation",
            Check::Name => "name_validation",
            Check::BirthdateAndAge => "birthdate_and_age_validation",
            Check::Email => "email_validation",
            Check::Phone => "phone_validation",
            Check::Cep => "cep_validation",
        }
    }
}

/// Ordered pass/fail map produced for one record.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ValidationResult {
    outcomes: Vec<(Check, bool)>,
}

impl ValidationResult {
    pub fn push(&mut self, check: Check, passed: bool) {
        self.outcomes.push((check, passed));
    }

    pub fn passed(&self, check: Check) -> Option<bool> {
        self.outcomes
            .iter()
            .find(|(c, _)| *c == check)
            .map(|(_, ok)| *ok)
    }

    pub fn all_passed(&self) -> bool {
        self.outcomes.iter().all(|(_, ok)| *ok)
    }

    /// Failed checks in evaluation order.
    pub fn failed(&self) -> Vec<Check> {
        self.outcomes
            .iter()
            .filter(|(_, ok)| !ok)
            .map(|(c, _)| *c)
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Check, bool)> + '_ {
        self.outcomes.iter().copied()
    }
}

// =============================================================================
// Detached records
// =============================================================================

/// Why a record left the accepted set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetachReason {
    /// A field check failed.
    Failed(Check),
    /// Exact copy of an already registered customer.
    AlreadyRegistered,
    /// Several incoming rows carry the same CPF.
    DuplicateCpf,
}

impl DetachReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetachReason::Failed(check) => check.name(),
            DetachReason::AlreadyRegistered => "update_validation",
            DetachReason::DuplicateCpf => "duplicate_cpf_validation",
        }
    }
}

impl Serialize for DetachReason {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl fmt::Display for DetachReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rejected customer with the reasons it was detached.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetachedRecord {
    #[serde(flatten)]
    pub record: CustomerRecord,
    pub detach_reason: Vec<DetachReason>,
}

impl DetachedRecord {
    pub fn new(record: CustomerRecord, detach_reason: Vec<DetachReason>) -> Self {
        Self {
            record,
            detach_reason,
        }
    }

    /// Reasons as a single delimited cell.
    pub fn reasons_text(&self) -> String {
        self.detach_reason
            .iter()
            .map(DetachReason::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

// =============================================================================
// Accepted records
// =============================================================================

/// Registration type of an accepted customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Tipo {
    /// Not yet registered.
    #[serde(rename = "I")]
    Insert,
    /// Registered, with at least one changed field.
    #[serde(rename = "A")]
    Alteration,
}

impl Tipo {
    pub fn code(&self) -> &'static str {
        match self {
            Tipo::Insert => "I",
            Tipo::Alteration => "A",
        }
    }
}

/// A customer that survived validation and reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AcceptedRecord {
    #[serde(flatten)]
    pub record: CustomerRecord,
    pub tipo: Tipo,
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_display() {
        assert_eq!(Cell::Number(123.0).to_string(), "123");
        assert_eq!(Cell::Number(1.5).to_string(), "1.5");
        assert_eq!(Cell::Empty.to_string(), "");
        let date = NaiveDate::from_ymd_opt(2001, 2, 3).unwrap();
        assert_eq!(Cell::Date(date).to_string(), "2001-02-03");
    }

    #[test]
    fn test_blank_text_is_empty() {
        assert_eq!(Cell::text("   "), Cell::Empty);
        assert_eq!(Cell::text("x"), Cell::Text("x".into()));
    }

    #[test]
    fn test_digits_pads_numbers_only() {
        assert_eq!(Cell::Number(1310100.0).digits(8), "01310100");
        assert_eq!(Cell::text("529.982.247-25").digits(11), "52998224725");
        assert_eq!(Cell::text("123").digits(11), "123");
    }

    #[test]
    fn test_field_from_column() {
        assert_eq!(Field::from_column("Data de Nascimento"), Some(Field::DataNasc));
        assert_eq!(Field::from_column("Telefone"), Some(Field::Celular));
        assert_eq!(Field::from_column("celular"), Some(Field::Celular));
        assert_eq!(Field::from_column("Observações"), None);
    }

    #[test]
    fn test_detached_serialization_flattens_fields() {
        let record = CustomerRecord::new()
            .with(Field::Nome, Cell::text("Ana Silva"))
            .with(Field::DataNasc, Cell::Empty);
        let detached = DetachedRecord::new(
            record,
            vec![DetachReason::Failed(Check::Cpf), DetachReason::Failed(Check::Phone)],
        );

        let json = serde_json::to_value(&detached).unwrap();
        assert_eq!(json["nome"], "Ana Silva");
        assert!(json["data_nasc"].is_null());
        assert_eq!(json["detach_reason"][1], "phone_validation");
        assert_eq!(detached.reasons_text(), "cpf_validation, phone_validation");
    }

    #[test]
    fn test_validation_result_failed_order() {
        let mut result = ValidationResult::default();
        for check in Check::ALL {
            result.push(check, !matches!(check, Check::Email | Check::Cpf));
        }
        assert!(!result.all_passed());
        assert_eq!(result.failed(), vec![Check::Cpf, Check::Email]);
        assert_eq!(result.passed(Check::Name), Some(true));
    }

    #[test]
    fn test_accepted_tipo_serialization() {
        let accepted = AcceptedRecord {
            record: CustomerRecord::new().with(Field::Cpf, Cell::text("52998224725")),
            tipo: Tipo::Alteration,
        };
        let json = serde_json::to_value(&accepted).unwrap();
        assert_eq!(json["tipo"], "A");
        assert_eq!(json["cpf"], "52998224725");
    }
}

//! Column renaming and accept/reject partitioning.
//!
//! ```text
//! raw rows ──normalize──▶ canonical records ──validate_all──┬──▶ accepted
//!                                                            └──▶ rejected (+ failed checks)
//! ```

use crate::api::logs::{log_info, log_success, log_warning};
use crate::cep::CepLookup;
use crate::models::{CustomerRecord, DetachReason, DetachedRecord, Field, RawRecord};
use crate::validation::FieldValidator;

/// Result of splitting a batch on the field checks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Partition {
    pub accepted: Vec<CustomerRecord>,
    pub rejected: Vec<DetachedRecord>,
}

impl Partition {
    pub fn len(&self) -> usize {
        self.accepted.len() + self.rejected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Rename source columns to canonical fields, dropping unknown columns.
pub fn normalize(raw: &RawRecord) -> CustomerRecord {
    raw.iter()
        .filter_map(|(column, cell)| Field::from_column(column).map(|field| (field, cell.clone())))
        .collect()
}

/// Normalize and validate every row.
///
/// Each row lands in exactly one of the two lists, in input order.
pub async fn partition<L: CepLookup>(raw_records: &[RawRecord], validator: &FieldValidator<L>) -> Partition {
    log_info(format!("✔️  Validating {} incoming rows...", raw_records.len()));

    let mut result = Partition::default();

    for raw in raw_records {
        let record = normalize(raw);
        let checks = validator.validate_all(&record).await;

        if checks.all_passed() {
            result.accepted.push(record);
        } else {
            let reasons = checks.failed().into_iter().map(DetachReason::Failed).collect();
            result.rejected.push(DetachedRecord::new(record, reasons));
        }
    }

    if result.rejected.is_empty() {
        log_success(format!("All {} rows passed validation", result.accepted.len()));
    } else {
        log_success(format!("Valid: {}", result.accepted.len()));
        log_warning(format!("Failed validation: {}", result.rejected.len()));
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cep::testing::KnownCeps;
    use crate::models::{Cell, Check};
    use chrono::NaiveDate;

    fn validator() -> FieldValidator<KnownCeps> {
        FieldValidator::new(KnownCeps::new(&["01310100"]))
            .with_today(NaiveDate::from_ymd_opt(2026, 10, 18).unwrap())
    }

    fn raw(pairs: &[(&str, &str)]) -> RawRecord {
        pairs.iter().map(|(k, v)| (k.to_string(), Cell::text(*v))).collect()
    }

    fn intake_row(cpf: &str, phone: &str) -> RawRecord {
        raw(&[
            ("NOME", "Ana Silva"),
            ("CPF", cpf),
            ("Data de Nascimento", "1990-03-15"),
            ("Email", "ana@x.com"),
            ("CEP", "01310-100"),
            ("Telefone", phone),
            ("Faculdade", "USP"),
        ])
    }

    #[test]
    fn test_normalize_renames_and_drops() {
        let record = normalize(&raw(&[
            ("NOME", "Ana Silva"),
            ("Telefone", "(11) 91234-5678"),
            ("Endereço", "Rua A"),
            ("Observações", "ignored"),
        ]));

        assert_eq!(record.text(Field::Nome).as_deref(), Some("Ana Silva"));
        assert_eq!(record.text(Field::Celular).as_deref(), Some("(11) 91234-5678"));
        assert_eq!(record.text(Field::Endereco).as_deref(), Some("Rua A"));
        assert_eq!(record.fields().count(), 3);
    }

    #[test]
    fn test_normalize_keeps_blank_columns_present() {
        let record = normalize(&raw(&[("Curso", "")]));
        assert!(record.contains(Field::Curso));
        assert_eq!(record.get(Field::Curso), Some(&Cell::Empty));
    }

    #[tokio::test]
    async fn test_partition_every_row_lands_once() {
        let rows = vec![
            intake_row("529.982.247-25", "(11) 91234-5678"),
            intake_row("111.111.111-11", "(11) 91234-5678"),
            intake_row("111.444.777-35", "11 91234-5678"),
            raw(&[]),
        ];

        let result = partition(&rows, &validator()).await;
        assert_eq!(result.len(), rows.len());
        assert_eq!(result.accepted.len(), 1);
        assert_eq!(result.rejected.len(), 3);
    }

    #[tokio::test]
    async fn test_partition_records_failed_checks() {
        let rows = vec![intake_row("111.444.777-35", "11 91234-5678")];
        let result = partition(&rows, &validator()).await;

        let detached = &result.rejected[0];
        assert_eq!(detached.detach_reason, vec![DetachReason::Failed(Check::Phone)]);
        // raw values are kept as read
        assert_eq!(detached.record.text(Field::Cpf).as_deref(), Some("111.444.777-35"));
    }

    #[tokio::test]
    async fn test_partition_single_record_is_exclusive() {
        for row in [intake_row("529.982.247-25", "(11) 91234-5678"), intake_row("1", "x")] {
            let result = partition(std::slice::from_ref(&row), &validator()).await;
            assert_eq!(result.accepted.len() + result.rejected.len(), 1);
        }
    }
}

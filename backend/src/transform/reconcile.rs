//! Insert / alteration / duplicate classification against the system of record.
//!
//! Records are matched on the CPF reduced to its digits, on both sides.
//!
//! ```text
//! accepted ──┬── CPF shared by several incoming rows ──▶ rejected [duplicate_cpf_validation]
//!            ├── CPF unknown to the system ───────────▶ accepted, tipo I
//!            ├── CPF known, some common field differs ─▶ accepted, tipo A
//!            └── CPF known, common fields all equal ──▶ rejected [update_validation]
//! ```
//!
//! Only fields present in both the incoming and the system record are
//! compared, so a system export with fewer columns still matches.

use std::collections::HashMap;

use crate::api::logs::{log_info, log_success, log_warning};
use crate::models::{AcceptedRecord, Cell, CustomerRecord, DetachReason, DetachedRecord, Field, Tipo};

use super::normalize::Partition;

/// Final split after comparing with the system of record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reconciliation {
    pub accepted: Vec<AcceptedRecord>,
    pub rejected: Vec<DetachedRecord>,
}

impl Reconciliation {
    pub fn count(&self, tipo: Tipo) -> usize {
        self.accepted.iter().filter(|r| r.tipo == tipo).count()
    }

    pub fn count_reason(&self, reason: DetachReason) -> usize {
        self.rejected
            .iter()
            .filter(|r| r.detach_reason.contains(&reason))
            .count()
    }
}

/// Replace the CPF with its digits so exports carry the identity key.
fn with_normalized_cpf(mut record: CustomerRecord) -> CustomerRecord {
    if let Some(key) = record.cpf_key() {
        record.insert(Field::Cpf, Cell::Text(key));
    }
    record
}

/// Group system records by CPF key.
fn index_by_cpf(system: &[CustomerRecord]) -> HashMap<String, Vec<&CustomerRecord>> {
    let mut index: HashMap<String, Vec<&CustomerRecord>> = HashMap::new();
    for record in system {
        if let Some(key) = record.cpf_key() {
            index.entry(key).or_default().push(record);
        }
    }
    index
}

/// True when every field present on both sides, CPF aside, holds the same value.
pub fn same_common_fields(incoming: &CustomerRecord, registered: &CustomerRecord) -> bool {
    incoming
        .fields()
        .filter(|field| *field != Field::Cpf && registered.contains(*field))
        .all(|field| incoming.get(field) == registered.get(field))
}

/// Classify accepted records against the system of record.
///
/// `final_rejected` is the partition's rejected list followed by the records
/// detached here, in input order.
pub fn reconcile(partition: Partition, system: &[CustomerRecord]) -> Reconciliation {
    log_info(format!(
        "🔎 Comparing {} accepted records with {} registered customers...",
        partition.accepted.len(),
        system.len()
    ));

    let Partition { accepted, mut rejected } = partition;
    let accepted: Vec<CustomerRecord> = accepted.into_iter().map(with_normalized_cpf).collect();

    let mut occurrences: HashMap<String, usize> = HashMap::new();
    for record in &accepted {
        if let Some(key) = record.cpf_key() {
            *occurrences.entry(key).or_default() += 1;
        }
    }

    let index = index_by_cpf(system);
    let mut kept = Vec::with_capacity(accepted.len());

    for record in accepted {
        let key = record.cpf_key();

        let duplicated = key
            .as_ref()
            .and_then(|k| occurrences.get(k))
            .is_some_and(|n| *n > 1);
        if duplicated {
            rejected.push(DetachedRecord::new(record, vec![DetachReason::DuplicateCpf]));
            continue;
        }

        match key.as_ref().and_then(|k| index.get(k)) {
            Some(registered) if registered.iter().any(|r| same_common_fields(&record, r)) => {
                rejected.push(DetachedRecord::new(record, vec![DetachReason::AlreadyRegistered]));
            }
            Some(_) => kept.push(AcceptedRecord {
                record,
                tipo: Tipo::Alteration,
            }),
            None => kept.push(AcceptedRecord {
                record,
                tipo: Tipo::Insert,
            }),
        }
    }

    let result = Reconciliation {
        accepted: kept,
        rejected,
    };

    log_success(format!(
        "Inserts: {}, alterations: {}",
        result.count(Tipo::Insert),
        result.count(Tipo::Alteration)
    ));
    let unchanged = result.count_reason(DetachReason::AlreadyRegistered);
    if unchanged > 0 {
        log_warning(format!("{} records already registered without changes", unchanged));
    }
    let duplicates = result.count_reason(DetachReason::DuplicateCpf);
    if duplicates > 0 {
        log_warning(format!("{} records share a CPF with another incoming row", duplicates));
    }

    result
}

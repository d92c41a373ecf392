//! Run outputs.
//!
//! - [`payload`] - JSON payload for the registration API (accepted customers)
//! - [`sheet`] - Spreadsheet of rejected customers with their detach reasons
//!
//! Both files are stamped with the run date.

pub mod payload;
pub mod sheet;

use chrono::NaiveDate;

pub use payload::{
    to_api_payload, to_json_string, to_payload, write_payload, Email, Endereco,
    InformacaoAdicional, RegistrationPayload, Telefone,
};
pub use sheet::{to_rejected_export, write_rejected, RejectedFormat, RejectedTable};

/// `dados-YYYYMMDD.json`
pub fn payload_filename(date: NaiveDate) -> String {
    format!("dados-{}.json", date.format("%Y%m%d"))
}

/// `dados_descartados-YYYYMMDD.<ext>`
pub fn rejected_filename(date: NaiveDate, format: RejectedFormat) -> String {
    format!("dados_descartados-{}.{}", date.format("%Y%m%d"), format.extension())
}

//! Customer field validation.
//!
//! [`FieldValidator`] runs six independent checks on one canonical record and
//! returns a [`ValidationResult`] in a fixed order:
//!
//! | Check                          | Field       |
//! |--------------------------------|-------------|
//! | `cpf_validation`               | `cpf`       |
//! | `name_validation`              | `nome`      |
//! | `birthdate_and_age_validation` | `data_nasc` |
//! | `email_validation`             | `email`     |
//! | `phone_validation`             | `celular`   |
//! | `cep_validation`               | `cep`       |
//!
//! A missing or blank field fails its check. Only the CEP check leaves the
//! process, through the injected [`CepLookup`].
//!
//! # Example
//!
//! ```rust,ignore
//! use cadastro::cep::ViaCepClient;
//! use cadastro::validation::FieldValidator;
//!
//! let validator = FieldValidator::new(ViaCepClient::from_env());
//! let result = validator.validate_all(&record).await;
//! if !result.all_passed() {
//!     println!("failed: {:?}", result.failed());
//! }
//! ```

pub mod rules;
pub mod schema;

use chrono::{Local, NaiveDate};

use crate::cep::{CepLookup, CepOutcome};
use crate::models::{Check, CustomerRecord, Field, ValidationResult};

pub use schema::{is_valid, validate, validate_payload};

/// Runs the field checks against one record at a time.
pub struct FieldValidator<L> {
    lookup: L,
    today: NaiveDate,
}

impl<L: CepLookup> FieldValidator<L> {
    /// Validator using the local date as "today".
    pub fn new(lookup: L) -> Self {
        Self {
            lookup,
            today: Local::now().date_naive(),
        }
    }

    /// Pin the reference date used by the age check.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    pub fn check_cpf(&self, record: &CustomerRecord) -> bool {
        record
            .cpf_key()
            .is_some_and(|digits| rules::is_valid_cpf(&digits))
    }

    pub fn check_name(&self, record: &CustomerRecord) -> bool {
        record
            .text(Field::Nome)
            .is_some_and(|name| rules::is_full_name(&name))
    }

    pub fn check_birthdate_and_age(&self, record: &CustomerRecord) -> bool {
        record
            .get(Field::DataNasc)
            .and_then(rules::parse_birthdate)
            .is_some_and(|birth| rules::is_of_age(birth, self.today))
    }

    pub fn check_email(&self, record: &CustomerRecord) -> bool {
        record
            .text(Field::Email)
            .is_some_and(|email| rules::is_valid_email(&email))
    }

    pub fn check_phone(&self, record: &CustomerRecord) -> bool {
        record
            .text(Field::Celular)
            .is_some_and(|phone| rules::is_valid_phone(&phone))
    }

    /// Ask the lookup service about the record's CEP.
    ///
    /// Malformed CEPs never reach the service.
    pub async fn lookup_cep(&self, record: &CustomerRecord) -> CepOutcome {
        let digits = record.get(Field::Cep).map(|c| c.digits(8)).unwrap_or_default();
        if !rules::is_well_formed_cep(&digits) {
            return CepOutcome::NotFound;
        }
        self.lookup.lookup(&digits).await
    }

    pub async fn check_cep(&self, record: &CustomerRecord) -> bool {
        self.lookup_cep(record).await.is_found()
    }

    /// Run every check in evaluation order.
    pub async fn validate_all(&self, record: &CustomerRecord) -> ValidationResult {
        let mut result = ValidationResult::default();
        result.push(Check::Cpf, self.check_cpf(record));
        result.push(Check::Name, self.check_name(record));
        result.push(Check::BirthdateAndAge, self.check_birthdate_and_age(record));
        result.push(Check::Email, self.check_email(record));
        result.push(Check::Phone, self.check_phone(record));
        result.push(Check::Cep, self.check_cep(record).await);
        result
    }
}

//! Registration API payload.
//!
//! One object per accepted customer, shaped for the registration endpoint:
//!
//! ```json
//! {
//!   "id": "usp-52998224725",
//!   "agrupador": "usp",
//!   "tipoPessoa": "FISICA",
//!   "nome": "ANA SILVA",
//!   "cpf": "52998224725",
//!   "dataNascimento": "15/03/1990",
//!   "tipo": "I",
//!   "enderecos": [{ "cep": "01310-100", "logradouro": "AVENIDA PAULISTA", ... }],
//!   "emails": [{ "email": "ana@x.com" }],
//!   "telefones": [{ "tipo": "CELULAR", "ddd": "11", "telefone": "912345678" }],
//!   "informacoesAdicionais": [{ "campo": "cpf_aluno", "linha": "1", "coluna": "1", "valor": "52998224725" }, ...]
//! }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::ser::PrettyFormatter;
use serde_json::Serializer;
use std::fs;
use std::path::Path;

use crate::error::ExportResult;
use crate::models::{AcceptedRecord, Cell, CustomerRecord, Field};

const TIPO_PESSOA: &str = "FISICA";
const TIPO_TELEFONE: &str = "CELULAR";

/// One customer as sent to the registration API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationPayload {
    pub id: String,
    pub agrupador: String,
    pub tipo_pessoa: String,
    pub nome: String,
    pub cpf: String,
    pub data_nascimento: String,
    /// `I` or `A`
    pub tipo: String,
    pub enderecos: Vec<Endereco>,
    pub emails: Vec<Email>,
    pub telefones: Vec<Telefone>,
    pub informacoes_adicionais: Vec<InformacaoAdicional>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Endereco {
    pub cep: String,
    pub logradouro: String,
    pub bairro: String,
    pub cidade: String,
    pub numero: String,
    pub uf: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Email {
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Telefone {
    pub tipo: String,
    pub ddd: String,
    pub telefone: String,
}

/// Free-form attribute attached to the customer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InformacaoAdicional {
    pub campo: String,
    pub linha: String,
    pub coluna: String,
    pub valor: String,
}

impl InformacaoAdicional {
    fn new(campo: &str, valor: String) -> Self {
        Self {
            campo: campo.to_string(),
            linha: "1".to_string(),
            coluna: "1".to_string(),
            valor,
        }
    }
}

/// Remove ASCII digits.
pub fn strip_digits(value: &str) -> String {
    value.chars().filter(|c| !c.is_ascii_digit()).collect()
}

/// Uppercase and remove digits, as the registration API expects for names and addresses.
pub fn upper_without_digits(value: &str) -> String {
    strip_digits(&value.to_uppercase())
}

/// Area code and subscriber number from `(DD) XXXXX-XXXX`.
pub fn split_phone(celular: &str) -> (String, String) {
    let ddd = celular.chars().skip(1).take(2).collect();
    let telefone = celular.chars().skip(5).filter(|c| *c != '-').collect();
    (ddd, telefone)
}

/// `DD/MM/YYYY` for date cells, the text as read otherwise.
pub fn format_birthdate(cell: Option<&Cell>) -> String {
    match cell {
        Some(Cell::Date(date)) => date.format("%d/%m/%Y").to_string(),
        Some(cell) => cell.to_string(),
        None => String::new(),
    }
}

fn text(record: &CustomerRecord, field: Field) -> String {
    record.get(field).map(Cell::to_string).unwrap_or_default()
}

/// Build the payload object for one accepted customer.
pub fn to_payload(accepted: &AcceptedRecord) -> RegistrationPayload {
    let record = &accepted.record;

    let agrupador = text(record, Field::Faculdade).to_lowercase();
    let cpf = text(record, Field::Cpf);
    let nome = upper_without_digits(&text(record, Field::Nome));
    let (ddd, telefone) = split_phone(&text(record, Field::Celular));

    RegistrationPayload {
        id: format!("{}-{}", agrupador, cpf),
        agrupador,
        tipo_pessoa: TIPO_PESSOA.to_string(),
        nome: nome.clone(),
        cpf: cpf.clone(),
        data_nascimento: format_birthdate(record.get(Field::DataNasc)),
        tipo: accepted.tipo.code().to_string(),
        enderecos: vec![Endereco {
            cep: text(record, Field::Cep),
            logradouro: upper_without_digits(&text(record, Field::Endereco)),
            bairro: upper_without_digits(&text(record, Field::Bairro)),
            cidade: upper_without_digits(&text(record, Field::Cidade)),
            numero: text(record, Field::Numero),
            uf: upper_without_digits(&text(record, Field::Estado)),
        }],
        emails: vec![Email {
            email: text(record, Field::Email),
        }],
        telefones: vec![Telefone {
            tipo: TIPO_TELEFONE.to_string(),
            ddd,
            telefone,
        }],
        informacoes_adicionais: vec![
            InformacaoAdicional::new("cpf_aluno", cpf),
            InformacaoAdicional::new("registro_aluno", text(record, Field::Ra)),
            InformacaoAdicional::new("nome_aluno", nome),
        ],
    }
}

/// Build payload objects for every accepted customer, in order.
pub fn to_api_payload(accepted: &[AcceptedRecord]) -> Vec<RegistrationPayload> {
    accepted.iter().map(to_payload).collect()
}

/// Serialize with 4-space indentation and non-ASCII kept literal.
pub fn to_json_string(payload: &[RegistrationPayload]) -> ExportResult<String> {
    let mut buffer = Vec::new();
    let mut serializer = Serializer::with_formatter(&mut buffer, PrettyFormatter::with_indent(b"    "));
    payload.serialize(&mut serializer)?;
    // serde_json only ever emits valid UTF-8
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

/// Write the payload file.
pub fn write_payload<P: AsRef<Path>>(path: P, payload: &[RegistrationPayload]) -> ExportResult<()> {
    let json = to_json_string(payload)?;
    fs::write(path, json)?;
    Ok(())
}

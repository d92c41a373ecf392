//! Rejected-records spreadsheet.
//!
//! All detached customers go to a single sheet: the canonical columns present
//! in the data, in canonical order, then `detach_reason`.

use rust_xlsxwriter::{Format, Workbook};
use std::path::Path;

use crate::error::ExportResult;
use crate::models::{Cell, DetachedRecord, Field};
use crate::validation::rules::parse_birthdate;

/// Sheet name inside the rejected workbook.
pub const SHEET_NAME: &str = "descartados";

/// Column holding the detach reasons.
pub const REASON_COLUMN: &str = "detach_reason";

/// Output format of the rejected records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RejectedFormat {
    #[default]
    Xlsx,
    /// `;`-delimited CSV
    Csv,
}

impl RejectedFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            RejectedFormat::Xlsx => "xlsx",
            RejectedFormat::Csv => "csv",
        }
    }
}

/// Rejected records laid out as rows.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

/// Birthdate as `DD/MM/YYYY`, blank when it cannot be read as a date.
fn birthdate_cell(cell: Option<&Cell>) -> Cell {
    cell.and_then(parse_birthdate)
        .map(|date| Cell::Text(date.format("%d/%m/%Y").to_string()))
        .unwrap_or_default()
}

/// Lay out detached records with the columns they actually carry.
pub fn to_rejected_export(rejected: &[DetachedRecord]) -> RejectedTable {
    let columns: Vec<Field> = Field::ALL
        .into_iter()
        .filter(|field| rejected.iter().any(|r| r.record.contains(*field)))
        .collect();

    let mut headers: Vec<String> = columns.iter().map(|f| f.as_str().to_string()).collect();
    headers.push(REASON_COLUMN.to_string());

    let rows = rejected
        .iter()
        .map(|detached| {
            let mut row: Vec<Cell> = columns
                .iter()
                .map(|field| match field {
                    Field::DataNasc => birthdate_cell(detached.record.get(*field)),
                    _ => detached.record.get(*field).cloned().unwrap_or_default(),
                })
                .collect();
            row.push(Cell::Text(detached.reasons_text()));
            row
        })
        .collect();

    RejectedTable { headers, rows }
}

/// Build the rejected workbook in memory.
pub fn build_workbook(table: &RejectedTable) -> ExportResult<Workbook> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET_NAME)?;

    let bold = Format::new().set_bold();
    for (col, header) in table.headers.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, header, &bold)?;
    }

    for (i, row) in table.rows.iter().enumerate() {
        let r = (i + 1) as u32;
        for (col, cell) in row.iter().enumerate() {
            let c = col as u16;
            match cell {
                Cell::Empty => {}
                Cell::Number(n) => {
                    sheet.write_number(r, c, *n)?;
                }
                other => {
                    sheet.write_string(r, c, other.to_string())?;
                }
            }
        }
    }

    Ok(workbook)
}

/// Write the rejected records as an `.xlsx` workbook.
pub fn write_rejected_xlsx<P: AsRef<Path>>(path: P, table: &RejectedTable) -> ExportResult<()> {
    let mut workbook = build_workbook(table)?;
    workbook.save(path.as_ref())?;
    Ok(())
}

/// Write the rejected records as a `;`-delimited CSV.
pub fn write_rejected_csv<P: AsRef<Path>>(path: P, table: &RejectedTable) -> ExportResult<()> {
    let mut writer = csv::WriterBuilder::new().delimiter(b';').from_path(path)?;
    writer.write_record(&table.headers)?;
    for row in &table.rows {
        writer.write_record(row.iter().map(|cell| cell.to_string()))?;
    }
    writer.flush()?;
    Ok(())
}

/// Write the rejected records in the requested format.
pub fn write_rejected<P: AsRef<Path>>(
    path: P,
    rejected: &[DetachedRecord],
    format: RejectedFormat,
) -> ExportResult<()> {
    let table = to_rejected_export(rejected);
    match format {
        RejectedFormat::Xlsx => write_rejected_xlsx(path, &table),
        RejectedFormat::Csv => write_rejected_csv(path, &table),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Check, CustomerRecord, DetachReason};
    use crate::parser::read_table;

    fn detached() -> Vec<DetachedRecord> {
        vec![
            DetachedRecord::new(
                CustomerRecord::new()
                    .with(Field::Nome, Cell::text("Ana"))
                    .with(Field::Cpf, Cell::text("111.111.111-11"))
                    .with(Field::DataNasc, Cell::text("1990-03-15")),
                vec![DetachReason::Failed(Check::Cpf), DetachReason::Failed(Check::Name)],
            ),
            DetachedRecord::new(
                CustomerRecord::new()
                    .with(Field::Cpf, Cell::Number(52998224725.0))
                    .with(Field::DataNasc, Cell::text("not a date"))
                    .with(Field::Ra, Cell::Number(123.0)),
                vec![DetachReason::AlreadyRegistered],
            ),
        ]
    }

    #[test]
    fn test_columns_follow_canonical_order() {
        let table = to_rejected_export(&detached());
        assert_eq!(table.headers, vec!["nome", "cpf", "data_nasc", "ra", "detach_reason"]);
    }

    #[test]
    fn test_rows_reformat_birthdate() {
        let table = to_rejected_export(&detached());

        assert_eq!(table.rows[0][2], Cell::Text("15/03/1990".into()));
        assert_eq!(table.rows[0][4], Cell::Text("cpf_validation, name_validation".into()));
        // unparseable dates are blanked
        assert_eq!(table.rows[1][2], Cell::Empty);
        // absent columns stay blank
        assert_eq!(table.rows[1][0], Cell::Empty);
        assert_eq!(table.rows[1][4], Cell::Text("update_validation".into()));
    }

    #[test]
    fn test_empty_rejected_list() {
        let table = to_rejected_export(&[]);
        assert_eq!(table.headers, vec![REASON_COLUMN]);
        assert!(table.rows.is_empty());
    }

    #[test]
    fn test_xlsx_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dados_descartados.xlsx");

        write_rejected(&path, &detached(), RejectedFormat::Xlsx).unwrap();

        let table = read_table(&path).unwrap();
        assert_eq!(table.headers.last().map(String::as_str), Some(REASON_COLUMN));
        assert_eq!(table.records.len(), 2);
        assert_eq!(table.records[0]["data_nasc"], Cell::Text("15/03/1990".into()));
        assert_eq!(table.records[1]["cpf"], Cell::Number(52998224725.0));
    }

    #[test]
    fn test_csv_uses_semicolons() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dados_descartados.csv");

        write_rejected(&path, &detached(), RejectedFormat::Csv).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        assert_eq!(lines.next(), Some("nome;cpf;data_nasc;ra;detach_reason"));
        assert_eq!(
            lines.next(),
            Some("Ana;111.111.111-11;15/03/1990;;cpf_validation, name_validation")
        );
        assert_eq!(lines.next(), Some(";52998224725;;123;update_validation"));
    }
}

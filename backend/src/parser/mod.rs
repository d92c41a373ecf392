//! Tabular input reader.
//!
//! Turns spreadsheet (`.xlsx`, `.xls`, `.ods`) or CSV files into raw records
//! keyed by column header. CSV input gets encoding and delimiter
//! auto-detection. No customer-specific logic here.

use calamine::{open_workbook_auto, open_workbook_auto_from_rs, Data, Reader, Sheets};
use chrono::NaiveDate;
use std::io::{Cursor, Read, Seek};
use std::path::Path;

use crate::error::{SheetError, SheetResult};
use crate::models::{Cell, RawRecord};

/// A table read from one input file.
#[derive(Debug, Clone)]
pub struct Table {
    /// Column headers, in file order
    pub headers: Vec<String>,
    /// One record per non-empty data row
    pub records: Vec<RawRecord>,
    /// Detected encoding (CSV only)
    pub encoding: Option<String>,
    /// Detected delimiter (CSV only)
    pub delimiter: Option<char>,
}

/// Input formats understood by [`read_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Workbook,
    Csv,
}

impl InputFormat {
    /// Guess the format from a file name.
    pub fn from_name(name: &str) -> Option<Self> {
        let ext = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())?;
        match ext.as_str() {
            "xlsx" | "xlsm" | "xls" | "xlsb" | "ods" => Some(Self::Workbook),
            "csv" | "txt" => Some(Self::Csv),
            _ => None,
        }
    }

    /// Guess the format from leading magic bytes (zip or OLE container).
    pub fn sniff(bytes: &[u8]) -> Self {
        if bytes.starts_with(b"PK\x03\x04") || bytes.starts_with(&[0xD0, 0xCF, 0x11, 0xE0]) {
            Self::Workbook
        } else {
            Self::Csv
        }
    }
}

/// Read a table from disk, dispatching on the file extension.
pub fn read_table<P: AsRef<Path>>(path: P) -> SheetResult<Table> {
    let path = path.as_ref();
    let name = path.display().to_string();

    match InputFormat::from_name(&name) {
        Some(InputFormat::Workbook) => {
            let workbook = open_workbook_auto(path).map_err(|e| SheetError::Workbook(e.to_string()))?;
            read_first_sheet(workbook, &name)
        }
        Some(InputFormat::Csv) => {
            let bytes = std::fs::read(path)?;
            parse_csv_bytes(&bytes)
        }
        None => Err(SheetError::UnsupportedFormat(name)),
    }
}

/// Read a table from uploaded bytes.
///
/// The file name decides the format when it has a known extension,
/// otherwise the content is sniffed.
pub fn read_table_bytes(name: &str, bytes: &[u8]) -> SheetResult<Table> {
    let format = InputFormat::from_name(name).unwrap_or_else(|| InputFormat::sniff(bytes));
    match format {
        InputFormat::Workbook => {
            let workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
                .map_err(|e| SheetError::Workbook(e.to_string()))?;
            read_first_sheet(workbook, name)
        }
        InputFormat::Csv => parse_csv_bytes(bytes),
    }
}

// =============================================================================
// Workbooks
// =============================================================================

fn read_first_sheet<RS: Read + Seek>(mut workbook: Sheets<RS>, name: &str) -> SheetResult<Table> {
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| SheetError::NoHeaders(name.to_string()))?
        .map_err(|e| SheetError::Workbook(e.to_string()))?;

    let mut rows = range.rows();
    let header_row = rows
        .next()
        .ok_or_else(|| SheetError::NoHeaders(name.to_string()))?;

    // Blank header cells keep their position but are never read back
    let headers: Vec<String> = header_row
        .iter()
        .map(|c| cell_from_data(c).to_string().trim().to_string())
        .collect();

    if headers.iter().all(|h| h.is_empty()) {
        return Err(SheetError::NoHeaders(name.to_string()));
    }

    let mut records = Vec::new();
    for row in rows {
        let cells: Vec<Cell> = row.iter().map(cell_from_data).collect();
        if cells.iter().all(Cell::is_empty) {
            continue;
        }

        let record: RawRecord = headers
            .iter()
            .enumerate()
            .filter(|(_, h)| !h.is_empty())
            .map(|(i, h)| (h.clone(), cells.get(i).cloned().unwrap_or_default()))
            .collect();
        records.push(record);
    }

    Ok(Table {
        headers: headers.into_iter().filter(|h| !h.is_empty()).collect(),
        records,
        encoding: None,
        delimiter: None,
    })
}

/// Convert a calamine cell into a raw scalar.
fn cell_from_data(data: &Data) -> Cell {
    match data {
        Data::Empty | Data::Error(_) => Cell::Empty,
        Data::String(s) => Cell::text(s.clone()),
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Float(f) => Cell::Number(*f),
        Data::Bool(b) => Cell::Text(b.to_string()),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(|d| Cell::Date(d.date()))
            .unwrap_or(Cell::Number(dt.as_f64())),
        Data::DateTimeIso(s) => s
            .get(..10)
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
            .map(Cell::Date)
            .unwrap_or_else(|| Cell::text(s.clone())),
        Data::DurationIso(s) => Cell::text(s.clone()),
    }
}

// =============================================================================
// CSV
// =============================================================================

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let result = chardet::detect(bytes);
    let charset = result.0;

    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes to string using the specified encoding
pub fn decode_content(bytes: &[u8], encoding: &str) -> String {
    match encoding.to_lowercase().as_str() {
        "iso-8859-1" | "latin-1" | "latin1" => encoding_rs::ISO_8859_15.decode(bytes).0.to_string(),
        "windows-1252" | "cp1252" => encoding_rs::WINDOWS_1252.decode(bytes).0.to_string(),
        // UTF-8 and anything unknown: lossy UTF-8
        _ => String::from_utf8_lossy(bytes).to_string(),
    }
}

/// Detect the delimiter by counting occurrences in the first line
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let separators = [';', ',', '\t', '|'];
    let mut best_sep = ';';
    let mut best_count = 0;

    for &sep in &separators {
        let count = first_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

/// Parse CSV bytes with auto-detection of encoding and delimiter.
pub fn parse_csv_bytes(bytes: &[u8]) -> SheetResult<Table> {
    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding);
    let delimiter = detect_delimiter(&content);

    let mut table = parse_csv_str(&content, delimiter)?;
    table.encoding = Some(encoding);
    Ok(table)
}

/// Parse CSV text with an explicit delimiter.
///
/// Every cell is text; blank cells become [`Cell::Empty`].
pub fn parse_csv_str(content: &str, delimiter: char) -> SheetResult<Table> {
    let content = content.trim_start_matches('\u{feff}');
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter as u8)
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| SheetError::Csv(e.to_string()))?
        .iter()
        .map(|h| h.to_string())
        .collect();

    if headers.iter().all(|h| h.is_empty()) {
        return Err(SheetError::NoHeaders("CSV input".to_string()));
    }

    let mut records = Vec::new();
    for (line_idx, result) in reader.records().enumerate() {
        let row = result.map_err(|e| SheetError::Csv(format!("line {}: {}", line_idx + 2, e)))?;
        if row.iter().all(|v| v.is_empty()) {
            continue;
        }

        let record: RawRecord = headers
            .iter()
            .enumerate()
            .filter(|(_, h)| !h.is_empty())
            .map(|(i, h)| (h.clone(), row.get(i).map(Cell::text).unwrap_or_default()))
            .collect();
        records.push(record);
    }

    Ok(Table {
        headers,
        records,
        encoding: None,
        delimiter: Some(delimiter),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_simple_csv() {
        let csv = "NOME;CPF\nAna Silva;529.982.247-25\nBruno Lima;111.444.777-35";
        let table = parse_csv_str(csv, ';').unwrap();

        assert_eq!(table.records.len(), 2);
        assert_eq!(table.headers, vec!["NOME", "CPF"]);
        assert_eq!(table.records[0]["NOME"], Cell::text("Ana Silva"));
        assert_eq!(table.records[1]["CPF"], Cell::text("111.444.777-35"));
    }

    #[test]
    fn test_quoted_values() {
        let csv = "NOME,Endereço\n\"Ana Silva\",\"Rua A, 10\"";
        let table = parse_csv_str(csv, ',').unwrap();

        assert_eq!(table.records[0]["NOME"], Cell::text("Ana Silva"));
        assert_eq!(table.records[0]["Endereço"], Cell::text("Rua A, 10"));
    }

    #[test]
    fn test_missing_values_and_empty_lines() {
        let csv = "a;b;c\n1;;3\n\n4;5;6\n";
        let table = parse_csv_str(csv, ';').unwrap();

        assert_eq!(table.records.len(), 2);
        assert_eq!(table.records[0]["b"], Cell::Empty);
        assert_eq!(table.records[1]["c"], Cell::text("6"));
    }

    #[test]
    fn test_short_rows_fill_empty() {
        let csv = "a;b;c\n1;2";
        let table = parse_csv_str(csv, ';').unwrap();
        assert_eq!(table.records[0]["c"], Cell::Empty);
    }

    #[test]
    fn test_empty_csv_error() {
        assert!(parse_csv_str("", ';').is_err());
    }

    #[test]
    fn test_detect_delimiter() {
        assert_eq!(detect_delimiter("a;b;c\n1;2;3"), ';');
        assert_eq!(detect_delimiter("a,b,c\n1,2,3"), ',');
        assert_eq!(detect_delimiter("a\tb\tc\n1\t2\t3"), '\t');
        assert_eq!(detect_delimiter("a|b|c\n1|2|3"), '|');
    }

    #[test]
    fn test_auto_parse_bytes() {
        let csv = "NOME,CEP\nAna Silva,01310-100";
        let table = parse_csv_bytes(csv.as_bytes()).unwrap();

        assert_eq!(table.delimiter, Some(','));
        assert_eq!(table.encoding.as_deref(), Some("utf-8"));
        assert_eq!(table.records[0]["CEP"], Cell::text("01310-100"));
    }

    #[test]
    fn test_latin1_decoding() {
        // "São" in ISO-8859-1
        let bytes: &[u8] = &[0x53, 0xE3, 0x6F];
        let decoded = decode_content(bytes, "iso-8859-1");
        assert_eq!(decoded, "São");
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(InputFormat::from_name("dados.XLSX"), Some(InputFormat::Workbook));
        assert_eq!(InputFormat::from_name("sistema.csv"), Some(InputFormat::Csv));
        assert_eq!(InputFormat::from_name("notes.pdf"), None);
        assert_eq!(InputFormat::sniff(b"PK\x03\x04rest"), InputFormat::Workbook);
        assert_eq!(InputFormat::sniff(b"NOME;CPF"), InputFormat::Csv);
    }

    #[test]
    fn test_unsupported_extension() {
        let err = read_table("customers.pdf").unwrap_err();
        assert!(matches!(err, SheetError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_read_xlsx_cells() {
        use rust_xlsxwriter::{ExcelDateTime, Format, Workbook};

        let dir = tempdir().unwrap();
        let path = dir.path().join("dados.xlsx");

        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(0, 0, "NOME").unwrap();
        sheet.write_string(0, 1, "CPF").unwrap();
        sheet.write_string(0, 2, "Data de Nascimento").unwrap();
        sheet.write_string(1, 0, "Ana Silva").unwrap();
        sheet.write_number(1, 1, 52998224725.0).unwrap();
        let birth = ExcelDateTime::from_ymd(2000, 1, 31).unwrap();
        let date_format = Format::new().set_num_format("dd/mm/yyyy");
        sheet
            .write_datetime_with_format(1, 2, &birth, &date_format)
            .unwrap();
        workbook.save(&path).unwrap();

        let table = read_table(&path).unwrap();
        assert_eq!(table.headers, vec!["NOME", "CPF", "Data de Nascimento"]);
        assert_eq!(table.records.len(), 1);

        let row = &table.records[0];
        assert_eq!(row["NOME"], Cell::text("Ana Silva"));
        assert_eq!(row["CPF"].to_string(), "52998224725");
        assert_eq!(
            row["Data de Nascimento"],
            Cell::Date(NaiveDate::from_ymd_opt(2000, 1, 31).unwrap())
        );
    }

    #[test]
    fn test_read_xlsx_bytes_without_extension() {
        use rust_xlsxwriter::Workbook;

        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(0, 0, "cpf").unwrap();
        sheet.write_string(1, 0, "52998224725").unwrap();
        let bytes = workbook.save_to_buffer().unwrap();

        let table = read_table_bytes("upload", &bytes).unwrap();
        assert_eq!(table.records[0]["cpf"], Cell::text("52998224725"));
    }
}

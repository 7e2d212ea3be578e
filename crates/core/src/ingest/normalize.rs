use crate::domain::portfolio::{Artifact, PortfolioInput};
use crate::error::AnalysisError;
use anyhow::Context;
use calamine::{Data, DataType, Reader, Xlsx};
use encoding_rs::WINDOWS_1252;
use std::io::Cursor;

pub const SUPPORTED_EXTENSIONS: [&str; 5] = ["xlsx", "csv", "png", "jpg", "jpeg"];

type Table = Vec<Vec<String>>;

/// Turns an uploaded artifact into its canonical [`PortfolioInput`].
///
/// Images are recognised by declared content type (guessed from the file
/// name when none was declared); spreadsheets and CSV files by extension.
pub fn normalize(artifact: &Artifact) -> Result<PortfolioInput, AnalysisError> {
    let content_type = artifact
        .content_type
        .clone()
        .unwrap_or_else(|| guess_content_type(&artifact.file_name));

    if content_type.starts_with("image/") {
        let mime_type = canonical_image_mime(&content_type).ok_or_else(|| {
            AnalysisError::unsupported(
                &artifact.file_name,
                format!("image type {content_type} is not supported; use PNG or JPEG"),
            )
        })?;
        tracing::debug!(
            file_name = %artifact.file_name,
            mime_type,
            bytes = artifact.bytes.len(),
            "normalized image upload"
        );
        return Ok(PortfolioInput::Image {
            bytes: artifact.bytes.clone(),
            mime_type: mime_type.to_string(),
        });
    }

    let table = match extension(&artifact.file_name).as_deref() {
        Some("xlsx") => read_xlsx(&artifact.bytes),
        Some("csv") => read_csv(&artifact.bytes),
        Some("png" | "jpg" | "jpeg") => {
            return Err(AnalysisError::unsupported(
                &artifact.file_name,
                format!(
                    "the image was sent as {content_type}; it must be declared as image/png or image/jpeg"
                ),
            ))
        }
        _ => {
            return Err(AnalysisError::unsupported(
                &artifact.file_name,
                format!(
                    "expected one of {}",
                    SUPPORTED_EXTENSIONS.map(|e| format!(".{e}")).join(", ")
                ),
            ))
        }
    }
    .map_err(|e| AnalysisError::unsupported(&artifact.file_name, format!("{e:#}")))?;

    if table.is_empty() {
        return Err(AnalysisError::unsupported(&artifact.file_name, "no rows"));
    }

    let csv_text = write_csv(&table)
        .map_err(|e| AnalysisError::unsupported(&artifact.file_name, format!("{e:#}")))?;
    tracing::debug!(
        file_name = %artifact.file_name,
        rows = table.len() - 1,
        "normalized tabular upload"
    );
    Ok(PortfolioInput::Tabular { csv_text })
}

fn extension(file_name: &str) -> Option<String> {
    std::path::Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
}

fn guess_content_type(file_name: &str) -> String {
    mime_guess::from_path(file_name)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

fn canonical_image_mime(content_type: &str) -> Option<&'static str> {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    match essence.as_str() {
        "image/png" => Some("image/png"),
        "image/jpeg" | "image/jpg" | "image/pjpeg" => Some("image/jpeg"),
        _ => None,
    }
}

fn read_csv(bytes: &[u8]) -> anyhow::Result<Table> {
    let text = decode_text(bytes);
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut table = Table::new();
    for record in reader.records() {
        let record = record.context("malformed CSV row")?;
        push_row(&mut table, record.iter().map(str::to_string).collect());
    }
    Ok(table)
}

fn read_xlsx(bytes: &[u8]) -> anyhow::Result<Table> {
    let mut workbook =
        Xlsx::new(Cursor::new(bytes.to_vec())).context("not a readable .xlsx workbook")?;
    let range = workbook
        .worksheet_range_at(0)
        .context("workbook has no worksheets")?
        .context("failed to read the first worksheet")?;

    let mut table = Table::new();
    for row in range.rows() {
        push_row(&mut table, row.iter().map(cell_text).collect());
    }
    Ok(table)
}

fn push_row(table: &mut Table, row: Vec<String>) {
    if row.iter().any(|cell| !cell.trim().is_empty()) {
        table.push(row);
    }
}

/// UTF-8 (optionally with BOM), falling back to Windows-1252 for legacy
/// spreadsheet exports.
fn decode_text(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (cow, _, _) = WINDOWS_1252.decode(bytes);
            cow.into_owned()
        }
    }
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        Data::Float(f) => f.to_string(),
        Data::Bool(b) => (if *b { "True" } else { "False" }).to_string(),
        Data::DateTime(_) => cell
            .as_datetime()
            .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| cell.to_string()),
        Data::Error(_) => String::new(),
        other => other.to_string(),
    }
}

fn write_csv(table: &Table) -> anyhow::Result<String> {
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    for row in table {
        writer.write_record(row).context("failed to serialize CSV row")?;
    }
    let bytes = writer.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(bytes).context("serialized CSV is not UTF-8")
}

/// Assembles a single-sheet workbook. Numeric-looking cells are written as
/// numbers, everything else as inline strings.
#[cfg(test)]
pub(crate) fn workbook_fixture(rows: &[&[&str]]) -> Vec<u8> {
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    let mut sheet = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>"#,
    );
    for (r, row) in rows.iter().enumerate() {
        sheet.push_str(&format!(r#"<row r="{}">"#, r + 1));
        for (c, value) in row.iter().enumerate() {
            let cell_ref = format!("{}{}", (b'A' + c as u8) as char, r + 1);
            if value.parse::<f64>().is_ok() {
                sheet.push_str(&format!(r#"<c r="{cell_ref}"><v>{value}</v></c>"#));
            } else {
                sheet.push_str(&format!(
                    r#"<c r="{cell_ref}" t="inlineStr"><is><t>{value}</t></is></c>"#
                ));
            }
        }
        sheet.push_str("</row>");
    }
    sheet.push_str("</sheetData></worksheet>");

    let parts = [
        (
            "[Content_Types].xml",
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/></Types>"#.to_string(),
        ),
        (
            "xl/workbook.xml",
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="Holdings" sheetId="1" r:id="rId1"/></sheets></workbook>"#.to_string(),
        ),
        (
            "xl/_rels/workbook.xml.rels",
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/></Relationships>"#.to_string(),
        ),
        ("xl/worksheets/sheet1.xml", sheet),
    ];

    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
    for (name, body) in parts {
        writer.start_file(name, options).unwrap();
        writer.write_all(body.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

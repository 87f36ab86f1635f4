// Writing of submitted results as CSV or Excel files.

use std::fs;
use std::path::{Path, PathBuf};

use ab_session::export::{export_file_name, export_table, ExportTable};
use ab_session::{FinalResult, SurveySettings};
use csv::{QuoteStyle, Terminator, WriterBuilder};
use rust_xlsxwriter::Workbook;

use crate::survey::*;

const BOM: &[u8] = b"\xEF\xBB\xBF";

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum ExportFormat {
    Csv,
    Xlsx,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Xlsx => "xlsx",
        }
    }
}

/// UTF-8 with a byte order mark, every value quoted.
pub fn csv_bytes(table: &ExportTable) -> AppResult<Vec<u8>> {
    let mut wtr = WriterBuilder::new()
        .quote_style(QuoteStyle::Always)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(BOM.to_vec());
    wtr.write_record(table.header()).context(WritingCsvSnafu {})?;
    for row in table.rows.iter() {
        wtr.write_record(row.cells()).context(WritingCsvSnafu {})?;
    }
    wtr.into_inner()
        .map_err(|e| io::Error::new(e.error().kind(), e.error().to_string()))
        .context(WritingCsvBufferSnafu {})
}

/// A workbook with a single sheet. The index column holds numbers; empty cells
/// are left blank.
pub fn xlsx_bytes(table: &ExportTable, sheet_name: &str) -> AppResult<Vec<u8>> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet
        .set_name(sheet_name)
        .context(WritingExcelSnafu {})?;
    for (col, name) in table.header().iter().enumerate() {
        worksheet
            .write_string(0, col as u16, *name)
            .context(WritingExcelSnafu {})?;
    }
    for (idx, row) in table.rows.iter().enumerate() {
        let r = (idx + 1) as u32;
        worksheet
            .write_number(r, 0, row.index as f64)
            .context(WritingExcelSnafu {})?;
        for (col, cell) in row.cells().iter().enumerate().skip(1) {
            if cell.is_empty() {
                continue;
            }
            worksheet
                .write_string(r, col as u16, cell.as_str())
                .context(WritingExcelSnafu {})?;
        }
    }
    workbook.save_to_buffer().context(WritingExcelSnafu {})
}

/// Writes the export of a result in `dir` and returns the path of the file.
pub fn write_export(
    result: &FinalResult,
    format: ExportFormat,
    dir: &Path,
    settings: &SurveySettings,
) -> AppResult<PathBuf> {
    let table = export_table(result);
    let bytes = match format {
        ExportFormat::Csv => csv_bytes(&table)?,
        ExportFormat::Xlsx => xlsx_bytes(&table, &settings.export_sheet_name)?,
    };
    let name = export_file_name(
        &settings.export_file_prefix,
        &result.session_id,
        format.extension(),
    );
    let path = dir.join(name);
    let path_s = path.display().to_string();
    fs::create_dir_all(dir).context(WritingFileSnafu {
        path: path_s.clone(),
    })?;
    fs::write(&path, bytes).context(WritingFileSnafu { path: path_s })?;
    info!(
        "write_export: {} rows written to {}",
        table.rows.len(),
        path.display()
    );
    Ok(path)
}

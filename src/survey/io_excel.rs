use std::io::Cursor;

use ab_session::dataset::UploadFormat;
use ab_session::Row;
use calamine::{DataType, Range, Reader, Xls, Xlsx};

use crate::survey::{
    io_common::{build_row, is_blank_row},
    *,
};

/// Reads the first worksheet of an Excel upload.
pub fn read_excel_rows(content: Vec<u8>, format: UploadFormat) -> AppResult<Vec<Row>> {
    let wrange = get_range(content, format)?;
    rows_from_range(&wrange)
}

fn get_range(content: Vec<u8>, format: UploadFormat) -> AppResult<Range<DataType>> {
    debug!("read_excel_rows: {} bytes as {:?}", content.len(), format);
    let wrange = match format {
        UploadFormat::Xls => {
            let mut workbook: Xls<_> =
                Xls::new(Cursor::new(content)).context(OpeningXlsSnafu {})?;
            workbook
                .worksheet_range_at(0)
                .context(EmptyExcelSnafu {})?
                .context(OpeningXlsSnafu {})?
        }
        _ => {
            let mut workbook: Xlsx<_> =
                Xlsx::new(Cursor::new(content)).context(OpeningExcelSnafu {})?;
            workbook
                .worksheet_range_at(0)
                .context(EmptyExcelSnafu {})?
                .context(OpeningExcelSnafu {})?
        }
    };
    Ok(wrange)
}

/// The first non-blank row is the header; blank rows are skipped.
pub fn rows_from_range(wrange: &Range<DataType>) -> AppResult<Vec<Row>> {
    let mut iter = wrange
        .rows()
        .map(|row| row.iter().map(cell_text).collect::<Vec<String>>())
        .skip_while(|cells| is_blank_row(cells));

    let header = match iter.next() {
        Some(h) => h,
        None => return Ok(Vec::new()),
    };
    debug!("rows_from_range: header: {:?}", header);

    let mut res: Vec<Row> = Vec::new();
    for (idx, cells) in iter.enumerate() {
        if is_blank_row(&cells) {
            continue;
        }
        debug!("rows_from_range: idx: {:?} row: {:?}", idx, &cells);
        res.push(build_row(&header, &cells));
    }
    Ok(res)
}

/// Renders a cell the way it reads in the sheet. Integral numbers have no
/// decimal part.
pub fn cell_text(cell: &DataType) -> String {
    match cell {
        DataType::String(s) => s.trim().to_string(),
        DataType::Empty => String::new(),
        DataType::Float(f) => f.to_string(),
        DataType::Int(i) => i.to_string(),
        DataType::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

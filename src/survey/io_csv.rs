// Primitives for reading CSV uploads.

use ab_session::Row;

use crate::survey::{
    io_common::{build_row, clean_cell, is_blank_row},
    *,
};

const BOM: &[u8] = b"\xEF\xBB\xBF";

/// Reads CSV content: the first line is the header, blank lines are skipped.
pub fn read_csv_rows(content: &[u8]) -> AppResult<Vec<Row>> {
    let content = content.strip_prefix(BOM).unwrap_or(content);
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(content);
    let mut records = rdr.records();

    let header: Vec<String> = match records.next() {
        Some(line_r) => line_r
            .context(CsvLineParseSnafu { lineno: 1usize })?
            .iter()
            .map(clean_cell)
            .collect(),
        None => return Ok(Vec::new()),
    };
    debug!("read_csv_rows: header: {:?}", header);

    let mut res: Vec<Row> = Vec::new();
    for (idx, line_r) in records.enumerate() {
        let lineno = idx + 2;
        let line = line_r.context(CsvLineParseSnafu { lineno })?;
        let cells: Vec<String> = line.iter().map(clean_cell).collect();
        if is_blank_row(&cells) {
            debug!("read_csv_rows: skipping blank line {}", lineno);
            continue;
        }
        res.push(build_row(&header, &cells));
    }
    debug!("read_csv_rows: {} rows", res.len());
    Ok(res)
}

use ab_session::Row;

/// Trims a cell and removes one pair of surrounding quotes, if any.
pub fn clean_cell(s: &str) -> String {
    let t = s.trim();
    let unquoted = t
        .strip_prefix('"')
        .and_then(|x| x.strip_suffix('"'))
        .unwrap_or(t);
    unquoted.trim().to_string()
}

pub fn is_blank_row<S: AsRef<str>>(cells: &[S]) -> bool {
    cells.iter().all(|c| c.as_ref().trim().is_empty())
}

/// Maps the header names to the cells of a line.
///
/// Cells missing at the end of the line read as empty. Columns without a
/// header name are dropped.
pub fn build_row(header: &[String], cells: &[String]) -> Row {
    header
        .iter()
        .enumerate()
        .filter(|(_, name)| !name.is_empty())
        .map(|(idx, name)| (name.clone(), cells.get(idx).cloned().unwrap_or_default()))
        .collect()
}

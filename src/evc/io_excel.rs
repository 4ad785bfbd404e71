use calamine::{open_workbook_auto, DataType, Range, Reader};
use survey_tally::builder::DatasetBuilder;

use crate::evc::{
    io_common::{column_names, simplify_file_name},
    *,
};

/// Reads the first row of a worksheet as the header and every other row as a response.
pub fn read_excel_dataset(path: &str, cfs: &FileSource) -> EvcResult<Dataset> {
    let wrange = get_range(path, cfs)?;

    let mut iter = wrange.rows();
    let header: Vec<Option<String>> = match iter.next() {
        Some(row) => row.iter().map(read_header).collect(),
        None => vec![],
    };
    debug!("read_excel_dataset: header: {:?}", header);

    let columns = column_names(&header);
    let mut builder = DatasetBuilder::new(columns.as_slice());
    if let Some(name) = simplify_file_name(path) {
        builder = builder.name(&name);
    }

    for (idx, row) in iter.enumerate() {
        debug!("read_excel_dataset: idx: {:?} row: {:?}", idx, row);
        let cells: Vec<Value> = row.iter().map(|c| read_cell(c, idx + 2)).collect();
        builder
            .add_row(cells)
            .context(BuildingDatasetSnafu { path })?;
    }
    Ok(builder.build())
}

fn read_header(cell: &DataType) -> Option<String> {
    match cell {
        DataType::Empty => None,
        c => read_cell(c, 1).category(),
    }
}

fn read_cell(cell: &DataType, lineno: usize) -> Value {
    match cell {
        DataType::String(s) => Value::Text(s.clone()),
        DataType::Float(f) => Value::Number(*f),
        DataType::Int(i) => Value::Number(*i as f64),
        DataType::Bool(b) => Value::Bool(*b),
        // Serial date, as stored in the sheet.
        DataType::DateTime(f) => Value::Number(*f),
        DataType::Empty => Value::Empty,
        other => {
            warn!(
                "read_cell: line {}: ignoring cell {:?}",
                lineno, other
            );
            Value::Empty
        }
    }
}

fn get_range(path: &str, cfs: &FileSource) -> EvcResult<Range<DataType>> {
    let worksheet_name_o = cfs.excel_worksheet_name.clone();
    debug!(
        "get_range: path: {:?} worksheet: {:?}",
        path, &worksheet_name_o
    );
    let mut workbook = open_workbook_auto(path).context(OpeningExcelSnafu { path })?;

    // A worksheet name was provided, use it.
    if let Some(worksheet_name) = worksheet_name_o {
        let wrange = workbook
            .worksheet_range(&worksheet_name)
            .context(MissingWorksheetSnafu {
                name: worksheet_name.clone(),
                path,
            })?
            .context(OpeningExcelSnafu { path })?;
        return Ok(wrange);
    }

    let all_worksheets = workbook.worksheets();
    match all_worksheets.as_slice() {
        [] => EmptyExcelSnafu { path }.fail(),
        [(worksheet_name, wrange)] => {
            debug!("get_range: path: {:?} worksheet: {:?}", path, worksheet_name);
            Ok(wrange.clone())
        }
        [(worksheet_name, wrange), ..] => {
            warn!(
                "get_range: {} has {} worksheets, using the first one ({:?}); use --excel-worksheet-name to pick another",
                path,
                all_worksheets.len(),
                worksheet_name
            );
            Ok(wrange.clone())
        }
    }
}

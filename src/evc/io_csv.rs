// Primitives for reading delimited text files.

use survey_tally::builder::DatasetBuilder;

use crate::evc::{
    io_common::{column_names, simplify_file_name},
    *,
};

pub fn read_csv_dataset(path: &str, cfs: &FileSource) -> EvcResult<Dataset> {
    let delimiter = cfs.delimiter_byte()?;
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .delimiter(delimiter)
        .from_path(path)
        .context(CsvOpenSnafu { path })?;

    let header: Vec<Option<String>> = rdr
        .headers()
        .context(CsvOpenSnafu { path })?
        .iter()
        .map(|s| Some(s.to_string()))
        .collect();
    debug!("read_csv_dataset: header: {:?}", header);

    let columns = column_names(&header);
    let mut builder = DatasetBuilder::new(columns.as_slice());
    if let Some(name) = simplify_file_name(path) {
        builder = builder.name(&name);
    }

    for (idx, line_r) in rdr.records().enumerate() {
        // The header is line 1.
        let lineno = idx + 2;
        let line = line_r.context(CsvLineParseSnafu { path, lineno })?;
        debug!("read_csv_dataset: lineno: {:?} row: {:?}", lineno, line);
        let cells: Vec<Value> = line
            .iter()
            .map(|s| {
                if s.trim().is_empty() {
                    Value::Empty
                } else {
                    Value::Text(s.to_string())
                }
            })
            .collect();
        builder
            .add_row(cells)
            .context(BuildingDatasetSnafu { path })?;
    }
    Ok(builder.build())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_tmp(content: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }

    #[test]
    fn reads_header_and_rows() {
        let f = write_tmp("MembershipStatus,Attended\nMember,Yes\nNon-member,\n");
        let d = read_csv_dataset(&f.path().display().to_string(), &FileSource::default()).unwrap();
        assert_eq!(d.columns, vec!["MembershipStatus", "Attended"]);
        assert_eq!(d.len(), 2);
        assert_eq!(d.records[1].get("Attended"), Some(&Value::Empty));
        assert_eq!(d.responses("MembershipStatus"), vec!["Member", "Non-member"]);
    }

    #[test]
    fn pads_short_lines() {
        let f = write_tmp("A,B,C\nx\ny,z\n");
        let d = read_csv_dataset(&f.path().display().to_string(), &FileSource::default()).unwrap();
        assert_eq!(d.len(), 2);
        assert_eq!(d.records[0].get("C"), Some(&Value::Empty));
        assert_eq!(d.responses("B"), vec!["z"]);
    }

    #[test]
    fn rejects_long_lines() {
        let f = write_tmp("A\nx,y\n");
        let res = read_csv_dataset(&f.path().display().to_string(), &FileSource::default());
        assert!(matches!(res, Err(EvcError::BuildingDataset { .. })));
    }

    #[test]
    fn custom_delimiter() {
        let f = write_tmp("Attended;Event\nYes;Gala\n");
        let cfs = FileSource {
            delimiter: Some(";".to_string()),
            ..FileSource::default()
        };
        let d = read_csv_dataset(&f.path().display().to_string(), &cfs).unwrap();
        assert_eq!(d.responses("Event"), vec!["Gala"]);
    }
}

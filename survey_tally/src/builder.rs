pub use crate::config::*;

/// A builder for assembling a dataset row by row.
///
/// The readers use it to turn spreadsheet rows into records.
///
/// ```
/// use survey_tally::builder::DatasetBuilder;
/// # use survey_tally::TallyError;
///
/// let mut builder = DatasetBuilder::new(&["MembershipStatus", "Attended"]).name("Spring");
/// builder.add_text_row(&["Member", "Yes"])?;
/// builder.add_text_row(&["Non-member"])?;
///
/// let dataset = builder.build();
/// assert_eq!(dataset.len(), 2);
/// assert_eq!(dataset.responses("Attended"), vec!["Yes".to_string()]);
/// # Ok::<(), TallyError>(())
/// ```
pub struct DatasetBuilder {
    pub(crate) _name: Option<String>,
    pub(crate) _columns: Vec<String>,
    pub(crate) _records: Vec<Record>,
}

impl DatasetBuilder {
    pub fn new<S: AsRef<str>>(columns: &[S]) -> DatasetBuilder {
        DatasetBuilder {
            _name: None,
            _columns: columns.iter().map(|c| c.as_ref().to_string()).collect(),
            _records: Vec::new(),
        }
    }

    pub fn name(self, name: &str) -> DatasetBuilder {
        DatasetBuilder {
            _name: Some(name.to_string()),
            ..self
        }
    }

    /// Adds a row of cells, in column order.
    ///
    /// Short rows are padded with empty cells. A row with more cells than
    /// columns is rejected.
    pub fn add_row(&mut self, cells: Vec<Value>) -> Result<(), TallyError> {
        if cells.len() > self._columns.len() {
            return RaggedRowSnafu {
                row: self._records.len() + 1,
                cells: cells.len(),
                columns: self._columns.len(),
            }
            .fail();
        }
        let mut record = Record::new();
        let mut cells_iter = cells.into_iter();
        for c in self._columns.iter() {
            record.insert(c.clone(), cells_iter.next().unwrap_or(Value::Empty));
        }
        self._records.push(record);
        Ok(())
    }

    pub fn add_text_row(&mut self, cells: &[&str]) -> Result<(), TallyError> {
        self.add_row(cells.iter().map(|s| Value::from(*s)).collect())
    }

    /// Adds the same row `count` times.
    pub fn repeat_text_row(&mut self, cells: &[&str], count: usize) -> Result<(), TallyError> {
        for _ in 0..count {
            self.add_text_row(cells)?;
        }
        Ok(())
    }

    pub fn build(self) -> Dataset {
        Dataset {
            name: self._name,
            columns: self._columns,
            records: self._records,
        }
    }
}

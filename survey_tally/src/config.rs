// ********* Input data structures ***********

use snafu::Snafu;
use std::collections::HashMap;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;

/// A single response cell, as read from a survey export.
#[derive(PartialEq, Debug, Clone)]
pub enum Value {
    Text(String),
    Number(f64),
    Bool(bool),
    Empty,
}

impl Value {
    /// The category under which this response is counted.
    ///
    /// Blank responses are not counted and return `None`.
    pub fn category(&self) -> Option<String> {
        match self {
            Value::Text(s) if s.trim().is_empty() => None,
            Value::Text(s) => Some(s.trim().to_string()),
            Value::Number(f) if f.is_finite() && f.fract() == 0.0 => Some(format!("{}", *f as i64)),
            Value::Number(f) => Some(f.to_string()),
            Value::Bool(true) => Some("Yes".to_string()),
            Value::Bool(false) => Some("No".to_string()),
            Value::Empty => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Value {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Value {
        Value::Text(s)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Value {
        Value::Number(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Value {
        Value::Bool(b)
    }
}

/// One survey response: question label -> answer.
pub type Record = HashMap<String, Value>;

/// The rows of one survey export.
///
/// Datasets are never modified by the engine. Derived columns such as the
/// event label are attached to a copy.
#[derive(PartialEq, Debug, Clone, Default)]
pub struct Dataset {
    /// Usually the stem of the file the dataset was loaded from.
    pub name: Option<String>,
    pub columns: Vec<String>,
    pub records: Vec<Record>,
}

impl Dataset {
    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The non-blank responses of a column, in record order.
    pub fn responses(&self, column: &str) -> Vec<String> {
        self.records
            .iter()
            .filter_map(|r| r.get(column).and_then(Value::category))
            .collect()
    }

    /// Returns a copy of this dataset with the `column` set on every record to
    /// the label computed for that record.
    pub fn with_event<F>(&self, column: &str, label: F) -> Dataset
    where
        F: Fn(&Record) -> String,
    {
        let mut columns = self.columns.clone();
        if !self.has_column(column) {
            columns.push(column.to_string());
        }
        let records = self
            .records
            .iter()
            .map(|r| {
                let mut tagged = r.clone();
                tagged.insert(column.to_string(), Value::Text(label(r)));
                tagged
            })
            .collect();
        Dataset {
            name: self.name.clone(),
            columns,
            records,
        }
    }

    /// Appends the records of another dataset. Columns are merged, keeping
    /// the order in which they are first seen.
    pub fn append(&mut self, other: Dataset) {
        for c in other.columns {
            if !self.has_column(&c) {
                self.columns.push(c);
            }
        }
        self.records.extend(other.records);
    }
}

// ********* Queries **********

/// The fixed analyses that can be run on a survey export.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum QueryKind {
    Attendance,
    MembershipStatus,
    Sales,
}

impl QueryKind {
    pub const ALL: [QueryKind; 3] = [
        QueryKind::Attendance,
        QueryKind::MembershipStatus,
        QueryKind::Sales,
    ];

    pub fn display_name(&self) -> &'static str {
        match self {
            QueryKind::Attendance => "Attendance",
            QueryKind::MembershipStatus => "Membership Status",
            QueryKind::Sales => "Sales",
        }
    }

    /// The prefix of the output file names.
    pub fn file_prefix(&self) -> String {
        self.display_name().replace(' ', "_")
    }
}

impl Display for QueryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl FromStr for QueryKind {
    type Err = TallyError;

    fn from_str(s: &str) -> Result<QueryKind, TallyError> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| !matches!(c, ' ' | '_' | '-'))
            .collect::<String>()
            .to_lowercase();
        match normalized.as_str() {
            "attendance" => Ok(QueryKind::Attendance),
            "membershipstatus" | "membership" => Ok(QueryKind::MembershipStatus),
            "sales" => Ok(QueryKind::Sales),
            _ => UnsupportedQuerySnafu { query: s }.fail(),
        }
    }
}

/// Sales rates, in dollars per response: (response, reported category, rate).
pub const SALES_RATES: [(&str, &str, u64); 2] =
    [("Member", "Members", 15), ("Non-member", "Non-Members", 20)];

pub const ATTENDANCE_COLUMN: &str = "Attended";
pub const MEMBERSHIP_STATUS_COLUMN: &str = "MembershipStatus";
pub const EVENT_COLUMN: &str = "Event";

/// The names of the columns read by the queries.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ColumnNames {
    pub attendance: String,
    pub membership_status: String,
    pub event: String,
}

impl Default for ColumnNames {
    fn default() -> ColumnNames {
        ColumnNames {
            attendance: ATTENDANCE_COLUMN.to_string(),
            membership_status: MEMBERSHIP_STATUS_COLUMN.to_string(),
            event: EVENT_COLUMN.to_string(),
        }
    }
}

// ******** Output data structures *********

/// Counted or derived values, keyed by category and optionally by event.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum Tabulation {
    Single(Vec<(String, u64)>),
    /// Every event carries the same categories, in the same order.
    Grouped(Vec<(String, Vec<(String, u64)>)>),
}

impl Tabulation {
    pub fn categories(&self) -> Vec<String> {
        let tally = match self {
            Tabulation::Single(tally) => tally,
            Tabulation::Grouped(events) => match events.first() {
                Some((_, tally)) => tally,
                None => return vec![],
            },
        };
        tally.iter().map(|(c, _)| c.clone()).collect()
    }

    /// The event labels, in order. Empty for a single tabulation.
    pub fn events(&self) -> Vec<String> {
        match self {
            Tabulation::Single(_) => vec![],
            Tabulation::Grouped(events) => events.iter().map(|(e, _)| e.clone()).collect(),
        }
    }

    /// The value of a category. The event is ignored for a single tabulation.
    pub fn get(&self, event: Option<&str>, category: &str) -> Option<u64> {
        let tally = match (self, event) {
            (Tabulation::Single(tally), _) => tally,
            (Tabulation::Grouped(events), Some(e)) => {
                &events.iter().find(|(name, _)| name == e)?.1
            }
            (Tabulation::Grouped(_), None) => return None,
        };
        tally.iter().find(|(c, _)| c == category).map(|(_, v)| *v)
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum ChartKind {
    Pie,
    GroupedBar,
    StackedBar,
}

/// Everything a renderer needs to draw one chart.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ChartSpec {
    pub kind: ChartKind,
    pub title: String,
    /// Event labels, or the single label of a single dataset.
    pub clusters: Vec<String>,
    pub categories: Vec<String>,
    /// values[cluster][category]
    pub values: Vec<Vec<u64>>,
    pub file_name: String,
}

// ********* Errors **********

pub type BoxedError = Box<dyn std::error::Error>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum TallyError {
    #[snafu(display("{labels} labels were given for {datasets} datasets"))]
    InputMismatch { labels: usize, datasets: usize },

    #[snafu(display("Empty input: {reason}"))]
    EmptyInput { reason: String },

    #[snafu(display("Missing column {column:?}"))]
    MissingColumn { column: String },

    #[snafu(display("Unsupported query {query:?}"))]
    UnsupportedQuery { query: String },

    #[snafu(display("Row {row} has {cells} cells but only {columns} columns are declared"))]
    RaggedRow {
        row: usize,
        cells: usize,
        columns: usize,
    },

    #[snafu(display("Failed to load dataset {}", path.display()))]
    ProviderFailure { path: PathBuf, source: BoxedError },

    #[snafu(display("Failed to render chart {}", path.display()))]
    RenderFailure { path: PathBuf, source: BoxedError },
}

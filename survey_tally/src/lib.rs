mod config;
pub mod builder;
pub mod manual;

use log::{debug, info, warn};
use snafu::{ensure, ResultExt};

use std::{
    fs,
    path::{Path, PathBuf},
};

pub use crate::config::*;

// ********* Collaborators **********

/// Loads a dataset from a file.
pub trait DatasetProvider {
    fn load(&self, path: &Path) -> Result<Dataset, BoxedError>;
}

/// Draws a chart and writes it to the given path.
///
/// Implementations must not leave a partial file behind on failure.
pub trait ChartSink {
    fn render(&self, spec: &ChartSpec, path: &Path) -> Result<(), BoxedError>;
}

// **** Query strategies ****

struct QueryStrategy {
    column: fn(&ColumnNames) -> &str,
    /// All the responses of a query -> the ordered categories to report.
    categories: fn(&[String]) -> Vec<String>,
    /// The value of one category, given the responses of one event.
    value: fn(&str, &[String]) -> u64,
    /// Whether a response contributes to any category.
    counted: fn(&str) -> bool,
    single_chart: ChartKind,
    title: &'static str,
}

static ATTENDANCE: QueryStrategy = QueryStrategy {
    column: attendance_column,
    categories: distinct_categories,
    value: count_category,
    counted: any_response,
    single_chart: ChartKind::Pie,
    title: "Attendance",
};

static MEMBERSHIP_STATUS: QueryStrategy = QueryStrategy {
    column: membership_column,
    categories: distinct_categories,
    value: count_category,
    counted: any_response,
    single_chart: ChartKind::Pie,
    title: "Members vs Non-members",
};

static SALES: QueryStrategy = QueryStrategy {
    column: membership_column,
    categories: sales_categories,
    value: sales_value,
    counted: has_sales_rate,
    single_chart: ChartKind::GroupedBar,
    title: "Sales by Membership",
};

fn strategy(query: QueryKind) -> &'static QueryStrategy {
    match query {
        QueryKind::Attendance => &ATTENDANCE,
        QueryKind::MembershipStatus => &MEMBERSHIP_STATUS,
        QueryKind::Sales => &SALES,
    }
}

fn attendance_column(columns: &ColumnNames) -> &str {
    &columns.attendance
}

fn membership_column(columns: &ColumnNames) -> &str {
    &columns.membership_status
}

// First-appearance order.
fn distinct_categories(responses: &[String]) -> Vec<String> {
    let mut res: Vec<String> = Vec::new();
    for r in responses {
        if !res.contains(r) {
            res.push(r.clone());
        }
    }
    res
}

fn count_category(category: &str, responses: &[String]) -> u64 {
    responses.iter().filter(|r| *r == category).count() as u64
}

fn any_response(_response: &str) -> bool {
    true
}

fn has_sales_rate(response: &str) -> bool {
    SALES_RATES
        .iter()
        .any(|(resp, _, _)| resp.eq_ignore_ascii_case(response))
}

fn sales_categories(responses: &[String]) -> Vec<String> {
    for r in distinct_categories(responses) {
        if !has_sales_rate(&r) {
            warn!("sales: no rate for response {:?}, skipping it", r);
        }
    }
    SALES_RATES
        .iter()
        .map(|(_, category, _)| category.to_string())
        .collect()
}

fn sales_value(category: &str, responses: &[String]) -> u64 {
    match SALES_RATES.iter().find(|(_, c, _)| *c == category) {
        Some((resp, _, rate)) => {
            responses
                .iter()
                .filter(|r| resp.eq_ignore_ascii_case(r))
                .count() as u64
                * rate
        }
        None => 0,
    }
}

// ********* Tabulation **********

/// Replaces the characters that cannot appear in an output file name.
pub fn sanitize_label(label: &str) -> String {
    label.replace([' ', '/', '\\'], "_")
}

/// The name of the chart file for a query.
///
/// `label` is the label of the single dataset, or `None` for a chart that
/// combines several events.
///
/// ```
/// use survey_tally::{output_file_name, QueryKind};
///
/// assert_eq!(output_file_name(QueryKind::MembershipStatus, Some("Spring Gala")),
///     "Membership_Status_Spring_Gala.png");
/// assert_eq!(output_file_name(QueryKind::Sales, None), "Sales_Multi.png");
/// ```
pub fn output_file_name(query: QueryKind, label: Option<&str>) -> String {
    match label {
        Some(l) => format!("{}_{}.png", query.file_prefix(), sanitize_label(l)),
        None => format!("{}_Multi.png", query.file_prefix()),
    }
}

fn check_inputs(datasets: &[Dataset], labels: Option<&[String]>) -> Result<(), TallyError> {
    ensure!(
        !datasets.is_empty(),
        EmptyInputSnafu {
            reason: "no dataset was given"
        }
    );
    if let Some(l) = labels {
        ensure!(
            l.len() == datasets.len(),
            InputMismatchSnafu {
                labels: l.len(),
                datasets: datasets.len(),
            }
        );
    }
    Ok(())
}

fn check_dataset(idx: usize, dataset: &Dataset, column: &str) -> Result<(), TallyError> {
    ensure!(
        !dataset.is_empty(),
        EmptyInputSnafu {
            reason: format!(
                "dataset {} ({}) has no records",
                idx + 1,
                dataset.name.as_deref().unwrap_or("unnamed")
            )
        }
    );
    ensure!(dataset.has_column(column), MissingColumnSnafu { column });
    Ok(())
}

/// The label of a dataset that is charted on its own.
fn single_label(dataset: &Dataset, labels: Option<&[String]>) -> String {
    labels
        .and_then(|l| l.first().cloned())
        .or_else(|| dataset.name.clone())
        .unwrap_or_else(|| "Event_1".to_string())
}

/// Tags every record with its event label and concatenates all the datasets.
///
/// The label of a record is the explicit label of its dataset, else the value
/// already present in the event column, else `Event_{n}`.
fn combine(datasets: &[Dataset], labels: Option<&[String]>, event_column: &str) -> Dataset {
    let mut combined = Dataset::default();
    for (idx, dataset) in datasets.iter().enumerate() {
        let explicit: Option<String> = labels.and_then(|l| l.get(idx).cloned());
        let fallback = format!("Event_{}", idx + 1);
        let tagged = dataset.with_event(event_column, |r| {
            explicit
                .clone()
                .or_else(|| r.get(event_column).and_then(Value::category))
                .unwrap_or_else(|| fallback.clone())
        });
        combined.append(tagged);
    }
    combined
}

/// Fails unless at least one response is counted by the query.
fn check_responses(
    strategy: &QueryStrategy,
    column: &str,
    responses: &[String],
) -> Result<(), TallyError> {
    ensure!(
        responses.iter().any(|r| (strategy.counted)(r)),
        EmptyInputSnafu {
            reason: format!("no countable response in column {:?}", column)
        }
    );
    Ok(())
}

fn tally_for(strategy: &QueryStrategy, categories: &[String], responses: &[String]) -> Vec<(String, u64)> {
    categories
        .iter()
        .map(|c| (c.clone(), (strategy.value)(c, responses)))
        .collect()
}

/// Tabulates a query over one or several datasets.
///
/// A single dataset is tabulated directly. Several datasets are combined and
/// tabulated per event; every event reports every category, with 0 for the
/// categories it never mentions.
///
/// ```
/// use survey_tally::builder::DatasetBuilder;
/// use survey_tally::*;
///
/// let mut builder = DatasetBuilder::new(&["MembershipStatus"]);
/// builder.repeat_text_row(&["Member"], 3)?;
/// builder.repeat_text_row(&["Non-member"], 2)?;
///
/// let tab = tabulate(&[builder.build()], None, QueryKind::Sales, &ColumnNames::default())?;
/// assert_eq!(tab, Tabulation::Single(vec![
///     ("Members".to_string(), 45),
///     ("Non-Members".to_string(), 40),
/// ]));
/// # Ok::<(), TallyError>(())
/// ```
pub fn tabulate(
    datasets: &[Dataset],
    labels: Option<&[String]>,
    query: QueryKind,
    columns: &ColumnNames,
) -> Result<Tabulation, TallyError> {
    check_inputs(datasets, labels)?;
    let strategy = strategy(query);
    let column = (strategy.column)(columns);
    for (idx, d) in datasets.iter().enumerate() {
        check_dataset(idx, d, column)?;
    }
    info!(
        "tabulate: query {:?} on {} dataset(s), column {:?}",
        query,
        datasets.len(),
        column
    );

    if let [dataset] = datasets {
        let responses = dataset.responses(column);
        check_responses(strategy, column, &responses)?;
        let categories = (strategy.categories)(&responses);
        let tally = tally_for(strategy, &categories, &responses);
        debug!("tabulate: single tally {:?}", tally);
        return Ok(Tabulation::Single(tally));
    }

    let combined = combine(datasets, labels, &columns.event);
    // The responses of each event, events in first-appearance order.
    let mut events: Vec<(String, Vec<String>)> = Vec::new();
    for r in combined.records.iter() {
        let event = r
            .get(&columns.event)
            .and_then(Value::category)
            .unwrap_or_default();
        let pos = match events.iter().position(|(e, _)| *e == event) {
            Some(pos) => pos,
            None => {
                events.push((event, Vec::new()));
                events.len() - 1
            }
        };
        if let Some(resp) = r.get(column).and_then(Value::category) {
            events[pos].1.push(resp);
        }
    }

    let all_responses: Vec<String> = events.iter().flat_map(|(_, r)| r.clone()).collect();
    check_responses(strategy, column, &all_responses)?;
    let categories = (strategy.categories)(&all_responses);

    let grouped: Vec<(String, Vec<(String, u64)>)> = events
        .iter()
        .map(|(e, responses)| (e.clone(), tally_for(strategy, &categories, responses)))
        .collect();
    debug!("tabulate: grouped tally {:?}", grouped);
    Ok(Tabulation::Grouped(grouped))
}

// ********* Charts **********

/// The outcome of a successful chart production.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ChartOutput {
    pub path: PathBuf,
    pub spec: ChartSpec,
    pub tabulation: Tabulation,
}

/// Turns datasets into chart images.
///
/// The engine holds no state between calls: the column contract, the chart
/// options and the renderer are fixed at construction.
pub struct ChartEngine<S: ChartSink> {
    columns: ColumnNames,
    stacked: bool,
    sink: S,
}

impl<S: ChartSink> ChartEngine<S> {
    pub fn new(sink: S) -> ChartEngine<S> {
        ChartEngine {
            columns: ColumnNames::default(),
            stacked: false,
            sink,
        }
    }

    pub fn columns(self, columns: ColumnNames) -> ChartEngine<S> {
        ChartEngine { columns, ..self }
    }

    /// Draws several events as stacked bars instead of grouped bars.
    pub fn stacked(self, stacked: bool) -> ChartEngine<S> {
        ChartEngine { stacked, ..self }
    }

    pub fn tabulate(
        &self,
        datasets: &[Dataset],
        labels: Option<&[String]>,
        query: QueryKind,
    ) -> Result<Tabulation, TallyError> {
        tabulate(datasets, labels, query, &self.columns)
    }

    /// Tabulates and describes the chart, without drawing it.
    pub fn chart_spec(
        &self,
        datasets: &[Dataset],
        labels: Option<&[String]>,
        query: QueryKind,
    ) -> Result<(ChartSpec, Tabulation), TallyError> {
        let tabulation = self.tabulate(datasets, labels, query)?;
        let strategy = strategy(query);
        let categories = tabulation.categories();
        let spec = match &tabulation {
            Tabulation::Single(tally) => {
                // Tabulation succeeded, so there is exactly one dataset.
                let label = single_label(&datasets[0], labels);
                ChartSpec {
                    kind: strategy.single_chart,
                    title: format!("{} - {}", strategy.title, label),
                    file_name: output_file_name(query, Some(label.as_str())),
                    clusters: vec![label],
                    categories,
                    values: vec![tally.iter().map(|(_, v)| *v).collect()],
                }
            }
            Tabulation::Grouped(events) => ChartSpec {
                kind: if self.stacked {
                    ChartKind::StackedBar
                } else {
                    ChartKind::GroupedBar
                },
                title: format!("{} by Event", strategy.title),
                file_name: output_file_name(query, None),
                clusters: tabulation.events(),
                categories,
                values: events
                    .iter()
                    .map(|(_, tally)| tally.iter().map(|(_, v)| *v).collect())
                    .collect(),
            },
        };
        debug!("chart_spec: {:?}", spec);
        Ok((spec, tabulation))
    }

    /// Tabulates, then renders the chart into `output_dir`.
    ///
    /// Nothing is written unless the tabulation succeeds.
    pub fn produce(
        &self,
        datasets: &[Dataset],
        labels: Option<&[String]>,
        query: QueryKind,
        output_dir: &Path,
    ) -> Result<ChartOutput, TallyError> {
        let (spec, tabulation) = self.chart_spec(datasets, labels, query)?;
        fs::create_dir_all(output_dir)
            .map_err(|e| Box::new(e) as BoxedError)
            .context(RenderFailureSnafu { path: output_dir })?;
        let path = output_dir.join(&spec.file_name);
        self.sink
            .render(&spec, &path)
            .context(RenderFailureSnafu { path: path.clone() })?;
        info!("produce: wrote {:?} chart to {}", spec.kind, path.display());
        Ok(ChartOutput {
            path,
            spec,
            tabulation,
        })
    }

    pub fn produce_chart(
        &self,
        datasets: &[Dataset],
        labels: Option<&[String]>,
        query: QueryKind,
        output_dir: &Path,
    ) -> Result<PathBuf, TallyError> {
        self.produce(datasets, labels, query, output_dir)
            .map(|out| out.path)
    }
}

/// Produces the chart of a query with the canonical column names.
///
/// `query` is the name of the query, for instance `"Sales"` or
/// `"Membership Status"`.
pub fn produce_chart<S: ChartSink>(
    datasets: &[Dataset],
    labels: Option<&[String]>,
    query: &str,
    output_dir: &Path,
    sink: S,
) -> Result<PathBuf, TallyError> {
    let query: QueryKind = query.parse()?;
    ChartEngine::new(sink).produce_chart(datasets, labels, query, output_dir)
}

/// Loads one dataset, attaching the path to any failure.
pub fn load_dataset<P: DatasetProvider + ?Sized>(
    provider: &P,
    path: &Path,
) -> Result<Dataset, TallyError> {
    info!("Attempting to read survey file {}", path.display());
    let dataset = provider
        .load(path)
        .context(ProviderFailureSnafu { path })?;
    debug!(
        "load_dataset: {} records, columns {:?}",
        dataset.len(),
        dataset.columns
    );
    Ok(dataset)
}

pub fn load_datasets<P: DatasetProvider + ?Sized>(
    provider: &P,
    paths: &[PathBuf],
) -> Result<Vec<Dataset>, TallyError> {
    paths.iter().map(|p| load_dataset(provider, p)).collect()
}

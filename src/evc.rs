use log::{debug, info, warn};

use snafu::{prelude::*, Snafu};
use survey_tally::*;

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::json;
use serde_json::Map as JSMap;
use serde_json::Value as JSValue;
use text_diff::print_diff;

use crate::args::Args;
use crate::evc::config_reader::*;

mod config_reader;
mod io_common;
mod io_csv;
mod io_excel;
mod render;

pub use crate::evc::render::PngSink;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum EvcError {
    #[snafu(display("Error opening workbook {path}"))]
    OpeningExcel {
        source: calamine::Error,
        path: String,
    },
    #[snafu(display("The workbook {path} has no worksheet"))]
    EmptyExcel { path: String },
    #[snafu(display("Cannot find worksheet {name:?} in {path}"))]
    MissingWorksheet { name: String, path: String },
    #[snafu(display("Error opening delimited file {path}"))]
    CsvOpen { source: csv::Error, path: String },
    #[snafu(display("Error parsing line {lineno} of {path}"))]
    CsvLineParse {
        source: csv::Error,
        path: String,
        lineno: usize,
    },
    #[snafu(display("The delimiter must be a single ASCII character, got {delimiter:?}"))]
    InvalidDelimiter { delimiter: String },
    #[snafu(display("Cannot read {path} as a workbook ({excel}) nor as delimited text"))]
    UnreadableInput {
        source: Box<EvcError>,
        path: String,
        excel: String,
    },
    #[snafu(display("Error reading rows of {path}"))]
    BuildingDataset { source: TallyError, path: String },
    #[snafu(display("Error opening {path}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing JSON"))]
    ParsingJson { source: serde_json::Error },
    #[snafu(display("Error writing {path}"))]
    WritingSummary {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("No survey file was given (use --input or a configuration file)"))]
    MissingInputs {},
    #[snafu(display("Could not produce the chart"))]
    Engine { source: TallyError },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type EvcResult<T> = Result<T, EvcError>;

/// Reads survey files: as a workbook first, then as delimited text.
pub struct FileProvider {
    source: FileSource,
}

impl FileProvider {
    pub fn new(source: &FileSource) -> FileProvider {
        FileProvider {
            source: source.clone(),
        }
    }

    fn read(&self, path: &Path) -> EvcResult<Dataset> {
        let p = path.display().to_string();
        match io_excel::read_excel_dataset(&p, &self.source) {
            Ok(dataset) => Ok(dataset),
            Err(excel_err) => {
                debug!(
                    "FileProvider: {} is not a workbook ({}), reading it as delimited text",
                    p, excel_err
                );
                io_csv::read_csv_dataset(&p, &self.source)
                    .map_err(Box::new)
                    .context(UnreadableInputSnafu {
                        path: p.clone(),
                        excel: excel_err.to_string(),
                    })
            }
        }
    }
}

impl DatasetProvider for FileProvider {
    fn load(&self, path: &Path) -> Result<Dataset, BoxedError> {
        Ok(self.read(path)?)
    }
}

/// The inputs and settings of one run, after merging the command line and the configuration file.
#[derive(Debug, Clone)]
struct RunSettings {
    sources: Vec<(PathBuf, FileSource)>,
    labels: Option<Vec<String>>,
    query: String,
    output_directory: PathBuf,
    columns: ColumnNames,
    stacked: bool,
    size: (u32, u32),
    summary: Option<String>,
}

fn resolve_settings(args: &Args, config: Option<(EvcConfig, PathBuf)>) -> EvcResult<RunSettings> {
    let (config, root_p) = config.unwrap_or_default();
    let settings = &config.output_settings;

    let cli_source = FileSource {
        excel_worksheet_name: args.excel_worksheet_name.clone(),
        delimiter: args.delimiter.clone(),
        ..FileSource::default()
    };

    // Files given on the command line are relative to the working directory,
    // the ones of the configuration to the configuration file.
    let (sources, labels): (Vec<(PathBuf, FileSource)>, Option<Vec<String>>) =
        if !args.input.is_empty() {
            let sources = args
                .input
                .iter()
                .map(|p| {
                    (
                        PathBuf::from(p),
                        FileSource {
                            file_path: p.clone(),
                            ..cli_source.clone()
                        },
                    )
                })
                .collect();
            let labels = if args.label.is_empty() {
                None
            } else {
                Some(args.label.clone())
            };
            (sources, labels)
        } else {
            let sources: Vec<(PathBuf, FileSource)> = config
                .file_sources
                .iter()
                .map(|cfs| {
                    let merged = FileSource {
                        excel_worksheet_name: cfs
                            .excel_worksheet_name
                            .clone()
                            .or_else(|| cli_source.excel_worksheet_name.clone()),
                        delimiter: cfs.delimiter.clone().or_else(|| cli_source.delimiter.clone()),
                        ..cfs.clone()
                    };
                    (root_p.join(&cfs.file_path), merged)
                })
                .collect();
            let labels = if !args.label.is_empty() {
                Some(args.label.clone())
            } else if config.file_sources.iter().any(|cfs| cfs.label.is_some()) {
                Some(
                    config
                        .file_sources
                        .iter()
                        .enumerate()
                        .map(|(idx, cfs)| {
                            cfs.label
                                .clone()
                                .unwrap_or_else(|| format!("Event_{}", idx + 1))
                        })
                        .collect(),
                )
            } else {
                None
            };
            (sources, labels)
        };

    ensure!(!sources.is_empty(), MissingInputsSnafu {});

    let output_directory = match (&args.out_dir, &settings.output_directory) {
        (Some(d), _) => PathBuf::from(d),
        (None, Some(d)) => root_p.join(d),
        (None, None) => PathBuf::from(DEFAULT_OUTPUT_DIRECTORY),
    };

    Ok(RunSettings {
        sources,
        labels,
        query: args
            .query
            .clone()
            .or_else(|| settings.query.clone())
            .unwrap_or_else(|| QueryKind::Attendance.to_string()),
        output_directory,
        columns: config.column_names(),
        stacked: args.stacked || settings.stacked_bars.unwrap_or(false),
        size: (
            settings.width.unwrap_or(render::DEFAULT_WIDTH),
            settings.height.unwrap_or(render::DEFAULT_HEIGHT),
        ),
        summary: args.summary.clone().or_else(|| settings.summary_path.clone()),
    })
}

/// The tabulation of a run, in JSON format.
///
/// A single file produces one event, labelled after the file.
fn build_summary_js(query: QueryKind, output: &ChartOutput) -> JSValue {
    let mut events: Vec<JSValue> = Vec::new();
    for (cluster, values) in output.spec.clusters.iter().zip(output.spec.values.iter()) {
        let mut tally: JSMap<String, JSValue> = JSMap::new();
        for (category, value) in output.spec.categories.iter().zip(values.iter()) {
            tally.insert(category.clone(), json!(value.to_string()));
        }
        events.push(json!({"event": cluster, "tally": tally}));
    }
    let file_name = output
        .path
        .file_name()
        .map(|f| f.to_string_lossy().to_string())
        .unwrap_or_default();
    json!({
        "query": query.display_name(),
        "file": file_name,
        "events": events,
    })
}

fn write_summary(location: &str, pretty_js: &str) -> EvcResult<()> {
    if location == "stdout" {
        println!("{}", pretty_js);
        return Ok(());
    }
    info!("Writing summary to {}", location);
    fs::write(location, pretty_js).context(WritingSummarySnafu { path: location })
}

fn check_reference(reference_path: &str, pretty_js_stats: &str) -> EvcResult<()> {
    let summary_ref = read_summary(reference_path)?;
    info!("summary: {:?}", summary_ref);
    let pretty_js_summary_ref =
        serde_json::to_string_pretty(&summary_ref).context(ParsingJsonSnafu {})?;
    if pretty_js_summary_ref != pretty_js_stats {
        warn!("Found differences with the reference string");
        print_diff(pretty_js_summary_ref.as_str(), pretty_js_stats, "\n");
        whatever!("Difference detected between calculated summary and reference summary")
    }
    Ok(())
}

/// Runs one tabulation end to end and returns the path of the chart.
pub fn run_charts(args: &Args) -> EvcResult<PathBuf> {
    let config = match &args.config {
        Some(config_path) => {
            let config = read_config(config_path)?;
            info!("config: {:?}", config);
            let root_p = Path::new(config_path)
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default();
            Some((config, root_p))
        }
        None => None,
    };
    let settings = resolve_settings(args, config)?;
    debug!("run_charts: settings {:?}", settings);

    let query: QueryKind = settings.query.parse().context(EngineSnafu {})?;

    let mut datasets: Vec<Dataset> = Vec::new();
    for (path, cfs) in settings.sources.iter() {
        let provider = FileProvider::new(cfs);
        let dataset = load_dataset(&provider, path).context(EngineSnafu {})?;
        info!(
            "Read {} responses from {}",
            dataset.len(),
            path.display()
        );
        datasets.push(dataset);
    }

    let engine = ChartEngine::new(PngSink::new(settings.size.0, settings.size.1))
        .columns(settings.columns.clone())
        .stacked(settings.stacked);
    let output = engine
        .produce(
            &datasets,
            settings.labels.as_deref(),
            query,
            &settings.output_directory,
        )
        .context(EngineSnafu {})?;
    info!("tabulation: {:?}", output.tabulation);

    let result_js = build_summary_js(query, &output);
    let pretty_js_stats = serde_json::to_string_pretty(&result_js).context(ParsingJsonSnafu {})?;

    if let Some(location) = &settings.summary {
        write_summary(location, &pretty_js_stats)?;
    }

    // The reference summary, if provided for comparison
    if let Some(reference_path) = &args.reference {
        check_reference(reference_path, &pretty_js_stats)?;
    }

    Ok(output.path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn write_file(dir: &Path, name: &str, content: &str) -> String {
        let p = dir.join(name);
        let mut f = fs::File::create(&p).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        p.display().to_string()
    }

    fn spring_fall(dir: &Path) -> (String, String) {
        let spring = write_file(
            dir,
            "spring.csv",
            "Timestamp,MembershipStatus,Attended\n1,Member,Yes\n2,Member,No\n3,Non-member,Yes\n",
        );
        let fall = write_file(
            dir,
            "fall.csv",
            "Timestamp,MembershipStatus,Attended\n1,Non-member,Yes\n2,Non-member,Yes\n3,Non-member,\n",
        );
        (spring, fall)
    }

    #[test]
    fn provider_falls_back_to_delimited_text() {
        init();
        let dir = tempfile::tempdir().unwrap();
        let (spring, _) = spring_fall(dir.path());
        let provider = FileProvider::new(&FileSource::default());
        let d = provider.load(Path::new(&spring)).unwrap();
        assert_eq!(d.len(), 3);
        assert_eq!(d.name.as_deref(), Some("spring"));
        assert!(d.has_column("MembershipStatus"));
    }

    const SPRING_DATA: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/data/spring");

    #[test]
    fn provider_reads_workbooks() {
        init();
        let provider = FileProvider::new(&FileSource::default());
        let path = Path::new(SPRING_DATA).join("spring_survey.xlsx");
        let d = provider.load(&path).unwrap();
        assert_eq!(d.name.as_deref(), Some("spring_survey"));
        assert_eq!(d.len(), 4);
        assert_eq!(
            d.columns,
            vec!["Timestamp", "MembershipStatus", "Attended", "Event"]
        );
        assert_eq!(d.records[1].get("Attended"), Some(&Value::Bool(true)));
        assert_eq!(d.responses("Event"), vec!["Spring Gala"; 4]);
    }

    #[test]
    fn workbook_configuration_run() {
        init();
        let dir = tempfile::tempdir().unwrap();
        let args = Args {
            config: Some(format!("{}/spring_config.json", SPRING_DATA)),
            reference: Some(format!("{}/spring_expected_summary.json", SPRING_DATA)),
            out_dir: Some(dir.path().display().to_string()),
            ..Args::default()
        };
        let path = run_charts(&args).unwrap();
        assert_eq!(path, dir.path().join("Sales_Spring_Gala.png"));
        let img = image::open(&path).unwrap();
        assert_eq!((img.width(), img.height()), (800, 600));
    }

    #[test]
    fn provider_reports_both_failures() {
        init();
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.xlsx");
        let provider = FileProvider::new(&FileSource::default());
        let res = provider.read(&missing);
        assert!(matches!(res, Err(EvcError::UnreadableInput { .. })));
    }

    #[test]
    fn single_file_run() {
        init();
        let dir = tempfile::tempdir().unwrap();
        let (spring, _) = spring_fall(dir.path());
        let out_dir = dir.path().join("static");
        let summary = dir.path().join("summary.json").display().to_string();
        let args = Args {
            input: vec![spring],
            query: Some("Sales".to_string()),
            out_dir: Some(out_dir.display().to_string()),
            summary: Some(summary.clone()),
            ..Args::default()
        };
        let path = run_charts(&args).unwrap();
        assert_eq!(path, out_dir.join("Sales_spring.png"));
        assert!(path.exists());

        let js: JSValue = serde_json::from_str(&fs::read_to_string(summary).unwrap()).unwrap();
        assert_eq!(
            js,
            json!({
                "query": "Sales",
                "file": "Sales_spring.png",
                "events": [{"event": "spring", "tally": {"Members": "30", "Non-Members": "20"}}]
            })
        );
    }

    #[test]
    fn multi_file_run_with_reference() {
        init();
        let dir = tempfile::tempdir().unwrap();
        let (spring, fall) = spring_fall(dir.path());
        let reference = write_file(
            dir.path(),
            "reference.json",
            r#"{
                "query": "Membership Status",
                "file": "Membership_Status_Multi.png",
                "events": [
                    {"event": "Spring", "tally": {"Member": "2", "Non-member": "1"}},
                    {"event": "Fall", "tally": {"Member": "0", "Non-member": "3"}}
                ]
            }"#,
        );
        let args = Args {
            input: vec![spring.clone(), fall.clone()],
            label: vec!["Spring".to_string(), "Fall".to_string()],
            query: Some("Membership Status".to_string()),
            out_dir: Some(dir.path().join("out").display().to_string()),
            reference: Some(reference),
            ..Args::default()
        };
        let path = run_charts(&args).unwrap();
        assert_eq!(
            path.file_name().unwrap().to_string_lossy(),
            "Membership_Status_Multi.png"
        );

        // The counts of the attendance query differ from the reference.
        let args = Args {
            query: Some("Attendance".to_string()),
            ..args
        };
        let res = run_charts(&args);
        assert!(matches!(res, Err(EvcError::Whatever { .. })));
    }

    #[test]
    fn label_mismatch_is_reported() {
        init();
        let dir = tempfile::tempdir().unwrap();
        let (spring, fall) = spring_fall(dir.path());
        let out_dir = dir.path().join("out");
        let args = Args {
            input: vec![spring, fall],
            label: vec!["Spring".to_string()],
            out_dir: Some(out_dir.display().to_string()),
            ..Args::default()
        };
        let res = run_charts(&args);
        assert!(matches!(
            res,
            Err(EvcError::Engine {
                source: TallyError::InputMismatch { .. }
            })
        ));
        assert!(!out_dir.exists());
    }

    #[test]
    fn unknown_query_is_reported() {
        init();
        let dir = tempfile::tempdir().unwrap();
        let (spring, _) = spring_fall(dir.path());
        let args = Args {
            input: vec![spring],
            query: Some("Foo".to_string()),
            ..Args::default()
        };
        let res = run_charts(&args);
        assert!(matches!(
            res,
            Err(EvcError::Engine {
                source: TallyError::UnsupportedQuery { .. }
            })
        ));
    }

    #[test]
    fn no_inputs() {
        init();
        let res = run_charts(&Args::default());
        assert!(matches!(res, Err(EvcError::MissingInputs {})));
    }

    #[test]
    fn configuration_run() {
        init();
        let dir = tempfile::tempdir().unwrap();
        write_file(
            dir.path(),
            "gala.csv",
            "Will you be in attendance?;Event\nYes;Gala\nNo;Gala\nYes;Mixer\n",
        );
        write_file(
            dir.path(),
            "picnic.csv",
            "Will you be in attendance?;Event\nYes;\n",
        );
        let config = write_file(
            dir.path(),
            "config.json",
            r#"{
                "outputSettings": {"outputDirectory": "charts", "query": "Attendance",
                                   "stackedBars": true, "width": 400, "height": 300},
                "fileSources": [
                    {"filePath": "gala.csv", "delimiter": ";"},
                    {"filePath": "picnic.csv", "delimiter": ";"}
                ],
                "columns": {"attendance": "Will you be in attendance?"}
            }"#,
        );
        let summary = dir.path().join("summary.json").display().to_string();
        let args = Args {
            config: Some(config),
            summary: Some(summary.clone()),
            ..Args::default()
        };
        let path = run_charts(&args).unwrap();
        assert_eq!(path, dir.path().join("charts").join("Attendance_Multi.png"));
        assert!(path.exists());

        let js: JSValue = serde_json::from_str(&fs::read_to_string(summary).unwrap()).unwrap();
        let events: Vec<String> = js["events"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["event"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(events, vec!["Gala", "Mixer", "Event_2"]);
        assert_eq!(js["events"][0]["tally"]["No"], json!("1"));
        assert_eq!(js["events"][2]["tally"]["No"], json!("0"));
    }
}

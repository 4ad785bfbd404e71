use clap::Parser;

/// This is a tabulation program for event surveys. It counts the answers of a few fixed
/// questions and draws them as a chart.
#[derive(Parser, Debug, Clone, Default)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path, optional) A JSON configuration file describing the inputs, the columns and the output.
    /// For more information about the file format, read the documentation of the survey_tally crate.
    #[clap(short, long, value_parser)]
    pub config: Option<String>,

    /// (file path, repeatable) A survey export, as an Excel workbook or as delimited text. Each file is one
    /// event. Setting this option overrides the files that may be specified with the --config option.
    #[clap(short, long, value_parser)]
    pub input: Vec<String>,

    /// (text, repeatable) The label of each event, in the same order as the inputs.
    #[clap(long, value_parser)]
    pub label: Vec<String>,

    /// (default Attendance) The query to run: Attendance, 'Membership Status' or Sales.
    #[clap(short, long, value_parser)]
    pub query: Option<String>,

    /// (directory, default static) The directory in which the chart is written.
    #[clap(short, long, value_parser)]
    pub out_dir: Option<String>,

    /// (file path, 'stdout' or empty) If specified, the tabulated values will be written in JSON format to the
    /// given location.
    #[clap(short, long, value_parser)]
    pub summary: Option<String>,

    /// (file path) A reference file containing a tabulation summary in JSON format. If provided, evcharts will
    /// check that the tabulated output matches the reference.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,

    /// When using an Excel file, indicates the name of the worksheet to use.
    #[clap(long, value_parser)]
    pub excel_worksheet_name: Option<String>,

    /// (default ',') The field delimiter of delimited text inputs.
    #[clap(long, value_parser)]
    pub delimiter: Option<String>,

    /// If passed as an argument, several events are drawn as stacked bars instead of grouped bars.
    #[clap(long, takes_value = false)]
    pub stacked: bool,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}

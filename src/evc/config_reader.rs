use crate::evc::*;

use serde::{Deserialize, Serialize};

pub const DEFAULT_OUTPUT_DIRECTORY: &str = "static";

#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputSettings {
    #[serde(rename = "outputDirectory")]
    pub output_directory: Option<String>,
    pub query: Option<String>,
    #[serde(rename = "stackedBars")]
    pub stacked_bars: Option<bool>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    #[serde(rename = "summaryPath")]
    pub summary_path: Option<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileSource {
    #[serde(rename = "filePath")]
    pub file_path: String,
    pub label: Option<String>,
    #[serde(rename = "excelWorksheetName")]
    pub excel_worksheet_name: Option<String>,
    pub delimiter: Option<String>,
}

impl FileSource {
    pub fn delimiter_byte(&self) -> EvcResult<u8> {
        match self.delimiter.as_deref() {
            None => Ok(b','),
            Some("\\t") | Some("tab") => Ok(b'\t'),
            Some(d) if d.len() == 1 && d.is_ascii() => Ok(d.as_bytes()[0]),
            Some(d) => InvalidDelimiterSnafu { delimiter: d }.fail(),
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct ColumnSettings {
    pub attendance: Option<String>,
    #[serde(rename = "membershipStatus")]
    pub membership_status: Option<String>,
    pub event: Option<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvcConfig {
    #[serde(rename = "outputSettings", default)]
    pub output_settings: OutputSettings,
    #[serde(rename = "fileSources", default)]
    pub file_sources: Vec<FileSource>,
    #[serde(default)]
    pub columns: ColumnSettings,
}

impl EvcConfig {
    /// The column names, with the canonical names for the ones not configured.
    pub fn column_names(&self) -> ColumnNames {
        let defaults = ColumnNames::default();
        ColumnNames {
            attendance: self
                .columns
                .attendance
                .clone()
                .unwrap_or(defaults.attendance),
            membership_status: self
                .columns
                .membership_status
                .clone()
                .unwrap_or(defaults.membership_status),
            event: self.columns.event.clone().unwrap_or(defaults.event),
        }
    }
}

pub fn read_config(path: &str) -> EvcResult<EvcConfig> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})
}

pub fn read_summary(path: &str) -> EvcResult<JSValue> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    debug!("read content: {:?}", contents);
    serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config() {
        let config: EvcConfig =
            serde_json::from_str(r#"{"fileSources": [{"filePath": "a.xlsx", "label": "Gala"}]}"#)
                .unwrap();
        assert_eq!(config.file_sources[0].label.as_deref(), Some("Gala"));
        assert_eq!(config.output_settings, OutputSettings::default());
        assert_eq!(config.column_names(), ColumnNames::default());
    }

    #[test]
    fn column_overrides() {
        let config: EvcConfig = serde_json::from_str(
            r#"{"columns": {"membershipStatus": "Are you a member of Waltham Chamber of Commerce"}}"#,
        )
        .unwrap();
        let columns = config.column_names();
        assert_eq!(
            columns.membership_status,
            "Are you a member of Waltham Chamber of Commerce"
        );
        assert_eq!(columns.attendance, "Attended");
    }

    #[test]
    fn delimiters() {
        let mut cfs = FileSource::default();
        assert_eq!(cfs.delimiter_byte().unwrap(), b',');
        cfs.delimiter = Some(";".to_string());
        assert_eq!(cfs.delimiter_byte().unwrap(), b';');
        cfs.delimiter = Some("tab".to_string());
        assert_eq!(cfs.delimiter_byte().unwrap(), b'\t');
        cfs.delimiter = Some("::".to_string());
        assert!(matches!(
            cfs.delimiter_byte(),
            Err(EvcError::InvalidDelimiter { .. })
        ));
    }
}

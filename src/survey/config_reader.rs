use crate::survey::*;

use serde::{Deserialize, Serialize};

#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct ColumnNamesConfig {
    #[serde(rename = "standardQuestion")]
    pub standard_question: Option<String>,
    #[serde(rename = "responseA")]
    pub response_a: Option<String>,
    #[serde(rename = "responseB")]
    pub response_b: Option<String>,
    #[serde(rename = "responseC")]
    pub response_c: Option<String>,
    #[serde(rename = "responseD")]
    pub response_d: Option<String>,
}

/// The JSON configuration file. Every field is optional.
#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct SurveyConfig {
    /// The preset of header names: `en` or `zh`.
    pub columns: Option<String>,
    #[serde(rename = "columnNames")]
    pub column_names: Option<ColumnNamesConfig>,
    #[serde(rename = "maxRows")]
    pub max_rows: Option<usize>,
    #[serde(rename = "maxFileBytes")]
    pub max_file_bytes: Option<u64>,
    #[serde(rename = "anonymousNickname")]
    pub anonymous_nickname: Option<String>,
    #[serde(rename = "exportFilePrefix")]
    pub export_file_prefix: Option<String>,
    #[serde(rename = "exportSheetName")]
    pub export_sheet_name: Option<String>,
}

pub fn read_config(path: &str) -> AppResult<SurveyConfig> {
    let config_str = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let config: SurveyConfig = serde_json::from_str(&config_str).context(ParsingJsonSnafu {})?;
    Ok(config)
}

fn non_empty(field: &str, value: &Option<String>) -> AppResult<Option<String>> {
    match value {
        Some(s) if s.trim().is_empty() => {
            whatever!("Configuration field {} may not be empty", field)
        }
        Some(s) => Ok(Some(s.trim().to_string())),
        None => Ok(None),
    }
}

/// Builds the settings of a session. The preset given on the command line
/// takes precedence over the one of the file; explicit column names override
/// both.
pub fn build_settings(config: &SurveyConfig, preset: Option<&str>) -> AppResult<SurveySettings> {
    let mut settings = SurveySettings::default();

    if let Some(name) = preset.or(config.columns.as_deref()) {
        settings.columns = match ColumnNames::preset(name) {
            Some(c) => c,
            None => whatever!("Unknown column preset {:?}: expected en or zh", name),
        };
    }
    if let Some(cn) = &config.column_names {
        let cols = &mut settings.columns;
        if let Some(s) = non_empty("columnNames.standardQuestion", &cn.standard_question)? {
            cols.standard_question = s;
        }
        if let Some(s) = non_empty("columnNames.responseA", &cn.response_a)? {
            cols.response_a = s;
        }
        if let Some(s) = non_empty("columnNames.responseB", &cn.response_b)? {
            cols.response_b = s;
        }
        if let Some(s) = non_empty("columnNames.responseC", &cn.response_c)? {
            cols.response_c = s;
        }
        if let Some(s) = non_empty("columnNames.responseD", &cn.response_d)? {
            cols.response_d = s;
        }
    }

    match config.max_rows {
        Some(0) => whatever!("maxRows must be positive"),
        Some(x) => settings.max_rows = x,
        None => {}
    }
    match config.max_file_bytes {
        Some(0) => whatever!("maxFileBytes must be positive"),
        Some(x) => settings.max_file_bytes = x,
        None => {}
    }
    if let Some(s) = non_empty("anonymousNickname", &config.anonymous_nickname)? {
        settings.anonymous_nickname = s;
    }
    if let Some(s) = non_empty("exportFilePrefix", &config.export_file_prefix)? {
        settings.export_file_prefix = s;
    }
    if let Some(s) = non_empty("exportSheetName", &config.export_sheet_name)? {
        settings.export_sheet_name = s;
    }
    debug!("build_settings: {:?}", settings);
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_config() {
        let settings = build_settings(&SurveyConfig::default(), None).unwrap();
        assert_eq!(settings, SurveySettings::default());
    }

    #[test]
    fn reads_partial_config() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("survey.json");
        fs::write(
            &p,
            r#"{"columns": "zh", "columnNames": {"responseA": "Model 1"}, "maxRows": 20}"#,
        )
        .unwrap();
        let config = read_config(&p.display().to_string()).unwrap();
        let settings = build_settings(&config, None).unwrap();
        assert_eq!(settings.columns.standard_question, "标准问题");
        assert_eq!(settings.columns.response_a, "Model 1");
        assert_eq!(settings.columns.response_b, "回复B");
        assert_eq!(settings.max_rows, 20);
        assert_eq!(settings.max_file_bytes, SurveySettings::DEFAULT_MAX_FILE_BYTES);

        let settings = build_settings(&config, Some("en")).unwrap();
        assert_eq!(settings.columns.response_b, "ResponseB");
        assert_eq!(settings.columns.response_a, "Model 1");
    }

    #[test]
    fn rejects_bad_values() {
        let config = SurveyConfig {
            columns: Some("fr".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            build_settings(&config, None),
            Err(AppError::Whatever { .. })
        ));
        let config = SurveyConfig {
            max_rows: Some(0),
            ..Default::default()
        };
        assert!(build_settings(&config, None).is_err());
        let config = SurveyConfig {
            export_sheet_name: Some("  ".to_string()),
            ..Default::default()
        };
        assert!(build_settings(&config, None).is_err());
        assert!(matches!(
            read_config("/nonexistent/survey.json"),
            Err(AppError::OpeningJson { .. })
        ));
    }
}

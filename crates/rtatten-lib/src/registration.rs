//! Registration parameters derived from the session configuration.
//!
//! The derived [`RegistrationConfig`] is never edited in place; every change
//! to the session configuration or to the operator-entered
//! [`RegistrationFields`] rebuilds it from scratch.

use crate::coerce;
use crate::config::{ConfigValue, SessionConfig};
use crate::error::{SessionError, SessionResult};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Placeholder shown next to steps that only run on the first scan day.
pub const DAY_ONE_ONLY: &str = "(Day 1 only)";
pub const ROI_NAME: &str = "wholebrain_mask";

const SESSION: &str = "session";
const EXPERIMENT: &str = "experiment";
const DAY_ONE_STEPS: [&str; 2] = ["highres", "skullstrip"];
// Two-digit years are tried first; `%Y` would read "05/01/23" as year 5.
const DATE_FORMATS: &[&str] = &[
    "%m/%d/%y",
    "%m/%d/%Y",
    "%Y/%m/%d",
    "%Y%m%d",
    "%B %d, %Y",
    "%b %d, %Y",
];

/// Registration inputs typed by the operator rather than read from the config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistrationFields {
    pub highres_scan: String,
    pub functional_scan: String,
    pub f_param: String,
    pub makenii: bool,
    pub num_highres_dicoms: String,
    pub num_func_dicoms: String,
}

impl Default for RegistrationFields {
    fn default() -> Self {
        Self {
            highres_scan: String::new(),
            functional_scan: String::new(),
            f_param: "0.6".into(),
            makenii: true,
            num_highres_dicoms: String::new(),
            num_func_dicoms: String::new(),
        }
    }
}

impl RegistrationFields {
    pub const NAMES: [&'static str; 6] = [
        "highresScan",
        "functionalScan",
        "fParam",
        "makenii",
        "NumHighresDicoms",
        "NumFuncDicoms",
    ];

    /// Update a field by its form name.
    pub fn set(&mut self, name: &str, value: &str) -> SessionResult<()> {
        match name {
            "highresScan" => self.highres_scan = value.trim().to_string(),
            "functionalScan" => self.functional_scan = value.trim().to_string(),
            "fParam" => self.f_param = value.trim().to_string(),
            "makenii" => {
                self.makenii = coerce::parse_bool(value.trim()).ok_or_else(|| {
                    SessionError::validation(format!(
                        "makenii expects true or false, got '{value}'"
                    ))
                })?
            }
            "NumHighresDicoms" => self.num_highres_dicoms = value.trim().to_string(),
            "NumFuncDicoms" => self.num_func_dicoms = value.trim().to_string(),
            other => return Err(SessionError::UnknownKey(other.to_string())),
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<String> {
        match name {
            "highresScan" => Some(self.highres_scan.clone()),
            "functionalScan" => Some(self.functional_scan.clone()),
            "fParam" => Some(self.f_param.clone()),
            "makenii" => Some(self.makenii.to_string()),
            "NumHighresDicoms" => Some(self.num_highres_dicoms.clone()),
            "NumFuncDicoms" => Some(self.num_func_dicoms.clone()),
            _ => None,
        }
    }
}

/// Flat parameter set handed to the registration scripts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegistrationConfig {
    #[serde(rename = "subjectNum")]
    pub subject_num: Option<ConfigValue>,
    #[serde(rename = "dayNum")]
    pub day_num: Option<i64>,
    #[serde(rename = "runNum")]
    pub run_num: ConfigValue,
    #[serde(rename = "highresScan")]
    pub highres_scan: String,
    #[serde(rename = "functionalScan")]
    pub functional_scan: String,
    #[serde(rename = "fParam")]
    pub f_param: String,
    pub makenii: bool,
    #[serde(rename = "NumHighresDicoms")]
    pub num_highres_dicoms: String,
    #[serde(rename = "NumFuncDicoms")]
    pub num_func_dicoms: String,
    pub data_path: String,
    pub dryrun: String,
    pub roi_name: String,
    #[serde(rename = "subjName")]
    pub subj_name: String,
    #[serde(rename = "scanFolder")]
    pub scan_folder: String,
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        let fields = RegistrationFields::default();
        Self {
            subject_num: None,
            day_num: None,
            run_num: ConfigValue::Integer(-1),
            highres_scan: fields.highres_scan,
            functional_scan: fields.functional_scan,
            f_param: fields.f_param,
            makenii: fields.makenii,
            num_highres_dicoms: fields.num_highres_dicoms,
            num_func_dicoms: fields.num_func_dicoms,
            data_path: String::new(),
            dryrun: "false".into(),
            roi_name: ROI_NAME.into(),
            subj_name: String::new(),
            scan_folder: String::new(),
        }
    }
}

impl RegistrationConfig {
    pub fn is_day_one(&self) -> bool {
        self.day_num == Some(1)
    }
}

/// Per-step and per-upload status text; a missing entry shows nothing.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct RegistrationInfo {
    entries: BTreeMap<String, String>,
}

impl RegistrationInfo {
    pub fn get(&self, kind: &str) -> Option<&str> {
        self.entries.get(kind).map(String::as_str)
    }

    pub fn set(&mut self, kind: &str, status: impl Into<String>) {
        self.entries.insert(kind.to_string(), status.into());
    }

    pub fn remove(&mut self, kind: &str) -> Option<String> {
        self.entries.remove(kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(kind, status)| (kind.as_str(), status.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Scan date rendered the two ways the scanner uses it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanDates {
    /// `mmddyy`
    pub mdy: String,
    /// `yyyymmdd`
    pub ymd: String,
}

impl ScanDates {
    fn from_date(date: NaiveDate) -> Self {
        Self {
            mdy: date.format("%m%d%y").to_string(),
            ymd: date.format("%Y%m%d").to_string(),
        }
    }
}

/// Resolve the session `date` setting; absent, blank or `now` means today.
pub fn resolve_scan_dates(raw: Option<&ConfigValue>, today: NaiveDate) -> SessionResult<ScanDates> {
    let text = raw.map(ConfigValue::to_string).unwrap_or_default();
    let text = text.trim();
    if text.is_empty() || text.eq_ignore_ascii_case("now") {
        return Ok(ScanDates::from_date(today));
    }
    let normalized = text.replace('-', "/");
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(&normalized, format).ok())
        .map(ScanDates::from_date)
        .ok_or_else(|| SessionError::validation(format!("unable to parse session date '{text}'")))
}

fn session_value<'a>(config: &'a SessionConfig, key: &str) -> Option<&'a ConfigValue> {
    config
        .section_value(SESSION, key)
        .filter(|value| !value.is_blank())
}

fn subject_name(config: &SessionConfig, dates: &ScanDates) -> SessionResult<String> {
    if let Some(name) = session_value(config, "subjectName") {
        return Ok(name.to_string());
    }
    let session_num = session_value(config, "sessionNum")
        .ok_or_else(|| {
            SessionError::missing("either subjectName or sessionNum to build subjectName")
        })?;
    let experiment = config
        .section_value(EXPERIMENT, "experimentName")
        .filter(|value| !value.is_blank())
        .ok_or_else(|| SessionError::missing("experimentName to build subjectName"))?;
    Ok(format!("{}{}_{}", dates.mdy, session_num, experiment))
}

fn first_run(config: &SessionConfig) -> ConfigValue {
    let runs = match config.normalize_sequence("Runs") {
        Ok(runs) => runs,
        Err(_) => config
            .section_value(SESSION, "Runs")
            .and_then(ConfigValue::as_list)
            .map(<[ConfigValue]>::to_vec)
            .unwrap_or_default(),
    };
    runs.into_iter().next().unwrap_or(ConfigValue::Integer(-1))
}

/// Derive the registration parameters from the configuration and local fields.
///
/// Fails without producing anything when a required input is missing.
pub fn recompute_registration_config(
    config: &SessionConfig,
    fields: &RegistrationFields,
    today: NaiveDate,
) -> SessionResult<RegistrationConfig> {
    if config.section(SESSION).is_none() {
        return Err(SessionError::missing("a session section"));
    }
    let dates = resolve_scan_dates(config.section_value(SESSION, "date"), today)?;
    let subj_name = subject_name(config, &dates)?;
    let data_path = session_value(config, "dataDir")
        .ok_or_else(|| SessionError::missing("dataDir"))?
        .to_string();
    let dicom_folder = format!("{}.{}.{}", dates.ymd, subj_name, subj_name);
    let scan_folder = Path::new(&data_path)
        .join(dicom_folder)
        .to_string_lossy()
        .into_owned();
    let dryrun = session_value(config, "registrationDryRun")
        .map(|value| value.to_string().to_lowercase())
        .unwrap_or_else(|| "false".into());

    Ok(RegistrationConfig {
        subject_num: session_value(config, "subjectNum").cloned(),
        day_num: session_value(config, "subjectDay").and_then(ConfigValue::as_integer),
        run_num: first_run(config),
        highres_scan: fields.highres_scan.clone(),
        functional_scan: fields.functional_scan.clone(),
        f_param: fields.f_param.clone(),
        makenii: fields.makenii,
        num_highres_dicoms: fields.num_highres_dicoms.clone(),
        num_func_dicoms: fields.num_func_dicoms.clone(),
        data_path,
        dryrun,
        roi_name: ROI_NAME.into(),
        subj_name,
        scan_folder,
    })
}

/// Mark day-1-only steps when the session is past day 1, and clear the marks
/// when it moves back to day 1.
pub fn apply_day_gating(info: &mut RegistrationInfo, previous_day: Option<i64>, day: Option<i64>) {
    if day != Some(1) {
        for step in DAY_ONE_STEPS {
            info.set(step, DAY_ONE_ONLY);
        }
    } else if previous_day != Some(1) {
        for step in DAY_ONE_STEPS {
            if info.get(step) == Some(DAY_ONE_ONLY) {
                info.remove(step);
            }
        }
    }
}

/// Rebuild the registration parameters and update the day-1 markers.
///
/// On failure neither `info` nor the caller's previous config is touched.
pub fn refresh_registration(
    config: &SessionConfig,
    fields: &RegistrationFields,
    previous: &RegistrationConfig,
    info: &mut RegistrationInfo,
    today: NaiveDate,
) -> SessionResult<RegistrationConfig> {
    let next = recompute_registration_config(config, fields, today)?;
    apply_day_gating(info, previous.day_num, next.day_num);
    Ok(next)
}

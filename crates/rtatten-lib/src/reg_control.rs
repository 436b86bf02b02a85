//! Registration steps and image uploads.

use crate::error::{SessionError, SessionResult};
use crate::protocol::{OutboundMessage, RegStep, UploadKind};
use crate::session::SessionState;

/// Prepare a `runReg` command for `step`.
///
/// Clears the registration log and error, re-derives the registration
/// parameters and checks the inputs the step needs before anything is sent.
pub fn run_step(state: &mut SessionState, step: RegStep) -> SessionResult<OutboundMessage> {
    state.reg_log.clear();
    state.clear_error();
    state.refresh_registration()?;

    let reg = &state.reg_config;
    if reg.is_day_one() && reg.highres_scan.is_empty() {
        return Err(SessionError::validation("Must specify Highres Scan value"));
    }
    if reg.functional_scan.is_empty() {
        return Err(SessionError::validation("Must specify Functional Scan value"));
    }
    if step == RegStep::Skullstrip && reg.f_param.is_empty() {
        return Err(SessionError::validation("Must specify fParam value"));
    }
    Ok(OutboundMessage::RunReg {
        reg_type: step,
        config: state.config.clone(),
        reg_config: reg.clone(),
    })
}

pub fn stop_step() -> OutboundMessage {
    OutboundMessage::StopReg
}

/// Prepare an `uploadImages` request for the highres or functional series.
pub fn upload_images(state: &SessionState, kind: UploadKind) -> OutboundMessage {
    let reg = &state.reg_config;
    let (scan_num, num_dicoms) = match kind {
        UploadKind::Highres => (&reg.highres_scan, &reg.num_highres_dicoms),
        UploadKind::Functional => (&reg.functional_scan, &reg.num_func_dicoms),
    };
    OutboundMessage::UploadImages {
        kind,
        scan_folder: reg.scan_folder.clone(),
        scan_num: scan_num.clone(),
        num_dicoms: num_dicoms.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config_text;
    use chrono::NaiveDate;

    fn day_state(day: i64) -> SessionState {
        let mut state = SessionState::new();
        state.pin_date(NaiveDate::from_ymd_opt(2023, 5, 1).unwrap());
        let config = load_config_text(&format!(
            r#"
            [experiment]
            experimentName = "face"

            [session]
            dataDir = "/data"
            sessionNum = 3
            subjectDay = {day}
            Runs = [1]
            "#
        ))
        .unwrap();
        state.replace_config(config);
        state
    }

    #[test]
    fn day_one_requires_highres_scan() {
        let mut state = day_state(1);
        state.set_registration_field("functionalScan", "7").unwrap();
        let err = run_step(&mut state, RegStep::Registration).unwrap_err();
        assert_eq!(err.to_string(), "Must specify Highres Scan value");

        let mut later = day_state(2);
        later.set_registration_field("functionalScan", "7").unwrap();
        assert!(run_step(&mut later, RegStep::Registration).is_ok());
    }

    #[test]
    fn skullstrip_requires_f_param() {
        let mut state = day_state(1);
        state.set_registration_field("highresScan", "4").unwrap();
        state.set_registration_field("functionalScan", "7").unwrap();
        state.set_registration_field("fParam", "").unwrap();
        state.reg_log.push("previous output");
        let err = run_step(&mut state, RegStep::Skullstrip).unwrap_err();
        assert_eq!(err.to_string(), "Must specify fParam value");
        assert!(state.reg_log().is_empty());
        assert!(run_step(&mut state, RegStep::Makemask).is_ok());
    }

    #[test]
    fn run_step_carries_derived_config() {
        let mut state = day_state(1);
        state.set_registration_field("highresScan", "4").unwrap();
        state.set_registration_field("functionalScan", "7").unwrap();
        match run_step(&mut state, RegStep::Skullstrip).unwrap() {
            OutboundMessage::RunReg {
                reg_type,
                reg_config,
                ..
            } => {
                assert_eq!(reg_type, RegStep::Skullstrip);
                assert_eq!(reg_config.highres_scan, "4");
                assert_eq!(reg_config.subj_name, "0501233_face");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn upload_picks_branch_by_kind() {
        let mut state = day_state(1);
        state.set_registration_field("highresScan", "4").unwrap();
        state.set_registration_field("NumHighresDicoms", "176").unwrap();
        state.set_registration_field("functionalScan", "7").unwrap();
        state.set_registration_field("NumFuncDicoms", "240").unwrap();
        assert_eq!(
            upload_images(&state, UploadKind::Functional),
            OutboundMessage::UploadImages {
                kind: UploadKind::Functional,
                scan_folder: "/data/20230501.0501233_face.0501233_face".into(),
                scan_num: "7".into(),
                num_dicoms: "240".into(),
            }
        );
        match upload_images(&state, UploadKind::Highres) {
            OutboundMessage::UploadImages {
                scan_num,
                num_dicoms,
                ..
            } => {
                assert_eq!(scan_num, "4");
                assert_eq!(num_dicoms, "176");
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}

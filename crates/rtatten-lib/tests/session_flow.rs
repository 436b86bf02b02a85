use chrono::NaiveDate;
use rtatten_lib::{
    Change, ConfigValue, Console, ConnectionState, OutboundMessage, RegStep, SessionError,
    SessionResult, SessionState, Transport, TransportEvent, UploadKind,
};

#[derive(Default)]
struct RecordingTransport {
    sent: Vec<OutboundMessage>,
}

impl Transport for RecordingTransport {
    fn send(&mut self, message: &OutboundMessage) -> SessionResult<()> {
        // every outbound message must serialize
        message.encode()?;
        self.sent.push(message.clone());
        Ok(())
    }
}

const DEFAULT_CONFIG: &str = r#"{"cmd":"config","value":{
    "experiment":{"experimentName":"face","model":"rtAtten"},
    "session":{"dataDir":"/data","date":"2023-05-01","sessionNum":3,"subjectNum":101,
               "subjectDay":1,"Runs":[1],"ScanNums":[5],"useButtonBox":"false"}}}"#;

fn console() -> Console<RecordingTransport> {
    let mut state = SessionState::new();
    state.pin_date(NaiveDate::from_ymd_opt(2024, 3, 4).unwrap());
    state.begin_connect();
    Console::new(state, RecordingTransport::default())
}

fn frame(console: &mut Console<RecordingTransport>, text: &str) -> Vec<Change> {
    console.handle_event(TransportEvent::Frame(text.to_string()))
}

#[test]
fn operator_session_from_connect_to_upload() {
    let mut console = console();
    let changes = console.handle_event(TransportEvent::Opened);
    assert_eq!(changes, vec![Change::Connection(ConnectionState::Connected)]);
    assert_eq!(console.transport().sent, vec![OutboundMessage::GetDefaultConfig]);

    frame(&mut console, DEFAULT_CONFIG);
    assert_eq!(console.state().config().get("experimentName"), ConfigValue::text("face"));
    assert_eq!(
        console.state().registration_config().subj_name,
        "0501233_face"
    );
    assert!(console.state().registration_info().is_empty());

    console.set_config_input("Runs", "1,2,3").unwrap();
    console.start_run().unwrap();
    let OutboundMessage::Run { config } = console.transport().sent.last().unwrap().clone() else {
        panic!("expected a run command");
    };
    assert_eq!(
        config.get("Runs"),
        ConfigValue::List(vec![1i64.into(), 2i64.into(), 3i64.into()])
    );
    assert_eq!(config.get("useButtonBox"), ConfigValue::Bool(false));

    frame(&mut console, r#"{"cmd":"userLog","value":"run 1 started"}"#);
    frame(&mut console, r#"{"cmd":"runStatus","status":"running"}"#);
    assert_eq!(console.state().run_status(), Some("running"));
    console.stop_run().unwrap();
    assert_eq!(console.transport().sent.last(), Some(&OutboundMessage::Stop));

    console.set_registration_field("highresScan", "4").unwrap();
    console.set_registration_field("functionalScan", "7").unwrap();
    console.set_registration_field("NumFuncDicoms", "240").unwrap();
    console.run_registration(RegStep::Skullstrip).unwrap();
    match console.transport().sent.last() {
        Some(OutboundMessage::RunReg { reg_type, reg_config, .. }) => {
            assert_eq!(*reg_type, RegStep::Skullstrip);
            assert_eq!(reg_config.f_param, "0.6");
            assert_eq!(reg_config.day_num, Some(1));
        }
        other => panic!("unexpected {other:?}"),
    }

    frame(&mut console, r#"{"cmd":"regStatus","type":"skullstrip","status":["bet","running"]}"#);
    assert_eq!(console.state().registration_info().get("skullstrip"), Some("bet running"));

    console.upload_images(UploadKind::Functional).unwrap();
    let encoded = console.transport().sent.last().unwrap().encode().unwrap();
    let json: serde_json::Value = serde_json::from_str(&encoded).unwrap();
    assert_eq!(json["cmd"], "uploadImages");
    assert_eq!(json["type"], "functional");
    assert_eq!(json["scanNum"], "7");
    assert_eq!(json["numDicoms"], "240");
    assert_eq!(json["scanFolder"], "/data/20230501.0501233_face.0501233_face");
}

#[test]
fn missing_f_param_blocks_skullstrip() {
    let mut console = console();
    console.handle_event(TransportEvent::Opened);
    frame(&mut console, DEFAULT_CONFIG);
    console.set_registration_field("highresScan", "4").unwrap();
    console.set_registration_field("functionalScan", "7").unwrap();
    console.set_registration_field("fParam", "").unwrap();
    frame(&mut console, r#"{"cmd":"regLog","value":"old output"}"#);
    let sent_before = console.transport().sent.len();

    let err = console.run_registration(RegStep::Skullstrip).unwrap_err();
    assert_eq!(err, SessionError::Validation("Must specify fParam value".into()));
    assert_eq!(console.transport().sent.len(), sent_before);
    assert!(console.state().reg_log().is_empty());
    assert_eq!(console.state().error(), Some("Must specify fParam value"));
}

#[test]
fn later_day_marks_day_one_steps() {
    let mut console = console();
    console.handle_event(TransportEvent::Opened);
    frame(&mut console, DEFAULT_CONFIG);
    console
        .set_config_item("subjectDay", ConfigValue::Integer(2))
        .unwrap();
    let info = console.state().registration_info();
    assert_eq!(info.get("highres"), Some("(Day 1 only)"));
    assert_eq!(info.get("skullstrip"), Some("(Day 1 only)"));

    // day 2 does not need a highres scan
    console.set_registration_field("functionalScan", "9").unwrap();
    console.run_registration(RegStep::Registration).unwrap();
}

#[test]
fn subject_name_error_keeps_previous_registration() {
    let mut console = console();
    console.handle_event(TransportEvent::Opened);
    frame(&mut console, DEFAULT_CONFIG);
    let before = console.state().registration_config().clone();
    console
        .set_config_item("sessionNum", ConfigValue::empty())
        .unwrap();
    assert_eq!(console.state().registration_config(), &before);
    assert_eq!(
        console.state().error(),
        Some("Configurations must define either subjectName or sessionNum to build subjectName")
    );
}

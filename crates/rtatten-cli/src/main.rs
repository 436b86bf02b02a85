mod commands;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use commands::{ConsoleCommand, View, HELP};
use crossbeam_channel::{select, unbounded, Receiver};
use env_logger::Env;
use log::{debug, info};
use rtatten_lib::config::load_config_file;
use rtatten_lib::run_control;
use rtatten_lib::{
    Change, ConfigValue, Console, SessionState, Transport, TransportEvent, WebSocketTransport,
};
use serde_json::json;
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::{fs, thread};

const DEFAULT_URL: &str = "wss://localhost:8888/wsUser";

#[derive(Parser)]
#[command(author, version, about = "rtAtten operator console", long_about = None)]
struct Cli {
    /// Logging verbosity (e.g., debug, info, warn)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Connect to the experiment server and drive the session from stdin
    Connect {
        /// Websocket endpoint of the control server
        #[arg(long, env = "RTATTEN_URL", default_value = DEFAULT_URL)]
        url: String,
    },
    /// Print the normalized configuration and derived registration parameters
    Inspect {
        /// Settings file (toml)
        #[arg(long)]
        config: PathBuf,
        /// Highres scan number
        #[arg(long)]
        highres_scan: Option<String>,
        /// Functional scan number
        #[arg(long)]
        functional_scan: Option<String>,
    },
}

fn main() -> Result<()> {
    let args = Cli::parse();

    env_logger::Builder::from_env(Env::default().default_filter_or(&args.log_level)).init();

    match args.command {
        Command::Connect { url } => connect(&url),
        Command::Inspect {
            config,
            highres_scan,
            functional_scan,
        } => inspect(&config, highres_scan.as_deref(), functional_scan.as_deref()),
    }
}

fn inspect(path: &Path, highres_scan: Option<&str>, functional_scan: Option<&str>) -> Result<()> {
    let mut state = SessionState::new();
    state.replace_config(load_config_file(path)?);
    if let Some(scan) = highres_scan {
        state.set_registration_field("highresScan", scan)?;
    }
    if let Some(scan) = functional_scan {
        state.set_registration_field("functionalScan", scan)?;
    }

    run_control::start(&mut state)
        .with_context(|| format!("normalizing {}", path.display()))?;
    if let Some(err) = state.error() {
        bail!("{}: {}", path.display(), err);
    }

    let output = json!({
        "config": state.config(),
        "regConfig": state.registration_config(),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn connect(url: &str) -> Result<()> {
    info!("Connecting to {}", url);
    let (transport, events) = WebSocketTransport::connect(url)?;
    let mut state = SessionState::new();
    state.begin_connect();
    let mut console = Console::new(state, transport);

    let lines = spawn_stdin_reader()?;
    println!("{HELP}");

    loop {
        select! {
            recv(events) -> event => match event {
                Ok(event) => {
                    let closed = event == TransportEvent::Closed;
                    let changes = console.handle_event(event);
                    report(console.state(), &changes);
                    if closed {
                        println!("connection closed");
                        break;
                    }
                }
                Err(_) => break,
            },
            recv(lines) -> line => match line {
                Ok(line) if line.trim().is_empty() => {}
                Ok(line) => match line.parse::<ConsoleCommand>() {
                    Ok(ConsoleCommand::Quit) => break,
                    Ok(command) => execute(&mut console, command),
                    Err(err) => println!("{err}"),
                },
                Err(_) => {
                    info!("stdin closed, disconnecting");
                    break;
                }
            },
        }
    }
    Ok(())
}

fn spawn_stdin_reader() -> Result<Receiver<String>> {
    let (tx, rx) = unbounded();
    thread::Builder::new()
        .name("rtatten-stdin".into())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        })
        .context("spawning stdin reader")?;
    Ok(rx)
}

fn execute<T: Transport>(console: &mut Console<T>, command: ConsoleCommand) {
    debug!("console command {:?}", command);
    let result = match command {
        ConsoleCommand::Run => console.start_run().map(|_| Vec::new()),
        ConsoleCommand::Stop => console.stop_run().map(|_| Vec::new()),
        ConsoleCommand::Reg(step) => console.run_registration(step).map(|_| Vec::new()),
        ConsoleCommand::StopReg => console.stop_registration().map(|_| Vec::new()),
        ConsoleCommand::Upload(kind) => console.upload_images(kind).map(|_| Vec::new()),
        ConsoleCommand::Set { key, value } => console.set_config_input(&key, &value),
        ConsoleCommand::SetSection {
            section,
            key,
            value,
        } => {
            let current = console
                .state()
                .config()
                .section_value(&section, &key)
                .cloned()
                .unwrap_or_default();
            let value = ConfigValue::from_input(&value, &current);
            Ok(console.set_section_item(&section, &key, value))
        }
        ConsoleCommand::Field { name, value } => console.set_registration_field(&name, &value),
        ConsoleCommand::Load(path) => match load_settings(console, &path) {
            Ok(changes) => Ok(changes),
            Err(err) => {
                println!("error: {err:#}");
                return;
            }
        },
        ConsoleCommand::Ack => Ok(console.clear_run_status()),
        ConsoleCommand::Show(view) => {
            show(console.state(), view);
            return;
        }
        ConsoleCommand::Help => {
            println!("{HELP}");
            return;
        }
        ConsoleCommand::Quit => return,
    };
    match result {
        Ok(changes) => report(console.state(), &changes),
        Err(err) => println!("error: {err}"),
    }
}

fn load_settings<T: Transport>(console: &mut Console<T>, path: &Path) -> Result<Vec<Change>> {
    let text =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let changes = console.load_config_text(&name, &text)?;
    Ok(changes)
}

fn report(state: &SessionState, changes: &[Change]) {
    for line in describe(state, changes) {
        println!("{line}");
    }
}

/// Console lines for a batch of changes.
///
/// `Change::Error` always refers to the session error; settings-file
/// failures come back to the caller of `load` and are printed there.
fn describe(state: &SessionState, changes: &[Change]) -> Vec<String> {
    let mut lines = Vec::new();
    for change in changes {
        match change {
            Change::Connection(connection) => lines.push(format!("connection: {connection:?}")),
            Change::Config => {
                lines.push(format!("configuration updated ({})", state.config_name()))
            }
            Change::Registration => debug!("registration parameters refreshed"),
            Change::RunLog => {
                if let Some(line) = state.run_log().last() {
                    lines.push(format!("[run] {line}"));
                }
            }
            Change::RegLog => {
                if let Some(line) = state.reg_log().last() {
                    lines.push(format!("[reg] {line}"));
                }
            }
            Change::RunStatus => {
                lines.push(format!("run status: {}", state.run_status().unwrap_or("-")))
            }
            Change::RegInfo(kind) => lines.push(format!(
                "{kind}: {}",
                state.registration_info().get(kind).unwrap_or("-")
            )),
            Change::Error => {
                if let Some(err) = state.error() {
                    lines.push(format!("error: {err}"));
                }
            }
        }
    }
    lines
}

fn show(state: &SessionState, view: View) {
    let rendered = match view {
        View::Config => serde_json::to_string_pretty(state.config()),
        View::Registration => serde_json::to_string_pretty(state.registration_config()),
        View::Info => serde_json::to_string_pretty(state.registration_info()),
        View::Status => serde_json::to_string_pretty(&json!({
            "connection": format!("{:?}", state.connection()),
            "configName": state.config_name(),
            "filesRemote": state.files_remote(),
            "runStatus": state.run_status(),
            "error": state.error(),
            "settingsError": state.settings_error(),
        })),
        View::RunLog => Ok(state.run_log().lines().join("\n")),
        View::RegLog => Ok(state.reg_log().lines().join("\n")),
    };
    match rendered {
        Ok(text) => println!("{text}"),
        Err(err) => println!("error: {err}"),
    }
}

use anyhow::{anyhow, bail, Result};
use rtatten_lib::{RegStep, UploadKind};
use std::path::PathBuf;
use std::str::FromStr;

pub const HELP: &str = "\
commands:
  run                          start a run with the current configuration
  stop                         stop the current run
  reg <step>                   run skullstrip, registration or makemask
  stopreg                      stop the running registration step
  upload <highres|functional>  request an image upload
  set <key> <value>            set a configuration value
  set <section>.<key> <value>  set a value in a specific section
  field <name> <value>         set a registration field (e.g. fParam)
  load <path>                  load a toml settings file
  ack                          clear the run status
  show <what>                  config, reg, info, status, log or reglog
  help                         show this message
  quit                         disconnect and exit";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Config,
    Registration,
    Info,
    Status,
    RunLog,
    RegLog,
}

/// One line typed at the interactive console.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Run,
    Stop,
    Reg(RegStep),
    StopReg,
    Upload(UploadKind),
    Set { key: String, value: String },
    SetSection { section: String, key: String, value: String },
    Field { name: String, value: String },
    Load(PathBuf),
    Ack,
    Show(View),
    Help,
    Quit,
}

impl FromStr for ConsoleCommand {
    type Err = anyhow::Error;

    fn from_str(line: &str) -> Result<Self> {
        let line = line.trim();
        let (verb, rest) = match line.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (line, ""),
        };
        let command = match verb.to_ascii_lowercase().as_str() {
            "run" => ConsoleCommand::Run,
            "stop" => ConsoleCommand::Stop,
            "reg" => ConsoleCommand::Reg(required(rest, "reg <step>")?.parse()?),
            "stopreg" => ConsoleCommand::StopReg,
            "upload" => ConsoleCommand::Upload(required(rest, "upload <kind>")?.parse()?),
            "set" => {
                let (target, value) = pair(rest, "set <key> <value>")?;
                match target.split_once('.') {
                    Some((section, key)) => ConsoleCommand::SetSection {
                        section: section.to_string(),
                        key: key.to_string(),
                        value,
                    },
                    None => ConsoleCommand::Set {
                        key: target,
                        value,
                    },
                }
            }
            "field" => {
                let (name, value) = pair(rest, "field <name> <value>")?;
                ConsoleCommand::Field { name, value }
            }
            "load" => ConsoleCommand::Load(PathBuf::from(required(rest, "load <path>")?)),
            "ack" => ConsoleCommand::Ack,
            "show" => ConsoleCommand::Show(match required(rest, "show <what>")? {
                "config" => View::Config,
                "reg" => View::Registration,
                "info" => View::Info,
                "status" => View::Status,
                "log" => View::RunLog,
                "reglog" => View::RegLog,
                other => bail!("nothing called '{}' to show", other),
            }),
            "help" | "?" => ConsoleCommand::Help,
            "quit" | "exit" => ConsoleCommand::Quit,
            "" => bail!("empty command"),
            other => bail!("unknown command '{}' (try help)", other),
        };
        Ok(command)
    }
}

fn required<'a>(rest: &'a str, usage: &str) -> Result<&'a str> {
    if rest.is_empty() {
        Err(anyhow!("usage: {}", usage))
    } else {
        Ok(rest)
    }
}

/// Split `<target> <value>`; the value may contain spaces or be empty.
fn pair(rest: &str, usage: &str) -> Result<(String, String)> {
    let rest = required(rest, usage)?;
    let (target, value) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
    Ok((target.to_string(), value.trim().to_string()))
}

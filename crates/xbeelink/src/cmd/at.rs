use serde::Serialize;
use xbeelink_dispatch::{AtCommand, AtRequest, AtResponse, CommandStatus};

use crate::cmd::{optional_hex, parse_duration, AtArgs, Context};
use crate::exit::{radio_error, CliError, CliResult, FAILURE, SUCCESS, TIMEOUT};
use crate::output::{hex, print_json, print_raw, print_table, OutputFormat};

/// One AT response, local or remote.
#[derive(Serialize)]
pub(crate) struct CommandOutput {
    pub frame_id: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub command: String,
    pub status: &'static str,
    pub ok: bool,
    pub data: String,
    #[serde(skip)]
    pub raw: Vec<u8>,
}

impl CommandOutput {
    pub fn new(
        frame_id: u8,
        source: Option<String>,
        command: AtCommand,
        status: CommandStatus,
        data: &[u8],
    ) -> Self {
        Self {
            frame_id,
            source,
            command: command.to_string(),
            status: status.name(),
            ok: status.is_ok(),
            data: hex(data),
            raw: data.to_vec(),
        }
    }

    pub fn exit_code(&self) -> i32 {
        if self.ok {
            SUCCESS
        } else {
            FAILURE
        }
    }
}

impl From<&AtResponse> for CommandOutput {
    fn from(response: &AtResponse) -> Self {
        Self::new(
            response.frame_id,
            None,
            response.command,
            response.status,
            &response.data,
        )
    }
}

pub fn run(args: AtArgs, ctx: Context) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let parameter = optional_hex(args.param.as_deref())?;
    let radio = ctx.open_radio(&args.port)?;

    let request = AtRequest::set(args.command, parameter);
    let frame = radio
        .send_sync_timeout(&request, timeout)
        .map_err(|err| radio_error("send failed", err))?
        .ok_or_else(|| {
            CliError::new(
                TIMEOUT,
                format!("no response to {} within {timeout:?}", args.command),
            )
        })?;
    let response =
        AtResponse::decode(&frame).map_err(|err| radio_error("bad response", err.into()))?;

    let out = CommandOutput::from(&response);
    print_command(&out, ctx.format);
    Ok(out.exit_code())
}

pub(crate) fn print_command(out: &CommandOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(out),
        OutputFormat::Table => {
            let mut header = vec!["COMMAND", "STATUS", "DATA"];
            let mut row = vec![out.command.clone(), out.status.to_string(), out.data.clone()];
            if let Some(source) = &out.source {
                header.insert(0, "SOURCE");
                row.insert(0, source.clone());
            }
            print_table(&header, vec![row]);
        }
        OutputFormat::Pretty => {
            let prefix = out
                .source
                .as_ref()
                .map(|source| format!("{source} "))
                .unwrap_or_default();
            if out.data.is_empty() {
                println!("{prefix}{} {}", out.command, out.status);
            } else {
                println!("{prefix}{} {} {}", out.command, out.status, out.data);
            }
        }
        OutputFormat::Raw => print_raw(&out.raw),
    }
}

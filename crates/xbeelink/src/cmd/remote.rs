use xbeelink_dispatch::{Destination, RemoteAtRequest, RemoteAtResponse};

use crate::cmd::at::{print_command, CommandOutput};
use crate::cmd::{optional_hex, parse_duration, Context, RemoteArgs};
use crate::exit::{radio_error, CliError, CliResult, TIMEOUT};

impl From<&RemoteAtResponse> for CommandOutput {
    fn from(response: &RemoteAtResponse) -> Self {
        Self::new(
            response.frame_id,
            Some(response.source64.to_string()),
            response.command,
            response.status,
            &response.data,
        )
    }
}

pub fn run(args: RemoteArgs, ctx: Context) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let parameter = optional_hex(args.param.as_deref())?;
    let mut destination = Destination::new(args.dest);
    if let Some(short) = args.dest16 {
        destination = destination.with_short(short);
    }
    let radio = ctx.open_radio(&args.port)?;

    let request = RemoteAtRequest::set(destination, args.command, parameter);
    let frame = radio
        .send_sync_timeout(&request, timeout)
        .map_err(|err| radio_error("send failed", err))?
        .ok_or_else(|| {
            CliError::new(
                TIMEOUT,
                format!(
                    "no response from {destination} to {} within {timeout:?}",
                    args.command
                ),
            )
        })?;
    let response = RemoteAtResponse::decode(&frame)
        .map_err(|err| radio_error("bad response", err.into()))?;

    let out = CommandOutput::from(&response);
    print_command(&out, ctx.format);
    Ok(out.exit_code())
}

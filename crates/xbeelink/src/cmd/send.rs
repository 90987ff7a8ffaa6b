use serde::Serialize;
use xbeelink_dispatch::{Destination, TransmitRequest, TransmitStatus};

use crate::cmd::{parse_duration, parse_hex, Context, SendArgs};
use crate::exit::{radio_error, CliError, CliResult, FAILURE, SUCCESS, TIMEOUT};
use crate::output::{print_json, print_table, OutputFormat};

#[derive(Serialize)]
struct TransmitOutput {
    frame_id: u8,
    destination: String,
    delivered: bool,
    delivery: String,
    discovery: String,
    retries: u8,
}

impl TransmitOutput {
    fn new(destination: Destination, status: &TransmitStatus) -> Self {
        Self {
            frame_id: status.frame_id,
            destination: destination.to_string(),
            delivered: status.delivery.is_success(),
            delivery: format!("{:?}", status.delivery),
            discovery: format!("{:?}", status.discovery),
            retries: status.retries,
        }
    }
}

pub fn run(args: SendArgs, ctx: Context) -> CliResult<i32> {
    let payload = resolve_payload(&args)?;
    let mut destination = Destination::new(args.dest);
    if let Some(short) = args.dest16 {
        destination = destination.with_short(short);
    }
    let timeout = if args.wait {
        Some(parse_duration(&args.timeout)?)
    } else {
        None
    };
    let radio = ctx.open_radio(&args.port)?;
    let request = TransmitRequest::new(destination, payload);

    let Some(timeout) = timeout else {
        radio
            .send(&request)
            .map_err(|err| radio_error("send failed", err))?;
        return Ok(SUCCESS);
    };

    let frame = radio
        .send_sync_timeout(&request, timeout)
        .map_err(|err| radio_error("send failed", err))?
        .ok_or_else(|| {
            CliError::new(
                TIMEOUT,
                format!("no transmit status from {destination} within {timeout:?}"),
            )
        })?;
    let status = TransmitStatus::decode(&frame)
        .map_err(|err| radio_error("bad transmit status", err.into()))?;

    let out = TransmitOutput::new(destination, &status);
    print_transmit(&out, ctx.format);
    Ok(if out.delivered { SUCCESS } else { FAILURE })
}

fn resolve_payload(args: &SendArgs) -> CliResult<Vec<u8>> {
    if let Some(data) = &args.data {
        return Ok(data.as_bytes().to_vec());
    }
    if let Some(hex) = &args.hex {
        return parse_hex(hex);
    }
    Ok(Vec::new())
}

fn print_transmit(out: &TransmitOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(out),
        OutputFormat::Table => print_table(
            &["DESTINATION", "DELIVERY", "DISCOVERY", "RETRIES"],
            vec![vec![
                out.destination.clone(),
                out.delivery.clone(),
                out.discovery.clone(),
                out.retries.to_string(),
            ]],
        ),
        OutputFormat::Pretty | OutputFormat::Raw => {
            println!(
                "{} {} (retries={})",
                out.destination, out.delivery, out.retries
            );
        }
    }
}

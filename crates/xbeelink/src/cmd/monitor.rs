use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::cmd::{Context, MonitorArgs};
use crate::exit::{radio_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::print_event;

const POLL_INTERVAL: Duration = Duration::from_millis(200);

pub fn run(args: MonitorArgs, ctx: Context) -> CliResult<i32> {
    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let radio = ctx.open_radio(&args.port)?;
    let (tx, rx) = mpsc::channel();
    let subscription = radio.subscribe(move |event| {
        let _ = tx.send(event.clone());
    });
    info!(port = %args.port.port.display(), "monitoring radio events");

    let mut printed = 0usize;
    while running.load(Ordering::SeqCst) {
        match rx.recv_timeout(POLL_INTERVAL) {
            Ok(event) => {
                print_event(&event, ctx.format);
                printed = printed.saturating_add(1);
                if args.count.is_some_and(|count| printed >= count) {
                    break;
                }
            }
            Err(RecvTimeoutError::Timeout) => radio
                .ensure_receiving()
                .map_err(|err| radio_error("monitor stopped", err))?,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    radio.unsubscribe(subscription);
    Ok(SUCCESS)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}

use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, warn};
use xbeelink_dispatch::{response_command, AtCommand, DiscoveredNode};

use crate::cmd::{parse_duration, Context, DiscoverArgs};
use crate::exit::{radio_error, CliResult, SUCCESS};
use crate::output::{print_json, print_table, OutputFormat};

#[derive(Serialize)]
struct NodeOutput {
    address64: String,
    address16: String,
    identifier: String,
}

impl From<&DiscoveredNode> for NodeOutput {
    fn from(node: &DiscoveredNode) -> Self {
        Self {
            address64: node.address64.to_string(),
            address16: node.address16.to_string(),
            identifier: node.identifier.clone(),
        }
    }
}

#[derive(Serialize)]
struct DiscoverOutput {
    count: usize,
    nodes: Vec<NodeOutput>,
}

pub fn run(args: DiscoverArgs, ctx: Context) -> CliResult<i32> {
    let duration = parse_duration(&args.duration)?;
    let radio = ctx.open_radio(&args.port)?;

    let (tx, rx) = mpsc::channel();
    let id = radio
        .send_at(AtCommand::NODE_DISCOVER, &[], move |frame| {
            if let Some((_, body)) = response_command(frame) {
                let _ = tx.send(body.to_vec());
            }
        })
        .map_err(|err| radio_error("send failed", err))?;

    let nodes = collect_nodes(&rx, Instant::now() + duration);
    radio.release(id);

    let out = DiscoverOutput {
        count: nodes.len(),
        nodes: nodes.iter().map(NodeOutput::from).collect(),
    };
    print_discovery(&out, ctx.format);
    Ok(SUCCESS)
}

/// Gather node reports until the deadline or the module's empty
/// end-of-discovery response.
fn collect_nodes(rx: &Receiver<Vec<u8>>, deadline: Instant) -> Vec<DiscoveredNode> {
    let mut nodes = Vec::new();
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining == Duration::ZERO {
            break;
        }
        match rx.recv_timeout(remaining) {
            Ok(body) if body.is_empty() => {
                debug!("discovery finished early");
                break;
            }
            Ok(body) => match DiscoveredNode::parse(&body) {
                Some(node) => nodes.push(node),
                None => warn!(len = body.len(), "unparseable discovery response"),
            },
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => break,
        }
    }
    nodes
}

fn print_discovery(out: &DiscoverOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(out),
        OutputFormat::Table => print_table(
            &["ADDRESS64", "ADDRESS16", "IDENTIFIER"],
            out.nodes
                .iter()
                .map(|node| {
                    vec![
                        node.address64.clone(),
                        node.address16.clone(),
                        node.identifier.clone(),
                    ]
                })
                .collect(),
        ),
        OutputFormat::Pretty | OutputFormat::Raw => {
            for node in &out.nodes {
                println!("{} {} {}", node.address64, node.address16, node.identifier);
            }
            if format == OutputFormat::Pretty {
                println!("{} node(s) found", out.count);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node_body(short: [u8; 2], name: &str) -> Vec<u8> {
        let mut body = short.to_vec();
        body.extend_from_slice(&[0x00, 0x13, 0xA2, 0x00, 0x40, 0x86, 0xDA, 0x07]);
        body.extend_from_slice(name.as_bytes());
        body.push(0);
        body
    }

    #[test]
    fn stops_at_end_of_discovery() {
        let (tx, rx) = mpsc::channel();
        tx.send(node_body([0x12, 0x34], "kitchen")).unwrap();
        tx.send(vec![0x01]).unwrap();
        tx.send(Vec::new()).unwrap();
        tx.send(node_body([0x56, 0x78], "late")).unwrap();

        let nodes = collect_nodes(&rx, Instant::now() + Duration::from_secs(5));

        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].identifier, "kitchen");
    }

    #[test]
    fn stops_at_deadline() {
        let (tx, rx) = mpsc::channel::<Vec<u8>>();
        let started = Instant::now();

        let nodes = collect_nodes(&rx, started + Duration::from_millis(50));

        assert!(nodes.is_empty());
        assert!(started.elapsed() >= Duration::from_millis(50));
        drop(tx);
    }
}

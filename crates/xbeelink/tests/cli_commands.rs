#![cfg(all(unix, feature = "cli"))]

use std::path::PathBuf;
use std::process::{Command, Output};

fn xbeelink(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_xbeelink"))
        .args(["--log-level", "error"])
        .args(args)
        .env_remove("XBEELINK_PORT")
        .env_remove("XBEELINK_BAUD")
        .output()
        .expect("xbeelink should run")
}

fn missing_device() -> PathBuf {
    PathBuf::from(format!(
        "/tmp/xbeelink-missing-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ))
}

#[test]
fn version_prints_package_version() {
    let output = xbeelink(&["version"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.trim(), format!("xbeelink {}", env!("CARGO_PKG_VERSION")));
}

#[test]
fn version_extended_lists_features() {
    let output = xbeelink(&["version", "--extended"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("name: xbeelink"));
    assert!(stdout.contains("transport: serial-tty"));
    assert!(stdout.contains("cli=true"));
}

#[test]
fn missing_port_returns_transport_error() {
    let device = missing_device();
    let output = xbeelink(&["at", "--port", device.to_str().unwrap(), "MY"]);

    assert_eq!(output.status.code(), Some(3));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("failed to open"), "stderr: {stderr}");
}

#[test]
fn unsupported_baud_returns_usage() {
    let device = missing_device();
    let output = xbeelink(&[
        "--baud",
        "12345",
        "at",
        "--port",
        device.to_str().unwrap(),
        "MY",
    ]);

    assert_eq!(output.status.code(), Some(64));
}

#[test]
fn invalid_hex_parameter_returns_usage() {
    let device = missing_device();
    let output = xbeelink(&[
        "at",
        "--port",
        device.to_str().unwrap(),
        "NI",
        "--param",
        "xyz",
    ]);

    assert_eq!(output.status.code(), Some(64));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("invalid hex"), "stderr: {stderr}");
}

#[test]
fn port_falls_back_to_environment() {
    let device = missing_device();
    let output = Command::new(env!("CARGO_BIN_EXE_xbeelink"))
        .args(["--log-level", "error", "discover", "--duration", "1s"])
        .env("XBEELINK_PORT", &device)
        .output()
        .expect("xbeelink should run");

    assert_eq!(output.status.code(), Some(3));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains(device.to_str().unwrap()), "stderr: {stderr}");
}

#[cfg(target_os = "linux")]
mod pty {
    use std::fs::File;
    use std::os::fd::FromRawFd;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    use xbeelink::frame::{FrameReader, FrameWriter};

    use super::*;

    /// A pty pair; the slave path stands in for the radio's serial device.
    fn open_pty() -> (File, PathBuf) {
        // SAFETY: plain libc calls on a descriptor we own; ptsname_r writes
        // a NUL-terminated path into `name`.
        unsafe {
            let master = libc::posix_openpt(libc::O_RDWR | libc::O_NOCTTY);
            assert!(master >= 0, "posix_openpt failed");
            assert_eq!(libc::grantpt(master), 0);
            assert_eq!(libc::unlockpt(master), 0);
            let mut name = [0 as libc::c_char; 128];
            assert_eq!(libc::ptsname_r(master, name.as_mut_ptr(), name.len()), 0);
            let path = std::ffi::CStr::from_ptr(name.as_ptr())
                .to_string_lossy()
                .into_owned();
            (File::from_raw_fd(master), PathBuf::from(path))
        }
    }

    #[test]
    fn at_command_round_trip_over_pty() {
        let (master, path) = open_pty();
        let (done_tx, done_rx) = mpsc::channel();

        // Play the module: answer the first request with MY = 0x1234.
        thread::spawn(move || {
            let mut reader = FrameReader::new(master.try_clone().unwrap());
            let mut writer = FrameWriter::new(master);
            let result = reader.read_frame().map(|request| {
                let id = request.frame_id().unwrap_or(0);
                writer.send(0x88, id, b"MY\x00\x12\x34").unwrap();
                request.data().to_vec()
            });
            let _ = done_tx.send(result.map_err(|err| err.to_string()));
        });

        let output = xbeelink(&[
            "--format",
            "json",
            "at",
            "--port",
            path.to_str().unwrap(),
            "MY",
            "--timeout",
            "3s",
        ]);

        let request = done_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("module thread should finish")
            .expect("module should read a request");
        assert_eq!(request[0], 0x08);
        assert_eq!(&request[2..], b"MY");

        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(
            output.status.success(),
            "stderr: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        assert!(stdout.contains("\"command\":\"MY\""), "stdout: {stdout}");
        assert!(stdout.contains("\"data\":\"1234\""), "stdout: {stdout}");
    }
}

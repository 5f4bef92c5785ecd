use clap::Parser;
use serde_json::{json, Value};
use std::io::{self, BufRead, Write};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use uart_device_agent::config::{ConfigLoader, LogFormat};
use uart_device_agent::driver::{DeviceAttributes, DeviceDriver, ValueKind};
use uart_device_agent::error::DriverError;
use uart_device_agent::port::PortError;

/// UART device service: generic, monitor and transceiver access to
/// serial-attached devices, driven by JSON commands on stdin.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Explicit configuration file (overrides standard resolution)
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,

    /// Override the configured log level
    #[arg(short, long)]
    log_level: Option<String>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let loader = match &args.config {
        Some(path) => ConfigLoader::load_from(path)?,
        None => ConfigLoader::load()?,
    };
    let config = loader.into_config();

    let level = args
        .log_level
        .clone()
        .unwrap_or_else(|| config.logging.level.clone());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_writer(io::stderr);
    match config.logging.format {
        LogFormat::Pretty => builder.pretty().init(),
        LogFormat::Compact => builder.compact().init(),
        LogFormat::Json => builder.json().init(),
    }

    info!(
        default_baud = config.serial.default_baud,
        "uart device agent starting"
    );

    let driver = DeviceDriver::new(&config);
    run_command_loop(&driver);

    driver.shutdown();
    Ok(())
}

/// Process one JSON command per stdin line until EOF or an explicit exit.
fn run_command_loop(driver: &DeviceDriver) {
    let stdin = io::stdin();
    let stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<Value>(&line) {
            Ok(request) => {
                if request["command"].as_str() == Some("exit") {
                    break;
                }
                dispatch(driver, &request)
            }
            Err(err) => error_response("InvalidPayload", &format!("malformed JSON: {err}")),
        };

        let mut out = stdout.lock();
        // Responses are the host protocol; keep them one line each.
        let _ = writeln!(out, "{response}");
        let _ = out.flush();
    }
}

fn dispatch(driver: &DeviceDriver, request: &Value) -> Value {
    let command = request["command"].as_str().unwrap_or("");
    match command {
        "read" => match parse_attributes(driver, request).and_then(|attrs| {
            let kind = match request["value_type"].as_str() {
                Some(raw) => ValueKind::parse(raw)?,
                None => ValueKind::Text,
            };
            driver.handle_read(&attrs, kind)
        }) {
            Ok(value) => json!({ "status": "ok", "value": value.into_json() }),
            Err(err) if matches!(err, DriverError::DeviceBusy(_)) => {
                // Deliberate drop policy: an overlapping read yields an
                // empty, non-fatal result.
                json!({ "status": "ok", "value": "", "notice": err.to_string() })
            }
            Err(err) => driver_error_response(&err),
        },
        "write" => match parse_attributes(driver, request).and_then(|attrs| {
            let payload = request["value"].as_str().ok_or_else(|| {
                DriverError::InvalidPayload("write requires a hex 'value'".into())
            })?;
            driver.handle_write(&attrs, payload)
        }) {
            Ok(()) => json!({ "status": "ok" }),
            Err(err) => driver_error_response(&err),
        },
        "reconfigure" => match parse_attributes(driver, request).and_then(|attrs| driver.reconfigure(&attrs)) {
            Ok(()) => json!({ "status": "ok" }),
            Err(err) => driver_error_response(&err),
        },
        "device_added" | "device_updated" | "device_removed" => match request["device"].as_str() {
            Some(device) => {
                match command {
                    "device_added" => driver.device_added(device),
                    "device_updated" => driver.device_updated(device),
                    _ => driver.device_removed(device),
                }
                json!({ "status": "ok" })
            }
            None => error_response("InvalidPayload", "lifecycle events require 'device'"),
        },
        "help" => json!({
            "status": "ok",
            "commands": ["read", "write", "reconfigure", "device_added", "device_updated", "device_removed", "help", "exit"],
            "note": "read/write take an 'attributes' object with type/dev/baud/timeout/maxbytes; values travel hex-encoded",
        }),
        other => error_response("InvalidPayload", &format!("unknown command '{other}'")),
    }
}

fn parse_attributes(driver: &DeviceDriver, request: &Value) -> Result<DeviceAttributes, DriverError> {
    DeviceAttributes::from_value(&request["attributes"], driver.defaults())
}

fn driver_error_response(err: &DriverError) -> Value {
    error!(%err, "command failed");
    error_response(error_type(err), &err.to_string())
}

fn error_response(error_type: &str, message: &str) -> Value {
    json!({
        "status": "error",
        "error": { "type": error_type, "message": message }
    })
}

fn error_type(err: &DriverError) -> &'static str {
    match err {
        DriverError::Port(PortError::Unavailable(_)) => "PortUnavailable",
        DriverError::Port(PortError::EndOfStream) => "EndOfStream",
        DriverError::Port(PortError::Read(_)) => "ReadFailure",
        DriverError::Port(PortError::Write(_)) => "WriteFailure",
        DriverError::Port(PortError::Serial(_)) => "SerialError",
        DriverError::DeviceBusy(_) => "DeviceBusy",
        DriverError::NoResponse => "NoResponse",
        DriverError::Unsupported(_) => "Unsupported",
        DriverError::InvalidAttribute { .. } => "InvalidAttribute",
        DriverError::InvalidPayload(_) => "InvalidPayload",
    }
}

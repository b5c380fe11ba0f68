use anyhow::{Context, Result};
use cpal::Device;
use cpal::traits::{DeviceTrait, HostTrait};

fn get_host() -> cpal::Host {
    cpal::default_host()
}

pub fn get_or_default_input(device_name: Option<String>) -> Result<Device> {
    let host = get_host();
    tracing::debug!("Host: {:?}", host.id());

    let Some(target) = device_name else {
        return host
            .default_input_device()
            .context("No default input device available");
    };

    let mut input_devices = host.input_devices().context("Failed to list input devices")?;
    input_devices
        .find(|device| device.name().is_ok_and(|name| name == target))
        .with_context(|| format!("No input device named '{target}'"))
}

pub fn get_or_default_output(device_name: Option<String>) -> Result<Device> {
    let host = get_host();

    let Some(target) = device_name else {
        return host
            .default_output_device()
            .context("No default output device available");
    };

    let mut output_devices = host
        .output_devices()
        .context("Failed to list output devices")?;
    output_devices
        .find(|device| device.name().is_ok_and(|name| name == target))
        .with_context(|| format!("No output device named '{target}'"))
}

pub fn list_inputs() -> Result<String> {
    let host = get_host();
    let default_name = host
        .default_input_device()
        .and_then(|d| d.name().ok())
        .unwrap_or_default();

    let mut lines: Vec<String> = Vec::new();
    for device in host.input_devices().context("Failed to list input devices")? {
        let name = device.name().unwrap_or_else(|_| "<unnamed>".to_string());
        let mut line = match device.default_input_config() {
            Ok(cfg) => format!(" * {}({}ch, {}hz)", name, cfg.channels(), cfg.sample_rate().0),
            Err(_) => format!(" * {name}"),
        };
        if name == default_name {
            line.push_str(" [default]");
        }
        lines.push(line);
    }
    Ok(lines.join("\n"))
}

pub fn list_outputs() -> Result<String> {
    let host = get_host();
    let default_name = host
        .default_output_device()
        .and_then(|d| d.name().ok())
        .unwrap_or_default();

    let mut lines: Vec<String> = Vec::new();
    for device in host
        .output_devices()
        .context("Failed to list output devices")?
    {
        let name = device.name().unwrap_or_else(|_| "<unnamed>".to_string());
        let mut line = match device.default_output_config() {
            Ok(cfg) => format!(" * {}({}ch, {}hz)", name, cfg.channels(), cfg.sample_rate().0),
            Err(_) => format!(" * {name}"),
        };
        if name == default_name {
            line.push_str(" [default]");
        }
        lines.push(line);
    }
    Ok(lines.join("\n"))
}

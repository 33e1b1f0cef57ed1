use serde::Serialize;

use ratgdo_config::Config;

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

#[derive(Debug, Serialize)]
struct DeviceRow<'a> {
    name: &'a str,
    label: &'a str,
    address: String,
    watchdog_secs: u64,
    retry_secs: u64,
}

/// List configured devices with their effective timing. No network access.
pub fn handle(config: &Config, global: &GlobalOpts) -> Result<(), CliError> {
    let rows: Vec<DeviceRow<'_>> = config
        .devices
        .iter()
        .map(|(name, device)| {
            let stream = config.stream_config(device);
            DeviceRow {
                name,
                label: device.label(name),
                address: device.address().to_string(),
                watchdog_secs: stream.watchdog_window.as_secs(),
                retry_secs: stream.retry_delay.as_secs(),
            }
        })
        .collect();

    let out = output::render_list(global.output, &rows, |r| {
        format!(
            "{}\t{}\t{}\twatchdog={}s retry={}s",
            r.name, r.label, r.address, r.watchdog_secs, r.retry_secs
        )
    })?;
    output::print_output(&out, global.quiet);

    Ok(())
}

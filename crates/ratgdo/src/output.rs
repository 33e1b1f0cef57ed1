//! Output formatting: human-readable text or JSON.
//!
//! Every command builds a serde-serializable view and renders it in the
//! format selected by `--output`.

use std::io::{self, Write};

use serde::Serialize;

use ratgdo_core::{CharacteristicUpdate, DeviceState, Identity};

use crate::cli::OutputFormat;
use crate::error::CliError;

// ── Render dispatchers ───────────────────────────────────────────────

/// Render one item: `text_fn` for text, pretty JSON otherwise.
pub fn render_single<T: Serialize>(
    format: OutputFormat,
    data: &T,
    text_fn: impl Fn(&T) -> String,
) -> Result<String, CliError> {
    match format {
        OutputFormat::Text => Ok(text_fn(data)),
        OutputFormat::Json => render_json_pretty(data),
    }
}

/// Render a list: one `text_fn` line per item, or a pretty JSON array.
pub fn render_list<T: Serialize>(
    format: OutputFormat,
    data: &[T],
    text_fn: impl Fn(&T) -> String,
) -> Result<String, CliError> {
    match format {
        OutputFormat::Text => Ok(data.iter().map(text_fn).collect::<Vec<_>>().join("\n")),
        OutputFormat::Json => render_json_pretty(data),
    }
}

/// Render one streamed record: a text line, or compact JSON (one object
/// per line).
pub fn render_line<T: Serialize>(
    format: OutputFormat,
    data: &T,
    text_fn: impl Fn(&T) -> String,
) -> Result<String, CliError> {
    match format {
        OutputFormat::Text => Ok(text_fn(data)),
        OutputFormat::Json => Ok(serde_json::to_string(data)?),
    }
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
    let _ = stdout.flush();
}

fn render_json_pretty<T: Serialize + ?Sized>(data: &T) -> Result<String, CliError> {
    Ok(serde_json::to_string_pretty(data)?)
}

// ── Domain text renderers ────────────────────────────────────────────

pub fn identity_text(device: &str, address: &str, identity: &Identity) -> String {
    format!("{device}\t{address}\t{}\t{}", identity.model, identity.serial)
}

/// Multi-line `key: value` view of a snapshot. Unknown values print as `-`.
pub fn state_text(device: &str, state: &DeviceState) -> String {
    let current = or_dash(state.current_door_state());
    let target = or_dash(state.target_door_state().ok());

    let mut lines = vec![
        device.to_owned(),
        format!("  door:        {current}"),
        format!("  target:      {target}"),
        format!("  position:    {}", or_dash(state.position.map(|p| format!("{p}%")))),
        format!("  obstruction: {}", or_dash(state.obstruction_detected)),
        format!("  lock:        {}", state.lock),
    ];
    if let Some(firmware) = &state.firmware_revision {
        lines.push(format!("  firmware:    {firmware}"));
    }
    lines.join("\n")
}

pub fn update_text(device: &str, update: &CharacteristicUpdate) -> String {
    let change = match update {
        CharacteristicUpdate::CurrentDoorState(s) => format!("door={s}"),
        CharacteristicUpdate::TargetDoorState(s) => format!("target={s}"),
        CharacteristicUpdate::ObstructionDetected(o) => format!("obstruction={o}"),
        CharacteristicUpdate::LockState(l) => format!("lock={l}"),
        CharacteristicUpdate::FirmwareRevision(f) => {
            format!("firmware={}", or_dash(f.as_deref()))
        }
    };
    format!("{device}\t{change}")
}

fn or_dash<T: ToString>(value: Option<T>) -> String {
    value.map_or_else(|| "-".to_owned(), |v| v.to_string())
}

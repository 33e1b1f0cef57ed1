//! Command handlers and shared device selection.

pub mod devices;
pub mod discover;
pub mod door;
pub mod status;
pub mod watch;

use ratgdo_config::Config;
use ratgdo_core::{DeviceAddress, DeviceState, LiveStateClient, StreamConfig, TargetDoorState};
use tracing::{Span, info_span};

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// One device a command talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// Config key, or the `--host` value.
    pub name: String,
    pub address: DeviceAddress,
    pub stream: StreamConfig,
}

impl Target {
    /// Parent span for every client opened against this target.
    pub fn span(&self) -> Span {
        info_span!("ratgdo", name = %self.name)
    }
}

/// How many devices a command accepts when none is named.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    One,
    All,
}

/// Pick targets: `--host` first, then `--device`, then the config file.
///
/// With nothing named, `Selection::All` takes every configured device and
/// `Selection::One` requires exactly one.
pub fn resolve_targets(
    global: &GlobalOpts,
    config: &Config,
    selection: Selection,
) -> Result<Vec<Target>, CliError> {
    if let Some(host) = &global.host {
        let address: DeviceAddress = host.parse()?;
        return Ok(vec![Target {
            name: host.clone(),
            address,
            stream: config.defaults.stream_config(),
        }]);
    }

    if let Some(name) = &global.device {
        let device = config
            .device(name)
            .map_err(|_| CliError::DeviceNotFound {
                name: name.clone(),
                available: available(config),
            })?;
        return Ok(vec![Target {
            name: name.clone(),
            address: device.address(),
            stream: config.stream_config(device),
        }]);
    }

    let targets: Vec<Target> = config
        .devices
        .iter()
        .map(|(name, device)| Target {
            name: name.clone(),
            address: device.address(),
            stream: config.stream_config(device),
        })
        .collect();

    match (targets.len(), selection) {
        (0, _) => Err(CliError::NoDevice {
            path: global
                .config
                .clone()
                .unwrap_or_else(ratgdo_config::config_path)
                .display()
                .to_string(),
        }),
        (1, _) | (_, Selection::All) => Ok(targets),
        (_, Selection::One) => Err(CliError::AmbiguousDevice {
            available: available(config),
        }),
    }
}

fn available(config: &Config) -> String {
    if config.devices.is_empty() {
        return "(none)".into();
    }
    config.devices.keys().cloned().collect::<Vec<_>>().join(", ")
}

/// Wait for a snapshot satisfying `done`. `None` if the client stops first.
pub async fn wait_for_state(
    client: &LiveStateClient,
    done: impl Fn(&DeviceState) -> bool,
) -> Option<DeviceState> {
    let mut states = client.subscribe();
    if done(states.current()) {
        return Some(states.current().clone());
    }
    while let Some(state) = states.changed().await {
        if done(&state) {
            return Some(state);
        }
    }
    None
}

/// Route a parsed command to its handler.
pub async fn dispatch(cmd: Command, config: &Config, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Devices => devices::handle(config, global),
        Command::Discover(args) => {
            let targets = resolve_targets(global, config, Selection::All)?;
            discover::handle(&args, targets, global).await
        }
        Command::Status(args) => {
            let targets = resolve_targets(global, config, Selection::All)?;
            status::handle(&args, targets, global).await
        }
        Command::Watch => {
            let targets = resolve_targets(global, config, Selection::All)?;
            watch::handle(targets, global).await
        }
        Command::Open(args) => {
            let target = single(resolve_targets(global, config, Selection::One)?)?;
            door::handle(TargetDoorState::Open, &args, target, global).await
        }
        Command::Close(args) => {
            let target = single(resolve_targets(global, config, Selection::One)?)?;
            door::handle(TargetDoorState::Closed, &args, target, global).await
        }
    }
}

fn single(mut targets: Vec<Target>) -> Result<Target, CliError> {
    targets.pop().ok_or_else(|| CliError::Validation {
        field: "device".into(),
        reason: "no device selected".into(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use clap::Parser;
    use pretty_assertions::assert_eq;
    use ratgdo_config::Device;

    use super::*;
    use crate::cli::Cli;

    fn global(args: &[&str]) -> GlobalOpts {
        let mut argv = vec!["ratgdo"];
        argv.extend_from_slice(args);
        argv.push("devices");
        Cli::try_parse_from(argv).unwrap().global
    }

    fn device(host: &str, watchdog_secs: Option<u64>) -> Device {
        Device {
            host: host.into(),
            port: 80,
            display_name: None,
            watchdog_secs,
            retry_secs: None,
        }
    }

    fn two_devices() -> Config {
        let mut config = Config::default();
        config.devices.insert("garage".into(), device("10.0.0.5", None));
        config.devices.insert("barn".into(), device("10.0.0.6", Some(45)));
        config
    }

    #[test]
    fn host_flag_bypasses_config() {
        let targets =
            resolve_targets(&global(&["--host", "10.0.0.9:8080"]), &two_devices(), Selection::One)
                .unwrap();

        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].name, "10.0.0.9:8080");
        assert_eq!(targets[0].address, DeviceAddress::new("10.0.0.9", 8080));
        assert_eq!(targets[0].stream, StreamConfig::default());
    }

    #[test]
    fn bad_host_is_a_usage_error() {
        let err = resolve_targets(&global(&["--host", "10.0.0.9:abc"]), &two_devices(), Selection::One)
            .unwrap_err();
        assert!(matches!(err, CliError::Validation { .. }), "got {err:?}");
    }

    #[test]
    fn device_flag_uses_its_overrides() {
        let targets =
            resolve_targets(&global(&["-d", "barn"]), &two_devices(), Selection::One).unwrap();

        assert_eq!(targets[0].address, DeviceAddress::new("10.0.0.6", 80));
        assert_eq!(targets[0].stream.watchdog_window, Duration::from_secs(45));
    }

    #[test]
    fn unknown_device_lists_available() {
        let err = resolve_targets(&global(&["-d", "shed"]), &two_devices(), Selection::All)
            .unwrap_err();
        match err {
            CliError::DeviceNotFound { name, available } => {
                assert_eq!(name, "shed");
                assert_eq!(available, "barn, garage");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn unnamed_selection_depends_on_command() {
        let config = two_devices();

        let all = resolve_targets(&global(&[]), &config, Selection::All).unwrap();
        let names: Vec<_> = all.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["barn", "garage"]);

        assert!(matches!(
            resolve_targets(&global(&[]), &config, Selection::One),
            Err(CliError::AmbiguousDevice { .. })
        ));
    }

    #[test]
    fn single_configured_device_is_implied() {
        let mut config = Config::default();
        config.devices.insert("garage".into(), device("10.0.0.5", None));

        let targets = resolve_targets(&global(&[]), &config, Selection::One).unwrap();
        assert_eq!(targets[0].name, "garage");
    }

    #[test]
    fn empty_config_names_its_path() {
        let err = resolve_targets(
            &global(&["--config", "/tmp/ratgdo-test/config.toml"]),
            &Config::default(),
            Selection::All,
        )
        .unwrap_err();

        assert!(
            matches!(err, CliError::NoDevice { ref path } if path == "/tmp/ratgdo-test/config.toml"),
            "got {err:?}"
        );
    }
}

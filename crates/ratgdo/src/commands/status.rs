use std::time::Duration;

use futures_util::future::join_all;
use serde::Serialize;

use ratgdo_core::{CurrentDoorState, DeviceState, LiveStateClient, TargetDoorState};

use crate::cli::{GlobalOpts, StatusArgs};
use crate::commands::{Target, wait_for_state};
use crate::error::CliError;
use crate::output;

#[derive(Debug, Serialize)]
struct Status {
    device: String,
    address: String,
    current_door_state: Option<CurrentDoorState>,
    target_door_state: Option<TargetDoorState>,
    #[serde(flatten)]
    state: DeviceState,
}

impl Status {
    fn new(target: Target, state: DeviceState) -> Self {
        Self {
            device: target.name,
            address: target.address.to_string(),
            current_door_state: state.current_door_state(),
            target_door_state: state.target_door_state().ok(),
            state,
        }
    }
}

pub async fn handle(
    args: &StatusArgs,
    targets: Vec<Target>,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let limit = Duration::from_secs(args.timeout);
    let reads = targets.into_iter().map(|target| async move {
        let state = read_state(&target, limit).await?;
        Ok::<_, CliError>(Status::new(target, state))
    });

    let mut statuses = Vec::new();
    let mut first_error = None;
    for result in join_all(reads).await {
        match result {
            Ok(status) => statuses.push(status),
            Err(e) => {
                first_error.get_or_insert(e);
            }
        }
    }

    let out = output::render_list(global.output, &statuses, |s| {
        output::state_text(&s.device, &s.state)
    })?;
    output::print_output(&out, global.quiet);

    first_error.map_or(Ok(()), Err)
}

/// Stream until the first report of where the door is, then close.
async fn read_state(target: &Target, limit: Duration) -> Result<DeviceState, CliError> {
    let client = LiveStateClient::spawn(target.address.clone(), target.stream.clone(), &target.span())?;

    let result = tokio::time::timeout(limit, wait_for_state(&client, |s| s.door.is_known())).await;

    // Whatever arrived alongside the door report is part of the answer.
    let snapshot = client.snapshot();
    client.close();
    client.terminated().await;

    match result {
        Ok(Some(_)) => Ok(snapshot),
        Ok(None) => Err(CliError::Stream {
            reason: format!("client for {} stopped unexpectedly", target.address),
        }),
        Err(_) => Err(CliError::Timeout {
            what: format!("door state from {}", target.address),
            seconds: limit.as_secs(),
        }),
    }
}

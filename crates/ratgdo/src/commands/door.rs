use std::time::Duration;

use serde::Serialize;
use tracing::{Instrument, info};

use ratgdo_core::{
    CommandClient, CoreError, CurrentDoorState, LiveStateClient, TargetDoorState,
};

use crate::cli::{DoorArgs, GlobalOpts};
use crate::commands::{Target, wait_for_state};
use crate::error::CliError;
use crate::output;

#[derive(Debug, Serialize)]
struct DoorResult {
    device: String,
    requested: TargetDoorState,
    /// Only set with `--wait`.
    reached: Option<CurrentDoorState>,
}

/// Send open/close; with `--wait`, watch the stream until the door rests
/// in the requested position.
pub async fn handle(
    target_state: TargetDoorState,
    args: &DoorArgs,
    target: Target,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let span = target.span();

    let reached = match args.wait {
        None => {
            send(&command_client(&target)?, target_state)
                .instrument(span)
                .await?;
            None
        }
        Some(seconds) => {
            // Subscribe before sending so the movement is not missed.
            let client = LiveStateClient::spawn(
                target.address.clone(),
                target.stream.clone(),
                &span,
            )?;
            let outcome = send_and_wait(&client, target_state, seconds)
                .instrument(span)
                .await;
            client.close();
            client.terminated().await;
            Some(outcome?)
        }
    };

    let result = DoorResult {
        device: target.name,
        requested: target_state,
        reached,
    };
    let out = output::render_single(global.output, &result, |r| match r.reached {
        Some(state) => format!("{}\t{state}", r.device),
        None => format!("{}\t{} requested", r.device, r.requested),
    })?;
    output::print_output(&out, global.quiet);

    Ok(())
}

fn command_client(target: &Target) -> Result<CommandClient, CliError> {
    let http = target
        .stream
        .transport()
        .build_command_client()
        .map_err(CoreError::from)?;
    Ok(CommandClient::new(http, target.address.base_url()?))
}

async fn send(commands: &CommandClient, target_state: TargetDoorState) -> Result<(), CliError> {
    let command = target_state.command();
    info!(%command, "sending door command");
    commands.send(command).await.map_err(CoreError::from)?;
    Ok(())
}

async fn send_and_wait(
    client: &LiveStateClient,
    target_state: TargetDoorState,
    seconds: u64,
) -> Result<CurrentDoorState, CliError> {
    let resting = match target_state {
        TargetDoorState::Open => CurrentDoorState::Open,
        TargetDoorState::Closed => CurrentDoorState::Closed,
    };

    send(client.commands(), target_state).await?;

    let arrived = tokio::time::timeout(
        Duration::from_secs(seconds),
        wait_for_state(client, |s| s.current_door_state() == Some(resting)),
    )
    .await;

    match arrived {
        Ok(Some(_)) => Ok(resting),
        Ok(None) => Err(CliError::Stream {
            reason: format!("client for {} stopped unexpectedly", client.address()),
        }),
        Err(_) => Err(CliError::Timeout {
            what: format!("the door to be {resting}"),
            seconds,
        }),
    }
}

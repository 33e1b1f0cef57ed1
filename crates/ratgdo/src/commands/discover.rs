use std::time::Duration;

use futures_util::future::join_all;
use serde::Serialize;
use tracing::Instrument;

use ratgdo_core::{DiscoveryProbe, Identity};

use crate::cli::{DiscoverArgs, GlobalOpts};
use crate::commands::Target;
use crate::error::CliError;
use crate::output;

#[derive(Debug, Serialize)]
struct Discovered {
    device: String,
    address: String,
    #[serde(flatten)]
    identity: Identity,
}

/// Probe every target at once; report what answered, fail with the first
/// error.
pub async fn handle(
    args: &DiscoverArgs,
    targets: Vec<Target>,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let seconds = args.timeout;
    let probes = targets.into_iter().map(|target| async move {
        let span = target.span();
        let probe = DiscoveryProbe::discover(target.address.clone(), target.stream.clone());

        match tokio::time::timeout(Duration::from_secs(seconds), probe.instrument(span)).await {
            Ok(Ok(identity)) => Ok(Discovered {
                device: target.name,
                address: target.address.to_string(),
                identity,
            }),
            Ok(Err(e)) => Err(CliError::from(e)),
            Err(_) => Err(CliError::Timeout {
                what: format!("a heartbeat from {}", target.address),
                seconds,
            }),
        }
    });

    let mut found = Vec::new();
    let mut first_error = None;
    for result in join_all(probes).await {
        match result {
            Ok(discovered) => found.push(discovered),
            Err(e) => {
                first_error.get_or_insert(e);
            }
        }
    }

    let out = output::render_list(global.output, &found, |d| {
        output::identity_text(&d.device, &d.address, &d.identity)
    })?;
    output::print_output(&out, global.quiet);

    first_error.map_or(Ok(()), Err)
}

use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use ratgdo_core::{CharacteristicUpdate, LiveStateClient};

use crate::cli::{GlobalOpts, OutputFormat};
use crate::commands::Target;
use crate::error::CliError;
use crate::output;

#[derive(Debug, Serialize)]
struct Change<'a> {
    device: &'a str,
    #[serde(flatten)]
    update: &'a CharacteristicUpdate,
}

/// Print every characteristic change from every target until Ctrl-C.
pub async fn handle(targets: Vec<Target>, global: &GlobalOpts) -> Result<(), CliError> {
    let mut clients = Vec::with_capacity(targets.len());
    let mut printers = Vec::with_capacity(targets.len());

    for target in targets {
        let client =
            LiveStateClient::spawn(target.address.clone(), target.stream.clone(), &target.span())?;
        printers.push(print_changes(target.name, &client, global.output, global.quiet));
        clients.push(client);
    }

    tokio::signal::ctrl_c().await?;
    info!("interrupted; closing {} client(s)", clients.len());

    for client in &clients {
        client.close();
    }
    for client in &clients {
        client.terminated().await;
    }
    for printer in printers {
        printer.abort();
    }

    Ok(())
}

fn print_changes(
    device: String,
    client: &LiveStateClient,
    format: OutputFormat,
    quiet: bool,
) -> JoinHandle<()> {
    let mut changes = client.changes();
    tokio::spawn(async move {
        loop {
            match changes.recv().await {
                Ok(update) => {
                    let change = Change {
                        device: &device,
                        update: &update,
                    };
                    match output::render_line(format, &change, |c| {
                        output::update_text(c.device, c.update)
                    }) {
                        Ok(line) => output::print_output(&line, quiet),
                        Err(e) => warn!(error = %e, "cannot render change"),
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(device = %device, skipped, "output fell behind; changes dropped");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

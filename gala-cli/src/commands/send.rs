//! Send command - deliver one message and wait for the server's echo.

use console::style;

use gala_core::config::ConfigHandle;
use gala_core::error::{GalaError, GalaResult};
use gala_socket::ClientEvent;

use crate::OutputFormat;

pub async fn run(
    config: ConfigHandle,
    token: Option<String>,
    receiver: String,
    text: String,
    image: bool,
    format: OutputFormat,
) -> GalaResult<()> {
    if text.trim().is_empty() {
        return Err(GalaError::InvalidRequest("message text is empty".into()));
    }

    let client = super::connect(&config, token).await?;
    let mut events = client.subscribe();

    let queued = if image {
        client.send_image(&receiver, &text)
    } else {
        client.send_text(&receiver, &text)
    };
    if !queued {
        client.shutdown().await;
        return Err(GalaError::MissingConfig("identity.sender_id".into()));
    }

    let event = super::wait_for_event(&mut events, |e| {
        matches!(e, ClientEvent::MessageReceived { counterpart, .. } if *counterpart == receiver)
    })
    .await;
    client.shutdown().await;

    let ClientEvent::MessageReceived { message, .. } = event? else {
        return Err(GalaError::Protocol("unexpected event".into()));
    };

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&message).unwrap_or_default());
        }
        OutputFormat::Text => {
            println!(
                "  {} Sent to {} ({})",
                style("OK").green().bold(),
                receiver,
                message.id
            );
        }
    }

    Ok(())
}

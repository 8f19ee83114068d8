//! Messages command - load a conversation's history.

use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, ContentArrangement, Table};
use console::style;

use gala_core::config::ConfigHandle;
use gala_core::error::{GalaError, GalaResult};
use gala_socket::ClientEvent;

use crate::OutputFormat;

pub async fn run(
    config: ConfigHandle,
    token: Option<String>,
    counterpart: String,
    earlier: u32,
    format: OutputFormat,
) -> GalaResult<()> {
    let client = super::connect(&config, token).await?;
    let own_id = client
        .identity()
        .map(|i| i.sender_id)
        .ok_or_else(|| GalaError::MissingConfig("identity.sender_id".into()))?;
    let mut events = client.subscribe();
    let is_reply = |e: &ClientEvent| {
        matches!(e, ClientEvent::MessagesUpdated { counterpart: c, .. } if *c == counterpart)
    };

    client.request_messages(&counterpart);
    super::wait_for_event(&mut events, is_reply).await?;

    for _ in 0..earlier {
        if !client.request_earlier_messages(&counterpart) {
            break;
        }
        super::wait_for_event(&mut events, is_reply).await?;
    }

    let history = client.messages(&counterpart).unwrap_or_default();
    client.shutdown().await;

    match format {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "counterpart": counterpart,
                "messages": history.documents,
                "currentPage": history.current_page,
                "hasMore": history.has_more,
            });
            println!("{}", serde_json::to_string_pretty(&json).unwrap_or_default());
        }
        OutputFormat::Text => {
            if history.is_empty() {
                println!("No messages with {counterpart}.");
                return Ok(());
            }

            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .apply_modifier(UTF8_ROUND_CORNERS)
                .set_content_arrangement(ContentArrangement::Dynamic);
            table.set_header(vec!["Date", "From", "Message"]);

            // Stored newest-first; print in reading order.
            for message in history.documents.iter().rev() {
                let from = if message.is_from(&own_id) {
                    style("me").green().to_string()
                } else {
                    message.sender_id.clone()
                };
                let body = if message.is_image {
                    format!("[image] {}", message.content)
                } else {
                    super::truncate(&message.content, 80)
                };
                table.add_row(vec![
                    message.timestamp.format("%Y-%m-%d %H:%M").to_string(),
                    from,
                    body,
                ]);
            }
            println!("{table}");

            if history.has_more {
                println!(
                    "{}",
                    style("Earlier messages available, use --earlier N").dim()
                );
            }
        }
    }

    Ok(())
}

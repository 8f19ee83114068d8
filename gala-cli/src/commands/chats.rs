//! Chats command - page through the chat list.

use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, ContentArrangement, Table};
use console::style;

use gala_core::config::ConfigHandle;
use gala_core::error::GalaResult;
use gala_socket::ClientEvent;

use crate::OutputFormat;

pub async fn run(
    config: ConfigHandle,
    token: Option<String>,
    all: bool,
    format: OutputFormat,
) -> GalaResult<()> {
    let client = super::connect(&config, token).await?;
    let mut events = client.subscribe();

    client.request_chat_list();
    super::wait_for_event(&mut events, |e| matches!(e, ClientEvent::ChatListUpdated { .. })).await?;

    while all && client.request_more_chat_list() {
        super::wait_for_event(&mut events, |e| matches!(e, ClientEvent::ChatListUpdated { .. })).await?;
    }

    let list = client.chat_list();
    client.shutdown().await;

    match format {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "chats": list.documents,
                "currentPage": list.current_page,
                "totalPages": list.total_pages,
                "hasMore": list.has_more,
            });
            println!("{}", serde_json::to_string_pretty(&json).unwrap_or_default());
        }
        OutputFormat::Text => {
            if list.is_empty() {
                println!("No chats found.");
                return Ok(());
            }

            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .apply_modifier(UTF8_ROUND_CORNERS)
                .set_content_arrangement(ContentArrangement::Dynamic);
            table.set_header(vec!["Counterpart", "Id", "Last Message", "Date"]);

            for chat in &list.documents {
                let date = chat
                    .timestamp
                    .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_default();
                table.add_row(vec![
                    super::truncate(chat.title(), 30),
                    chat.counterpart.id.clone(),
                    super::truncate(chat.preview(), 50),
                    date,
                ]);
            }
            println!("{table}");

            let footer = format!(
                "{} chat(s), page {} of {}",
                list.len(),
                list.current_page,
                list.total_pages
            );
            if list.has_more {
                println!("{} (more available, use --all)", style(footer).dim());
            } else {
                println!("{}", style(footer).dim());
            }
        }
    }

    Ok(())
}

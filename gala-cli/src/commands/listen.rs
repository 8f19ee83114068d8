//! Listen command - stream client events until interrupted.

use console::style;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info};

use gala_core::config::ConfigHandle;
use gala_core::error::GalaResult;
use gala_socket::{ClientEvent, ConnectionState};

use crate::OutputFormat;

fn print_event(event: &ClientEvent, format: OutputFormat) {
    if let OutputFormat::Json = format {
        let json = match event {
            ClientEvent::StateChanged(state) => {
                serde_json::json!({"event": "state", "state": state.to_string()})
            }
            ClientEvent::TimedOut => serde_json::json!({"event": "timed_out"}),
            ClientEvent::Registered => serde_json::json!({"event": "registered"}),
            ClientEvent::Switched => serde_json::json!({"event": "switched"}),
            ClientEvent::ChatListUpdated { has_more } => {
                serde_json::json!({"event": "chat_list", "hasMore": has_more})
            }
            ClientEvent::MessagesUpdated { counterpart, has_more } => {
                serde_json::json!({"event": "messages", "counterpart": counterpart, "hasMore": has_more})
            }
            ClientEvent::MessageReceived { counterpart, message } => {
                serde_json::json!({"event": "message", "counterpart": counterpart, "message": message})
            }
        };
        println!("{json}");
        return;
    }

    match event {
        ClientEvent::StateChanged(state) => {
            let label = match state {
                ConnectionState::Open => style(state.to_string()).green(),
                ConnectionState::TimedOut => style(state.to_string()).red(),
                _ => style(state.to_string()).yellow(),
            };
            println!("  {} {label}", style("[state]").cyan());
        }
        ClientEvent::TimedOut => {
            println!(
                "  {} Reconnect attempts exhausted",
                style("[timed_out]").red().bold()
            );
        }
        ClientEvent::Registered => println!("  {} Identity registered", style("[register]").cyan()),
        ClientEvent::Switched => println!("  {} Identity switched", style("[switch]").cyan()),
        ClientEvent::ChatListUpdated { has_more } => {
            println!("  {} has_more={has_more}", style("[chat_list]").cyan());
        }
        ClientEvent::MessagesUpdated { counterpart, has_more } => {
            println!("  {} {counterpart} has_more={has_more}", style("[messages]").cyan());
        }
        ClientEvent::MessageReceived { counterpart, message } => {
            let body = if message.is_image {
                format!("[image] {}", message.content)
            } else {
                message.content.clone()
            };
            println!(
                "  {} {} <{}> {}",
                style("[message]").cyan(),
                message.timestamp.format("%H:%M:%S"),
                counterpart,
                body
            );
        }
    }
}

pub async fn run(
    config: ConfigHandle,
    token: Option<String>,
    reconnect: bool,
    format: OutputFormat,
) -> GalaResult<()> {
    let client = super::connect(&config, token).await?;
    let mut events = client.subscribe();

    if let OutputFormat::Text = format {
        println!(
            "  {} Connected. Listening for events... (Ctrl+C to stop)",
            style("OK").green().bold()
        );
        println!();
    }

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    print_event(&event, format);
                    if event == ClientEvent::TimedOut {
                        if reconnect {
                            info!("retries exhausted, reconnecting");
                            client.reconnect();
                        } else {
                            error!("retries exhausted, giving up");
                            break;
                        }
                    }
                }
                Err(RecvError::Lagged(n)) => {
                    println!("  {} Missed {n} events (slow consumer)", style("WARN").yellow());
                }
                Err(RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => {
                println!("\n  Disconnecting...");
                break;
            }
        }
    }

    client.shutdown().await;
    Ok(())
}

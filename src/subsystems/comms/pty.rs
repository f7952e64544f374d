//! Console comms channel: reads lines from stdin, hands them to the gateway
//! and prints the reply to stdout.
//!
//! The console is a single local user (`local`, chat `0`).  Runs until the
//! `shutdown` token is cancelled (Ctrl-C) or stdin is closed.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::attachment_file_name;
use super::state::CommsState;
use crate::error::AppError;
use crate::message::Response;
use crate::subsystems::runtime::{Component, ComponentFuture};

const LOCAL_USER: &str = "local";
const LOCAL_CHAT: i64 = 0;

pub struct PtyChannel {
    channel_id: String,
    state: Arc<CommsState>,
}

impl PtyChannel {
    pub fn new(channel_id: impl Into<String>, state: Arc<CommsState>) -> Self {
        Self { channel_id: channel_id.into(), state }
    }
}

impl Component for PtyChannel {
    fn id(&self) -> &str {
        &self.channel_id
    }

    fn run(self: Box<Self>, shutdown: CancellationToken) -> ComponentFuture {
        Box::pin(run_pty(self.channel_id, self.state, shutdown))
    }
}

/// Console rendering of a reply.  Attachments print a one-line banner and
/// then their content.
fn render(response: &Response) -> String {
    match &response.payload {
        Some(bytes) => {
            let name = attachment_file_name(chrono::Utc::now().timestamp_millis());
            format!(
                "[attachment {name}, {} bytes]\n{}",
                bytes.len(),
                String::from_utf8_lossy(bytes)
            )
        }
        None => response.text.clone(),
    }
}

async fn run_pty(
    channel_id: String,
    state: Arc<CommsState>,
    shutdown: CancellationToken,
) -> Result<(), AppError> {
    info!(%channel_id, "pty channel started, type a message and press Enter. Ctrl-C to quit.");
    println!("─────────────────────────────────");
    println!(" chatgate console  (Ctrl-C to quit)");
    println!("─────────────────────────────────");

    let stdin = tokio::io::stdin();
    let mut lines = BufReader::new(stdin).lines();

    loop {
        print!("> ");
        use std::io::Write as _;
        let _ = std::io::stdout().flush();

        tokio::select! {
            biased;

            _ = shutdown.cancelled() => {
                println!("\n[pty] shutdown signal received, closing console channel");
                info!("pty channel shutting down");
                break;
            }

            line = lines.next_line() => {
                match line {
                    Err(e) => {
                        warn!("pty read error: {e}");
                        break;
                    }
                    Ok(None) => {
                        info!("pty stdin closed");
                        break;
                    }
                    Ok(Some(input)) => {
                        let input = input.trim().to_string();
                        if input.is_empty() { continue; }

                        debug!(input = %input, "pty received line");
                        let reply = state.send_message(&channel_id, LOCAL_USER, LOCAL_CHAT, input).await;
                        println!("{}", render(&reply));
                    }
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_reply_renders_verbatim() {
        assert_eq!(render(&Response::text(0, "hi there")), "hi there");
    }

    #[test]
    fn attachment_renders_banner_then_content() {
        let out = render(&Response::attachment(0, b"timestamp,role,message\n".to_vec()));
        let (banner, body) = out.split_once('\n').unwrap();
        assert!(banner.starts_with("[attachment "));
        assert!(banner.ends_with(".csv, 23 bytes]"));
        assert_eq!(body, "timestamp,role,message\n");
    }
}

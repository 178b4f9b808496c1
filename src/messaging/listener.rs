// JSON-lines request loop: one response line per request.
use super::handler::PageController;
use super::protocol::{Inbound, PageEvent, Response, parse_inbound};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{Mutex, watch};
use tracing::{info, warn};

/// Reads messages until EOF. Navigation is handed to the watcher through `location`.
pub async fn listen_for_messages<R, W>(
    reader: R,
    mut writer: W,
    controller: Arc<Mutex<PageController>>,
    location: watch::Sender<String>,
) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let response = match parse_inbound(line) {
            Ok(Inbound::Request(request)) => Some(controller.lock().await.handle(request).await),
            Ok(Inbound::Event(PageEvent::Navigate { url })) => {
                info!("Host navigated to {}", url);
                location.send_replace(url);
                None
            }
            Ok(Inbound::Event(event)) => controller.lock().await.handle_event(event).await,
            Err(e) => {
                warn!("Rejected message: {}", e);
                Some(Response::error(&e))
            }
        };

        if let Some(response) = response {
            write_response(&mut writer, &response).await?;
        }
    }
    info!("🛑 Input closed, listener ended.");
    Ok(())
}

async fn write_response<W: AsyncWrite + Unpin>(writer: &mut W, response: &Response) -> std::io::Result<()> {
    let mut line = serde_json::to_vec(response).map_err(std::io::Error::other)?;
    line.push(b'\n');
    writer.write_all(&line).await?;
    writer.flush().await
}

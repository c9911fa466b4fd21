// =============================================================================
// Live Candle Feed -- kline-style WebSocket ingest
// =============================================================================
//
// Connects to a kline-style WebSocket stream and forwards each *closed*
// candle into the engine's candle channel. In-progress updates are dropped;
// the confirmation pipeline only ever reasons about closed candles.
//
// Runs until the stream disconnects or errors, then returns so the caller can
// handle reconnection with backoff:
//
//   loop {
//       if let Err(e) = run_candle_feed(&url, tx.clone()).await {
//           error!("feed error: {e}");
//       }
//       tokio::time::sleep(Duration::from_secs(5)).await;
//   }
// =============================================================================

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::types::Candle;

/// Parse one kline-style JSON message into a closed candle.
///
/// Expected shape (combined-stream envelope or direct payload):
/// ```json
/// { "k": { "t": 1700000000000, "o": "1.0850", "h": "1.0862",
///          "l": "1.0841", "c": "1.0855", "x": true } }
/// ```
///
/// Returns `Ok(None)` for a well-formed but still-open candle.
pub fn parse_candle_message(text: &str) -> Result<Option<Candle>> {
    let root: serde_json::Value =
        serde_json::from_str(text).context("failed to parse candle JSON")?;

    // Support both combined-stream envelope and direct payload.
    let data = if root.get("data").is_some() {
        &root["data"]
    } else {
        &root
    };
    let k = &data["k"];

    let is_closed = k["x"].as_bool().context("missing field k.x")?;
    if !is_closed {
        return Ok(None);
    }

    let open_time = k["t"].as_i64().context("missing field k.t")?;
    let open = parse_string_f64(&k["o"], "k.o")?;
    let high = parse_string_f64(&k["h"], "k.h")?;
    let low = parse_string_f64(&k["l"], "k.l")?;
    let close = parse_string_f64(&k["c"], "k.c")?;

    let timestamp: DateTime<Utc> = DateTime::from_timestamp_millis(open_time)
        .context("candle open time out of range")?;

    Ok(Some(Candle {
        open,
        high,
        low,
        close,
        timestamp,
        // The candle log assigns the authoritative index on append.
        index: 0,
    }))
}

/// Helper: kline feeds send numeric values as JSON strings.
fn parse_string_f64(val: &serde_json::Value, name: &str) -> Result<f64> {
    match val {
        serde_json::Value::String(s) => s
            .parse::<f64>()
            .with_context(|| format!("failed to parse {name} as f64: {s}")),
        serde_json::Value::Number(n) => n
            .as_f64()
            .with_context(|| format!("field {name} is not a valid f64")),
        _ => anyhow::bail!("field {name} has unexpected JSON type"),
    }
}

/// Connect to `url` and forward closed candles into `tx` until the stream
/// ends or the receiver is dropped.
pub async fn run_candle_feed(url: &str, tx: mpsc::Sender<Candle>) -> Result<()> {
    info!(url = %url, "connecting to candle feed");

    let (ws_stream, _response) = tokio_tungstenite::connect_async(url)
        .await
        .context("failed to connect to candle feed")?;

    info!("candle feed connected");
    let (_write, mut read) = ws_stream.split();

    loop {
        match read.next().await {
            Some(Ok(msg)) => {
                if let tokio_tungstenite::tungstenite::Message::Text(text) = msg {
                    match parse_candle_message(&text) {
                        Ok(Some(candle)) => {
                            debug!(close = candle.close, "closed candle received");
                            if tx.send(candle).await.is_err() {
                                info!("candle receiver dropped -- stopping feed");
                                return Ok(());
                            }
                        }
                        Ok(None) => {
                            // In-progress update; only closed candles matter.
                        }
                        Err(e) => {
                            warn!(error = %e, "failed to parse candle message");
                        }
                    }
                }
                // Ping/Pong/Binary/Close frames are handled by tungstenite.
            }
            Some(Err(e)) => {
                error!(error = %e, "candle feed read error");
                return Err(e.into());
            }
            None => {
                warn!("candle feed stream ended");
                return Ok(());
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

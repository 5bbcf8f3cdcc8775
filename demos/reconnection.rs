use std::time::Duration;

use resilient_ws::{ClientOptions, ReadyState, SocketEvent, WebSocketClient};

/// Watch the client reconnect with backoff while the server goes up and down
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Initialize tracing to see backoff logs
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    println!("🦀 Testing reconnection\n");

    let url = std::env::var("WS_URL").unwrap_or_else(|_| "ws://127.0.0.1:8080".to_string());
    println!("📡 Connecting to: {}\n", url);

    let client = WebSocketClient::new(
        &url,
        ClientOptions::builder()
            .automatic_open(false)
            .reconnect_interval(Duration::from_millis(500))
            .max_reconnect_interval(Duration::from_secs(10))
            .max_reconnect_attempts(20)
            .build()?,
    )?;

    client.on("connecting", |event: &SocketEvent| match event {
        SocketEvent::Connecting(Some(info)) => {
            println!("⚠️  Connection lost (code {}), reconnecting...", info.code)
        }
        _ => println!("⏳ Connecting..."),
    });
    client.on("open", |event: &SocketEvent| {
        if let SocketEvent::Open {
            reconnect_attempt, ..
        } = event
        {
            println!("✅ Open (reconnect: {})", reconnect_attempt);
        }
    });

    client.open()?;

    // Stop the server now and then to watch the backoff grow
    println!("Restart the server at {} to see the client recover. Ctrl-C to quit.\n", url);
    let mut status = client.state_receiver();
    loop {
        tokio::select! {
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = status.borrow_and_update().clone();
                if snapshot.gave_up {
                    println!("❌ Gave up after {} attempts", snapshot.reconnect_attempts);
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    if client.ready_state() != ReadyState::Closed {
        client.disconnect()?;
    }
    println!("🎉 Done");
    Ok(())
}

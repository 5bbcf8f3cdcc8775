use std::time::Duration;

use resilient_ws::{ClientOptions, SocketEvent, WebSocketClient};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    // Initialize tracing to see heartbeat logs
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    println!("🦀 Testing heartbeat\n");

    let url = std::env::var("WS_URL").unwrap_or_else(|_| "ws://127.0.0.1:8080".to_string());
    println!("📡 Connecting to: {}\n", url);

    let client = WebSocketClient::new(
        &url,
        ClientOptions::builder()
            .ping_interval(Duration::from_secs(2))
            .ping_data("keepalive")
            .build()?,
    )?;

    // An echo server answers every probe
    client.on("message", |event: &SocketEvent| {
        if let SocketEvent::Message(payload) = event {
            println!("💓 {:?}", payload.as_text());
        }
    });

    client.wait_for_state(resilient_ws::ReadyState::Open).await?;
    println!("✅ Connected, watching heartbeats for 10 seconds...\n");
    tokio::time::sleep(Duration::from_secs(10)).await;

    client.disconnect()?;
    println!("🎉 Heartbeat demo finished");
    Ok(())
}

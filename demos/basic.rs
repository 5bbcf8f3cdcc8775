use resilient_ws::{ClientOptions, SocketEvent, WebSocketClient};
use serde_json::json;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let url = std::env::var("WS_URL").unwrap_or_else(|_| "ws://127.0.0.1:8080".to_string());

    // Create client without connecting so listeners see every event
    let client = WebSocketClient::new(
        &url,
        ClientOptions::builder().automatic_open(false).build()?,
    )?;

    client.on("open", |_: &SocketEvent| println!("Connected!"));
    client.on("message", |event: &SocketEvent| {
        if let SocketEvent::Message(payload) = event {
            println!("<- {:?}", payload);
        }
    });
    client.on("greeting", |event: &SocketEvent| {
        println!("Structured greeting: {:?}", event.payload());
    });

    // Sent once the connection opens
    client.send("greeting", &json!({ "text": "hello from resilient-ws" }))?;

    println!("Connecting to {}...", client.url());
    client.open()?;

    // Keep connection alive
    tokio::signal::ctrl_c().await?;

    println!("Disconnecting...");
    client.disconnect()?;
    client.wait_for_state(resilient_ws::ReadyState::Closed).await?;
    println!("Disconnected!");

    Ok(())
}

use std::time::Duration;

use ddp_client::{DdpClient, DdpError};

#[async_std::main]
async fn main() -> Result<(), DdpError> {
    env_logger::init();

    let client = DdpClient::connect("wss://example.meteor.com/websocket").await?;

    client
        .on("connected", |_event| {
            log::info!("session established");
        })
        .await?;

    let sub_id = client
        .subscribe("todos", vec![], Duration::from_secs(10))
        .await?;
    log::info!("subscribed: {}", sub_id);

    if let Some(todo) = client.get("todos", "abc123").await? {
        log::info!("cached todo: {:?}", todo);
    }

    client.unsubscribe(sub_id).await?;
    client.close().await?;
    Ok(())
}

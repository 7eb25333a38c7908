use std::time::Duration;

use ddp_client::{DdpClient, DdpError, Event};

#[tokio::main]
async fn main() -> Result<(), DdpError> {
    env_logger::init();

    let client = DdpClient::connect("wss://example.meteor.com/websocket").await?;

    client
        .on("collection:todos:added", |event| {
            if let Event::Added { id, fields, .. } = event {
                log::info!("todo added: {} {:?}", id, fields);
            }
        })
        .await?;

    let sub_id = client
        .subscribe("todos", vec![], Duration::from_secs(10))
        .await?;
    log::info!("subscribed: {}", sub_id);

    let result = client
        .call("todos.insert", vec![serde_json::json!({"text": "write the client"})], Duration::from_secs(10))
        .await?;
    log::info!("method result: {}", result);

    client.unsubscribe(sub_id).await?;
    client.close().await?;
    Ok(())
}

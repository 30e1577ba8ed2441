use std::sync::Arc;

use voice_bridge::engine::remote::RemoteGraph;
use voice_bridge::prelude::*;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), BridgeError> {
    voice_bridge::init_observability();
    let adapter = GraphAdapter::builder(Arc::new(RemoteGraph::from_env()?))
        .config(BridgeConfig::from_env()?)
        .session_sid("demo-room")
        .build()?;

    let mut stream = adapter.chat(vec![ChatMessage::user("Hi there")]);
    while let Some(item) = stream.next_item().await {
        match item {
            Ok(StreamItem::Chunk(chunk)) => print!("{}", chunk.content()),
            Ok(StreamItem::Flush) => println!(),
            Ok(StreamItem::Placeholder { request_id }) => eprintln!("[request {request_id}]"),
            Err(failure) => eprintln!("run failed: {failure}"),
        }
    }
    println!();

    let outcome = stream.finish().await?;
    eprintln!("[{outcome:?}]");
    Ok(())
}

//! End-to-end tests over an in-process peer
//!
//! The peer side reads the frames written by the transport and pushes frames back,
//! the same way a front-end would over the named pipes.

use anyhow::Result;
use cellwire::transport::codec::{read_frame, write_frame, DEFAULT_MAX_FRAME_LEN};
use cellwire::{
    Comms, DisplayPayload, DuplexConnector, DuplexPeer, IncomingMessage, OutgoingMessage,
    SubscriptionControl, ValuePush, WireValue,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{BufReader, DuplexStream};
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};

/// Front-end side of the connection
struct Peer {
    reader: BufReader<DuplexStream>,
    writer: DuplexStream,
}

impl Peer {
    fn new(peer: DuplexPeer) -> Self {
        Self {
            reader: BufReader::new(peer.from_transport),
            writer: peer.to_transport,
        }
    }

    /// Next message written by the transport
    async fn next(&mut self) -> Result<OutgoingMessage> {
        let message = timeout(
            Duration::from_millis(500),
            read_frame::<_, OutgoingMessage>(&mut self.reader, DEFAULT_MAX_FRAME_LEN),
        )
        .await??;
        message.ok_or_else(|| anyhow::anyhow!("transport closed its writer"))
    }

    async fn push(&mut self, address: &str, value: WireValue) -> Result<()> {
        let message = IncomingMessage::Value(ValuePush::new(address, value));
        write_frame(&mut self.writer, &message).await?;
        Ok(())
    }
}

fn connect() -> (Comms, Peer) {
    let _ = env_logger::builder().is_test(true).try_init();
    let (connector, peer) = DuplexConnector::pair(64 * 1024);
    (Comms::with_connector(Arc::new(connector)), Peer::new(peer))
}

fn control(address: &str, unsubscribe: bool) -> OutgoingMessage {
    OutgoingMessage::Subscription(SubscriptionControl {
        address: address.to_string(),
        unsubscribe,
    })
}

#[tokio::test]
async fn test_subscribe_dispatch_unsubscribe() -> Result<()> {
    let (comms, mut peer) = connect();
    let (tx, mut rx) = mpsc::unbounded_channel();

    let id = comms
        .subscribe("/x", move |address: &str, value: i64| {
            let _ = tx.send((address.to_string(), value));
        })
        .await?;
    assert_eq!(peer.next().await?, control("/x", false));

    peer.push("/x", WireValue::Int(10)).await?;
    let received = timeout(Duration::from_millis(500), rx.recv()).await?;
    assert_eq!(received, Some(("/x".to_string(), 10)));

    comms.unsubscribe(id).await;
    assert_eq!(peer.next().await?, control("/x", true));

    peer.push("/x", WireValue::Int(99)).await?;
    sleep(Duration::from_millis(50)).await;
    assert!(rx.try_recv().is_err());
    assert!(comms.error().is_none());
    Ok(())
}

#[tokio::test]
async fn test_second_subscriber_sends_no_control() -> Result<()> {
    let (comms, mut peer) = connect();

    let first = comms.subscribe("/shared", |_: &str, _: f64| {}).await?;
    let second = comms.subscribe("/shared", |_: &str, _: f64| {}).await?;
    assert!(first < second);

    comms.unsubscribe(first).await;
    comms.unsubscribe(second).await;

    // Exactly one subscribe followed by exactly one unsubscribe
    assert_eq!(peer.next().await?, control("/shared", false));
    assert_eq!(peer.next().await?, control("/shared", true));
    Ok(())
}

#[tokio::test]
async fn test_send_pushes_typed_value() -> Result<()> {
    let (comms, mut peer) = connect();

    comms
        .send("/labels", vec!["a".to_string(), "b".to_string()])
        .await?;
    comms.send("/ratio", 0.25f64).await?;

    assert_eq!(
        peer.next().await?,
        OutgoingMessage::Value(ValuePush::new(
            "/labels",
            WireValue::StrList(vec!["a".to_string(), "b".to_string()])
        ))
    );
    assert_eq!(
        peer.next().await?,
        OutgoingMessage::Value(ValuePush::new("/ratio", WireValue::Float(0.25)))
    );
    Ok(())
}

#[tokio::test]
async fn test_request_and_wait_once() -> Result<()> {
    let (comms, mut peer) = connect();

    let requester = {
        let comms = comms.clone();
        tokio::spawn(async move { comms.request_and_wait_once::<i64>("/slider").await })
    };

    assert_eq!(peer.next().await?, control("/slider", false));
    assert_eq!(
        peer.next().await?,
        OutgoingMessage::Value(ValuePush::request("/slider"))
    );

    // The front-end answers with a float; the caller asked for an integer
    peer.push("/slider", WireValue::Float(3.5)).await?;
    let value = timeout(Duration::from_millis(500), requester).await???;
    assert_eq!(value, 4);

    assert_eq!(peer.next().await?, control("/slider", true));
    assert_eq!(comms.registry().subscriber_count("/slider"), 0);
    Ok(())
}

#[tokio::test]
async fn test_request_timeout() -> Result<()> {
    let (comms, mut peer) = connect();

    let result = comms
        .request_and_wait_timeout::<String>("/silent", Duration::from_millis(50))
        .await;
    assert_eq!(result, Err(cellwire::CommsError::Timeout));

    assert_eq!(peer.next().await?, control("/silent", false));
    assert_eq!(
        peer.next().await?,
        OutgoingMessage::Value(ValuePush::request("/silent"))
    );
    // The abandoned listener still unsubscribes
    assert_eq!(peer.next().await?, control("/silent", true));
    Ok(())
}

#[tokio::test]
async fn test_listen_stream() -> Result<()> {
    let (comms, mut peer) = connect();

    let mut listener = comms.listen::<String>("/text").await?;
    assert_eq!(peer.next().await?, control("/text", false));

    for word in ["alpha", "beta"] {
        peer.push("/text", WireValue::Str(word.to_string())).await?;
        let received = timeout(Duration::from_millis(500), listener.recv()).await?;
        assert_eq!(received.as_deref(), Some(word));
    }

    listener.close();
    assert_eq!(peer.next().await?, control("/text", true));
    assert_eq!(listener.recv().await, None);
    Ok(())
}

#[tokio::test]
async fn test_display_passthrough() -> Result<()> {
    let (comms, mut peer) = connect();

    let payload = DisplayPayload::new("text/html", "<b>hi</b>").with_display_id("out-1");
    comms.display(payload.clone()).await?;
    assert_eq!(peer.next().await?, OutgoingMessage::Display(payload));
    Ok(())
}

#[tokio::test]
async fn test_request_from_peer_keeps_connection_healthy() -> Result<()> {
    let (comms, mut peer) = connect();
    let (tx, mut rx) = mpsc::unbounded_channel();
    comms
        .subscribe("/x", move |_: &str, value: i64| {
            let _ = tx.send(value);
        })
        .await?;
    peer.next().await?;

    let mut bogus = ValuePush::new("/x", WireValue::Int(1));
    bogus.is_request = true;
    write_frame(&mut peer.writer, &IncomingMessage::Value(bogus)).await?;
    peer.push("/x", WireValue::Int(2)).await?;

    let received = timeout(Duration::from_millis(500), rx.recv()).await?;
    assert_eq!(received, Some(2));
    assert!(comms.error().is_none());
    Ok(())
}

#[tokio::test]
async fn test_non_finite_floats_are_not_sent() -> Result<()> {
    let (comms, mut peer) = connect();

    match comms.send("/ratio", f64::NAN).await {
        Err(cellwire::CommsError::NonFinite { address, value }) => {
            assert_eq!(address, "/ratio");
            assert!(value.is_nan());
        }
        other => anyhow::bail!("expected a non-finite rejection, got {:?}", other),
    }
    let list = comms.send("/ratios", vec![0.5, f64::INFINITY]).await;
    assert_eq!(
        list,
        Err(cellwire::CommsError::NonFinite {
            address: "/ratios".to_string(),
            value: f64::INFINITY,
        })
    );

    // Nothing was written for the rejected values and the connection is untouched
    comms.send("/ratio", 0.5f64).await?;
    assert_eq!(
        peer.next().await?,
        OutgoingMessage::Value(ValuePush::new("/ratio", WireValue::Float(0.5)))
    );
    assert!(comms.error().is_none());
    Ok(())
}

use super::*;
use crate::broker::MemoryBroker;
use serde_json::Value;

async fn publisher() -> ConfigPublisher<MemoryBroker> {
    ConfigPublisher::new(MemoryBroker::new().with_topic("cfg"), "cfg", "data")
        .await
        .unwrap()
}

#[tokio::test]
async fn test_add_publishes_exactly_one_unkeyed_message() {
    let publisher = publisher().await;
    publisher.announce_add(&["PV:1", "PV:2"]).await.unwrap();

    let produced = publisher.client().produced();
    assert_eq!(produced.len(), 1);
    assert_eq!(produced[0].topic, "cfg");
    assert_eq!(produced[0].key, None);

    let value: Value = serde_json::from_slice(&produced[0].value).unwrap();
    assert_eq!(value["cmd"], "add");
    assert_eq!(value["streams"][0]["channel"], "PV:1");
    assert_eq!(value["streams"][1]["channel"], "PV:2");
    assert_eq!(value["streams"][1]["converter"]["topic"], "data");
}

#[tokio::test]
async fn test_remove_publishes_one_keyed_message_per_identifier() {
    let publisher = publisher().await;
    let ids = vec!["PV:1".to_string(), "PV:2".to_string(), "PV:3".to_string()];
    publisher.announce_remove(&ids).await.unwrap();

    let produced = publisher.client().produced();
    assert_eq!(produced.len(), 3);
    for (message, id) in produced.iter().zip(&ids) {
        assert_eq!(message.topic, "cfg");
        assert_eq!(message.key.as_deref(), Some(id.as_str()));
        assert!(message.value.is_empty());
    }
}

#[tokio::test]
async fn test_remove_single_identifier() {
    let publisher = publisher().await;
    publisher.announce_remove(&["PV:1"]).await.unwrap();

    let produced = publisher.client().produced();
    assert_eq!(produced.len(), 1);
    assert_eq!(produced[0].key.as_deref(), Some("PV:1"));
    assert!(produced[0].value.is_empty());
}

#[tokio::test]
async fn test_empty_identifiers_rejected() {
    let publisher = publisher().await;
    let none: [&str; 0] = [];

    assert!(matches!(
        publisher.announce_add(&none).await,
        Err(PublishError::NoIdentifiers)
    ));
    assert!(matches!(
        publisher.announce_remove(&none).await,
        Err(PublishError::NoIdentifiers)
    ));
    assert!(publisher.client().produced().is_empty());
}

#[tokio::test]
async fn test_missing_topic_only_warns() {
    let publisher = ConfigPublisher::new(MemoryBroker::new(), "cfg", "data")
        .await
        .unwrap();
    assert_eq!(publisher.config_topic(), "cfg");
    assert!(!publisher.topic_exists("cfg").await);
}

#[tokio::test]
async fn test_transport_probe_failure_only_warns() {
    let broker = MemoryBroker::new().fail_subscribe(BrokerErrorKind::Transport);
    let publisher = ConfigPublisher::new(broker, "cfg", "data").await.unwrap();
    assert!(!publisher.topic_exists("cfg").await);
}

#[tokio::test]
async fn test_fatal_probe_failure_aborts_construction() {
    for kind in [
        BrokerErrorKind::BrokerNotAvailable,
        BrokerErrorKind::TimedOut,
        BrokerErrorKind::InvalidConfiguration,
    ] {
        let broker = MemoryBroker::new().fail_subscribe(kind);
        let result = ConfigPublisher::new(broker, "cfg", "data").await;
        assert_eq!(result.err().map(|e| e.kind()), Some(kind));
    }
}

#[tokio::test]
async fn test_empty_topics_rejected() {
    let result = ConfigPublisher::new(MemoryBroker::new(), "", "data").await;
    assert_eq!(
        result.err().map(|e| e.kind()),
        Some(BrokerErrorKind::InvalidConfiguration)
    );

    let result = ConfigPublisher::new(MemoryBroker::new(), "cfg", " ").await;
    assert_eq!(
        result.err().map(|e| e.kind()),
        Some(BrokerErrorKind::InvalidConfiguration)
    );
}

#[tokio::test]
async fn test_topic_exists_true_for_known_topic() {
    let publisher = publisher().await;
    assert!(publisher.topic_exists("cfg").await);
    assert!(!publisher.topic_exists("other").await);
}

#[tokio::test]
async fn test_produce_failure_propagates() {
    let broker = MemoryBroker::new()
        .with_topic("cfg")
        .fail_produce(BrokerErrorKind::Transport);
    let publisher = ConfigPublisher::new(broker, "cfg", "data").await.unwrap();

    match publisher.announce_remove(&["PV:1", "PV:2"]).await {
        Err(PublishError::Broker(e)) => assert_eq!(e.kind(), BrokerErrorKind::Transport),
        other => panic!("expected broker error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_exit_publishes_exit_command() {
    let publisher = publisher().await;
    publisher.announce_exit().await.unwrap();

    let produced = publisher.client().produced();
    assert_eq!(produced.len(), 1);
    let value: Value = serde_json::from_slice(&produced[0].value).unwrap();
    assert_eq!(value["cmd"], "exit");
}

#[tokio::test]
async fn test_custom_schema() {
    let formatter = ConfigFormatter::with_schema("data", "tdct");
    let publisher = ConfigPublisher::with_formatter(MemoryBroker::new().with_topic("cfg"), "cfg", formatter)
        .await
        .unwrap();
    publisher.announce_add(&["PV:1"]).await.unwrap();

    let value: Value = serde_json::from_slice(&publisher.client().produced()[0].value).unwrap();
    assert_eq!(value["streams"][0]["converter"]["schema"], "tdct");
}

#[tokio::test]
async fn test_remove_rejects_line_breaks_in_identifiers() {
    let publisher = publisher().await;

    for bad in ["PV:1\nPV:2", "PV:1\r", "\r\nForged: header"] {
        assert!(matches!(
            publisher.announce_remove(&[bad]).await,
            Err(PublishError::InvalidIdentifier(_))
        ));
    }
    assert!(publisher.client().produced().is_empty());
}

#[tokio::test]
async fn test_add_keeps_line_breaks_inside_json() {
    let publisher = publisher().await;
    publisher.announce_add(&["PV:1\nsuffix"]).await.unwrap();

    let value: Value = serde_json::from_slice(&publisher.client().produced()[0].value).unwrap();
    assert_eq!(value["streams"][0]["channel"], "PV:1\nsuffix");
}

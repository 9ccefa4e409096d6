//! UDP contract tests for DnsResponder
//!
//! These tests run the responder on a real loopback socket and talk to it
//! with hickory-encoded queries.

use ddns_core::{MemoryRecordLog, RecordStore, ResourceRecord, StoreConfig};
use ddns_dns_server::{DnsResponder, bind};
use hickory_proto::op::{Message, MessageType, OpCode, Query};
use hickory_proto::rr::rdata::A;
use hickory_proto::rr::{Name, RData, RecordType as QueryType};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;

async fn start(store: Arc<RecordStore>) -> SocketAddr {
    let socket = bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
    let addr = socket.local_addr().unwrap();
    let responder = DnsResponder::new(store);

    tokio::spawn(async move {
        let _ = responder.serve(socket).await;
    });

    addr
}

async fn query(server: SocketAddr, id: u16, name: &str, rtype: QueryType) -> Message {
    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();

    let mut request = Message::new();
    request
        .set_id(id)
        .set_message_type(MessageType::Query)
        .set_op_code(OpCode::Query)
        .set_recursion_desired(true);
    request.add_query(Query::query(Name::from_ascii(name).unwrap(), rtype));

    client
        .send_to(&request.to_vec().unwrap(), server)
        .await
        .unwrap();

    let mut buffer = vec![0u8; 4096];
    let (len, _) = tokio::time::timeout(Duration::from_secs(5), client.recv_from(&mut buffer))
        .await
        .expect("no DNS reply within 5s")
        .unwrap();

    Message::from_vec(&buffer[..len]).unwrap()
}

fn answered_address(reply: &Message) -> Option<String> {
    reply.answers().first().and_then(|record| match record.data() {
        Some(RData::A(a)) => Some(a.0.to_string()),
        Some(RData::AAAA(aaaa)) => Some(aaaa.0.to_string()),
        _ => None,
    })
}

async fn empty_store() -> Arc<RecordStore> {
    Arc::new(RecordStore::open(Box::new(MemoryRecordLog::new()), StoreConfig::default()).await.unwrap())
}

#[tokio::test]
async fn test_upserted_record_is_served() {
    let store = empty_store().await;
    store
        .upsert(ResourceRecord::address_record("a.example.com", "1.2.3.4".parse().unwrap()).unwrap())
        .await
        .unwrap();

    let server = start(store).await;
    let reply = query(server, 42, "a.example.com.", QueryType::A).await;

    assert_eq!(reply.id(), 42);
    assert_eq!(reply.answers().len(), 1);
    assert_eq!(
        reply.answers()[0].data(),
        Some(&RData::A(A("1.2.3.4".parse().unwrap())))
    );
}

#[tokio::test]
async fn test_updates_are_visible_without_restart() {
    let store = empty_store().await;
    let server = start(store.clone()).await;

    let before = query(server, 1, "late.example.com.", QueryType::A).await;
    assert!(before.answers().is_empty());

    store
        .upsert(ResourceRecord::address_record("late.example.com", "9.9.9.9".parse().unwrap()).unwrap())
        .await
        .unwrap();
    let after = query(server, 2, "late.example.com.", QueryType::A).await;
    assert_eq!(answered_address(&after).as_deref(), Some("9.9.9.9"));

    store.delete("late.example.com", 1).await.unwrap();
    let gone = query(server, 3, "late.example.com.", QueryType::A).await;
    assert!(gone.answers().is_empty());
}

#[tokio::test]
async fn test_garbage_does_not_stop_listener() {
    let store = empty_store().await;
    store
        .upsert(ResourceRecord::address_record("a.example.com", "1.2.3.4".parse().unwrap()).unwrap())
        .await
        .unwrap();
    let server = start(store).await;

    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    client.send_to(b"not dns", server).await.unwrap();

    let reply = query(server, 9, "a.example.com.", QueryType::A).await;
    assert_eq!(answered_address(&reply).as_deref(), Some("1.2.3.4"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_answers_never_torn_under_concurrent_updates() {
    let store = empty_store().await;
    store
        .upsert(ResourceRecord::address_record("busy.example.com", "10.0.0.0".parse().unwrap()).unwrap())
        .await
        .unwrap();
    let server = start(store.clone()).await;

    let writer = {
        let store = store.clone();
        tokio::spawn(async move {
            for round in 0..100u8 {
                let ip = format!("10.0.0.{}", round);
                store
                    .upsert(ResourceRecord::address_record("busy.example.com", ip.parse().unwrap()).unwrap())
                    .await
                    .unwrap();
            }
        })
    };

    for id in 0..50u16 {
        let reply = query(server, id, "busy.example.com.", QueryType::A).await;
        let address = answered_address(&reply).expect("record always present");
        assert!(address.starts_with("10.0.0."), "unexpected answer {}", address);
    }

    writer.await.unwrap();
}

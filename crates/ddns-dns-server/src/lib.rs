// # ddns-dns-server
//
// UDP responder answering address queries out of the shared RecordStore.
//
// ## Per-datagram Flow
//
// ```text
// recv ─► decode ─► for each question: lookup ─► exact name match? ─► answer
//                                                                      │
//                                          encode (uncompressed) ◄─────┘
//                                                   │
//                                                  send
// ```
//
// ## Failure Policy
//
// - Undecodable datagrams and stray responses are dropped without a reply
// - A failed or empty lookup leaves its question unanswered; no error
//   response code is ever sent back
// - Non-query opcodes get an empty-answer reply
// - A send failure is logged and the listener keeps going
//
// Each datagram is handled to completion before the next receive.

use hickory_proto::op::{Message, MessageType, OpCode, Query};
use hickory_proto::rr::rdata::{A, AAAA};
use hickory_proto::rr::{RData, Record};
use hickory_proto::serialize::binary::{BinEncodable, BinEncoder};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tracing::{debug, info, trace, warn};

use ddns_core::{RecordData, RecordStore, ResourceRecord};

/// Largest datagram read off the socket
pub const MAX_DATAGRAM: usize = 4096;

/// Errors ending or failing a responder operation
#[derive(Debug, thiserror::Error)]
pub enum ResponderError {
    /// Reply could not be serialized
    #[error("Failed to encode response: {0}")]
    Encode(String),

    /// Socket failure
    #[error("DNS socket error: {0}")]
    Io(#[from] io::Error),
}

/// Bind a UDP socket for [`DnsResponder::serve`]
pub async fn bind(addr: SocketAddr) -> Result<UdpSocket, ResponderError> {
    let socket = UdpSocket::bind(addr).await?;
    debug!("DNS socket bound to {}", socket.local_addr()?);
    Ok(socket)
}

/// Authoritative responder over a shared [`RecordStore`]
#[derive(Debug, Clone)]
pub struct DnsResponder {
    store: Arc<RecordStore>,
}

impl DnsResponder {
    pub fn new(store: Arc<RecordStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<RecordStore> {
        &self.store
    }

    /// Receive and answer datagrams until the socket fails
    ///
    /// Only a receive failure ends the loop; the error is returned so the
    /// caller can report it. Failures tied to a single datagram are
    /// logged and skipped.
    pub async fn serve(&self, socket: UdpSocket) -> Result<(), ResponderError> {
        info!("DNS responder listening on udp://{}", socket.local_addr()?);

        let mut buffer = vec![0u8; MAX_DATAGRAM];

        loop {
            let (len, peer) = match socket.recv_from(&mut buffer).await {
                Ok(received) => received,
                // ICMP port-unreachable from an earlier send surfaces here
                Err(e) if is_transient(&e) => {
                    debug!("Ignoring transient receive error: {}", e);
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let Some(reply) = self.handle(&buffer[..len]).await else {
                continue;
            };

            if let Err(e) = socket.send_to(&reply, peer).await {
                warn!("Failed to send DNS reply to {}: {}", peer, e);
            }
        }
    }

    /// Turn one request datagram into a reply datagram
    ///
    /// Returns `None` when the datagram is dropped.
    pub async fn handle(&self, datagram: &[u8]) -> Option<Vec<u8>> {
        let request = match Message::from_vec(datagram) {
            Ok(message) => message,
            Err(e) => {
                debug!("Dropping undecodable datagram ({} bytes): {}", datagram.len(), e);
                return None;
            }
        };

        if request.message_type() != MessageType::Query {
            debug!("Dropping DNS response id={}", request.id());
            return None;
        }

        let response = self.answer(&request).await;

        match encode(&response) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                warn!("Dropping reply to id={}: {}", request.id(), e);
                None
            }
        }
    }

    /// Build the reply for a decoded request
    pub async fn answer(&self, request: &Message) -> Message {
        let mut response = Message::new();
        response
            .set_id(request.id())
            .set_message_type(MessageType::Response)
            .set_op_code(request.op_code())
            .set_recursion_desired(request.recursion_desired())
            .set_checking_disabled(request.checking_disabled());
        response.add_queries(request.queries().iter().cloned());

        if request.op_code() != OpCode::Query {
            debug!("Unsupported opcode {:?}, empty reply", request.op_code());
            return response;
        }

        for query in request.queries() {
            if let Some(record) = self.resolve(query).await {
                response.add_answer(record);
            }
        }

        trace!(
            "Answered id={}: {} question(s), {} answer(s)",
            request.id(),
            request.queries().len(),
            response.answers().len()
        );
        response
    }

    async fn resolve(&self, query: &Query) -> Option<Record> {
        let name = query.name().to_ascii();
        let rtype = u16::from(query.query_type());

        let record = match self.store.lookup(&name, rtype).await {
            Ok(Some(record)) => record,
            Ok(None) => return None,
            Err(e) => {
                debug!("Lookup for {} type {} failed: {}", name, rtype, e);
                return None;
            }
        };

        // Guard against a key that maps to a differently written name
        if record.name() != name {
            debug!("Stored name {} does not match query {}", record.name(), name);
            return None;
        }

        Some(Record::from_rdata(query.name().clone(), record.ttl(), rdata(&record)))
    }
}

fn rdata(record: &ResourceRecord) -> RData {
    match record.data() {
        RecordData::A(ip) => RData::A(A(*ip)),
        RecordData::Aaaa(ip) => RData::AAAA(AAAA(*ip)),
    }
}

/// Serialize a message with name compression disabled
pub fn encode(message: &Message) -> Result<Vec<u8>, ResponderError> {
    let mut buffer = Vec::with_capacity(512);
    {
        let mut encoder = BinEncoder::new(&mut buffer);
        encoder
            .with_canonical_names(|encoder| message.emit(encoder))
            .map_err(|e| ResponderError::Encode(e.to_string()))?;
    }
    Ok(buffer)
}

fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionRefused
    )
}

//! Shared test infrastructure for handler and server integration tests.

#![allow(dead_code)]

use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use hickory_proto::op::{Header, Message, MessageType, OpCode, Query, ResponseCode};
use hickory_proto::rr::{DNSClass, LowerName, Name, RData, RecordType};
use hickory_proto::serialize::binary::{BinDecodable, BinDecoder, BinEncoder};
use hickory_server::authority::{MessageRequest, MessageResponse, MessageResponseBuilder};
use hickory_server::proto::rr::Record;
use hickory_server::proto::xfer::Protocol;
use hickory_server::server::{Request, RequestHandler, ResponseHandler, ResponseInfo};

use ospfip_dns::tags::{derive_claim, PLUGIN_TAG_IDENTIFIER};
use ospfip_dns::{FloatingIpHandler, Snapshot, SnapshotStore, ZoneAssembler};

// --- Constants ---

pub const TTL: u32 = 3600;

/// Floating IPs used across the integration suites.
pub const INVENTORY: &[(&str, &str)] = &[
    ("192.0.0.3", "api.mycluster.example.net"),
    ("192.0.0.4", "*.apps.mycluster.example.net"),
    ("2001:db8::5", "ingress.othercluster.example.org"),
];

// --- TestResponseHandler ---

/// Captures the serialized DNS response for inspection in tests.
///
/// The response is written with `MessageResponse::destructive_emit()` and
/// kept as wire-format bytes, parsed back with `Message::from_vec()`.
#[derive(Clone)]
pub struct TestResponseHandler {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl TestResponseHandler {
    pub fn new() -> Self {
        Self {
            buf: Arc::new(Mutex::new(Vec::with_capacity(512))),
        }
    }

    /// Parse the captured wire bytes into a `Message` for assertions.
    pub fn into_message(self) -> Message {
        let buf = self.buf.lock().unwrap();
        assert!(!buf.is_empty(), "no response was captured");
        Message::from_vec(&buf).expect("failed to parse captured DNS response")
    }
}

#[async_trait]
impl ResponseHandler for TestResponseHandler {
    async fn send_response<'a>(
        &mut self,
        response: MessageResponse<
            '_,
            'a,
            impl Iterator<Item = &'a Record> + Send + 'a,
            impl Iterator<Item = &'a Record> + Send + 'a,
            impl Iterator<Item = &'a Record> + Send + 'a,
            impl Iterator<Item = &'a Record> + Send + 'a,
        >,
    ) -> io::Result<ResponseInfo> {
        let mut buf = self.buf.lock().unwrap();
        buf.clear();
        let mut encoder = BinEncoder::new(&mut *buf);
        encoder.set_max_size(u16::MAX);
        response
            .destructive_emit(&mut encoder)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
    }
}

// --- Next handler ---

/// Next handler in the chain: counts the queries it receives and answers
/// NXDOMAIN so delegation is visible in the response.
#[derive(Clone, Default)]
pub struct RecordingNextHandler {
    calls: Arc<AtomicUsize>,
}

impl RecordingNextHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RequestHandler for RecordingNextHandler {
    async fn handle_request<R: ResponseHandler>(
        &self,
        request: &Request,
        mut response_handle: R,
    ) -> ResponseInfo {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let response = MessageResponseBuilder::from_message_request(request)
            .error_msg(request.header(), ResponseCode::NXDomain);
        match response_handle.send_response(response).await {
            Ok(info) => info,
            Err(_) => {
                let mut header = Header::new();
                header.set_response_code(ResponseCode::ServFail);
                header.into()
            }
        }
    }
}

// --- Snapshot builders ---

/// Tags a floating IP carries to claim `domain`.
pub fn claim_tags(domain: &str) -> Vec<String> {
    vec![
        PLUGIN_TAG_IDENTIFIER.to_string(),
        format!("{}:{}", PLUGIN_TAG_IDENTIFIER, domain),
    ]
}

/// Assemble a snapshot under the root origin from `(address, domain)` pairs.
pub fn build_snapshot(entries: &[(&str, &str)]) -> Snapshot {
    build_snapshot_with_origins(entries, &["."])
}

pub fn build_snapshot_with_origins(entries: &[(&str, &str)], origins: &[&str]) -> Snapshot {
    let origins = origins
        .iter()
        .map(|o| LowerName::from(Name::from_ascii(o).unwrap()))
        .collect();
    let tags: Vec<(&str, Vec<String>)> = entries
        .iter()
        .map(|(address, domain)| (*address, claim_tags(domain)))
        .collect();
    ZoneAssembler::new(origins, TTL)
        .assemble(
            tags.iter()
                .map(|(address, tags)| (*address, derive_claim(tags.as_slice()))),
        )
        .expect("snapshot assembly failed")
}

/// Handler in front of a recording next handler.
pub fn build_handler(
    snapshot: Snapshot,
) -> (FloatingIpHandler<RecordingNextHandler>, RecordingNextHandler) {
    let next = RecordingNextHandler::new();
    let handler = FloatingIpHandler::new(SnapshotStore::with_snapshot(snapshot), TTL, next.clone());
    (handler, next)
}

// --- Query/Request construction ---

/// Build a DNS query message.
pub fn build_query(name: &str, record_type: RecordType, id: u16) -> Message {
    let mut msg = Message::new();
    msg.set_id(id);
    msg.set_message_type(MessageType::Query);
    msg.set_op_code(OpCode::Query);
    msg.set_recursion_desired(true);
    let mut query = Query::new();
    query.set_name(Name::from_ascii(name).unwrap());
    query.set_query_type(record_type);
    query.set_query_class(DNSClass::IN);
    msg.add_query(query);
    msg
}

/// Parse wire bytes into a `Request` from a fixed client address.
pub fn request_from_bytes(bytes: &[u8]) -> Request {
    let mut decoder = BinDecoder::new(bytes);
    let msg = MessageRequest::read(&mut decoder).expect("failed to parse MessageRequest");
    let src: SocketAddr = "127.0.0.1:53000".parse().unwrap();
    Request::new(msg, src, Protocol::Udp)
}

pub fn build_request(name: &str, record_type: RecordType, id: u16) -> Request {
    let bytes = build_query(name, record_type, id).to_vec().unwrap();
    request_from_bytes(&bytes)
}

/// Execute a query through `handler` and return the parsed response.
pub async fn execute_query<H: RequestHandler>(
    handler: &H,
    name: &str,
    record_type: RecordType,
    id: u16,
) -> Message {
    let request = build_request(name, record_type, id);
    let response = TestResponseHandler::new();
    handler.handle_request(&request, response.clone()).await;
    response.into_message()
}

// --- Response helpers ---

/// Addresses in the answer section, A and AAAA alike.
pub fn answer_ips(msg: &Message) -> Vec<IpAddr> {
    let mut ips: Vec<IpAddr> = msg
        .answers()
        .iter()
        .filter_map(|r| match r.data() {
            RData::A(a) => Some(IpAddr::V4(a.0)),
            RData::AAAA(aaaa) => Some(IpAddr::V6(aaaa.0)),
            _ => None,
        })
        .collect();
    ips.sort();
    ips
}

/// PTR targets in the answer section.
pub fn answer_ptrs(msg: &Message) -> Vec<String> {
    msg.answers()
        .iter()
        .filter_map(|r| match r.data() {
            RData::PTR(ptr) => Some(ptr.0.to_string()),
            _ => None,
        })
        .collect()
}

/// Assert response code.
pub fn assert_response_code(msg: &Message, expected: ResponseCode) {
    assert_eq!(
        msg.response_code(),
        expected,
        "expected {:?}, got {:?}",
        expected,
        msg.response_code()
    );
}

/// Assert an authoritative NOERROR answer with exactly `expected`.
pub fn assert_answer(msg: &Message, expected: &[&str]) {
    assert_response_code(msg, ResponseCode::NoError);
    assert!(msg.header().authoritative(), "answer is not authoritative");
    let mut expected: Vec<IpAddr> = expected.iter().map(|ip| ip.parse().unwrap()).collect();
    expected.sort();
    assert_eq!(answer_ips(msg), expected);
}

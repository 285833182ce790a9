//! Handler-level integration tests.
//!
//! Queries go through `FloatingIpHandler::handle_request()` with a recording
//! next handler behind it, so delegation is observable. No network access or
//! privileges required.

mod common;

use common::*;
use hickory_proto::op::{Message, MessageType, OpCode, ResponseCode};
use hickory_proto::rr::RecordType;
use hickory_server::server::RequestHandler;
use ospfip_dns::{FloatingIpHandler, Snapshot, SnapshotStore};

// =========================================================================
// Forward lookups
// =========================================================================

#[tokio::test]
async fn fqdn_a_record_is_answered_authoritatively() {
    let (handler, next) = build_handler(build_snapshot(INVENTORY));

    let msg = execute_query(&handler, "api.mycluster.example.net.", RecordType::A, 1).await;

    assert_answer(&msg, &["192.0.0.3"]);
    assert_eq!(msg.answers()[0].ttl(), TTL);
    assert_eq!(next.calls(), 0);
}

#[tokio::test]
async fn query_name_case_is_ignored() {
    let (handler, _next) = build_handler(build_snapshot(INVENTORY));

    let msg = execute_query(&handler, "API.MyCluster.Example.NET.", RecordType::A, 2).await;

    assert_answer(&msg, &["192.0.0.3"]);
}

#[tokio::test]
async fn wildcard_covers_any_single_label() {
    let (handler, next) = build_handler(build_snapshot(INVENTORY));

    for (id, name) in ["console.apps.mycluster.example.net.", "oauth.apps.mycluster.example.net."]
        .iter()
        .enumerate()
    {
        let msg = execute_query(&handler, name, RecordType::A, id as u16 + 10).await;
        assert_answer(&msg, &["192.0.0.4"]);
        assert_eq!(msg.answers()[0].name().to_string(), *name);
    }
    assert_eq!(next.calls(), 0);
}

#[tokio::test]
async fn aaaa_record_for_ipv6_floating_ip() {
    let (handler, _next) = build_handler(build_snapshot(INVENTORY));

    let msg = execute_query(
        &handler,
        "ingress.othercluster.example.org.",
        RecordType::AAAA,
        3,
    )
    .await;

    assert_answer(&msg, &["2001:db8::5"]);
}

#[tokio::test]
async fn several_floating_ips_on_one_name_are_all_answered() {
    let snapshot = build_snapshot(&[
        ("192.0.0.3", "api.mycluster.example.net"),
        ("192.0.0.13", "api.mycluster.example.net"),
    ]);
    let (handler, _next) = build_handler(snapshot);

    let msg = execute_query(&handler, "api.mycluster.example.net.", RecordType::A, 4).await;

    assert_answer(&msg, &["192.0.0.3", "192.0.0.13"]);
}

// =========================================================================
// Reverse lookups
// =========================================================================

#[tokio::test]
async fn ptr_for_ipv4_floating_ip() {
    let (handler, next) = build_handler(build_snapshot(INVENTORY));

    let msg = execute_query(&handler, "3.0.0.192.in-addr.arpa.", RecordType::PTR, 20).await;

    assert_response_code(&msg, ResponseCode::NoError);
    assert!(msg.header().authoritative());
    assert_eq!(answer_ptrs(&msg), vec!["api.mycluster.example.net."]);
    assert_eq!(next.calls(), 0);
}

#[tokio::test]
async fn ptr_for_ipv6_floating_ip() {
    let (handler, _next) = build_handler(build_snapshot(INVENTORY));
    let name = "5.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.8.b.d.0.1.0.0.2.ip6.arpa.";

    let msg = execute_query(&handler, name, RecordType::PTR, 21).await;

    assert_eq!(answer_ptrs(&msg), vec!["ingress.othercluster.example.org."]);
}

#[tokio::test]
async fn wildcard_floating_ip_has_no_ptr() {
    let (handler, next) = build_handler(build_snapshot(INVENTORY));

    let msg = execute_query(&handler, "4.0.0.192.in-addr.arpa.", RecordType::PTR, 22).await;

    assert_response_code(&msg, ResponseCode::NXDomain);
    assert_eq!(next.calls(), 1);
}

// =========================================================================
// Delegation to the next handler
// =========================================================================

#[tokio::test]
async fn unknown_zone_is_delegated() {
    let (handler, next) = build_handler(build_snapshot(INVENTORY));

    let msg = execute_query(&handler, "www.example.com.", RecordType::A, 30).await;

    assert_response_code(&msg, ResponseCode::NXDomain);
    assert_eq!(next.calls(), 1);
}

#[tokio::test]
async fn unknown_name_in_served_zone_is_delegated() {
    let (handler, next) = build_handler(build_snapshot(INVENTORY));

    let msg = execute_query(&handler, "db.mycluster.example.net.", RecordType::A, 31).await;

    assert_response_code(&msg, ResponseCode::NXDomain);
    assert_eq!(next.calls(), 1);
}

#[tokio::test]
async fn address_family_mismatch_is_delegated() {
    let (handler, next) = build_handler(build_snapshot(INVENTORY));

    let msg = execute_query(&handler, "api.mycluster.example.net.", RecordType::AAAA, 32).await;

    assert!(answer_ips(&msg).is_empty());
    assert_eq!(next.calls(), 1);
}

#[tokio::test]
async fn unsupported_record_types_are_delegated() {
    let (handler, next) = build_handler(build_snapshot(INVENTORY));

    for (id, rtype) in [RecordType::MX, RecordType::TXT, RecordType::SOA]
        .into_iter()
        .enumerate()
    {
        execute_query(&handler, "api.mycluster.example.net.", rtype, id as u16 + 40).await;
    }

    assert_eq!(next.calls(), 3);
}

#[tokio::test]
async fn empty_snapshot_delegates_everything() {
    let (handler, next) = build_handler(Snapshot::empty());

    execute_query(&handler, "api.mycluster.example.net.", RecordType::A, 50).await;
    execute_query(&handler, "3.0.0.192.in-addr.arpa.", RecordType::PTR, 51).await;

    assert_eq!(next.calls(), 2);
}

#[tokio::test]
async fn names_outside_origins_are_not_served() {
    let snapshot = build_snapshot_with_origins(INVENTORY, &["example.org."]);
    let (handler, next) = build_handler(snapshot);

    let msg = execute_query(&handler, "api.mycluster.example.net.", RecordType::A, 60).await;
    assert_response_code(&msg, ResponseCode::NXDomain);
    assert_eq!(next.calls(), 1);

    let msg = execute_query(
        &handler,
        "ingress.othercluster.example.org.",
        RecordType::AAAA,
        61,
    )
    .await;
    assert_answer(&msg, &["2001:db8::5"]);
}

// =========================================================================
// Malformed requests and snapshot replacement
// =========================================================================

#[tokio::test]
async fn request_without_question_is_formerr() {
    let (handler, next) = build_handler(build_snapshot(INVENTORY));

    let mut msg = Message::new();
    msg.set_id(70);
    msg.set_message_type(MessageType::Query);
    msg.set_op_code(OpCode::Query);
    let request = request_from_bytes(&msg.to_vec().unwrap());

    let response = TestResponseHandler::new();
    handler.handle_request(&request, response.clone()).await;
    let msg = response.into_message();

    assert_response_code(&msg, ResponseCode::FormErr);
    assert_eq!(msg.id(), 70);
    assert_eq!(next.calls(), 0);
}

#[tokio::test]
async fn replaced_snapshot_is_visible_to_next_query() {
    let store = SnapshotStore::with_snapshot(build_snapshot(INVENTORY));
    let next = RecordingNextHandler::new();
    let handler = FloatingIpHandler::new(store.clone(), TTL, next.clone());

    let msg = execute_query(&handler, "api.mycluster.example.net.", RecordType::A, 80).await;
    assert_answer(&msg, &["192.0.0.3"]);

    store.replace(build_snapshot(&[("192.0.0.99", "api.mycluster.example.net")]));

    let msg = execute_query(&handler, "api.mycluster.example.net.", RecordType::A, 81).await;
    assert_answer(&msg, &["192.0.0.99"]);
    assert_eq!(next.calls(), 0);
}

#[tokio::test]
async fn concurrent_queries_see_consistent_answers() {
    let (handler, _next) = build_handler(build_snapshot(INVENTORY));

    let queries = (0..32u16).map(|id| {
        let handler = &handler;
        async move { execute_query(handler, "api.mycluster.example.net.", RecordType::A, id).await }
    });
    let responses = futures::future::join_all(queries).await;

    for msg in responses {
        assert_answer(&msg, &["192.0.0.3"]);
    }
}

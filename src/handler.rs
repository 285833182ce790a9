//! DNS request handler serving the current snapshot.
//!
//! Queries the snapshot is not authoritative for are passed unchanged to the
//! next handler in the chain.

use async_trait::async_trait;
use hickory_proto::op::{Header, ResponseCode};
use hickory_proto::rr::Record;
use hickory_server::authority::MessageResponseBuilder;
use hickory_server::server::{Request, RequestHandler, ResponseHandler, ResponseInfo};
use tracing::{debug, error, trace};

use crate::metrics::{self, QueryResult, Timer};
use crate::resolver::{QueryResolver, Resolution};
use crate::state::SnapshotStore;

/// Answers from a [`SnapshotStore`], falling through to `next`.
pub struct FloatingIpHandler<N> {
    store: SnapshotStore,
    resolver: QueryResolver,
    next: N,
}

impl<N: RequestHandler> FloatingIpHandler<N> {
    /// Create a handler answering with `ttl` in front of `next`.
    pub fn new(store: SnapshotStore, ttl: u32, next: N) -> Self {
        Self {
            store,
            resolver: QueryResolver::new(ttl),
            next,
        }
    }

    async fn send_answer<R: ResponseHandler>(
        request: &Request,
        mut response_handle: R,
        header: Header,
        answers: &[Record],
        additionals: &[Record],
    ) -> ResponseInfo {
        let response = MessageResponseBuilder::from_message_request(request).build(
            header,
            answers.iter(),
            std::iter::empty(),
            std::iter::empty(),
            additionals.iter(),
        );
        Self::sent(response_handle.send_response(response).await)
    }

    async fn send_error<R: ResponseHandler>(
        request: &Request,
        mut response_handle: R,
        code: ResponseCode,
    ) -> ResponseInfo {
        let response =
            MessageResponseBuilder::from_message_request(request).error_msg(request.header(), code);
        Self::sent(response_handle.send_response(response).await)
    }

    fn sent(result: std::io::Result<ResponseInfo>) -> ResponseInfo {
        match result {
            Ok(info) => info,
            Err(e) => {
                error!("Failed to send response: {}", e);
                let mut header = Header::new();
                header.set_response_code(ResponseCode::ServFail);
                header.into()
            }
        }
    }
}

#[async_trait]
impl<N: RequestHandler> RequestHandler for FloatingIpHandler<N> {
    async fn handle_request<R: ResponseHandler>(
        &self,
        request: &Request,
        response_handle: R,
    ) -> ResponseInfo {
        let timer = Timer::start();

        let query = match request.request_info() {
            Ok(info) => info.query.clone(),
            Err(e) => {
                debug!(src = %request.src(), "unreadable request: {}", e);
                metrics::record_query("unknown", QueryResult::FormatError, timer.elapsed());
                return Self::send_error(request, response_handle, ResponseCode::FormErr).await;
            }
        };
        let rtype = query.query_type();
        let rtype_str = rtype.to_string();

        trace!(name = %query.name(), ?rtype, src = %request.src(), "DNS query");

        let snapshot = self.store.get();
        let resolution = self.resolver.resolve(&snapshot, query.name(), rtype).await;

        match resolution {
            Resolution::Answered {
                answers,
                additionals,
            } => {
                metrics::record_query(&rtype_str, QueryResult::Answered, timer.elapsed());
                let mut header = Header::response_from_request(request.header());
                header.set_authoritative(true);
                header.set_response_code(ResponseCode::NoError);
                Self::send_answer(request, response_handle, header, &answers, &additionals).await
            }
            Resolution::NotAuthoritative => {
                trace!(name = %query.name(), ?rtype, "passing to next handler");
                metrics::record_query(&rtype_str, QueryResult::Delegated, timer.elapsed());
                self.next.handle_request(request, response_handle).await
            }
            Resolution::ServerFailure(reason) => {
                error!(name = %query.name(), ?rtype, "lookup failed: {}", reason);
                metrics::record_query(&rtype_str, QueryResult::ServerFailure, timer.elapsed());
                Self::send_error(request, response_handle, ResponseCode::ServFail).await
            }
        }
    }
}

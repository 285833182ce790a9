//! Query resolution against a snapshot.
//!
//! ```text
//! PTR   -> reverse-map lookup           -> Answered | NotAuthoritative
//! other -> longest zone suffix match    -> NotAuthoritative if none
//!       -> zone lookup (A/AAAA only)    -> Answered | NotAuthoritative
//! ```
//!
//! An empty answer is never an error: the next handler gets a chance.

use hickory_proto::rr::rdata::PTR;
use hickory_proto::rr::{DNSClass, LowerName, Name, RData, Record, RecordType};
use hickory_server::authority::{Authority, LookupControlFlow, LookupObject, LookupOptions};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use tracing::{debug, trace};

use crate::zone::Snapshot;

const IN_ADDR_ARPA: &str = ".in-addr.arpa";
const IP6_ARPA: &str = ".ip6.arpa";

/// Outcome of resolving one query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Records to send back with the authoritative bit set.
    Answered {
        /// Answer section.
        answers: Vec<Record>,
        /// Additional section.
        additionals: Vec<Record>,
    },
    /// Not ours to answer; the next handler should try.
    NotAuthoritative,
    /// The snapshot is inconsistent; answer SERVFAIL.
    ServerFailure(String),
}

/// Resolves queries against a snapshot with a fixed answer TTL.
#[derive(Debug, Clone, Copy)]
pub struct QueryResolver {
    ttl: u32,
}

impl QueryResolver {
    /// Create a resolver answering with `ttl`.
    pub fn new(ttl: u32) -> Self {
        Self { ttl }
    }

    /// Resolve `name`/`rtype` against `snapshot`.
    pub async fn resolve(
        &self,
        snapshot: &Snapshot,
        name: &LowerName,
        rtype: RecordType,
    ) -> Resolution {
        if rtype == RecordType::PTR {
            return self.resolve_ptr(snapshot, name);
        }

        let Some(zone_name) = snapshot.find_zone(name) else {
            trace!(%name, "no matching zone");
            return Resolution::NotAuthoritative;
        };
        let Some(zone) = snapshot.zone(zone_name) else {
            return Resolution::ServerFailure(format!(
                "zone {} is listed but missing from the snapshot",
                zone_name
            ));
        };

        if !matches!(rtype, RecordType::A | RecordType::AAAA) {
            debug!(%name, ?rtype, "unsupported record type");
            return Resolution::NotAuthoritative;
        }

        let mut lookup = match zone.lookup(name, rtype, LookupOptions::default()).await {
            LookupControlFlow::Continue(Ok(lookup)) | LookupControlFlow::Break(Ok(lookup)) => {
                lookup
            }
            LookupControlFlow::Continue(Err(e)) | LookupControlFlow::Break(Err(e)) => {
                debug!(%name, ?rtype, error = %e, "zone lookup found nothing");
                return Resolution::NotAuthoritative;
            }
            LookupControlFlow::Skip => return Resolution::NotAuthoritative,
        };

        let answers: Vec<Record> = lookup.iter().cloned().collect();
        if answers.is_empty() {
            return Resolution::NotAuthoritative;
        }
        let additionals = lookup
            .take_additionals()
            .map(|extra| extra.iter().cloned().collect())
            .unwrap_or_default();

        debug!(%name, ?rtype, count = answers.len(), "answering from zone {}", zone_name);
        Resolution::Answered {
            answers,
            additionals,
        }
    }

    fn resolve_ptr(&self, snapshot: &Snapshot, name: &LowerName) -> Resolution {
        let qname = Name::from(name.clone());
        let Some(addr) = address_from_reverse(&qname) else {
            debug!(%name, "not a reverse lookup name");
            return Resolution::NotAuthoritative;
        };
        let Some(target) = snapshot.reverse_name(&addr) else {
            debug!(%addr, "no reverse record");
            return Resolution::NotAuthoritative;
        };

        let mut record = Record::from_rdata(qname, self.ttl, RData::PTR(PTR(target.clone())));
        record.set_dns_class(DNSClass::IN);
        Resolution::Answered {
            answers: vec![record],
            additionals: Vec::new(),
        }
    }
}

/// Decode the address encoded in an `in-addr.arpa` or `ip6.arpa` name.
///
/// Only complete addresses are decoded; partial reverse names yield `None`.
pub fn address_from_reverse(name: &Name) -> Option<IpAddr> {
    let name = name.to_lowercase().to_ascii();
    let name = name.trim_end_matches('.');

    if let Some(labels) = name.strip_suffix(IN_ADDR_ARPA) {
        let mut octets = [0u8; 4];
        let mut count = 0;
        for label in labels.rsplit('.') {
            if count == octets.len() || label.is_empty() || !label.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            octets[count] = label.parse().ok()?;
            count += 1;
        }
        return (count == octets.len()).then(|| IpAddr::V4(Ipv4Addr::from(octets)));
    }

    if let Some(labels) = name.strip_suffix(IP6_ARPA) {
        let mut value: u128 = 0;
        let mut count = 0;
        for label in labels.rsplit('.') {
            let mut chars = label.chars();
            let (Some(nibble), None) = (chars.next(), chars.next()) else {
                return None;
            };
            value = (value << 4) | u128::from(nibble.to_digit(16)?);
            count += 1;
            if count > 32 {
                return None;
            }
        }
        return (count == 32).then(|| IpAddr::V6(Ipv6Addr::from(value)));
    }

    None
}

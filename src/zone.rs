//! Zone assembly from floating IP domain claims.
//!
//! One assembly pass turns the `(address, claim)` pairs of a refresh into a
//! [`Snapshot`]: one in-memory zone per claimed suffix, each holding a
//! synthesized SOA plus the A/AAAA records of its claims, and a reverse map
//! from address to name for every non-wildcard claim.

use hickory_proto::rr::rdata::{A, AAAA, SOA};
use hickory_proto::rr::{DNSClass, LowerName, Name, RData, Record, RecordSet, RrKey};
use hickory_server::authority::ZoneType;
use hickory_server::store::in_memory::InMemoryAuthority;
use std::collections::{BTreeMap, HashMap};
use std::net::IpAddr;
use tracing::{debug, warn};

use crate::error::DnsError;
use crate::metrics::{self, SkipReason};
use crate::tags::DomainClaim;

/// Serial of every synthesized SOA.
const SOA_SERIAL: u32 = 1;

/// One complete, immutable view of the authoritative data.
#[derive(Default)]
pub struct Snapshot {
    zones: HashMap<LowerName, InMemoryAuthority>,
    zone_names: Vec<LowerName>,
    reverse: HashMap<IpAddr, Name>,
    records: usize,
}

impl std::fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Snapshot")
            .field("zone_names", &self.zone_names)
            .field("reverse", &self.reverse)
            .field("records", &self.records)
            .finish()
    }
}

impl Snapshot {
    /// A snapshot with no zones and no reverse records.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Zone names in the order they were first claimed.
    pub fn zone_names(&self) -> &[LowerName] {
        &self.zone_names
    }

    /// Zone object for an exact zone name.
    pub fn zone(&self, zone_name: &LowerName) -> Option<&InMemoryAuthority> {
        self.zones.get(zone_name)
    }

    /// Longest known zone name that `name` falls under.
    pub fn find_zone(&self, name: &LowerName) -> Option<&LowerName> {
        self.zone_names
            .iter()
            .filter(|zone| zone.zone_of(name))
            .max_by_key(|zone| zone.num_labels())
    }

    /// Name that claimed `addr`, if it has a reverse record.
    pub fn reverse_name(&self, addr: &IpAddr) -> Option<&Name> {
        self.reverse.get(addr)
    }

    /// Reverse records, address to name.
    pub fn reverse_records(&self) -> &HashMap<IpAddr, Name> {
        &self.reverse
    }

    /// Number of zones.
    pub fn zones_count(&self) -> usize {
        self.zone_names.len()
    }

    /// Number of address records across all zones.
    pub fn records_count(&self) -> usize {
        self.records
    }

    #[cfg(test)]
    pub(crate) fn from_parts(
        zones: HashMap<LowerName, InMemoryAuthority>,
        zone_names: Vec<LowerName>,
        reverse: HashMap<IpAddr, Name>,
    ) -> Self {
        Self {
            zones,
            zone_names,
            reverse,
            records: 0,
        }
    }
}

/// Records of one zone under construction.
struct ZoneBuilder {
    origin: Name,
    records: BTreeMap<RrKey, RecordSet>,
}

impl ZoneBuilder {
    /// Start a zone. The SOA goes in first: zone lookups need it.
    fn new(origin: Name, ttl: u32) -> Self {
        let soa = soa_record(&origin, ttl);
        let mut builder = Self::empty(origin);
        builder.insert(soa);
        builder
    }

    fn empty(origin: Name) -> Self {
        Self {
            origin,
            records: BTreeMap::new(),
        }
    }

    fn insert(&mut self, record: Record) {
        let key = RrKey::new(LowerName::from(record.name()), record.record_type());
        self.records
            .entry(key)
            .or_insert_with(|| RecordSet::new(record.name().clone(), record.record_type(), SOA_SERIAL))
            .insert(record, SOA_SERIAL);
    }

    fn build(self) -> Result<InMemoryAuthority, DnsError> {
        let origin = self.origin.to_string();
        InMemoryAuthority::new(self.origin, self.records, ZoneType::Primary, false)
            .map_err(|reason| DnsError::Zone { origin, reason })
    }
}

/// Builds snapshots for a fixed set of origins and TTL.
#[derive(Debug, Clone)]
pub struct ZoneAssembler {
    origins: Vec<LowerName>,
    ttl: u32,
    #[cfg(test)]
    omit_soa: bool,
}

impl ZoneAssembler {
    /// Create an assembler for the given origins and record TTL.
    pub fn new(origins: Vec<LowerName>, ttl: u32) -> Self {
        Self {
            origins,
            ttl,
            #[cfg(test)]
            omit_soa: false,
        }
    }

    /// An assembler whose zones lack an SOA, so every zone build fails.
    #[cfg(test)]
    pub(crate) fn without_soa(mut self) -> Self {
        self.omit_soa = true;
        self
    }

    fn zone_builder(&self, origin: Name) -> ZoneBuilder {
        #[cfg(test)]
        if self.omit_soa {
            return ZoneBuilder::empty(origin);
        }
        ZoneBuilder::new(origin, self.ttl)
    }

    /// Whether `name` is under one of the configured origins.
    pub fn in_origins(&self, name: &Name) -> bool {
        let name = LowerName::from(name);
        self.origins.iter().any(|origin| origin.zone_of(&name))
    }

    /// Assemble a snapshot from `(address, claim)` pairs, in inventory order.
    ///
    /// Missing claims, claims outside the origins and unparsable addresses
    /// are skipped. A zone that cannot be built fails the whole pass.
    pub fn assemble<'a, I>(&self, claims: I) -> Result<Snapshot, DnsError>
    where
        I: IntoIterator<Item = (&'a str, Option<DomainClaim>)>,
    {
        let mut builders: HashMap<LowerName, ZoneBuilder> = HashMap::new();
        let mut zone_names: Vec<LowerName> = Vec::new();
        let mut reverse: HashMap<IpAddr, Name> = HashMap::new();
        let mut records = 0;

        for (address, claim) in claims {
            let ip: IpAddr = match address.parse::<IpAddr>() {
                Ok(ip) => ip.to_canonical(),
                Err(e) => {
                    warn!(address, error = %e, "failed to parse floating IP, skipping");
                    metrics::record_skipped(SkipReason::InvalidAddress);
                    continue;
                }
            };

            let Some(claim) = claim else {
                debug!(%ip, "no domain claim, skipping");
                metrics::record_skipped(SkipReason::NoClaim);
                continue;
            };

            let name = claim.name();
            if !self.in_origins(name) {
                debug!(%name, "does not match the configured origin(s), skipping");
                metrics::record_skipped(SkipReason::OutsideOrigins);
                continue;
            }

            let zone_name = claim.zone();
            let key = LowerName::from(&zone_name);
            let builder = builders.entry(key.clone()).or_insert_with(|| {
                zone_names.push(key);
                self.zone_builder(zone_name)
            });
            builder.insert(address_record(name, ip, self.ttl));
            records += 1;

            if !claim.is_wildcard() {
                debug!(%ip, %name, "adding reverse record");
                reverse.insert(ip, name.clone());
            }
        }

        let mut zones = HashMap::with_capacity(builders.len());
        for (key, builder) in builders {
            zones.insert(key, builder.build()?);
        }

        debug!(zones = ?zone_names, "assembled zones");
        Ok(Snapshot {
            zones,
            zone_names,
            reverse,
            records,
        })
    }
}

/// A or AAAA record for `ip`, depending on its family.
fn address_record(name: &Name, ip: IpAddr, ttl: u32) -> Record {
    let rdata = match ip {
        IpAddr::V4(v4) => RData::A(A::from(v4)),
        IpAddr::V6(v6) => RData::AAAA(AAAA::from(v6)),
    };
    let mut record = Record::from_rdata(name.clone(), ttl, rdata);
    record.set_dns_class(DNSClass::IN);
    record
}

/// Placeholder SOA for a synthesized zone.
pub fn soa_record(origin: &Name, ttl: u32) -> Record {
    let soa = SOA::new(
        Name::from_labels(vec!["localhost"]).unwrap_or_else(|_| Name::root()),
        Name::from_labels(vec!["root", "localhost"]).unwrap_or_else(|_| Name::root()),
        SOA_SERIAL,
        0,
        0,
        0,
        ttl,
    );
    let mut record = Record::from_rdata(origin.clone(), ttl, RData::SOA(soa));
    record.set_dns_class(DNSClass::IN);
    record
}

//! Floating IP tag interpretation.
//!
//! A floating IP managed by this server carries the identifier tag
//! `coredns:plugin:ospfip` plus one domain-bearing tag of the form
//! `coredns:plugin:ospfip:<fqdn-or-wildcard>`:
//!
//! ```text
//! coredns:plugin:ospfip
//! coredns:plugin:ospfip:api.cluster.example.net   -> Fqdn(api.cluster.example.net.)
//! coredns:plugin:ospfip:*.cluster.example.net     -> Wildcard(*.cluster.example.net.)
//! ```

use hickory_proto::rr::Name;
use tracing::debug;

/// Tag marking a floating IP as managed by this server.
pub const PLUGIN_TAG_IDENTIFIER: &str = "coredns:plugin:ospfip";

const TAG_PREFIX: &str = "coredns:plugin:ospfip:";

const DNS1123_LABEL_MAX_LEN: usize = 63;
const DNS1123_SUBDOMAIN_MAX_LEN: usize = 253;

/// The domain a floating IP claims through its tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainClaim {
    /// A plain name, e.g. `api.cluster.example.net.`.
    Fqdn(Name),
    /// A wildcard name, e.g. `*.cluster.example.net.`.
    Wildcard(Name),
}

impl DomainClaim {
    /// Normalized (lowercase, fully qualified) claimed name.
    pub fn name(&self) -> &Name {
        match self {
            DomainClaim::Fqdn(name) | DomainClaim::Wildcard(name) => name,
        }
    }

    /// Whether the claim is a wildcard and therefore has no reverse name.
    pub fn is_wildcard(&self) -> bool {
        matches!(self, DomainClaim::Wildcard(_))
    }

    /// Zone the claimed name belongs to.
    pub fn zone(&self) -> Name {
        zone_of(self.name())
    }
}

/// Extract the domain claim from a floating IP's tags.
///
/// The first tag (in the given order) that is not the identifier tag and
/// holds a valid domain wins. Invalid tags are skipped.
pub fn derive_claim<S: AsRef<str>>(tags: &[S]) -> Option<DomainClaim> {
    for tag in tags {
        let tag = tag.as_ref();
        if tag == PLUGIN_TAG_IDENTIFIER {
            continue;
        }
        debug!(tag, "processing tag");

        let candidate = tag.strip_prefix(TAG_PREFIX).unwrap_or(tag);
        match classify(candidate) {
            Some(claim) => return Some(claim),
            None => debug!(candidate, "not a valid domain, skipping tag"),
        }
    }
    None
}

/// Zone of a name: the name with its leftmost label removed, normalized.
pub fn zone_of(name: &Name) -> Name {
    let mut zone = name.base_name().to_lowercase();
    zone.set_fqdn(true);
    zone
}

fn classify(candidate: &str) -> Option<DomainClaim> {
    if is_fully_qualified_domain_name(candidate) {
        return to_name(candidate).map(DomainClaim::Fqdn);
    }
    // Wildcard validation does not accept a trailing dot.
    let unqualified = candidate.strip_suffix('.').unwrap_or(candidate);
    if is_wildcard_dns1123_subdomain(unqualified) {
        return to_name(unqualified).map(DomainClaim::Wildcard);
    }
    None
}

fn to_name(candidate: &str) -> Option<Name> {
    match Name::from_ascii(candidate) {
        Ok(name) => {
            let mut name = name.to_lowercase();
            name.set_fqdn(true);
            Some(name)
        }
        Err(e) => {
            debug!(candidate, error = %e, "validated domain rejected by name parser");
            None
        }
    }
}

/// A DNS-1123 label: lowercase alphanumerics and '-', alphanumeric at both ends.
fn is_dns1123_label(label: &str) -> bool {
    let bytes = label.as_bytes();
    match (bytes.first(), bytes.last()) {
        (Some(first), Some(last)) => {
            bytes.len() <= DNS1123_LABEL_MAX_LEN
                && first.is_ascii_alphanumeric()
                && last.is_ascii_alphanumeric()
                && bytes
                    .iter()
                    .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'-')
        }
        _ => false,
    }
}

fn is_dns1123_subdomain(value: &str) -> bool {
    value.len() <= DNS1123_SUBDOMAIN_MAX_LEN && value.split('.').all(is_dns1123_label)
}

/// A DNS-1123 subdomain with at least two labels, optionally fully qualified.
pub fn is_fully_qualified_domain_name(value: &str) -> bool {
    let value = value.strip_suffix('.').unwrap_or(value);
    !value.is_empty() && is_dns1123_subdomain(value) && value.split('.').count() >= 2
}

/// A zone origin: the root `.`, or a DNS-1123 subdomain of any depth,
/// optionally fully qualified. Case is not checked here.
pub fn is_zone_origin(value: &str) -> bool {
    if value == "." {
        return true;
    }
    let value = value.strip_suffix('.').unwrap_or(value);
    !value.is_empty() && is_dns1123_subdomain(&value.to_ascii_lowercase())
}

/// `*.` followed by a DNS-1123 subdomain. A trailing dot is not accepted.
pub fn is_wildcard_dns1123_subdomain(value: &str) -> bool {
    value.len() <= DNS1123_SUBDOMAIN_MAX_LEN
        && value
            .strip_prefix("*.")
            .is_some_and(is_dns1123_subdomain)
}

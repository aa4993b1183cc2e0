use bytes::Bytes;
use serde::Serialize;

use crate::error::{RelayError, Result};
use crate::hash::DIGEST_LEN;
use crate::prefix::{MatchMode, Prefix, Suite, MAX_NAME_COMPONENTS};

pub const MAX_PACKET_SIZE: usize = 8096;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PacketKind {
    Interest,
    Content,
}

/// Per-suite packet attributes. Only the variant matching the name's suite is valid.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SuiteFields {
    Ccnb {
        min_suffix: u64,
        max_suffix: u64,
        nonce: Option<Bytes>,
    },
    Ccntlv,
    Ndntlv {
        min_suffix: u64,
        max_suffix: u64,
        nonce: Option<Bytes>,
        must_be_fresh: bool,
        /// Interest lifetime, if the interest carried one.
        lifetime_ms: Option<u64>,
        /// Content freshness period.
        freshness_period_ms: u64,
    },
}

impl SuiteFields {
    /// Fields of a packet that carried no optional attributes.
    pub fn default_for(suite: Suite) -> Self {
        match suite {
            Suite::Ccnb => SuiteFields::Ccnb {
                min_suffix: 0,
                max_suffix: MAX_NAME_COMPONENTS as u64,
                nonce: None,
            },
            Suite::Ccntlv => SuiteFields::Ccntlv,
            Suite::Ndntlv => SuiteFields::Ndntlv {
                min_suffix: 0,
                max_suffix: 1,
                nonce: None,
                must_be_fresh: false,
                lifetime_ms: None,
                freshness_period_ms: 0,
            },
        }
    }

    pub fn suite(&self) -> Suite {
        match self {
            SuiteFields::Ccnb { .. } => Suite::Ccnb,
            SuiteFields::Ccntlv => Suite::Ccntlv,
            SuiteFields::Ndntlv { .. } => Suite::Ndntlv,
        }
    }
}

/// A decoded interest or content object. `wire` keeps the encoded form that is forwarded
/// and hashed; `payload` is the content body and stays empty for interests.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Packet {
    kind: PacketKind,
    prefix: Prefix,
    fields: SuiteFields,
    payload: Bytes,
    wire: Bytes,
}

impl Packet {
    pub fn new(
        kind: PacketKind,
        prefix: Prefix,
        fields: SuiteFields,
        payload: Bytes,
        wire: Bytes,
    ) -> Result<Self> {
        if fields.suite() != prefix.suite() {
            return Err(RelayError::MalformedInput(format!(
                "{} fields on a {} name",
                fields.suite(),
                prefix.suite()
            )));
        }
        if wire.len() > MAX_PACKET_SIZE {
            return Err(RelayError::CapacityExceeded {
                what: "packet bytes",
                limit: MAX_PACKET_SIZE,
            });
        }
        Ok(Self {
            kind,
            prefix,
            fields,
            payload,
            wire,
        })
    }

    pub fn interest(prefix: Prefix, wire: impl Into<Bytes>) -> Result<Self> {
        let fields = SuiteFields::default_for(prefix.suite());
        Self::new(PacketKind::Interest, prefix, fields, Bytes::new(), wire.into())
    }

    pub fn content(
        prefix: Prefix,
        payload: impl Into<Bytes>,
        wire: impl Into<Bytes>,
    ) -> Result<Self> {
        let fields = SuiteFields::default_for(prefix.suite());
        Self::new(PacketKind::Content, prefix, fields, payload.into(), wire.into())
    }

    pub fn with_fields(self, fields: SuiteFields) -> Result<Self> {
        Self::new(self.kind, self.prefix, fields, self.payload, self.wire)
    }

    pub fn kind(&self) -> PacketKind {
        self.kind
    }

    pub fn is_interest(&self) -> bool {
        self.kind == PacketKind::Interest
    }

    pub fn prefix(&self) -> &Prefix {
        &self.prefix
    }

    pub fn suite(&self) -> Suite {
        self.prefix.suite()
    }

    pub fn fields(&self) -> &SuiteFields {
        &self.fields
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn wire(&self) -> &Bytes {
        &self.wire
    }

    pub fn nonce(&self) -> Option<&Bytes> {
        match &self.fields {
            SuiteFields::Ccnb { nonce, .. } | SuiteFields::Ndntlv { nonce, .. } => nonce.as_ref(),
            SuiteFields::Ccntlv => None,
        }
    }

    pub fn lifetime_ms(&self) -> Option<u64> {
        match &self.fields {
            SuiteFields::Ndntlv { lifetime_ms, .. } => *lifetime_ms,
            _ => None,
        }
    }

    /// Freshness period of content in a suite that tracks staleness.
    pub fn freshness_period_ms(&self) -> Option<u64> {
        match &self.fields {
            SuiteFields::Ndntlv {
                freshness_period_ms,
                ..
            } => Some(*freshness_period_ms),
            _ => None,
        }
    }

    pub fn must_be_fresh(&self) -> bool {
        matches!(
            self.fields,
            SuiteFields::Ndntlv {
                must_be_fresh: true,
                ..
            }
        )
    }

    /// Two interests are the same request if they name the same thing in the same suite with
    /// the same selectors.
    pub fn is_same_interest(&self, other: &Packet) -> bool {
        if self.suite() != other.suite() || !self.prefix.is_exact_match(&other.prefix) {
            return false;
        }
        match (&self.fields, &other.fields) {
            (
                SuiteFields::Ccnb {
                    min_suffix: a_min,
                    max_suffix: a_max,
                    ..
                },
                SuiteFields::Ccnb {
                    min_suffix: b_min,
                    max_suffix: b_max,
                    ..
                },
            )
            | (
                SuiteFields::Ndntlv {
                    min_suffix: a_min,
                    max_suffix: a_max,
                    ..
                },
                SuiteFields::Ndntlv {
                    min_suffix: b_min,
                    max_suffix: b_max,
                    ..
                },
            ) => a_min == b_min && a_max == b_max,
            _ => true,
        }
    }

    /// Whether `content` answers this interest. CCNx names must match exactly. CCNB and NDN
    /// first check the suffix bounds, then compare exactly with the content's digest appended
    /// when the interest carries exactly one more component. The digest is only requested
    /// when needed.
    pub fn is_satisfied_by<D>(&self, content: &Packet, digest: &mut D) -> bool
    where
        D: FnMut() -> [u8; DIGEST_LEN],
    {
        if self.suite() != content.suite() {
            return false;
        }
        let (min_suffix, max_suffix) = match &self.fields {
            SuiteFields::Ccntlv => return content.prefix.is_exact_match(&self.prefix),
            SuiteFields::Ccnb {
                min_suffix,
                max_suffix,
                ..
            }
            | SuiteFields::Ndntlv {
                min_suffix,
                max_suffix,
                ..
            } => (*min_suffix, *max_suffix),
        };

        let wanted = self.prefix.component_count() as u64;
        let offered = content.prefix.component_count() as u64 + 1;
        if wanted.saturating_add(min_suffix) > offered
            || wanted.saturating_add(max_suffix) < offered
        {
            return false;
        }

        if self.prefix.component_count() == content.prefix.component_count() + 1 {
            let digest = digest();
            content
                .prefix
                .compare(Some(&digest), &self.prefix, MatchMode::Exact)
                == 0
        } else {
            content.prefix.is_exact_match(&self.prefix)
        }
    }
}

/// Translates between wire bytes and packets. Implemented outside the relay core.
pub trait Codec {
    fn decode(&mut self, bytes: &[u8]) -> Result<Packet>;
    fn encode(&mut self, packet: &Packet) -> Result<Bytes>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ndn(uri: &str) -> Prefix {
        Prefix::from_uri(Suite::Ndntlv, uri).unwrap()
    }

    fn never() -> [u8; DIGEST_LEN] {
        panic!("digest should not be computed")
    }

    #[test]
    fn test_suite_mismatch_is_rejected() {
        let packet = Packet::interest(ndn("/a"), &b"i"[..]).unwrap();
        assert!(matches!(
            packet.with_fields(SuiteFields::Ccntlv),
            Err(RelayError::MalformedInput(_))
        ));
    }

    #[test]
    fn test_oversized_packet_is_rejected() {
        let wire = vec![0u8; MAX_PACKET_SIZE + 1];
        assert_eq!(
            Packet::content(ndn("/a"), Bytes::new(), wire),
            Err(RelayError::CapacityExceeded {
                what: "packet bytes",
                limit: MAX_PACKET_SIZE
            })
        );
    }

    #[test]
    fn test_exact_name_satisfies() {
        let interest = Packet::interest(ndn("/x/y"), &b"i"[..]).unwrap();
        let content = Packet::content(ndn("/x/y"), &b"p"[..], &b"c"[..]).unwrap();
        assert!(interest.is_satisfied_by(&content, &mut never));

        let other = Packet::content(ndn("/x/z"), &b"p"[..], &b"c"[..]).unwrap();
        assert!(!interest.is_satisfied_by(&other, &mut never));
    }

    #[test]
    fn test_digest_component_satisfies() {
        let digest = [9u8; DIGEST_LEN];
        let mut name = ndn("/x");
        name.append_component(&digest).unwrap();
        let interest = Packet::interest(name, &b"i"[..]).unwrap();
        let content = Packet::content(ndn("/x"), &b"p"[..], &b"c"[..]).unwrap();

        let mut computed = 0;
        assert!(interest.is_satisfied_by(&content, &mut || {
            computed += 1;
            digest
        }));
        assert_eq!(computed, 1);
        assert!(!interest.is_satisfied_by(&content, &mut || [0u8; DIGEST_LEN]));
    }

    #[test]
    fn test_suffix_bounds() {
        let content = Packet::content(ndn("/x/y"), &b"p"[..], &b"c"[..]).unwrap();
        // Requiring at least two more components than the interest has cannot be met by
        // an exact name.
        let interest = Packet::interest(ndn("/x/y"), &b"i"[..])
            .unwrap()
            .with_fields(SuiteFields::Ndntlv {
                min_suffix: 2,
                max_suffix: 4,
                nonce: None,
                must_be_fresh: false,
                lifetime_ms: None,
                freshness_period_ms: 0,
            })
            .unwrap();
        assert!(!interest.is_satisfied_by(&content, &mut never));
    }

    #[test]
    fn test_ccntlv_is_exact_only() {
        let name = Prefix::from_uri(Suite::Ccntlv, "/x").unwrap();
        let mut longer = name.clone();
        longer.append_component(&[1u8; DIGEST_LEN]).unwrap();
        let interest = Packet::interest(longer, &b"i"[..]).unwrap();
        let content = Packet::content(name.clone(), &b"p"[..], &b"c"[..]).unwrap();
        assert!(!interest.is_satisfied_by(&content, &mut never));

        let interest = Packet::interest(name, &b"i"[..]).unwrap();
        assert!(interest.is_satisfied_by(&content, &mut never));
    }

    #[test]
    fn test_same_interest_compares_selectors() {
        let a = Packet::interest(ndn("/a"), &b"1"[..]).unwrap();
        let b = Packet::interest(ndn("/a"), &b"2"[..]).unwrap();
        assert!(a.is_same_interest(&b));

        let c = b
            .clone()
            .with_fields(SuiteFields::Ndntlv {
                min_suffix: 0,
                max_suffix: 3,
                nonce: None,
                must_be_fresh: false,
                lifetime_ms: None,
                freshness_period_ms: 0,
            })
            .unwrap();
        assert!(!a.is_same_interest(&c));

        let ccnb = Packet::interest(Prefix::from_uri(Suite::Ccnb, "/a").unwrap(), &b"1"[..])
            .unwrap();
        assert!(!a.is_same_interest(&ccnb));
    }
}

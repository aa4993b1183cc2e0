use core::cmp::Ordering;
use core::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{RelayError, Result};
use crate::hash::DIGEST_LEN;

pub const MAX_NAME_COMPONENTS: usize = 64;
pub const MAX_PREFIX_SIZE: usize = 2048;

/// Wire encoding family a packet (and its name) belongs to.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Suite {
    Ccnb,
    Ccntlv,
    Ndntlv,
}

impl Suite {
    pub fn default_port(&self) -> u16 {
        match self {
            Suite::Ccnb | Suite::Ccntlv => 9695,
            Suite::Ndntlv => 6363,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Suite::Ccnb => "ccnb",
            Suite::Ccntlv => "ccnx2015",
            Suite::Ndntlv => "ndn2013",
        }
    }
}

impl fmt::Display for Suite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One opaque name component.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Component(Box<[u8]>);

impl Component {
    pub fn new(bytes: &[u8]) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&[u8]> for Component {
    fn from(bytes: &[u8]) -> Self {
        Self::new(bytes)
    }
}

impl From<&str> for Component {
    fn from(s: &str) -> Self {
        Self::new(s.as_bytes())
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MatchMode {
    /// Full equality. Yields 0 on a match and -1 otherwise.
    Exact,
    /// Leading components in common, starting from the first.
    Match,
    /// Same count as `Match`; used for routing lookups.
    Longest,
}

/// A hierarchical name: an ordered list of components plus an optional chunk number.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Prefix {
    suite: Suite,
    components: Vec<Component>,
    chunk_number: Option<u32>,
}

impl Prefix {
    pub fn new(suite: Suite) -> Self {
        Self {
            suite,
            components: Vec::new(),
            chunk_number: None,
        }
    }

    pub fn from_components<'c, I>(suite: Suite, components: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'c [u8]>,
    {
        let mut prefix = Self::new(suite);
        for component in components {
            prefix.append_component(component)?;
        }
        Ok(prefix)
    }

    /// Parses a `/`-separated path. `%XY` sequences are unescaped; a lone `%` stays literal.
    /// Empty segments between two slashes produce empty components, a trailing slash does not.
    pub fn from_uri(suite: Suite, uri: &str) -> Result<Self> {
        let mut prefix = Self::new(suite);
        let path = uri.strip_prefix('/').unwrap_or(uri);
        if path.is_empty() {
            return Ok(prefix);
        }
        let path = path.strip_suffix('/').unwrap_or(path);
        for segment in path.split('/') {
            prefix.append_component(&unescape(segment.as_bytes()))?;
        }
        Ok(prefix)
    }

    pub fn suite(&self) -> Suite {
        self.suite
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    pub fn component(&self, index: usize) -> Option<&Component> {
        self.components.get(index)
    }

    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    pub fn chunk_number(&self) -> Option<u32> {
        self.chunk_number
    }

    /// Sum of the component lengths.
    pub fn encoded_len(&self) -> usize {
        self.components.iter().map(Component::len).sum()
    }

    pub fn append_component(&mut self, bytes: &[u8]) -> Result<()> {
        if self.components.len() >= MAX_NAME_COMPONENTS {
            return Err(RelayError::CapacityExceeded {
                what: "name components",
                limit: MAX_NAME_COMPONENTS,
            });
        }
        if self.encoded_len() + bytes.len() > MAX_PREFIX_SIZE {
            return Err(RelayError::CapacityExceeded {
                what: "prefix bytes",
                limit: MAX_PREFIX_SIZE,
            });
        }
        self.components.push(Component::new(bytes));
        Ok(())
    }

    /// Appends `chunk` as a trailing component in the suite's segment encoding and records it as
    /// the chunk number. NDN marks the segment with a leading zero byte; CCNx uses the bare
    /// big-endian value.
    pub fn append_chunk_number(&mut self, chunk: u32) -> Result<()> {
        let be = chunk.to_be_bytes();
        let skip = be.iter().take_while(|b| **b == 0).count().min(be.len() - 1);
        let value = &be[skip..];

        let mut component = Vec::with_capacity(value.len() + 1);
        match self.suite {
            Suite::Ndntlv => {
                component.push(0x00);
                component.extend_from_slice(value);
            }
            Suite::Ccntlv => component.extend_from_slice(value),
            Suite::Ccnb => return Err(RelayError::UnsupportedSuite(self.suite)),
        }
        self.append_component(&component)?;
        self.chunk_number = Some(chunk);
        Ok(())
    }

    pub fn with_chunk_number(mut self, chunk: u32) -> Result<Self> {
        self.append_chunk_number(chunk)?;
        Ok(self)
    }

    /// Compares `self`, optionally extended with `digest` as a synthetic final component,
    /// against `target`. The suites of the two names are not considered.
    ///
    /// In `Exact` mode the result is 0 on equality and -1 otherwise. Equality requires the
    /// same effective component count, identical components and identical chunk numbers.
    /// Other modes return the number of leading components that match and never return -1.
    pub fn compare(
        &self,
        digest: Option<&[u8; DIGEST_LEN]>,
        target: &Prefix,
        mode: MatchMode,
    ) -> i32 {
        let effective = self.components.len() + usize::from(digest.is_some());

        if mode == MatchMode::Exact {
            if effective != target.components.len() || self.chunk_number != target.chunk_number {
                return -1;
            }
        }

        let mut matched = 0;
        while matched < effective && matched < target.components.len() {
            let ours: &[u8] = match (self.components.get(matched), digest) {
                (Some(component), _) => component.as_bytes(),
                (None, Some(digest)) => &digest[..],
                (None, None) => break,
            };
            if ours != target.components[matched].as_bytes() {
                break;
            }
            matched += 1;
        }

        match mode {
            MatchMode::Exact if matched == effective => 0,
            MatchMode::Exact => -1,
            MatchMode::Match | MatchMode::Longest => matched as i32,
        }
    }

    pub fn is_exact_match(&self, target: &Prefix) -> bool {
        self.compare(None, target, MatchMode::Exact) == 0
    }

    /// True if every component of `self` is a leading component of `name`.
    pub fn is_prefix_of(&self, name: &Prefix) -> bool {
        self.compare(None, name, MatchMode::Longest) as usize == self.components.len()
    }

    /// Renders the name into `buf` as `/c1/c2/...`, returning the number of bytes written.
    /// Control bytes, DEL and non-ASCII bytes are written as `%XX`; so is `/` when
    /// `escape_separator` is set. Fails without partial guarantees if `buf` is too small.
    pub fn write_path(&self, buf: &mut [u8], escape_separator: bool) -> Result<usize> {
        let mut writer = BoundedWriter { buf, len: 0 };
        for component in &self.components {
            writer.push(b'/')?;
            for &byte in component.as_bytes() {
                if needs_escape(byte, escape_separator) {
                    let [hi, lo] = hex_pair(byte);
                    writer.push(b'%')?;
                    writer.push(hi)?;
                    writer.push(lo)?;
                } else {
                    writer.push(byte)?;
                }
            }
        }
        Ok(writer.len)
    }

    /// Renders the path into a string. Every byte escapes to at most three characters.
    pub fn to_path(&self) -> Result<String> {
        let mut buf = vec![0u8; 3 * self.encoded_len() + self.component_count()];
        let len = self.write_path(&mut buf, false)?;
        buf.truncate(len);
        // Only ASCII is ever written.
        String::from_utf8(buf).map_err(|e| RelayError::MalformedInput(e.to_string()))
    }
}

impl Ord for Prefix {
    fn cmp(&self, other: &Self) -> Ordering {
        self.components
            .cmp(&other.components)
            .then_with(|| self.chunk_number.cmp(&other.chunk_number))
            .then_with(|| self.suite.as_str().cmp(other.suite.as_str()))
    }
}

impl PartialOrd for Prefix {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for component in &self.components {
            f.write_str("/")?;
            for &byte in component.as_bytes() {
                if needs_escape(byte, false) {
                    write!(f, "%{:02x}", byte)?;
                } else {
                    write!(f, "{}", byte as char)?;
                }
            }
        }
        if let Some(chunk) = self.chunk_number {
            write!(f, " [chunk {}]", chunk)?;
        }
        Ok(())
    }
}

struct BoundedWriter<'b> {
    buf: &'b mut [u8],
    len: usize,
}

impl BoundedWriter<'_> {
    fn push(&mut self, byte: u8) -> Result<()> {
        let capacity = self.buf.len();
        let slot = self
            .buf
            .get_mut(self.len)
            .ok_or(RelayError::BufferTooSmall { capacity })?;
        *slot = byte;
        self.len += 1;
        Ok(())
    }
}

fn needs_escape(byte: u8, escape_separator: bool) -> bool {
    byte < 0x20 || byte >= 0x7f || (escape_separator && byte == b'/')
}

fn hex_pair(byte: u8) -> [u8; 2] {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    [HEX[usize::from(byte >> 4)], HEX[usize::from(byte & 0x0f)]]
}

fn hex_value(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

fn unescape(segment: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(segment.len());
    let mut i = 0;
    while i < segment.len() {
        if segment[i] == b'%' {
            if let (Some(hi), Some(lo)) = (
                segment.get(i + 1).copied().and_then(hex_value),
                segment.get(i + 2).copied().and_then(hex_value),
            ) {
                out.push(hi << 4 | lo);
                i += 3;
                continue;
            }
        }
        out.push(segment[i]);
        i += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(uri: &str) -> Prefix {
        Prefix::from_uri(Suite::Ndntlv, uri).unwrap()
    }

    #[test]
    fn test_from_uri() {
        let p = name("/a/bc/%2fd");
        assert_eq!(p.component_count(), 3);
        assert_eq!(p.component(1).unwrap().as_bytes(), b"bc");
        assert_eq!(p.component(2).unwrap().as_bytes(), b"/d");

        assert_eq!(name("/").component_count(), 0);
        assert_eq!(name("").component_count(), 0);
        assert_eq!(name("/a/").component_count(), 1);
        assert_eq!(name("/a//b").component(1).unwrap().as_bytes(), b"");
        assert_eq!(name("/100%").component(0).unwrap().as_bytes(), b"100%");
    }

    #[test]
    fn test_from_uri_rejects_too_many_components() {
        let uri = "/x".repeat(MAX_NAME_COMPONENTS + 1);
        assert_eq!(
            Prefix::from_uri(Suite::Ccntlv, &uri),
            Err(RelayError::CapacityExceeded {
                what: "name components",
                limit: MAX_NAME_COMPONENTS
            })
        );
        let uri = "/x".repeat(MAX_NAME_COMPONENTS);
        assert!(Prefix::from_uri(Suite::Ccntlv, &uri).is_ok());
    }

    #[test]
    fn test_compare_exact() {
        let p = name("/a/b");
        assert_eq!(p.compare(None, &p, MatchMode::Exact), 0);
        assert_eq!(p.compare(None, &name("/a/c"), MatchMode::Exact), -1);
        assert_eq!(p.compare(None, &name("/a"), MatchMode::Exact), -1);
        assert_eq!(p.compare(None, &name("/a/b/c"), MatchMode::Exact), -1);

        // Component bytes are compared, not just lengths.
        assert_eq!(name("/ab").compare(None, &name("/a"), MatchMode::Exact), -1);
    }

    #[test]
    fn test_compare_exact_chunks() {
        let plain = name("/a");
        let chunked = Prefix {
            chunk_number: Some(1),
            ..plain.clone()
        };
        assert_eq!(plain.compare(None, &chunked, MatchMode::Exact), -1);
        assert_eq!(chunked.compare(None, &chunked, MatchMode::Exact), 0);
        // Chunk presence does not matter outside of exact mode.
        assert_eq!(plain.compare(None, &chunked, MatchMode::Match), 1);
    }

    #[test]
    fn test_compare_longest_and_match() {
        let route = name("/a/b");
        assert_eq!(route.compare(None, &name("/a/b/c"), MatchMode::Longest), 2);
        assert_eq!(route.compare(None, &name("/a/x"), MatchMode::Longest), 1);
        assert_eq!(route.compare(None, &name("/x"), MatchMode::Match), 0);
        assert_eq!(Prefix::new(Suite::Ndntlv).compare(None, &route, MatchMode::Longest), 0);
        assert!(route.is_prefix_of(&name("/a/b/c")));
        assert!(!route.is_prefix_of(&name("/a/x")));
    }

    #[test]
    fn test_compare_with_digest() {
        let digest = [7u8; DIGEST_LEN];
        let content = name("/a");
        let mut interest = name("/a");
        interest.append_component(&digest).unwrap();

        assert_eq!(content.compare(Some(&digest), &interest, MatchMode::Exact), 0);
        assert_eq!(content.compare(None, &interest, MatchMode::Exact), -1);
        assert_eq!(
            content.compare(Some(&[8u8; DIGEST_LEN]), &interest, MatchMode::Exact),
            -1
        );
        assert_eq!(content.compare(Some(&digest), &interest, MatchMode::Longest), 2);
    }

    #[test]
    fn test_append_chunk_number() {
        let mut ndn = name("/v");
        ndn.append_chunk_number(0x0102).unwrap();
        assert_eq!(ndn.component(1).unwrap().as_bytes(), &[0x00, 0x01, 0x02]);
        assert_eq!(ndn.chunk_number(), Some(0x0102));

        let mut ndn_zero = name("/v");
        ndn_zero.append_chunk_number(0).unwrap();
        assert_eq!(ndn_zero.component(1).unwrap().as_bytes(), &[0x00, 0x00]);

        let mut ccnx = Prefix::from_uri(Suite::Ccntlv, "/v").unwrap();
        ccnx.append_chunk_number(7).unwrap();
        assert_eq!(ccnx.component(1).unwrap().as_bytes(), &[0x07]);

        let mut ccnb = Prefix::from_uri(Suite::Ccnb, "/v").unwrap();
        assert_eq!(
            ccnb.append_chunk_number(1),
            Err(RelayError::UnsupportedSuite(Suite::Ccnb))
        );
        assert_eq!(ccnb.component_count(), 1);
        assert_eq!(ccnb.chunk_number(), None);
    }

    #[test]
    fn test_write_path_escapes() {
        let p = Prefix::from_components(Suite::Ccnb, [&b"a/b"[..], &[0x01, b'z'][..]]).unwrap();
        let mut buf = [0u8; 64];

        let len = p.write_path(&mut buf, false).unwrap();
        assert_eq!(&buf[..len], b"/a/b/%01z");

        let len = p.write_path(&mut buf, true).unwrap();
        assert_eq!(&buf[..len], b"/a%2fb/%01z");

        assert_eq!(p.to_string(), "/a/b/%01z");
        assert_eq!(p.to_path().unwrap(), "/a/b/%01z");
    }

    #[test]
    fn test_write_path_never_overflows() {
        let p = name("/abcdef");
        let mut small = [0u8; 4];
        assert_eq!(
            p.write_path(&mut small, false),
            Err(RelayError::BufferTooSmall { capacity: 4 })
        );
        let mut exact = [0u8; 7];
        assert_eq!(p.write_path(&mut exact, false), Ok(7));
    }

    #[test]
    fn test_to_path_renders_fully_escaped_names() {
        let component = [0xffu8; 32];
        let p = Prefix::from_components(Suite::Ndntlv, (0..64).map(|_| &component[..])).unwrap();
        assert_eq!(p.encoded_len(), 2048);

        let path = p.to_path().unwrap();
        assert_eq!(path.len(), 64 * (1 + 3 * 32));
        assert!(path.starts_with("/%ff%ff"));
    }

    #[test]
    fn test_ordering_is_component_wise() {
        assert!(name("/a") < name("/a/b"));
        assert!(name("/a/b") < name("/b"));
        assert!(name("/a") < name("/ab"));
    }
}

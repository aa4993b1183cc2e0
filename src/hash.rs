/// Length of a content digest, in bytes.
pub const DIGEST_LEN: usize = 32;

pub trait Hasher {
    type Digest;
    fn reset(&mut self);
    fn update(&mut self, input: &[u8]);
    fn finalize_reset(&mut self) -> Self::Digest;
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct Sha256Digest(pub [u8; DIGEST_LEN]);

/// Hashes `wire` in one go. Used to derive the implicit digest component of a content object.
pub fn digest_of<H>(hasher: &mut H, wire: &[u8]) -> [u8; DIGEST_LEN]
where
    H: Hasher<Digest = Sha256Digest>,
{
    hasher.reset();
    hasher.update(wire);
    hasher.finalize_reset().0
}

#[cfg(feature = "sha2")]
pub mod sha {
    use sha2::{Digest, Sha256};

    use super::{Hasher, Sha256Digest};

    pub struct Sha256Hasher {
        inner: Sha256,
    }

    impl Sha256Hasher {
        pub fn new() -> Self {
            Self {
                inner: Sha256::new(),
            }
        }
    }

    impl Default for Sha256Hasher {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Hasher for Sha256Hasher {
        type Digest = Sha256Digest;

        fn reset(&mut self) {
            Digest::reset(&mut self.inner);
        }

        fn update(&mut self, input: &[u8]) {
            Digest::update(&mut self.inner, input);
        }

        fn finalize_reset(&mut self) -> Self::Digest {
            Sha256Digest(self.inner.finalize_reset().into())
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::hash::digest_of;

        #[test]
        fn test_sha256_known_vector() {
            let mut hasher = Sha256Hasher::new();
            let digest = digest_of(&mut hasher, b"abc");
            assert_eq!(
                digest[..8],
                [0xba, 0x78, 0x16, 0xbf, 0x8f, 0x01, 0xcf, 0xea]
            );
            assert_eq!(
                digest[24..],
                [0xb4, 0x10, 0xff, 0x61, 0xf2, 0x00, 0x15, 0xad]
            );
        }

        #[test]
        fn test_hasher_is_reusable() {
            let mut hasher = Sha256Hasher::new();
            hasher.update(b"garbage");
            let a = digest_of(&mut hasher, b"abc");
            let b = digest_of(&mut hasher, b"abc");
            assert_eq!(a, b);
        }
    }
}

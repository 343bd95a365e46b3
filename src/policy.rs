//! Key hashing and equality policies for the duplicate table
//!
//! One policy is chosen per run and handed to the table. The policy turns a
//! [`Signature`] into a [`TableKey`]; the key *is* the policy's hash, and two
//! signatures are equal under the policy exactly when their keys are equal.
//!
//! - [`KeyPolicy::Identity`]: the typed signature itself, exact field
//!   equality, no precision loss.
//! - [`KeyPolicy::Compact`]: the packed bit pattern (two 64-bit words).
//!   Fields that overflow their packed width are masked, so distinct
//!   footprints may share a key. Such keys are flagged as truncated.
//! - [`KeyPolicy::Digest`]: a 256-bit BLAKE3 digest of the full unpacked
//!   signature. Fixed-size entries at the price of accepting digest
//!   collisions: two distinct footprints with the same digest share one
//!   table entry and the loser is dropped without a warning.

use std::fmt;

use clap::ValueEnum;

use crate::signature::Signature;

/// Run-selected hashing/equality policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum KeyPolicy {
    /// Exact typed fields (two-word unpacked form)
    #[default]
    Identity,
    /// Packed bit pattern with bounded field widths
    Compact,
    /// BLAKE3 digest over the full signature
    Digest,
}

/// Key stored in the duplicate table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableKey {
    Fields(Signature),
    Packed(u128),
    Digest([u8; 32]),
}

/// A key together with whether it lost precision on the way
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyedSignature {
    pub key: TableKey,
    pub truncated: bool,
}

impl KeyPolicy {
    /// Compute the table key of a signature under this policy.
    #[inline]
    pub fn key(&self, sig: &Signature) -> KeyedSignature {
        match self {
            KeyPolicy::Identity => KeyedSignature {
                key: TableKey::Fields(*sig),
                truncated: false,
            },
            KeyPolicy::Compact => {
                let packed = sig.pack();
                KeyedSignature {
                    key: TableKey::Packed(packed.bits),
                    truncated: packed.truncated,
                }
            }
            KeyPolicy::Digest => KeyedSignature {
                key: TableKey::Digest(digest(sig)),
                truncated: false,
            },
        }
    }

    /// Equality of two signatures as seen by this policy
    #[inline]
    pub fn equal(&self, a: &Signature, b: &Signature) -> bool {
        self.key(a).key == self.key(b).key
    }
}

impl fmt::Display for KeyPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            KeyPolicy::Identity => "identity",
            KeyPolicy::Compact => "compact",
            KeyPolicy::Digest => "digest",
        };
        f.write_str(name)
    }
}

/// BLAKE3 over the little-endian encoding of every signature field
fn digest(sig: &Signature) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    for fp in [&sig.primary, &sig.mate] {
        hasher.update(&fp.chrom.to_le_bytes());
        hasher.update(&fp.start.to_le_bytes());
        hasher.update(&fp.len.to_le_bytes());
    }
    *hasher.finalize().as_bytes()
}

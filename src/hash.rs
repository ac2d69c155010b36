//! Romulus-H, a 256-bit hash function built from Skinny-128-384+ in a
//! double-block-length (DBL) compression construction.
//!
//! See section 2.4.6 of the Romulus specification.
//! <https://csrc.nist.gov/CSRC/media/Projects/lightweight-cryptography/documents/finalist-round/updated-spec-doc/romulus-spec-final.pdf>

use tracing::instrument;

use crate::skinny;

/// The compression function `CF(L, R, M)`, consuming a 32-byte message
/// block into the two 16-byte chaining halves `L`/`R`.
///
/// Two TBC calls are made: the first with `L` as the block and `R || M` as
/// the tweakey, the second identical but with `L[0]` toggled. Their outputs,
/// xored against the respective `L` values, become the new `L'`/`R'`.
pub fn compress(l: &mut [u8; 16], r: &mut [u8; 16], msg: &[u8; 32]) {
    let mut tweakey = [0u8; 48];
    tweakey[0..16].copy_from_slice(r);
    tweakey[16..48].copy_from_slice(msg);

    let a = skinny::tbc(*l, &tweakey);
    let mut l_prime = [0u8; 16];
    for i in 0..16 {
        l_prime[i] = a[i] ^ l[i];
    }

    l[0] ^= 0b0000_0001;

    let b = skinny::tbc(*l, &tweakey);
    for i in 0..16 {
        r[i] = b[i] ^ l[i];
    }

    *l = l_prime;
}

/// Hash `msg` to a 32-byte digest `L || R`.
///
/// The message is consumed 32 bytes at a time; the final (possibly empty or
/// partial) block is zero-padded with its unpadded byte count written to
/// its last byte, and `L[0]` is toggled before it is compressed.
#[instrument(skip_all, fields(len = msg.len()))]
pub fn hash(msg: &[u8]) -> [u8; 32] {
    let mut l = [0u8; 16];
    let mut r = [0u8; 16];

    let full_blocks = msg.len() / 32;
    let rem = msg.len() % 32;

    for i in 0..full_blocks {
        let block: [u8; 32] = msg[i * 32..i * 32 + 32].try_into().unwrap();
        compress(&mut l, &mut r, &block);
    }

    let mut last = [0u8; 32];
    let off = full_blocks * 32;
    last[..rem].copy_from_slice(&msg[off..off + rem]);
    last[31] = rem as u8;

    l[0] ^= 0b0000_0010;
    compress(&mut l, &mut r, &last);

    let mut digest = [0u8; 32];
    digest[..16].copy_from_slice(&l);
    digest[16..].copy_from_slice(&r);
    digest
}

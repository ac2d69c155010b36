//! Romulus-T, leakage-resistant authenticated encryption.
//!
//! Encryption derives its keystream through repeated TBC calls keyed by an
//! evolving secret state, rather than reusing a single key schedule across
//! the whole message; this bounds what a side-channel leak from any single
//! block cipher call can reveal about the key. Authentication runs
//! Romulus-H's compression function over `AD ‖ C ‖ nonce ‖ counter`.
//!
//! See section 2.4.7 of the Romulus specification.
//! <https://csrc.nist.gov/CSRC/media/Projects/lightweight-cryptography/documents/finalist-round/updated-spec-doc/romulus-spec-final.pdf>

use subtle::ConstantTimeEq;
use tracing::instrument;
use zeroize::Zeroizing;

use crate::common::{self, Lfsr};
use crate::hash;
use crate::skinny;
use crate::{Error, Result};

const ZERO16: [u8; 16] = [0u8; 16];
const ZERO7: [u8; 7] = [0u8; 7];

/// Extract the `idx`-th 32-byte block of
/// `pad16(ad) ‖ pad16(cipher) ‖ nonce ‖ lfsr`.
fn get_auth_block(ad: &[u8], cipher: &[u8], nonce: &[u8; 16], lfsr: &[u8; 7], idx: usize) -> [u8; 32] {
    let mut blk = [0u8; 32];

    let ad_rem = ad.len() % 16;
    let ct_rem = cipher.len() % 16;

    let flg0 = !ad.is_empty();
    let flg1 = !cipher.is_empty();

    let padded_dlen = ad.len() + if flg0 { 16 - ad_rem } else { 0 };
    let padded_ctlen = cipher.len() + if flg1 { 16 - ct_rem } else { 0 };

    let tmp4 = padded_dlen + padded_ctlen;
    let tmp5 = tmp4 + 16;
    let padded_authlen = tmp5 + 7;

    let mut off = idx * 32;
    let mut boff = 0usize;

    if off < padded_dlen {
        let read = ad.len().saturating_sub(off).min(32);
        blk[boff..boff + read].copy_from_slice(&ad[off..off + read]);
        if read < 16 {
            blk[15] = read as u8;
        }
        if read > 16 && read < 32 {
            blk[31] = (read & 15) as u8;
        }

        let read_ = (padded_dlen - off).min(32);
        off += read_;
        boff += read_;
    }

    let flg2 = off >= padded_dlen;
    let flg3 = off < tmp4;
    if boff < 32 && flg2 && flg3 {
        let ctoff = off - padded_dlen;
        let read = cipher.len().saturating_sub(ctoff).min(32);
        blk[boff..boff + read].copy_from_slice(&cipher[ctoff..ctoff + read]);
        if read < 16 {
            blk[15] = read as u8;
        }
        if read > 16 && read < 32 {
            blk[31] = (read & 15) as u8;
        }

        let read_ = (padded_ctlen - ctoff).min(32);
        off += read_;
        boff += read_;
    }

    let flg4 = off >= tmp4;
    let flg5 = off < tmp5;
    if boff < 32 && flg4 && flg5 {
        blk[boff..boff + 16].copy_from_slice(nonce);
        off += 16;
        boff += 16;
    }

    let flg6 = off >= tmp5;
    let flg7 = off < padded_authlen;
    if boff < 32 && flg6 && flg7 {
        blk[boff..boff + 7].copy_from_slice(lfsr);
        off += 7;
        boff += 7;
    }

    if boff < 32 {
        blk[31] = boff as u8;
    }

    blk
}

/// XOR `src` with the Romulus-T keystream derived from `key`/`nonce`,
/// writing the result into `dst`. Since this is a stream cipher the same
/// operation serves both encryption and decryption.
fn keystream_xor(key: &[u8; 16], nonce: &[u8; 16], src: &[u8], dst: &mut [u8]) {
    if src.is_empty() {
        return;
    }

    let tweakey0 = common::encode(key, &ZERO16, &ZERO7, 0x42);
    let mut s = Zeroizing::new(skinny::tbc(*nonce, &tweakey0));

    let mut lfsr = Lfsr::new();
    let tot_blk_cnt = src.len().div_ceil(16);

    let mut off = 0usize;
    for i in 0..tot_blk_cnt {
        let tweakey_k = common::encode(&s, &ZERO16, &lfsr.bytes(), 0x40);
        let k_i = skinny::tbc(*nonce, &tweakey_k);

        let this_len = (src.len() - off).min(16);
        for j in 0..this_len {
            dst[off + j] = src[off + j] ^ k_i[j];
        }

        if i + 1 < tot_blk_cnt {
            let tweakey_s = common::encode(&s, &ZERO16, &lfsr.bytes(), 0x41);
            *s = skinny::tbc(*nonce, &tweakey_s);
        }

        lfsr.step();
        off += this_len;
    }
}

/// Derive the authentication tag over `(ad, cipher)` under `key`/`nonce`.
fn compute_tag(key: &[u8; 16], nonce: &[u8; 16], ad: &[u8], cipher: &[u8]) -> [u8; 16] {
    let tot_ct_blk = cipher.len().div_ceil(16);

    let mut lfsr = Lfsr::new();
    for _ in 0..tot_ct_blk {
        lfsr.step();
    }

    let ad_rem = ad.len() % 16;
    let ct_rem = cipher.len() % 16;
    let flg0 = !ad.is_empty();
    let flg1 = !cipher.is_empty();
    let padded_dlen = ad.len() + if flg0 { 16 - ad_rem } else { 0 };
    let padded_ctlen = cipher.len() + if flg1 { 16 - ct_rem } else { 0 };
    let padded_authlen = padded_dlen + padded_ctlen + 16 + 7;

    let blk_cnt = padded_authlen.div_ceil(32);

    let mut l = [0u8; 16];
    let mut r = [0u8; 16];

    for i in 0..blk_cnt {
        let block = get_auth_block(ad, cipher, nonce, &lfsr.bytes(), i);
        if i + 1 == blk_cnt {
            l[0] ^= 0b0000_0010;
        }
        hash::compress(&mut l, &mut r, &block);
    }

    let tweakey = common::encode(key, &r, &ZERO7, 0x44);
    skinny::tbc(l, &tweakey)
}

/// Encrypt `plaintext` under `key`/`nonce` with associated data `ad`,
/// writing the ciphertext into `ciphertext` and returning the tag.
#[instrument(skip_all, fields(ad_len = ad.len(), msg_len = plaintext.len()))]
pub fn encrypt(
    key: &[u8; 16],
    nonce: &[u8; 16],
    ad: &[u8],
    plaintext: &[u8],
    ciphertext: &mut [u8],
) -> [u8; 16] {
    assert_eq!(plaintext.len(), ciphertext.len());

    keystream_xor(key, nonce, plaintext, ciphertext);
    compute_tag(key, nonce, ad, ciphertext)
}

/// Decrypt `ciphertext` under `key`/`nonce` with associated data `ad`,
/// verifying `tag`. The tag is recomputed directly from the provided
/// ciphertext before any plaintext is recovered, so a forged tag never
/// causes even a single keystream block to be produced.
#[instrument(skip_all, fields(ad_len = ad.len(), msg_len = ciphertext.len()))]
pub fn decrypt(
    key: &[u8; 16],
    nonce: &[u8; 16],
    tag: &[u8; 16],
    ad: &[u8],
    ciphertext: &[u8],
    plaintext: &mut [u8],
) -> Result<()> {
    assert_eq!(ciphertext.len(), plaintext.len());

    let tag_prime = compute_tag(key, nonce, ad, ciphertext);

    if !bool::from(tag.as_slice().ct_eq(tag_prime.as_slice())) {
        plaintext.fill(0);
        return Err(Error::TagMismatch);
    }

    keystream_xor(key, nonce, ciphertext, plaintext);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_with_nonempty_ad_and_message() {
        let key = [0x11u8; 16];
        let nonce = [0x22u8; 16];
        let ad = b"romulus-t associated data";
        let msg = b"leakage-resistant authenticated encryption scheme";

        let mut ct = vec![0u8; msg.len()];
        let tag = encrypt(&key, &nonce, ad, msg, &mut ct);

        let mut pt = vec![0u8; ct.len()];
        decrypt(&key, &nonce, &tag, ad, &ct, &mut pt).unwrap();
        assert_eq!(&pt, msg);
    }

    #[test]
    fn round_trips_with_empty_ad_and_message() {
        let key = [0u8; 16];
        let nonce = [0u8; 16];

        let mut ct: [u8; 0] = [];
        let tag = encrypt(&key, &nonce, &[], &[], &mut ct);

        let mut pt: [u8; 0] = [];
        decrypt(&key, &nonce, &tag, &[], &ct, &mut pt).unwrap();
    }

    #[test]
    fn tampered_tag_is_rejected_without_ever_decrypting() {
        let key = [3u8; 16];
        let nonce = [4u8; 16];
        let msg = [5u8; 20];
        let ad = [6u8; 10];

        let mut ct = vec![0u8; msg.len()];
        let mut tag = encrypt(&key, &nonce, &ad, &msg, &mut ct);
        tag[0] ^= 1;

        let mut pt = vec![0xffu8; msg.len()];
        let err = decrypt(&key, &nonce, &tag, &ad, &ct, &mut pt).unwrap_err();
        assert_eq!(err, Error::TagMismatch);
        assert!(pt.iter().all(|&b| b == 0));
    }

    #[test]
    fn tampered_ciphertext_is_rejected() {
        let key = [7u8; 16];
        let nonce = [8u8; 16];
        let msg = [9u8; 33];
        let ad = [1u8; 5];

        let mut ct = vec![0u8; msg.len()];
        let tag = encrypt(&key, &nonce, &ad, &msg, &mut ct);
        ct[0] ^= 1;

        let mut pt = vec![0u8; msg.len()];
        assert!(decrypt(&key, &nonce, &tag, &ad, &ct, &mut pt).is_err());
    }

    #[test]
    fn exercises_every_block_length_boundary() {
        let key = [0x42u8; 16];
        let nonce = [0x24u8; 16];

        for len in [0usize, 1, 15, 16, 17, 31, 32, 33] {
            let msg = vec![len as u8; len];
            let ad = vec![0xaa; len];

            let mut ct = vec![0u8; len];
            let tag = encrypt(&key, &nonce, &ad, &msg, &mut ct);

            let mut pt = vec![0u8; len];
            decrypt(&key, &nonce, &tag, &ad, &ct, &mut pt).unwrap();
            assert_eq!(pt, msg, "length {len} failed to round-trip");
        }
    }

    #[test]
    fn different_nonces_give_different_ciphertext_and_tag() {
        let key = [1u8; 16];
        let msg = [2u8; 16];

        let mut ct_a = vec![0u8; msg.len()];
        let tag_a = encrypt(&key, &[0u8; 16], b"ad", &msg, &mut ct_a);

        let mut ct_b = vec![0u8; msg.len()];
        let tag_b = encrypt(&key, &[1u8; 16], b"ad", &msg, &mut ct_b);

        assert_ne!(ct_a, ct_b);
        assert_ne!(tag_a, tag_b);
    }
}

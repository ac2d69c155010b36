//! Romulus-N, nonce-based authenticated encryption with associated data.
//!
//! The nonce must never repeat under a given key; Romulus-M is the
//! misuse-resistant alternative when that cannot be guaranteed.
//!
//! See section 2.4.4 of the Romulus specification.
//! <https://csrc.nist.gov/CSRC/media/Projects/lightweight-cryptography/documents/finalist-round/updated-spec-doc/romulus-spec-final.pdf>

use subtle::ConstantTimeEq;
use tracing::instrument;
use zeroize::Zeroizing;

use crate::common::{self, Lfsr};
use crate::skinny;
use crate::{Error, Result};

fn absorb_ad(key: &[u8; 16], nonce: &[u8; 16], ad: &[u8]) -> [u8; 16] {
    let mut state = Zeroizing::new([0u8; 16]);
    let mut lfsr = Lfsr::new();

    let full_blk_cnt = ad.len() / 16;
    let rem = ad.len() % 16;
    let flg = ad.is_empty() || rem > 0;
    let tot_blk_cnt = full_blk_cnt + if flg { 1 } else { 0 };
    let half_blk_cnt = tot_blk_cnt / 2;

    let mut off = 0usize;

    for _ in 0..half_blk_cnt {
        let left: [u8; 16] = common::pad16(ad, off);
        common::rho(&mut state, &left);
        lfsr.step();

        off += 16;
        let right = common::pad16(ad, off);
        off += ad.len().saturating_sub(off).min(16);

        let tweakey = common::encode(key, &right, &lfsr.bytes(), 0x08);
        *state = skinny::tbc(*state, &tweakey);

        lfsr.step();
    }

    let last = common::pad16(ad, off);
    common::rho(&mut state, &last);

    if tot_blk_cnt > half_blk_cnt * 2 {
        lfsr.step();
    }

    let ds = if flg { 26 } else { 24 };
    let tweakey = common::encode(key, nonce, &lfsr.bytes(), ds);
    skinny::tbc(*state, &tweakey)
}

/// Encrypt `plaintext` under `key`/`nonce` with associated data `ad`,
/// writing the ciphertext into `ciphertext` (same length as `plaintext`)
/// and returning the 16-byte authentication tag.
#[instrument(skip_all, fields(ad_len = ad.len(), msg_len = plaintext.len()))]
pub fn encrypt(
    key: &[u8; 16],
    nonce: &[u8; 16],
    ad: &[u8],
    plaintext: &[u8],
    ciphertext: &mut [u8],
) -> [u8; 16] {
    assert_eq!(plaintext.len(), ciphertext.len());

    let mut state = Zeroizing::new(absorb_ad(key, nonce, ad));
    let mut lfsr = Lfsr::new();

    let full_blk_cnt = plaintext.len() / 16;
    let rem = plaintext.len() % 16;
    let flg = plaintext.is_empty() || rem > 0;
    let tot_blk_cnt = full_blk_cnt + if flg { 1 } else { 0 };

    let mut off = 0usize;

    for _ in 0..tot_blk_cnt.saturating_sub(1) {
        let block: [u8; 16] = plaintext[off..off + 16].try_into().unwrap();
        let c = common::rho(&mut state, &block);
        ciphertext[off..off + 16].copy_from_slice(&c);

        lfsr.step();
        let tweakey = common::encode(key, nonce, &lfsr.bytes(), 0x04);
        *state = skinny::tbc(*state, &tweakey);

        off += 16;
    }

    if tot_blk_cnt > 0 {
        let to_read = plaintext.len() - off;
        let last = common::pad16(plaintext, off);
        let c = common::rho(&mut state, &last);
        ciphertext[off..off + to_read].copy_from_slice(&c[..to_read]);

        lfsr.step();
        let ds = if flg { 21 } else { 20 };
        let tweakey = common::encode(key, nonce, &lfsr.bytes(), ds);
        *state = skinny::tbc(*state, &tweakey);
    }

    common::rho(&mut state, &[0u8; 16])
}

/// Decrypt `ciphertext` under `key`/`nonce` with associated data `ad`,
/// verifying `tag`. On success writes the recovered plaintext into
/// `plaintext` (same length as `ciphertext`); on failure zeroes `plaintext`
/// and returns [`Error::TagMismatch`].
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

    let mut state = Zeroizing::new(absorb_ad(key, nonce, ad));
    let mut lfsr = Lfsr::new();

    let full_blk_cnt = ciphertext.len() / 16;
    let rem = ciphertext.len() % 16;
    let flg = ciphertext.is_empty() || rem > 0;
    let tot_blk_cnt = full_blk_cnt + if flg { 1 } else { 0 };

    let mut off = 0usize;

    for _ in 0..tot_blk_cnt.saturating_sub(1) {
        let block: [u8; 16] = ciphertext[off..off + 16].try_into().unwrap();
        let m = common::rho_inv(&mut state, &block);
        plaintext[off..off + 16].copy_from_slice(&m);

        lfsr.step();
        let tweakey = common::encode(key, nonce, &lfsr.bytes(), 0x04);
        *state = skinny::tbc(*state, &tweakey);

        off += 16;
    }

    if tot_blk_cnt > 0 {
        let to_read = ciphertext.len() - off;

        let gs = common::g(&state);
        let mut state_prime = [0u8; 16];
        state_prime[to_read..].copy_from_slice(&gs[to_read..]);

        let mut last = common::pad16(ciphertext, off);
        for i in 0..16 {
            last[i] ^= state_prime[i];
        }

        let m = common::rho_inv(&mut state, &last);
        plaintext[off..off + to_read].copy_from_slice(&m[..to_read]);

        lfsr.step();
        let ds = if flg { 21 } else { 20 };
        let tweakey = common::encode(key, nonce, &lfsr.bytes(), ds);
        *state = skinny::tbc(*state, &tweakey);
    }

    let tag_prime = common::rho(&mut state, &[0u8; 16]);

    if bool::from(tag.as_slice().ct_eq(tag_prime.as_slice())) {
        Ok(())
    } else {
        plaintext.fill(0);
        Err(Error::TagMismatch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_with_nonempty_ad_and_message() {
        let key = [0x11u8; 16];
        let nonce = [0x22u8; 16];
        let ad = b"romulus-n associated data, 37 b!";
        let msg = b"the quick brown fox jumps over the lazy dog, forty-three";

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
    fn tampered_tag_is_rejected_and_zeroes_plaintext() {
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
    fn distinct_ad_yields_distinct_tags() {
        let key = [1u8; 16];
        let nonce = [2u8; 16];
        let msg = [3u8; 16];

        let mut ct_a = vec![0u8; msg.len()];
        let tag_a = encrypt(&key, &nonce, b"ad-a", &msg, &mut ct_a);

        let mut ct_b = vec![0u8; msg.len()];
        let tag_b = encrypt(&key, &nonce, b"ad-b", &msg, &mut ct_b);

        assert_ne!(tag_a, tag_b);
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
}

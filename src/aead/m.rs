//! Romulus-M, nonce-misuse-resistant authenticated encryption.
//!
//! Associated data and plaintext are interleaved into a single SIV-style
//! absorption pass that derives the tag before a single plaintext byte is
//! touched; the tag then seeds a counter-style encryption pass. Nonce reuse
//! degrades gracefully to the same guarantees as a generic SIV mode, unlike
//! Romulus-N where nonce reuse is catastrophic.
//!
//! See section 2.4.5 of the Romulus specification.
//! <https://csrc.nist.gov/CSRC/media/Projects/lightweight-cryptography/documents/finalist-round/updated-spec-doc/romulus-spec-final.pdf>

use subtle::ConstantTimeEq;
use tracing::instrument;
use zeroize::Zeroizing;

use crate::common::{self, Lfsr};
use crate::skinny;
use crate::{Error, Result};

/// Extract the `idx`-th 16-byte block of `pad16(ad) ‖ pad16(msg)`.
fn get_auth_block(ad: &[u8], msg: &[u8], idx: usize) -> [u8; 16] {
    let mut blk = [0u8; 16];

    let ad_rem = ad.len() % 16;
    let msg_rem = msg.len() % 16;

    let flg0 = ad.is_empty() || ad_rem > 0;
    let flg1 = msg.is_empty() || msg_rem > 0;

    let off = idx * 16;

    let padded_dlen = ad.len() + if flg0 { 16 - ad_rem } else { 0 };
    let padded_ctlen = msg.len() + if flg1 { 16 - msg_rem } else { 0 };
    let padded_authlen = padded_dlen + padded_ctlen;

    if off < padded_dlen {
        let read = ad.len().saturating_sub(off).min(16);
        blk[..read].copy_from_slice(&ad[off..off + read]);
        if read < 16 {
            blk[15] = read as u8;
        }
    }

    if off >= padded_dlen && off < padded_authlen {
        let ctoff = off - padded_dlen;
        let read = msg.len().saturating_sub(ctoff).min(16);
        blk[..read].copy_from_slice(&msg[ctoff..ctoff + read]);
        if read < 16 {
            blk[15] = read as u8;
        }
    }

    blk
}

/// The interleaved AD/message absorption that derives the SIV tag.
fn derive_tag(key: &[u8; 16], nonce: &[u8; 16], ad: &[u8], msg: &[u8]) -> [u8; 16] {
    let mut state = Zeroizing::new([0u8; 16]);
    let mut lfsr = Lfsr::new();

    let ad_blk_cnt = ad.len() / 16;
    let ct_blk_cnt = msg.len() / 16;
    let ad_rem = ad.len() % 16;
    let ct_rem = msg.len() % 16;

    let flg0 = ad.is_empty() || ad_rem > 0;
    let flg1 = msg.is_empty() || ct_rem > 0;

    let tot_ad_blk_cnt = ad_blk_cnt + if flg0 { 1 } else { 0 };
    let tot_ct_blk_cnt = ct_blk_cnt + if flg1 { 1 } else { 0 };

    let mut w: u8 = 48;
    w ^= if flg0 { 2 } else { 0 };
    w ^= if flg1 { 1 } else { 0 };
    w ^= if tot_ad_blk_cnt % 2 == 0 { 8 } else { 0 };
    w ^= if tot_ct_blk_cnt % 2 == 0 { 4 } else { 0 };

    let tot_blk_cnt = tot_ad_blk_cnt + tot_ct_blk_cnt;
    let half_blk_cnt = tot_blk_cnt / 2;
    let half_ad_blk_cnt = tot_ad_blk_cnt / 2;

    let mut x: u8 = 40;

    for i in 0..half_blk_cnt {
        let left = get_auth_block(ad, msg, 2 * i);
        common::rho(&mut state, &left);
        lfsr.step();

        if i == half_ad_blk_cnt {
            x ^= 4;
        }

        let right = get_auth_block(ad, msg, 2 * i + 1);
        let tweakey = common::encode(key, &right, &lfsr.bytes(), x);
        *state = skinny::tbc(*state, &tweakey);

        lfsr.step();
    }

    let flg2 = tot_ad_blk_cnt % 2 == 1;
    let flg3 = tot_ct_blk_cnt % 2 == 1;

    let trailing = if flg2 == flg3 {
        [0u8; 16]
    } else {
        get_auth_block(ad, msg, tot_blk_cnt - 1)
    };
    common::rho(&mut state, &trailing);

    if tot_blk_cnt > half_blk_cnt * 2 {
        lfsr.step();
    }

    let tweakey = common::encode(key, nonce, &lfsr.bytes(), w);
    *state = skinny::tbc(*state, &tweakey);

    common::rho(&mut state, &[0u8; 16])
}

/// Encrypt `plaintext` under `key`/`nonce` with associated data `ad`,
/// writing the ciphertext into `ciphertext` and returning the tag. Safe to
/// call repeatedly with a reused nonce: the tag derivation sees the full
/// plaintext before any keystream is produced.
#[instrument(skip_all, fields(ad_len = ad.len(), msg_len = plaintext.len()))]
pub fn encrypt(
    key: &[u8; 16],
    nonce: &[u8; 16],
    ad: &[u8],
    plaintext: &[u8],
    ciphertext: &mut [u8],
) -> [u8; 16] {
    assert_eq!(plaintext.len(), ciphertext.len());

    let tag = derive_tag(key, nonce, ad, plaintext);

    if !plaintext.is_empty() {
        let mut lfsr = Lfsr::new();
        let mut state = Zeroizing::new(tag);

        let blk_cnt = plaintext.len() / 16;
        let rem = plaintext.len() % 16;
        let flg = plaintext.is_empty() || rem > 0;
        let tot_blk_cnt = blk_cnt + if flg { 1 } else { 0 };

        let mut off = 0usize;

        for _ in 0..tot_blk_cnt.saturating_sub(1) {
            let tweakey = common::encode(key, nonce, &lfsr.bytes(), 0x24);
            *state = skinny::tbc(*state, &tweakey);

            let block: [u8; 16] = plaintext[off..off + 16].try_into().unwrap();
            let c = common::rho(&mut state, &block);
            ciphertext[off..off + 16].copy_from_slice(&c);

            lfsr.step();
            off += 16;
        }

        let read = plaintext.len() - off;
        let mut blk = [0u8; 16];
        blk[..read].copy_from_slice(&plaintext[off..off + read]);
        if read < 16 {
            blk[15] = read as u8;
        }

        let tweakey = common::encode(key, nonce, &lfsr.bytes(), 0x24);
        *state = skinny::tbc(*state, &tweakey);

        let c = common::rho(&mut state, &blk);
        ciphertext[off..off + read].copy_from_slice(&c[..read]);
    }

    tag
}

/// Decrypt `ciphertext` under `key`/`nonce` with associated data `ad`,
/// verifying `tag`. Decryption runs first, seeded from the *unverified*
/// caller-supplied tag, and the recovered plaintext is only released once
/// the tag re-derived from it matches.
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

    if !ciphertext.is_empty() {
        let mut lfsr = Lfsr::new();
        let mut state = Zeroizing::new(*tag);

        let blk_cnt = ciphertext.len() / 16;
        let rem = ciphertext.len() % 16;
        let flg = ciphertext.is_empty() || rem > 0;
        let tot_blk_cnt = blk_cnt + if flg { 1 } else { 0 };

        let mut off = 0usize;

        for _ in 0..tot_blk_cnt.saturating_sub(1) {
            let tweakey = common::encode(key, nonce, &lfsr.bytes(), 0x24);
            *state = skinny::tbc(*state, &tweakey);

            let block: [u8; 16] = ciphertext[off..off + 16].try_into().unwrap();
            let m = common::rho_inv(&mut state, &block);
            plaintext[off..off + 16].copy_from_slice(&m);

            lfsr.step();
            off += 16;
        }

        let read = ciphertext.len() - off;
        let mut blk = [0u8; 16];
        blk[..read].copy_from_slice(&ciphertext[off..off + read]);
        if read < 16 {
            blk[15] = read as u8;
        }

        let tweakey = common::encode(key, nonce, &lfsr.bytes(), 0x24);
        *state = skinny::tbc(*state, &tweakey);

        let m = common::rho_inv(&mut state, &blk);
        plaintext[off..off + read].copy_from_slice(&m[..read]);
    }

    let tag_prime = derive_tag(key, nonce, ad, plaintext);

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
        let ad = b"romulus-m associated data";
        let msg = b"nonce-misuse-resistant authenticated encryption";

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
    fn reused_nonce_with_different_messages_still_authenticates() {
        let key = [9u8; 16];
        let nonce = [9u8; 16];

        let msg_a = b"first message under a reused nonce";
        let mut ct_a = vec![0u8; msg_a.len()];
        let tag_a = encrypt(&key, &nonce, b"ad", msg_a, &mut ct_a);

        let msg_b = b"second, different message, same nonce!!";
        let mut ct_b = vec![0u8; msg_b.len()];
        let tag_b = encrypt(&key, &nonce, b"ad", msg_b, &mut ct_b);

        assert_ne!(tag_a, tag_b);
        assert_ne!(ct_a, ct_b[..ct_a.len()]);

        let mut pt_a = vec![0u8; msg_a.len()];
        decrypt(&key, &nonce, &tag_a, b"ad", &ct_a, &mut pt_a).unwrap();
        assert_eq!(&pt_a, msg_a);
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
    fn distinct_ad_and_message_shapes_yield_distinct_tags() {
        let key = [1u8; 16];
        let nonce = [2u8; 16];

        let mut ct_a = vec![0u8; 16];
        let tag_a = encrypt(&key, &nonce, &[0u8; 16], &[0u8; 16], &mut ct_a);

        let mut ct_b: [u8; 0] = [];
        let tag_b = encrypt(&key, &nonce, &[0u8; 32], &[], &mut ct_b);

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

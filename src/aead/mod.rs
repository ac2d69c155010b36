//! The three Romulus AEAD modes: nonce-based, nonce-misuse-resistant, and
//! leakage-resistant, each with its own domain-separated use of the
//! Skinny-128-384+ tweakable block cipher.

pub mod m;
pub mod n;
pub mod t;

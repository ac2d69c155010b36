//! Skinny-128-384+, the tweakable block cipher (TBC) underlying every
//! Romulus primitive.
//!
//! The internal state and each of the three 128-bit tweakey words are
//! conceptually 4x4 matrices of bytes in row-major order:
//! `cell(row, col) = array[4*row + col]`. Forty identical rounds of
//! SubCells, AddConstants, AddRoundTweakey, ShiftRows and MixColumns turn
//! the 128-bit plaintext block into ciphertext under the 384-bit tweakey.
//!
//! See section 2.3 of the Romulus specification.
//! <https://csrc.nist.gov/CSRC/media/Projects/lightweight-cryptography/documents/finalist-round/updated-spec-doc/romulus-spec-final.pdf>

use zeroize::ZeroizeOnDrop;

/// Number of rounds applied by [`tbc`].
pub const ROUNDS: usize = 40;

/// Fixed 8-bit S-box for Skinny-128-384+, table 2.1 of the Romulus
/// specification. Applied to every cell during SubCells.
#[rustfmt::skip]
const S8: [u8; 256] = [
    0x65, 0x4c, 0x6a, 0x42, 0x4b, 0x63, 0x43, 0x6b, 0x55, 0x75, 0x5a, 0x7a, 0x53,
    0x73, 0x5b, 0x7b, 0x35, 0x8c, 0x3a, 0x81, 0x89, 0x33, 0x80, 0x3b, 0x95, 0x25,
    0x98, 0x2a, 0x90, 0x23, 0x99, 0x2b, 0xe5, 0xcc, 0xe8, 0xc1, 0xc9, 0xe0, 0xc0,
    0xe9, 0xd5, 0xf5, 0xd8, 0xf8, 0xd0, 0xf0, 0xd9, 0xf9, 0xa5, 0x1c, 0xa8, 0x12,
    0x1b, 0xa0, 0x13, 0xa9, 0x05, 0xb5, 0x0a, 0xb8, 0x03, 0xb0, 0x0b, 0xb9, 0x32,
    0x88, 0x3c, 0x85, 0x8d, 0x34, 0x84, 0x3d, 0x91, 0x22, 0x9c, 0x2c, 0x94, 0x24,
    0x9d, 0x2d, 0x62, 0x4a, 0x6c, 0x45, 0x4d, 0x64, 0x44, 0x6d, 0x52, 0x72, 0x5c,
    0x7c, 0x54, 0x74, 0x5d, 0x7d, 0xa1, 0x1a, 0xac, 0x15, 0x1d, 0xa4, 0x14, 0xad,
    0x02, 0xb1, 0x0c, 0xbc, 0x04, 0xb4, 0x0d, 0xbd, 0xe1, 0xc8, 0xec, 0xc5, 0xcd,
    0xe4, 0xc4, 0xed, 0xd1, 0xf1, 0xdc, 0xfc, 0xd4, 0xf4, 0xdd, 0xfd, 0x36, 0x8e,
    0x38, 0x82, 0x8b, 0x30, 0x83, 0x39, 0x96, 0x26, 0x9a, 0x28, 0x93, 0x20, 0x9b,
    0x29, 0x66, 0x4e, 0x68, 0x41, 0x49, 0x60, 0x40, 0x69, 0x56, 0x76, 0x58, 0x78,
    0x50, 0x70, 0x59, 0x79, 0xa6, 0x1e, 0xaa, 0x11, 0x19, 0xa3, 0x10, 0xab, 0x06,
    0xb6, 0x08, 0xba, 0x00, 0xb3, 0x09, 0xbb, 0xe6, 0xce, 0xea, 0xc2, 0xcb, 0xe3,
    0xc3, 0xeb, 0xd6, 0xf6, 0xda, 0xfa, 0xd3, 0xf3, 0xdb, 0xfb, 0x31, 0x8a, 0x3e,
    0x86, 0x8f, 0x37, 0x87, 0x3f, 0x92, 0x21, 0x9e, 0x2e, 0x97, 0x27, 0x9f, 0x2f,
    0x61, 0x48, 0x6e, 0x46, 0x4f, 0x67, 0x47, 0x6f, 0x51, 0x71, 0x5e, 0x7e, 0x57,
    0x77, 0x5f, 0x7f, 0xa2, 0x18, 0xae, 0x16, 0x1f, 0xa7, 0x17, 0xaf, 0x01, 0xb2,
    0x0e, 0xbe, 0x07, 0xb7, 0x0f, 0xbf, 0xe2, 0xca, 0xee, 0xc6, 0xcf, 0xe7, 0xc7,
    0xef, 0xd2, 0xf2, 0xde, 0xfe, 0xd7, 0xf7, 0xdf, 0xff,
];

/// Round constants, one per round, table in section 2.3 of the Romulus
/// specification. Only the low 6 bits of each entry are ever used.
#[rustfmt::skip]
const RC: [u8; ROUNDS] = [
    0x01, 0x03, 0x07, 0x0F, 0x1F, 0x3E, 0x3D, 0x3B, 0x37, 0x2F,
    0x1E, 0x3C, 0x39, 0x33, 0x27, 0x0E, 0x1D, 0x3A, 0x35, 0x2B,
    0x16, 0x2C, 0x18, 0x30, 0x21, 0x02, 0x05, 0x0B, 0x17, 0x2E,
    0x1C, 0x38, 0x31, 0x23, 0x06, 0x0D, 0x1B, 0x36, 0x2D, 0x1A,
];

/// Cell permutation applied to each tweakey word every round, figure 2.3 of
/// the Romulus specification: `tk'[i] = tk[P_T[i]]`.
const P_T: [usize; 16] = [9, 15, 8, 13, 10, 14, 12, 11, 0, 1, 2, 3, 4, 5, 6, 7];

/// A 4x4-byte matrix, stored in row-major order.
pub type Block = [u8; 16];

/// The full Skinny-128-384+ state: the 128-bit internal state plus the
/// three 128-bit tweakey words.
///
/// All four fields are wiped on drop since `tk3` carries the secret key and
/// `is` carries plaintext/ciphertext that the caller may treat as sensitive.
#[derive(ZeroizeOnDrop)]
pub struct TbcState {
    is: Block,
    tk1: Block,
    tk2: Block,
    tk3: Block,
}

impl TbcState {
    /// Build the initial state from a 16-byte block and a 48-byte tweakey
    /// (TK1 || TK2 || TK3).
    pub fn new(block: Block, tweakey: &[u8; 48]) -> Self {
        let mut tk1 = [0u8; 16];
        let mut tk2 = [0u8; 16];
        let mut tk3 = [0u8; 16];
        tk1.copy_from_slice(&tweakey[0..16]);
        tk2.copy_from_slice(&tweakey[16..32]);
        tk3.copy_from_slice(&tweakey[32..48]);
        Self {
            is: block,
            tk1,
            tk2,
            tk3,
        }
    }

    /// The current internal state.
    pub fn block(&self) -> Block {
        self.is
    }

    fn sub_cells(&mut self) {
        for c in self.is.iter_mut() {
            *c = S8[*c as usize];
        }
    }

    fn add_constants(&mut self, round: usize) {
        let rc = RC[round];
        self.is[0] ^= rc & 0x0f;
        self.is[4] ^= (rc >> 4) & 0b11;
        self.is[8] ^= 0x02;
    }

    fn add_round_tweakey(&mut self) {
        for i in 0..8 {
            self.is[i] ^= self.tk1[i] ^ self.tk2[i] ^ self.tk3[i];
        }

        permute(&mut self.tk1);
        permute(&mut self.tk2);
        permute(&mut self.tk3);

        for c in self.tk2.iter_mut().take(8) {
            *c = tk2_lfsr(*c);
        }
        for c in self.tk3.iter_mut().take(8) {
            *c = tk3_lfsr(*c);
        }
    }

    fn shift_rows(&mut self) {
        self.is[4..8].rotate_right(1);
        self.is[8..12].rotate_right(2);
        self.is[12..16].rotate_right(3);
    }

    fn mix_columns(&mut self) {
        for col in 0..4 {
            let a = self.is[col];
            let b = self.is[4 + col];
            let c = self.is[8 + col];
            let d = self.is[12 + col];
            self.is[col] = a ^ c ^ d;
            self.is[4 + col] = a;
            self.is[8 + col] = b ^ c;
            self.is[12 + col] = a ^ c;
        }
    }

    fn round(&mut self, idx: usize) {
        self.sub_cells();
        self.add_constants(idx);
        self.add_round_tweakey();
        self.shift_rows();
        self.mix_columns();
    }

    /// Run the full 40-round permutation, mutating the internal state and
    /// advancing the tweakey schedule in place.
    pub fn run(&mut self) {
        for round in 0..ROUNDS {
            self.round(round);
        }
    }
}

fn permute(tk: &mut Block) {
    let src = *tk;
    for (i, &p) in P_T.iter().enumerate() {
        tk[i] = src[p];
    }
}

/// LFSR update applied to the top 8 cells of TK2 every round, table 2.2 of
/// the Romulus specification.
fn tk2_lfsr(c: u8) -> u8 {
    ((c & 0x7f) << 1) | ((c >> 7) ^ ((c >> 5) & 1))
}

/// LFSR update applied to the top 8 cells of TK3 every round, table 2.2 of
/// the Romulus specification.
fn tk3_lfsr(c: u8) -> u8 {
    ((((c) & 1) ^ ((c >> 6) & 1)) << 7) | ((c & 0xfe) >> 1)
}

/// Apply the Skinny-128-384+ permutation to `block` under `tweakey` and
/// return the resulting 16-byte block.
///
/// `tweakey` is laid out TK1 || TK2 || TK3, 16 bytes each.
pub fn tbc(block: Block, tweakey: &[u8; 48]) -> Block {
    let mut st = TbcState::new(block, tweakey);
    st.run();
    st.block()
}

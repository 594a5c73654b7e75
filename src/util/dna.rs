/// Number of one-hot channels for a reference base (A, C, G, T).
pub const BASES: usize = 4;

/// Index of a nucleotide in the A/C/G/T channel order; `None` for anything else.
#[inline]
pub fn base_index(b: u8) -> Option<usize> {
    match b.to_ascii_uppercase() {
        b'A' => Some(0),
        b'C' => Some(1),
        b'G' => Some(2),
        b'T' | b'U' => Some(3),
        _ => None,
    }
}

/// IUPAC-aware complement. Unknown symbols become `N`.
#[inline]
pub fn complement(base: u8) -> u8 {
    match base.to_ascii_uppercase() {
        b'A' => b'T',
        b'C' => b'G',
        b'G' => b'C',
        b'T' | b'U' => b'A',
        b'M' => b'K',
        b'R' => b'Y',
        b'W' => b'S',
        b'S' => b'W',
        b'Y' => b'R',
        b'K' => b'M',
        b'V' => b'B',
        b'H' => b'D',
        b'D' => b'H',
        b'B' => b'V',
        _ => b'N',
    }
}

pub fn revcomp(seq: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(seq.len());
    for &b in seq.iter().rev() {
        out.push(complement(b));
    }
    out
}

/// Soft probabilities over A/C/G/T for an IUPAC symbol.
pub fn iupac_weights(base: u8) -> [f32; BASES] {
    const H: f32 = 0.5;
    const T: f32 = 1.0 / 3.0;
    match base.to_ascii_uppercase() {
        b'A' => [1.0, 0.0, 0.0, 0.0],
        b'C' => [0.0, 1.0, 0.0, 0.0],
        b'G' => [0.0, 0.0, 1.0, 0.0],
        b'T' | b'U' => [0.0, 0.0, 0.0, 1.0],
        b'M' => [H, H, 0.0, 0.0],
        b'R' => [H, 0.0, H, 0.0],
        b'W' => [H, 0.0, 0.0, H],
        b'S' => [0.0, H, H, 0.0],
        b'Y' => [0.0, H, 0.0, H],
        b'K' => [0.0, 0.0, H, H],
        b'V' => [T, T, T, 0.0],
        b'H' => [T, T, 0.0, T],
        b'D' => [T, 0.0, T, T],
        b'B' => [0.0, T, T, T],
        _ => [0.25; BASES],
    }
}

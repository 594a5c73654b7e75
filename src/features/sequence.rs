use crate::error::Result;
use crate::io::faidx::IndexedFasta;
use crate::io::store::FeatureArray;
use crate::region::Region;
use crate::util::dna::{self, BASES};

/// `[len, 4]` soft one-hot encoding over A/C/G/T.
pub fn one_hot(seq: &[u8]) -> FeatureArray<f32> {
    let mut data = Vec::with_capacity(seq.len() * BASES);
    for &b in seq {
        data.extend_from_slice(&dna::iupac_weights(b));
    }
    FeatureArray { shape: vec![seq.len(), BASES], data }
}

/// Encode the reference under `region`, reverse complemented on the minus strand.
pub fn region_sequence(fasta: &mut IndexedFasta, region: &Region) -> Result<FeatureArray<f32>> {
    let seq = fasta.fetch_region(region)?;
    Ok(one_hot(&seq))
}

//! Hash algorithm implementations.

mod average;
mod difference;
mod perceptual;
mod wavelet;

pub use average::AverageHasher;
pub use difference::DifferenceHasher;
pub use perceptual::PerceptualHasher;
pub use wavelet::WaveletHasher;

/// Pack bits MSB-first into bytes, padding the final partial byte with zeros.
pub(crate) fn pack_bits<I: IntoIterator<Item = bool>>(bits: I) -> Vec<u8> {
    let mut hash_bytes = Vec::new();
    let mut current_byte: u8 = 0;
    let mut bit_position = 0;

    for bit in bits {
        if bit {
            current_byte |= 1 << (7 - bit_position);
        }
        bit_position += 1;

        if bit_position == 8 {
            hash_bytes.push(current_byte);
            current_byte = 0;
            bit_position = 0;
        }
    }

    if bit_position > 0 {
        hash_bytes.push(current_byte);
    }

    hash_bytes
}

//! ## [Permutative Encoding](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/5faf4800-645d-49d1-9457-2ac40eb467bd)

use std::borrow::Cow;

use super::*;

/// Encode data block bytes in place.
pub fn encode_block(data: &mut [u8]) {
    permute(data, &KEY_DATA_R);
}

/// Decode data block bytes in place.
pub fn decode_block(data: &mut [u8]) {
    permute(data, &KEY_DATA_I);
}

/// Decode a borrowed data block into a private copy.
pub fn decode_copy(data: &[u8]) -> Cow<'static, [u8]> {
    let mut buffer = data.to_vec();
    decode_block(&mut buffer);
    Cow::Owned(buffer)
}

fn permute(data: &mut [u8], table: &[u8; 256]) {
    for b in data.iter_mut() {
        *b = table[*b as usize];
    }
}

/// Generator polynomial of ITU-T H.222.0 Annex A:
/// x32 + x26 + x23 + x22 + x16 + x12 + x11 + x10 + x8 + x7 + x5 + x4 + x2 + x + 1
const CRC32_MPEG2_POLY: u32 = 0x04C11DB7;

/// MPEG-2 CRC32 over PSI sections.
///
/// MSB-first, initial value 0xFFFFFFFF, no final XOR. Running it over a section
/// including its trailing CRC yields 0.
#[derive(Clone)]
pub struct Crc32Mpeg2 {
    table: [u32; 256],
}

impl Crc32Mpeg2 {
    pub fn new() -> Self {
        let mut table = [0u32; 256];
        for (i, entry) in table.iter_mut().enumerate() {
            let mut crc = (i as u32) << 24;
            for _ in 0..8 {
                crc = if crc & 0x8000_0000 != 0 {
                    (crc << 1) ^ CRC32_MPEG2_POLY
                } else {
                    crc << 1
                };
            }
            *entry = crc;
        }
        Self { table }
    }

    /// ```
    /// use tsgate::utils::Crc32Mpeg2;
    ///
    /// let crc = Crc32Mpeg2::new();
    /// assert_eq!(crc.calculate(b"123456789"), 0x0376E6E7);
    /// ```
    pub fn calculate(&self, data: &[u8]) -> u32 {
        data.iter().fold(0xFFFF_FFFF, |crc, &byte| {
            let index = ((crc >> 24) ^ byte as u32) & 0xFF;
            (crc << 8) ^ self.table[index as usize]
        })
    }
}

impl Default for Crc32Mpeg2 {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Crc32Mpeg2 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Crc32Mpeg2")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_vectors() {
        let crc = Crc32Mpeg2::new();
        assert_eq!(crc.calculate(&[]), 0xFFFF_FFFF);
        assert_eq!(crc.calculate(&[0x01, 0x01]), 0xD66FB816);
        assert_eq!(crc.calculate(b"123456789"), 0x0376E6E7);
    }

    #[test]
    fn test_section_with_crc_has_zero_remainder() {
        let crc = Crc32Mpeg2::new();
        let mut pat = vec![
            0x00, 0xB0, 0x0D, // table id, section length
            0x00, 0x01, 0xC1, 0x00, 0x00, // ts id, version, section numbers
            0x00, 0x01, 0xE1, 0x00, // program 1 -> PID 0x100
        ];
        let value = crc.calculate(&pat);
        pat.extend_from_slice(&value.to_be_bytes());
        assert_eq!(crc.calculate(&pat), 0);
    }
}

/// Wire-level constants of the IT8951 SPI host interface.
///
/// Every transaction starts with one of the preamble words, sent big-endian.
pub struct Flag;
#[allow(missing_docs)]
impl Flag {
    // Transaction preambles
    pub const PREAMBLE_COMMAND: u16 = 0x6000;
    pub const PREAMBLE_WRITE_DATA: u16 = 0x0000;
    pub const PREAMBLE_READ_DATA: u16 = 0x1000;

    // Load Image Area (0x0021) argument word: endian << 8 | pixel format << 4 | rotation
    pub const LOAD_ENDIAN_LITTLE: u16 = 0x0;
    pub const LOAD_ENDIAN_BIG: u16 = 0x1;

    pub const PIXEL_FORMAT_2BPP: u16 = 0x0;
    pub const PIXEL_FORMAT_3BPP: u16 = 0x1;
    pub const PIXEL_FORMAT_4BPP: u16 = 0x2;
    pub const PIXEL_FORMAT_8BPP: u16 = 0x3;

    pub const ROTATE_0: u16 = 0x0;
    pub const ROTATE_90: u16 = 0x1;
    pub const ROTATE_180: u16 = 0x2;
    pub const ROTATE_270: u16 = 0x3;

    // VCOM (0x0039) first parameter
    pub const VCOM_GET: u16 = 0x0000;
    pub const VCOM_SET: u16 = 0x0001;

    // I80CPCR (0x0004) value
    pub const PACKED_WRITE_ENABLE: u16 = 0x0001;

    // GET_DEV_INFO (0x0302) response length in words
    pub const DEVICE_INFO_WORDS: usize = 20;
}

/// Pack the Load Image Area argument word.
pub const fn load_image_args(endian: u16, pixel_format: u16, rotation: u16) -> u16 {
    (endian << 8) | (pixel_format << 4) | rotation
}

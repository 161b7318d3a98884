use crate::it8951::RefreshMode;

/// IT8951 host command codes
pub struct Cmd;
impl Cmd {
    // Power
    pub const SYS_RUN: u16 = 0x0001;
    pub const STANDBY: u16 = 0x0002;
    pub const SLEEP: u16 = 0x0003;

    // Register access
    pub const REG_RD: u16 = 0x0010;
    pub const REG_WR: u16 = 0x0011;

    // Image loading
    pub const LD_IMG: u16 = 0x0020;
    pub const LD_IMG_AREA: u16 = 0x0021;
    pub const LD_IMG_END: u16 = 0x0022;

    // User defined
    pub const DPY_AREA: u16 = 0x0034;
    pub const DPY_BUF_AREA: u16 = 0x0037;
    pub const VCOM: u16 = 0x0039;
    pub const GET_DEV_INFO: u16 = 0x0302;
}

/// IT8951 register addresses
pub struct Reg;
impl Reg {
    /// I80 command/parameter control, bit 0 enables packed writes
    pub const I80CPCR: u16 = 0x0004;
    /// Image buffer base address, low word (high word at +2)
    pub const LISAR: u16 = 0x0208;
    /// LUT engine status, non-zero while a waveform is running
    pub const LUTAFSR: u16 = 0x1224;
}

/// Controller codes for each [`RefreshMode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshModes {
    pub init: u16,
    pub du: u16,
    pub gc16: u16,
    pub gl16: u16,
    pub a2: u16,
}

/// Command and register layout of one controller variant.
///
/// Variants differ only in data, so the driver takes one of these instead of
/// being specialised per panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandTable {
    pub sys_run: u16,
    pub standby: u16,
    pub sleep: u16,
    pub reg_read: u16,
    pub reg_write: u16,
    pub load_image_area: u16,
    pub load_image_end: u16,
    pub display_area: u16,
    pub vcom: u16,
    pub get_device_info: u16,

    pub reg_packed_write: u16,
    pub reg_image_buffer_addr: u16,
    pub reg_lut_status: u16,

    pub modes: RefreshModes,
}

impl CommandTable {
    /// IT8951 with 6"-class panel waveforms
    pub const IT8951: CommandTable = CommandTable {
        sys_run: Cmd::SYS_RUN,
        standby: Cmd::STANDBY,
        sleep: Cmd::SLEEP,
        reg_read: Cmd::REG_RD,
        reg_write: Cmd::REG_WR,
        load_image_area: Cmd::LD_IMG_AREA,
        load_image_end: Cmd::LD_IMG_END,
        display_area: Cmd::DPY_AREA,
        vcom: Cmd::VCOM,
        get_device_info: Cmd::GET_DEV_INFO,

        reg_packed_write: Reg::I80CPCR,
        reg_image_buffer_addr: Reg::LISAR,
        reg_lut_status: Reg::LUTAFSR,

        modes: RefreshModes {
            init: 0,
            du: 1,
            gc16: 2,
            gl16: 3,
            a2: 4,
        },
    };

    /// IT8951 with 7.8"/10.3"-class panel waveforms, where A2 moved to slot 6
    pub const IT8951_LARGE: CommandTable = CommandTable {
        modes: RefreshModes {
            a2: 6,
            ..Self::IT8951.modes
        },
        ..Self::IT8951
    };

    /// Look a table up by its configuration name.
    pub fn by_name(name: &str) -> Option<CommandTable> {
        match name.trim().to_ascii_lowercase().as_str() {
            "it8951" => Some(Self::IT8951),
            "it8951-large" | "it8951_large" => Some(Self::IT8951_LARGE),
            _ => None,
        }
    }

    /// Controller code for `mode`.
    pub fn mode_code(&self, mode: RefreshMode) -> u16 {
        match mode {
            RefreshMode::Init => self.modes.init,
            RefreshMode::Du => self.modes.du,
            RefreshMode::Gc16 => self.modes.gc16,
            RefreshMode::Gl16 => self.modes.gl16,
            RefreshMode::A2 => self.modes.a2,
        }
    }
}

/*
IT8951 I80/SPI host command set:
0x0001 - System Run
0x0002 - Standby
0x0003 - Sleep
0x0010 - Register Read
0x0011 - Register Write
0x0020 - Load Image (full buffer)
0x0021 - Load Image Area
0x0022 - Load Image End
0x0034 - Display Area (user defined)
0x0037 - Display Buffer Area (user defined)
0x0039 - VCOM get/set (user defined)
0x0302 - Get Device Info (user defined)
*/

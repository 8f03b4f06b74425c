use thiserror::Error;

/// Failures while turning a ROM image into a cartridge. Nothing runs after one
/// of these.
#[derive(Error, Debug)]
pub enum CartridgeError {
    #[error("ROM image is empty")]
    Empty,

    #[error("ROM image is too small ({len} bytes, need at least {min})")]
    TooSmall { len: usize, min: usize },

    #[error("unsupported cartridge mapping (map mode 0x{map_mode:02X})")]
    UnsupportedMapping { map_mode: u8 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures while restoring a save state. The running machine is left as it
/// was before the call.
#[derive(Error, Debug)]
pub enum StateError {
    #[error("save state could not be decoded: {0}")]
    Decode(bincode::Error),

    #[error("save state could not be encoded: {0}")]
    Encode(bincode::Error),

    #[error("not a save state (bad magic)")]
    BadMagic,

    #[error("save state format version {found} is not supported (expected {expected})")]
    VersionMismatch { found: u32, expected: u32 },

    #[error("save state was written by core {found}, this is core {expected}")]
    CoreVersionMismatch { found: String, expected: String },

    #[error("save state belongs to another ROM (checksum {found:08X}, loaded {expected:08X})")]
    RomMismatch { found: u32, expected: u32 },

    #[error("save state region {region} has {found} bytes, expected {expected}")]
    SizeMismatch {
        region: &'static str,
        found: usize,
        expected: usize,
    },

    #[error("save state {counter} is {found}, must be below {limit}")]
    CounterOutOfRange {
        counter: &'static str,
        found: u16,
        limit: u16,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Cartridge(#[from] CartridgeError),

    #[error(transparent)]
    State(#[from] StateError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

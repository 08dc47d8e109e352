//! CRT cartridge container format.
//!
//! A `.crt` file wraps C64 cartridge ROM images: a 64-byte header carrying
//! the hardware type and the EXROM/GAME line levels, followed by CHIP
//! packets, each with a load address, bank number and payload.
//!
//! ```text
//! Header:                          CHIP packet:
//!   +00  "C64 CARTRIDGE   "          +00  "CHIP"
//!   +10  header length (BE u32)      +04  packet length (BE u32)
//!   +14  version (BE u16)            +08  chip type (BE u16)
//!   +16  hardware type (BE u16)      +0A  bank number (BE u16)
//!   +18  EXROM line level            +0C  load address (BE u16)
//!   +19  GAME line level             +0E  ROM size (BE u16)
//!   +20  name (32 bytes, NUL pad)    +10  data...
//! ```
//!
//! This crate only decodes the container; interpreting the hardware type
//! and driving the bank-switching logic belongs to the cartridge engines.
//! Malformed metadata is fatal: the whole file is rejected, never partially
//! loaded.

use std::path::Path;

use thiserror::Error;

/// CRT file signature.
const CRT_SIGNATURE: &[u8; 16] = b"C64 CARTRIDGE   ";

/// CHIP packet signature.
const CHIP_SIGNATURE: &[u8; 4] = b"CHIP";

/// Hardware type codes for the cartridges this emulator decodes.
pub mod hw {
    pub const SIMONS_BASIC: u16 = 4;
    pub const OCEAN_TYPE_1: u16 = 5;
    pub const C64_GAME_SYSTEM: u16 = 15;
    pub const ZAXXON: u16 = 18;
    pub const MAGIC_DESK: u16 = 19;
    pub const EASYFLASH: u16 = 32;
}

/// Errors raised while decoding a `.crt` file.
///
/// I/O problems are kept distinct from format problems so callers can tell
/// "file missing" from "file malformed".
#[derive(Debug, Error)]
pub enum CrtError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("not a CRT file (bad signature)")]
    BadSignature,

    #[error("CRT file too short: {len} bytes")]
    TooShort { len: usize },

    #[error("invalid CRT header length {len}")]
    BadHeaderLength { len: usize },

    #[error("CHIP packet expected at offset {offset:#x}")]
    MissingChip { offset: usize },

    #[error("invalid CHIP packet length {len} at offset {offset:#x}")]
    BadChipLength { offset: usize, len: usize },

    #[error("unknown CHIP type {chip_type} at offset {offset:#x}")]
    BadChipType { offset: usize, chip_type: u16 },

    #[error("CHIP data extends past end of file at offset {offset:#x}")]
    TruncatedChip { offset: usize },

    #[error("CRT file contains no CHIP packets")]
    Empty,
}

/// Payload kind of one CHIP packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChipType {
    Rom,
    Ram,
    Flash,
}

/// One CHIP packet.
#[derive(Debug, Clone)]
pub struct Chip {
    pub chip_type: ChipType,
    /// Bank number within the cartridge.
    pub bank: u16,
    /// Load address ($8000 for ROML, $A000/$E000 for ROMH).
    pub load_address: u16,
    pub data: Vec<u8>,
}

/// A decoded CRT container.
#[derive(Debug, Clone)]
pub struct Crt {
    /// Cartridge name from the header.
    pub name: String,
    /// Hardware type code (see [`hw`]).
    pub hardware_type: u16,
    /// EXROM line level from the header (`true` = high/inactive).
    pub exrom: bool,
    /// GAME line level from the header (`true` = high/inactive).
    pub game: bool,
    pub chips: Vec<Chip>,
}

impl Crt {
    /// Decode a CRT container from raw bytes.
    ///
    /// # Errors
    ///
    /// Any malformed metadata — bad signature, bad header length, broken
    /// or truncated CHIP packet — rejects the whole file.
    pub fn parse(data: &[u8]) -> Result<Self, CrtError> {
        if data.len() < 64 {
            return Err(CrtError::TooShort { len: data.len() });
        }
        if &data[0..16] != CRT_SIGNATURE {
            return Err(CrtError::BadSignature);
        }

        let header_len = read_be_u32(data, 0x10) as usize;
        if header_len < 0x40 || header_len > data.len() {
            return Err(CrtError::BadHeaderLength { len: header_len });
        }

        let hardware_type = read_be_u16(data, 0x16);
        let exrom = data[0x18] != 0;
        let game = data[0x19] != 0;

        let name_bytes = &data[0x20..0x40];
        let end = name_bytes.iter().position(|&b| b == 0).unwrap_or(name_bytes.len());
        let name = String::from_utf8_lossy(&name_bytes[..end]).trim().to_string();

        let mut chips = Vec::new();
        let mut offset = header_len;
        while offset + 0x10 <= data.len() {
            if &data[offset..offset + 4] != CHIP_SIGNATURE {
                return Err(CrtError::MissingChip { offset });
            }

            let packet_len = read_be_u32(data, offset + 0x04) as usize;
            if packet_len < 0x10 || offset + packet_len > data.len() {
                return Err(CrtError::BadChipLength {
                    offset,
                    len: packet_len,
                });
            }

            let chip_type = match read_be_u16(data, offset + 0x08) {
                0 => ChipType::Rom,
                1 => ChipType::Ram,
                2 => ChipType::Flash,
                other => {
                    return Err(CrtError::BadChipType {
                        offset,
                        chip_type: other,
                    });
                }
            };
            let bank = read_be_u16(data, offset + 0x0A);
            let load_address = read_be_u16(data, offset + 0x0C);
            let rom_size = read_be_u16(data, offset + 0x0E) as usize;

            let rom_start = offset + 0x10;
            let rom_end = rom_start + rom_size;
            if rom_end > data.len() || rom_end > offset + packet_len {
                return Err(CrtError::TruncatedChip { offset });
            }

            chips.push(Chip {
                chip_type,
                bank,
                load_address,
                data: data[rom_start..rom_end].to_vec(),
            });

            offset += packet_len;
        }

        if chips.is_empty() {
            return Err(CrtError::Empty);
        }

        Ok(Self {
            name,
            hardware_type,
            exrom,
            game,
            chips,
        })
    }

    /// Read and decode a CRT file.
    ///
    /// # Errors
    ///
    /// I/O failures surface as [`CrtError::Io`]; format failures as the
    /// other variants.
    pub fn load(path: &Path) -> Result<Self, CrtError> {
        let data = std::fs::read(path)?;
        Self::parse(&data)
    }

    /// Total ROM payload across all chips.
    #[must_use]
    pub fn size(&self) -> usize {
        self.chips.iter().map(|c| c.data.len()).sum()
    }
}

fn read_be_u16(data: &[u8], offset: usize) -> u16 {
    u16::from(data[offset]) << 8 | u16::from(data[offset + 1])
}

fn read_be_u32(data: &[u8], offset: usize) -> u32 {
    u32::from(data[offset]) << 24
        | u32::from(data[offset + 1]) << 16
        | u32::from(data[offset + 2]) << 8
        | u32::from(data[offset + 3])
}

/// Build a CRT header for tests and tooling.
#[must_use]
pub fn build_header(name: &str, hardware_type: u16, exrom: u8, game: u8) -> Vec<u8> {
    let mut header = Vec::with_capacity(0x40);
    header.extend_from_slice(CRT_SIGNATURE);
    header.extend_from_slice(&0x40u32.to_be_bytes());
    header.extend_from_slice(&[0x01, 0x00]); // version 1.0
    header.extend_from_slice(&hardware_type.to_be_bytes());
    header.push(exrom);
    header.push(game);
    header.extend_from_slice(&[0; 6]);
    let mut name_field = [0u8; 32];
    for (dst, src) in name_field.iter_mut().zip(name.bytes()) {
        *dst = src;
    }
    header.extend_from_slice(&name_field);
    header
}

/// Build a ROM CHIP packet for tests and tooling.
#[must_use]
pub fn build_chip(bank: u16, load_address: u16, data: &[u8]) -> Vec<u8> {
    let mut chip = Vec::with_capacity(0x10 + data.len());
    chip.extend_from_slice(CHIP_SIGNATURE);
    chip.extend_from_slice(&(0x10 + data.len() as u32).to_be_bytes());
    chip.extend_from_slice(&0u16.to_be_bytes()); // ROM
    chip.extend_from_slice(&bank.to_be_bytes());
    chip.extend_from_slice(&load_address.to_be_bytes());
    chip.extend_from_slice(&(data.len() as u16).to_be_bytes());
    chip.extend_from_slice(data);
    chip
}

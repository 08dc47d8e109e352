//! SNA snapshot format for the 48K ZX Spectrum.
//!
//! The oldest and simplest snapshot format: a fixed 27-byte register
//! header followed by a raw dump of the 48K of RAM, 49,179 bytes total.
//! No compression, no versioning.
//!
//! ```text
//! Offset  Size  Contents
//! 0       1     I
//! 1       8     HL', DE', BC', AF'
//! 9       10    HL, DE, BC, IY, IX
//! 19      1     bit 2 = IFF2
//! 20      1     R
//! 21      2     F, A
//! 23      2     SP
//! 25      1     interrupt mode (0–2)
//! 26      1     border colour
//! 27      49152 RAM $4000–$FFFF
//! ```
//!
//! SNA files carry no program counter. A snapshot was taken by an NMI
//! handler, so execution resumes at the ROM's interrupt-return path: the
//! loader points PC at [`ROM_RETN_ADDR`], where the 48K ROM executes
//! RETN.
//!
//! Parsing produces a [`Snapshot`] value; restoring it into a machine is
//! the caller's business. The only condition recovered locally is an
//! out-of-range interrupt mode, which is clamped with a warning — every
//! other defect rejects the file.

use std::path::Path;

use log::warn;
use thiserror::Error;

/// Expected size of a 48K SNA file.
pub const SNA_SIZE: usize = 49_179;

/// Header size in bytes.
pub const HEADER_SIZE: usize = 27;

/// RAM image size ($4000–$FFFF).
pub const RAM_SIZE: usize = 49_152;

/// Fixed ROM re-entry point used to reconstruct PC: the RETN at the end
/// of the 48K ROM's NMI path.
pub const ROM_RETN_ADDR: u16 = 0x0072;

/// Errors raised while decoding snapshot files (shared with the .Z80
/// loader, which builds on this crate).
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("snapshot is {got} bytes, expected {expected}")]
    WrongSize { expected: usize, got: usize },

    #[error("snapshot too short: {what}")]
    Truncated { what: &'static str },

    #[error("snapshot hardware mode {mode} not supported (48K only)")]
    UnsupportedHardware { mode: u8 },

    #[error("snapshot header malformed: {reason}")]
    BadHeader { reason: &'static str },
}

/// Z80 register file as restored from a snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Registers {
    pub a: u8,
    pub f: u8,
    pub b: u8,
    pub c: u8,
    pub d: u8,
    pub e: u8,
    pub h: u8,
    pub l: u8,
    pub a_alt: u8,
    pub f_alt: u8,
    pub b_alt: u8,
    pub c_alt: u8,
    pub d_alt: u8,
    pub e_alt: u8,
    pub h_alt: u8,
    pub l_alt: u8,
    pub i: u8,
    pub r: u8,
    pub ix: u16,
    pub iy: u16,
    pub sp: u16,
    pub pc: u16,
}

/// A decoded snapshot: registers, interrupt state, border colour and the
/// flat 48K RAM image. Built by a parser, consumed once by whoever
/// restores the machine, then discarded.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub regs: Registers,
    /// Interrupt mode (0–2).
    pub im: u8,
    pub iff1: bool,
    pub iff2: bool,
    /// Border colour (0–7).
    pub border: u8,
    /// RAM image for $4000–$FFFF.
    pub ram: Vec<u8>,
}

/// Decode an SNA image from raw bytes.
///
/// # Errors
///
/// The file must be exactly [`SNA_SIZE`] bytes. An out-of-range interrupt
/// mode is clamped (with a warning) rather than rejected.
pub fn parse_sna(data: &[u8]) -> Result<Snapshot, SnapshotError> {
    if data.len() != SNA_SIZE {
        return Err(SnapshotError::WrongSize {
            expected: SNA_SIZE,
            got: data.len(),
        });
    }

    let mut regs = Registers {
        i: data[0],
        l_alt: data[1],
        h_alt: data[2],
        e_alt: data[3],
        d_alt: data[4],
        c_alt: data[5],
        b_alt: data[6],
        f_alt: data[7],
        a_alt: data[8],
        l: data[9],
        h: data[10],
        e: data[11],
        d: data[12],
        c: data[13],
        b: data[14],
        iy: u16::from(data[15]) | (u16::from(data[16]) << 8),
        ix: u16::from(data[17]) | (u16::from(data[18]) << 8),
        r: data[20],
        f: data[21],
        a: data[22],
        sp: u16::from(data[23]) | (u16::from(data[24]) << 8),
        ..Registers::default()
    };

    let iff2 = data[19] & 0x04 != 0;

    let mut im = data[25];
    if im > 2 {
        warn!("SNA interrupt mode {im} out of range, clamping to 2");
        im = 2;
    }

    // No PC in the file: the snapshot was taken through NMI, so resume at
    // the ROM's RETN.
    regs.pc = ROM_RETN_ADDR;

    Ok(Snapshot {
        regs,
        im,
        iff1: iff2,
        iff2,
        border: data[26] & 0x07,
        ram: data[HEADER_SIZE..].to_vec(),
    })
}

/// Read and decode an SNA file.
///
/// # Errors
///
/// I/O failures surface as [`SnapshotError::Io`], distinct from format
/// failures.
pub fn load_sna(path: &Path) -> Result<Snapshot, SnapshotError> {
    let data = std::fs::read(path)?;
    parse_sna(&data)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_sna() -> Vec<u8> {
        let mut data = vec![0u8; SNA_SIZE];
        data[0] = 0x3F; // I
        data[1] = 0x11; // L'
        data[2] = 0x22; // H'
        data[9] = 0x78; // L
        data[10] = 0x56; // H
        data[15] = 0x34; // IY lo
        data[16] = 0x12; // IY hi
        data[17] = 0xCD; // IX lo
        data[18] = 0xAB; // IX hi
        data[19] = 0x04; // IFF2 set
        data[20] = 0x42; // R
        data[21] = 0xFF; // F
        data[22] = 0xAA; // A
        data[23] = 0x00; // SP lo
        data[24] = 0x80; // SP hi
        data[25] = 1; // IM 1
        data[26] = 2; // border red
        data[HEADER_SIZE] = 0x55; // first RAM byte ($4000)
        data[SNA_SIZE - 1] = 0x99; // last RAM byte ($FFFF)
        data
    }

    #[test]
    fn restores_registers_and_ram() {
        let snap = parse_sna(&make_sna()).expect("should parse");
        assert_eq!(snap.regs.i, 0x3F);
        assert_eq!(snap.regs.l_alt, 0x11);
        assert_eq!(snap.regs.h_alt, 0x22);
        assert_eq!(snap.regs.l, 0x78);
        assert_eq!(snap.regs.h, 0x56);
        assert_eq!(snap.regs.iy, 0x1234);
        assert_eq!(snap.regs.ix, 0xABCD);
        assert_eq!(snap.regs.r, 0x42);
        assert_eq!(snap.regs.f, 0xFF);
        assert_eq!(snap.regs.a, 0xAA);
        assert_eq!(snap.regs.sp, 0x8000);
        assert_eq!(snap.im, 1);
        assert!(snap.iff1);
        assert!(snap.iff2);
        assert_eq!(snap.border, 2);
        assert_eq!(snap.ram.len(), RAM_SIZE);
        assert_eq!(snap.ram[0], 0x55);
        assert_eq!(snap.ram[RAM_SIZE - 1], 0x99);
    }

    #[test]
    fn pc_comes_from_the_rom_reentry_point() {
        let snap = parse_sna(&make_sna()).expect("should parse");
        assert_eq!(snap.regs.pc, ROM_RETN_ADDR);
    }

    #[test]
    fn out_of_range_interrupt_mode_is_clamped() {
        let mut data = make_sna();
        data[25] = 7;
        let snap = parse_sna(&data).expect("clamped, not rejected");
        assert_eq!(snap.im, 2);
    }

    #[test]
    fn wrong_size_is_rejected() {
        assert!(matches!(
            parse_sna(&[0u8; 100]),
            Err(SnapshotError::WrongSize { got: 100, .. })
        ));
        assert!(matches!(
            parse_sna(&vec![0u8; SNA_SIZE + 1]),
            Err(SnapshotError::WrongSize { .. })
        ));
    }

    #[test]
    fn iff2_clear_disables_interrupt_flip_flops() {
        let mut data = make_sna();
        data[19] = 0x00;
        let snap = parse_sna(&data).expect("should parse");
        assert!(!snap.iff1);
        assert!(!snap.iff2);
    }
}

//! Point-in-time CPU+PPU state for debug tooling and nestest-style log
//! replay, reimagined here as a plain owned struct with no back-pointer
//! into the emulator — `Console::cpu_state()` and `Cpu6502::snapshot`
//! both produce it fresh each call.

use crate::cpu::opcodes::OPCODE_TABLE;

/// An owned, unidirectional copy of CPU state at one instant, plus the PPU
/// dot/scanline it was taken alongside. Never a live reference into the
/// emulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuSnapshot {
    pub pc: u16,
    pub raw_opcode: [u8; 3],
    pub opcode_len: u8,
    pub mnemonic: &'static str,
    pub a: u8,
    pub x: u8,
    pub y: u8,
    pub p: u8,
    pub sp: u8,
    pub ppu_dot: u16,
    pub ppu_scanline: i16,
    pub cycle: u64,
    pub illegal_opcode: bool,
}

impl CpuSnapshot {
    /// Format as a nestest-style log line:
    /// `PPPP AA BB CC  MNE  A:aa X:xx Y:yy P:pp SP:ss PPU:ddd,sss CYC:nnnnn`
    pub fn to_nestest_line(&self) -> String {
        let mut bytes = String::new();
        for i in 0..3 {
            if i < self.opcode_len as usize {
                bytes.push_str(&format!("{:02X} ", self.raw_opcode[i]));
            } else {
                bytes.push_str("   ");
            }
        }

        format!(
            "{pc:04X}  {bytes}{mnem:<3} A:{a:02X} X:{x:02X} Y:{y:02X} P:{p:02X} SP:{sp:02X} PPU:{dot},{scan} CYC:{cyc}",
            pc = self.pc,
            bytes = bytes,
            mnem = self.mnemonic,
            a = self.a,
            x = self.x,
            y = self.y,
            p = self.p,
            sp = self.sp,
            dot = self.ppu_dot,
            scan = self.ppu_scanline,
            cyc = self.cycle,
        )
    }

    /// Parse a nestest-style log line back into a snapshot, for comparing
    /// against a reference log in tests.
    pub fn parse_nestest_line(line: &str) -> Result<CpuSnapshot, String> {
        let pc_field = line.get(0..4).ok_or("line too short for a PC field")?;
        let pc = u16::from_str_radix(pc_field, 16).map_err(|e| e.to_string())?;

        let mut raw_opcode = [0u8; 3];
        let mut opcode_len = 0u8;
        for i in 0..3usize {
            let start = 6 + i * 3;
            let chunk = line.get(start..start + 2).ok_or("missing opcode byte field")?;
            if chunk.trim().is_empty() {
                break;
            }
            raw_opcode[i] = u8::from_str_radix(chunk.trim(), 16).map_err(|e| e.to_string())?;
            opcode_len += 1;
        }
        if opcode_len == 0 {
            return Err("no opcode bytes found".to_string());
        }

        let mnemonic_field = line
            .get(15..)
            .and_then(|rest| rest.split_whitespace().next())
            .ok_or("missing mnemonic field")?;
        let mnemonic = OPCODE_TABLE
            .iter()
            .map(|info| info.mnemonic)
            .find(|m| *m == mnemonic_field)
            .ok_or_else(|| format!("unknown mnemonic {mnemonic_field}"))?;

        let a = parse_hex_field(line, "A:")?;
        let x = parse_hex_field(line, "X:")?;
        let y = parse_hex_field(line, "Y:")?;
        let p = parse_hex_field(line, "P:")?;
        let sp = parse_hex_field(line, "SP:")?;

        let ppu = field_after(line, "PPU:").ok_or("missing PPU field")?;
        let (dot_str, scan_str) = ppu.split_once(',').ok_or("malformed PPU field")?;
        let ppu_dot = dot_str.trim().parse().map_err(|_| "bad PPU dot".to_string())?;
        let ppu_scanline = scan_str
            .trim()
            .parse()
            .map_err(|_| "bad PPU scanline".to_string())?;

        let cycle = field_after(line, "CYC:")
            .ok_or("missing CYC field")?
            .trim()
            .parse()
            .map_err(|_| "bad CYC field".to_string())?;

        Ok(CpuSnapshot {
            pc,
            raw_opcode,
            opcode_len,
            mnemonic,
            a,
            x,
            y,
            p,
            sp,
            ppu_dot,
            ppu_scanline,
            cycle,
            illegal_opcode: mnemonic == "???",
        })
    }
}

fn field_after<'a>(line: &'a str, label: &str) -> Option<&'a str> {
    let start = line.find(label)? + label.len();
    let rest = &line[start..];
    Some(rest.split_whitespace().next().unwrap_or(""))
}

fn parse_hex_field(line: &str, label: &str) -> Result<u8, String> {
    let field = field_after(line, label).ok_or_else(|| format!("missing {label} field"))?;
    u8::from_str_radix(field, 16).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CpuSnapshot {
        CpuSnapshot {
            pc: 0xC000,
            raw_opcode: [0x4C, 0xF5, 0xC5],
            opcode_len: 3,
            mnemonic: "JMP",
            a: 0x00,
            x: 0x00,
            y: 0x00,
            p: 0x24,
            sp: 0xFD,
            ppu_dot: 21,
            ppu_scanline: 0,
            cycle: 7,
            illegal_opcode: false,
        }
    }

    #[test]
    fn round_trips_through_nestest_line_format() {
        let snap = sample();
        let line = snap.to_nestest_line();
        let parsed = CpuSnapshot::parse_nestest_line(&line).unwrap();
        assert_eq!(parsed, snap);
    }

    #[test]
    fn shorter_opcode_pads_with_blank_byte_fields() {
        let mut snap = sample();
        snap.raw_opcode = [0xEA, 0, 0];
        snap.opcode_len = 1;
        snap.mnemonic = "NOP";
        let line = snap.to_nestest_line();
        let parsed = CpuSnapshot::parse_nestest_line(&line).unwrap();
        assert_eq!(parsed.opcode_len, 1);
        assert_eq!(parsed.raw_opcode[0], 0xEA);
        assert_eq!(parsed.mnemonic, "NOP");
    }

    #[test]
    fn unknown_mnemonic_is_rejected() {
        let line = "C000  02       KIL A:00 X:00 Y:00 P:24 SP:FD PPU:  0,  0 CYC:7";
        assert!(CpuSnapshot::parse_nestest_line(line).is_err());
    }
}

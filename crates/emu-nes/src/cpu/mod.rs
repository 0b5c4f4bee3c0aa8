//! 6502 CPU implementation for NES

pub mod disasm;
mod instructions;
pub(crate) mod opcodes;

use bitflags::bitflags;
use emu_core::{Cpu as CpuTrait, EmulatorError, Result};

use crate::snapshot::CpuSnapshot;

bitflags! {
    /// CPU status flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct StatusFlags: u8 {
        const CARRY     = 0b0000_0001;  // C
        const ZERO      = 0b0000_0010;  // Z
        const INTERRUPT = 0b0000_0100;  // I (interrupt disable)
        const DECIMAL   = 0b0000_1000;  // D (decimal mode - not used in NES)
        const BREAK     = 0b0001_0000;  // B (break command)
        const UNUSED    = 0b0010_0000;  // Always set
        const OVERFLOW  = 0b0100_0000;  // V
        const NEGATIVE  = 0b1000_0000;  // N
    }
}

/// Memory interface for the CPU
///
/// The CPU needs to read/write memory without caring about the
/// actual implementation (RAM, ROM, memory-mapped IO, etc.)
pub trait CpuMemory {
    fn read(&mut self, addr: u16) -> u8;
    fn write(&mut self, addr: u16, value: u8);

    fn read_word(&mut self, addr: u16) -> u16 {
        let lo = self.read(addr) as u16;
        let hi = self.read(addr.wrapping_add(1)) as u16;
        (hi << 8) | lo
    }
}

/// 6502 CPU implementation
pub struct Cpu6502<M: CpuMemory> {
    /// Accumulator
    pub a: u8,
    /// X register
    pub x: u8,
    /// Y register
    pub y: u8,
    /// Stack pointer (points into 0x0100-0x01FF)
    pub sp: u8,
    /// Program counter
    pub pc: u16,
    /// Status flags
    pub status: StatusFlags,
    /// Memory interface
    memory: M,
    /// Total cycles executed
    pub cycles: u64,
    /// Latched by the PPU on VBlank entry; edge-triggered, serviced at the
    /// next instruction boundary and cleared once taken.
    nmi_pending: bool,
    /// Level-triggered; serviced at the next instruction boundary unless the
    /// interrupt-disable flag is set.
    irq_pending: bool,
}

impl<M: CpuMemory> Cpu6502<M> {
    /// Create a new CPU with the given memory interface
    pub fn new(memory: M) -> Self {
        Self {
            a: 0,
            x: 0,
            y: 0,
            sp: 0xFD,
            pc: 0,
            status: StatusFlags::INTERRUPT | StatusFlags::UNUSED,
            memory,
            cycles: 0,
            nmi_pending: false,
            irq_pending: false,
        }
    }

    /// Latch an NMI to be serviced at the next instruction boundary.
    pub fn request_nmi(&mut self) {
        self.nmi_pending = true;
    }

    /// Raise the IRQ line. Ignored at service time if `I` is set.
    pub fn request_irq(&mut self) {
        self.irq_pending = true;
    }

    /// Clear the IRQ line (mappers/APU call this once the condition clears).
    pub fn clear_irq(&mut self) {
        self.irq_pending = false;
    }

    /// Push PC and P, set I, and jump to the vector at `vector`. `brk` marks
    /// whether the pushed P has the B flag set (BRK/PHP) or clear (NMI/IRQ
    /// hardware interrupts) -- bit 5 is always pushed set.
    fn service_interrupt(&mut self, vector: u16, brk: bool) {
        self.push_word(self.pc);
        let mut pushed = self.status;
        pushed.insert(StatusFlags::UNUSED);
        pushed.set(StatusFlags::BREAK, brk);
        self.push(pushed.bits());
        self.set_flag(StatusFlags::INTERRUPT, true);
        self.pc = self.memory.read_word(vector);
    }

    /// Set a status flag
    #[inline]
    pub fn set_flag(&mut self, flag: StatusFlags, value: bool) {
        if value {
            self.status.insert(flag);
        } else {
            self.status.remove(flag);
        }
    }

    /// Get a status flag
    #[inline]
    pub fn get_flag(&self, flag: StatusFlags) -> bool {
        self.status.contains(flag)
    }

    /// Update zero and negative flags based on value
    #[inline]
    pub fn update_zn(&mut self, value: u8) {
        self.set_flag(StatusFlags::ZERO, value == 0);
        self.set_flag(StatusFlags::NEGATIVE, value & 0x80 != 0);
    }

    /// Push a byte onto the stack
    #[inline]
    fn push(&mut self, value: u8) {
        self.memory.write(0x0100 | self.sp as u16, value);
        self.sp = self.sp.wrapping_sub(1);
    }

    /// Push a 16-bit word onto the stack (high byte first)
    #[inline]
    fn push_word(&mut self, value: u16) {
        self.push((value >> 8) as u8);
        self.push((value & 0xFF) as u8);
    }

    /// Pop a byte from the stack
    #[inline]
    fn pop(&mut self) -> u8 {
        self.sp = self.sp.wrapping_add(1);
        self.memory.read(0x0100 | self.sp as u16)
    }

    /// Pop a 16-bit word from the stack (low byte first)
    #[inline]
    fn pop_word(&mut self) -> u16 {
        let lo = self.pop() as u16;
        let hi = self.pop() as u16;
        (hi << 8) | lo
    }

    /// Read the next byte at PC and increment PC
    #[inline]
    fn fetch_byte(&mut self) -> u8 {
        let byte = self.memory.read(self.pc);
        self.pc = self.pc.wrapping_add(1);
        byte
    }

    /// Read the next word at PC and increment PC by 2
    #[inline]
    fn fetch_word(&mut self) -> u16 {
        let word = self.memory.read_word(self.pc);
        self.pc = self.pc.wrapping_add(2);
        word
    }

    // Addressing mode helpers (used by instructions)

    /// Get address for Zero Page addressing (addr = $00nn)
    #[inline]
    pub(super) fn addr_zero_page(&mut self) -> u16 {
        self.fetch_byte() as u16
    }

    /// Get address for Zero Page,X addressing (addr = $00nn + X)
    #[inline]
    pub(super) fn addr_zero_page_x(&mut self) -> u16 {
        self.fetch_byte().wrapping_add(self.x) as u16
    }

    /// Get address for Zero Page,Y addressing (addr = $00nn + Y)
    #[inline]
    pub(super) fn addr_zero_page_y(&mut self) -> u16 {
        self.fetch_byte().wrapping_add(self.y) as u16
    }

    /// Get address for Absolute addressing (addr = $nnnn)
    #[inline]
    pub(super) fn addr_absolute(&mut self) -> u16 {
        self.fetch_word()
    }

    /// Get address for Absolute,X addressing (addr = $nnnn + X)
    /// Returns (address, page_crossed)
    #[inline]
    pub(super) fn addr_absolute_x(&mut self) -> (u16, bool) {
        let base = self.fetch_word();
        let addr = base.wrapping_add(self.x as u16);
        let page_crossed = (base & 0xFF00) != (addr & 0xFF00);
        (addr, page_crossed)
    }

    /// Get address for Absolute,Y addressing (addr = $nnnn + Y)
    /// Returns (address, page_crossed)
    #[inline]
    pub(super) fn addr_absolute_y(&mut self) -> (u16, bool) {
        let base = self.fetch_word();
        let addr = base.wrapping_add(self.y as u16);
        let page_crossed = (base & 0xFF00) != (addr & 0xFF00);
        (addr, page_crossed)
    }

    /// Get address for Indirect addressing (JMP only)
    /// addr = contents of $nnnn
    #[inline]
    pub(super) fn addr_indirect(&mut self) -> u16 {
        let ptr = self.fetch_word();
        
        // 6502 bug: if ptr is at page boundary (e.g. $xxFF),
        // it wraps within the same page instead of crossing to next page
        if ptr & 0xFF == 0xFF {
            let lo = self.memory.read(ptr) as u16;
            let hi = self.memory.read(ptr & 0xFF00) as u16;
            (hi << 8) | lo
        } else {
            self.memory.read_word(ptr)
        }
    }

    /// Get address for Indexed Indirect addressing (addr = contents of ($nn + X))
    #[inline]
    pub(super) fn addr_indexed_indirect(&mut self) -> u16 {
        let ptr = self.fetch_byte().wrapping_add(self.x);
        let lo = self.memory.read(ptr as u16) as u16;
        let hi = self.memory.read(ptr.wrapping_add(1) as u16) as u16;
        (hi << 8) | lo
    }

    /// Get address for Indirect Indexed addressing (addr = contents of ($nn) + Y)
    /// Returns (address, page_crossed)
    #[inline]
    pub(super) fn addr_indirect_indexed(&mut self) -> (u16, bool) {
        let ptr = self.fetch_byte();
        let lo = self.memory.read(ptr as u16) as u16;
        let hi = self.memory.read(ptr.wrapping_add(1) as u16) as u16;
        let base = (hi << 8) | lo;
        let addr = base.wrapping_add(self.y as u16);
        let page_crossed = (base & 0xFF00) != (addr & 0xFF00);
        (addr, page_crossed)
    }

    /// Get the branch target for Relative addressing (signed 8-bit offset
    /// from the address of the instruction *following* the branch).
    /// Returns (address, page_crossed).
    #[inline]
    pub(super) fn addr_relative(&mut self) -> (u16, bool) {
        let offset = self.fetch_byte() as i8;
        let base = self.pc;
        let addr = base.wrapping_add(offset as u16);
        let page_crossed = (base & 0xFF00) != (addr & 0xFF00);
        (addr, page_crossed)
    }

    /// A point-in-time, read-only copy of CPU state for debugging/log-replay.
    /// Reads the instruction at the current PC without mutating anything.
    /// The caller supplies PPU dot/scanline since the CPU has no notion of
    /// video timing.
    pub fn snapshot(&mut self, ppu_dot: u16, ppu_scanline: i16) -> CpuSnapshot {
        let opcode = self.memory.read(self.pc);
        let info = &opcodes::OPCODE_TABLE[opcode as usize];
        let opcode_len = info.bytes.clamp(1, 3);

        let mut raw_opcode = [0u8; 3];
        for (i, byte) in raw_opcode.iter_mut().enumerate().take(opcode_len as usize) {
            *byte = self.memory.read(self.pc.wrapping_add(i as u16));
        }

        CpuSnapshot {
            pc: self.pc,
            raw_opcode,
            opcode_len,
            mnemonic: info.mnemonic,
            a: self.a,
            x: self.x,
            y: self.y,
            p: self.status.bits(),
            sp: self.sp,
            ppu_dot,
            ppu_scanline,
            cycle: self.cycles,
            illegal_opcode: info.mnemonic == "???",
        }
    }

    /// Borrow the memory interface directly. Lets a caller that owns the
    /// bus (e.g. a console orchestrator) reach through the CPU to clock
    /// other devices it shares the bus with.
    pub fn memory(&self) -> &M {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut M {
        &mut self.memory
    }
}

impl<M: CpuMemory> CpuTrait for Cpu6502<M> {
    fn reset(&mut self) {
        // A/X/Y and the rest of P survive a reset on real hardware; only SP,
        // I, and PC are well-defined afterwards.
        self.sp = self.sp.wrapping_sub(3);
        self.status.insert(StatusFlags::INTERRUPT | StatusFlags::UNUSED);

        self.pc = self.memory.read_word(0xFFFC);

        self.nmi_pending = false;
        self.irq_pending = false;
        self.cycles = 7;
    }

    fn step(&mut self) -> Result<u8> {
        if self.nmi_pending {
            self.nmi_pending = false;
            self.service_interrupt(0xFFFA, false);
            self.cycles = self.cycles.wrapping_add(7);
            return Ok(7);
        }
        if self.irq_pending && !self.get_flag(StatusFlags::INTERRUPT) {
            self.service_interrupt(0xFFFE, false);
            self.cycles = self.cycles.wrapping_add(7);
            return Ok(7);
        }

        let opcode = self.fetch_byte();
        let spent = self.execute(opcode)?;
        self.cycles = self.cycles.wrapping_add(spent as u64);
        Ok(spent)
    }

    fn pc(&self) -> u16 {
        self.pc
    }

    fn sp(&self) -> u8 {
        self.sp
    }

    fn a(&self) -> u8 {
        self.a
    }

    fn x(&self) -> u8 {
        self.x
    }

    fn y(&self) -> u8 {
        self.y
    }

    fn status(&self) -> u8 {
        self.status.bits()
    }
}

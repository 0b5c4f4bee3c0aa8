//! Console orchestration: ties CPU, bus, PPU, and cartridge into a runnable
//! machine.
//!
//! Grounded in `DaCodeChick-Lumi/crates/emu-nes/src/system.rs`'s `NesSystem`
//! for the overall shape (owns the CPU, exposes reset/step/run, logs ROM
//! load at debug level), reworked onto the `Bus`/`Ppu` pair this core uses,
//! with the hardcoded `CYCLES_PER_FRAME` constant replaced by a loop driven
//! off the PPU's own `frame_complete` flag.

use std::path::Path;

use emu_core::types::{Button, ControllerState};
use emu_core::{Cpu as CpuTrait, EmulatorError, Result};
use tracing::{debug, warn};

use crate::cartridge::Cartridge;
use crate::config::EmulatorConfig;
use crate::cpu::Cpu6502;
use crate::ines::Mirroring;
use crate::memory::Bus;
use crate::ppu::Ppu;
use crate::snapshot::CpuSnapshot;

/// A complete, runnable NES: one CPU driving one bus (RAM, PPU, controller
/// ports, cartridge). The cartridge socket starts empty; `insert` is the
/// only operation that can fail.
pub struct Console {
    cpu: Cpu6502<Bus>,
    config: EmulatorConfig,
}

impl Console {
    /// Power on with an empty cartridge socket. Call `insert` before
    /// stepping, or every cartridge-space read returns 0.
    pub fn new(config: EmulatorConfig) -> Self {
        let ppu = Ppu::new(Mirroring::Horizontal, config.suppress_nmi_on_vblank_race);
        let bus = Bus::new(ppu, Cartridge::empty());
        let mut cpu = Cpu6502::new(bus);
        cpu.reset();
        Self { cpu, config }
    }

    /// Parse an iNES image and install it, rejecting unsupported mappers.
    /// Resets the machine afterwards so execution starts from the new
    /// cartridge's reset vector.
    pub fn insert(&mut self, rom_bytes: &[u8]) -> Result<()> {
        let cartridge = match Cartridge::from_ines_bytes(rom_bytes) {
            Ok(cartridge) => cartridge,
            Err(EmulatorError::UnsupportedMapper(id)) => {
                warn!(mapper = id, "rejected ROM: unsupported mapper");
                return Err(EmulatorError::UnsupportedMapper(id));
            }
            Err(err) => return Err(err),
        };

        debug!(
            mapper = cartridge.mapper(),
            prg_banks = cartridge.prg_bank_count(),
            chr_banks = cartridge.chr_bank_count(),
            "loaded ROM"
        );

        let mirroring = cartridge.mirroring;
        let bus = self.cpu.memory_mut();
        bus.cartridge = cartridge;
        bus.ppu.mirroring = mirroring;

        self.reset();
        Ok(())
    }

    /// Convenience wrapper around `insert` for file-based ROMs.
    pub fn load_file(&mut self, path: &Path) -> Result<()> {
        let bytes = std::fs::read(path)?;
        self.insert(&bytes)
    }

    /// Re-seed CPU/PPU power-up state without re-parsing the cartridge.
    pub fn reset(&mut self) {
        self.cpu.reset();
        if let Some(pc) = self.config.nestest_start_pc {
            self.cpu.pc = pc;
        }
    }

    /// Execute exactly one CPU instruction (servicing any pending interrupt
    /// first), clock the PPU three times per CPU cycle consumed, and route
    /// a fresh NMI back into the CPU for service on the *next* call. Returns
    /// the CPU cycles the instruction itself consumed (not counting any
    /// OAMDMA stall, which the PPU still gets clocked for).
    pub fn step_instruction(&mut self) -> u8 {
        let cycles = self
            .cpu
            .step()
            .expect("CPU execution never fails; illegal opcodes are no-ops");

        let dma_stall = self.cpu.memory_mut().take_dma_stall();
        let stall = if dma_stall > 0 {
            dma_stall + if self.cpu.cycles % 2 == 1 { 1 } else { 0 }
        } else {
            0
        };

        for _ in 0..((cycles as u32 + stall) * 3) {
            self.tick_ppu();
        }

        cycles
    }

    fn tick_ppu(&mut self) {
        let bus = self.cpu.memory_mut();
        bus.ppu.clock(&mut bus.cartridge);
        if bus.ppu.take_nmi() {
            self.cpu.request_nmi();
        }
    }

    /// Run until the PPU completes a frame, then return the framebuffer.
    pub fn step_frame(&mut self) -> &[u8] {
        loop {
            self.step_instruction();
            if self.cpu.memory_mut().ppu.take_frame_complete() {
                break;
            }
        }
        self.framebuffer()
    }

    /// The current 256x240 RGB framebuffer, updated in place as each
    /// scanline is rendered.
    pub fn framebuffer(&self) -> &[u8] {
        self.cpu.memory().ppu.framebuffer()
    }

    /// Render one of the two CHR pattern tables through `palette` into a
    /// 128x128 RGB buffer, for debug tooling.
    pub fn pattern_table(&self, index: u8, palette: u8) -> Vec<u8> {
        let bus = self.cpu.memory();
        bus.ppu.pattern_table(&bus.cartridge, index, palette)
    }

    /// A fresh, owned snapshot of CPU state for debug tooling or nestest
    /// log-replay comparison.
    pub fn cpu_state(&mut self) -> CpuSnapshot {
        let (dot, scanline) = {
            let bus = self.cpu.memory();
            (bus.ppu.dot, bus.ppu.scanline)
        };
        self.cpu.snapshot(dot, scanline)
    }

    /// Latch an 8-bit button mask (NES physical shift-register bit order)
    /// for controller `index` (0 or 1). A placeholder for a real input
    /// subsystem, not a full controller implementation.
    pub fn set_controller(&mut self, index: u8, buttons: u8) {
        let mut state = ControllerState::new();
        state.buttons = Button::from_bits_truncate(buttons);
        self.cpu.memory_mut().set_controller(index, state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NESTEST_HEADER: [u8; 16] = [
        b'N', b'E', b'S', 0x1A, 2, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
    ];

    fn nestest_rom() -> Vec<u8> {
        let mut rom = NESTEST_HEADER.to_vec();
        let mut prg = vec![0xEAu8; 2 * 16384]; // all NOP
        let len = prg.len();
        prg[len - 4] = 0x00; // reset vector low byte -> $8000
        prg[len - 3] = 0x80; // reset vector high byte
        rom.extend(prg);
        rom.extend(std::iter::repeat(0u8).take(8192)); // CHR
        rom
    }

    #[test]
    fn new_console_has_an_empty_cartridge_and_does_not_panic() {
        let console = Console::new(EmulatorConfig::default());
        assert_eq!(console.framebuffer().len(), 256 * 240 * 3);
    }

    #[test]
    fn insert_rejects_unsupported_mapper() {
        let mut rom = NESTEST_HEADER.to_vec();
        rom[6] = 0x10; // mapper nibble low bits -> mapper 1
        rom.extend(std::iter::repeat(0xEAu8).take(2 * 16384));
        rom.extend(std::iter::repeat(0u8).take(8192));

        let mut console = Console::new(EmulatorConfig::default());
        let result = console.insert(&rom);
        assert!(matches!(result, Err(EmulatorError::UnsupportedMapper(1))));
    }

    #[test]
    fn insert_accepts_mapper_zero_and_resets_pc_to_vector() {
        let mut console = Console::new(EmulatorConfig::default());
        console.insert(&nestest_rom()).unwrap();
        // The fixture's reset vector points at $8000.
        assert_eq!(console.cpu.pc, 0x8000);
    }

    #[test]
    fn nestest_start_pc_override_applies_after_insert() {
        let config = EmulatorConfig {
            nestest_start_pc: Some(0xC000),
            ..EmulatorConfig::default()
        };
        let mut console = Console::new(config);
        console.insert(&nestest_rom()).unwrap();
        assert_eq!(console.cpu.pc, 0xC000);
    }

    #[test]
    fn step_instruction_advances_pc_past_a_single_byte_nop() {
        let mut console = Console::new(EmulatorConfig {
            nestest_start_pc: Some(0x8000),
            ..EmulatorConfig::default()
        });
        console.insert(&nestest_rom()).unwrap();
        let cycles = console.step_instruction();
        assert_eq!(cycles, 2); // NOP is 2 cycles
        assert_eq!(console.cpu.pc, 0x8001);
    }

    #[test]
    fn step_frame_returns_a_full_size_framebuffer() {
        let mut console = Console::new(EmulatorConfig {
            nestest_start_pc: Some(0x8000),
            ..EmulatorConfig::default()
        });
        console.insert(&nestest_rom()).unwrap();
        let frame = console.step_frame();
        assert_eq!(frame.len(), 256 * 240 * 3);
    }

    #[test]
    fn oamdma_write_stalls_the_next_instruction_by_513_or_514_cycles() {
        let mut console = Console::new(EmulatorConfig {
            nestest_start_pc: Some(0x8000),
            ..EmulatorConfig::default()
        });
        console.insert(&nestest_rom()).unwrap();
        let cycles_before = console.cpu.cycles;
        // STA $4014 would trigger this in real code; poke the bus directly
        // since the test ROM is all NOPs.
        {
            use crate::cpu::CpuMemory;
            CpuMemory::write(console.cpu.memory_mut(), 0x4014, 0x00);
        }
        console.step_instruction();
        let consumed = console.cpu.cycles - cycles_before;
        assert!(
            consumed >= 513,
            "expected OAMDMA stall to be counted, got {consumed}"
        );
    }

    #[test]
    fn cpu_state_reports_current_pc_and_cycle_count() {
        let mut console = Console::new(EmulatorConfig {
            nestest_start_pc: Some(0x8000),
            ..EmulatorConfig::default()
        });
        console.insert(&nestest_rom()).unwrap();
        let snap = console.cpu_state();
        assert_eq!(snap.pc, 0x8000);
        assert_eq!(snap.mnemonic, "NOP");
    }

    #[test]
    fn set_controller_latches_a_button_mask_for_later_reads() {
        let mut console = Console::new(EmulatorConfig::default());
        console.insert(&nestest_rom()).unwrap();
        console.set_controller(0, Button::A.bits());
        use crate::cpu::CpuMemory;
        CpuMemory::write(console.cpu.memory_mut(), 0x4016, 0x01);
        let bit = CpuMemory::read(console.cpu.memory_mut(), 0x4016) & 0x01;
        assert_eq!(bit, 0x01);
    }
}

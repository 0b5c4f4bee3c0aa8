//! NES CPU bus: address decode across RAM, PPU registers, controller ports,
//! and cartridge space.
//!
//! Grounded in `DaCodeChick-Lumi/crates/emu-nes/src/memory.rs`'s `NesMemory`
//! for the mirrored-RAM / PPU-register / cartridge-space decode and the
//! `MemoryObserver` notification wrapper, with the controller port reworked
//! onto `emu_core::types::{Button, ControllerState}` (whose bit layout
//! already matches the NES shift register's physical output order) and
//! OAMDMA added per this core's expanded specification. The APU window and
//! mapper-66 CHR banking are out of scope for this core and dropped.

use emu_core::types::{Button, ControllerState};
use emu_core::{EmulatorContext, MemoryBus, MemoryObserver};

use crate::cartridge::Cartridge;
use crate::cpu::CpuMemory;
use crate::ppu::Ppu;

/// CPU-facing bus: RAM, PPU register file, controller ports, and the
/// cartridge. Owns the PPU and cartridge so pixel-clocking can be driven
/// from outside without the caller juggling separate handles.
pub struct Bus {
    ram: [u8; 0x0800],
    pub ppu: Ppu,
    pub cartridge: Cartridge,

    controller1: ControllerState,
    controller2: ControllerState,
    controller1_shift: u8,
    controller2_shift: u8,
    controller_strobe: bool,

    observers: Vec<Box<dyn MemoryObserver>>,
    context: EmulatorContext,

    /// Base CPU stall cycles owed to the last $4014 write, consumed by
    /// `Console::step_instruction` (which alone knows the running cycle
    /// parity needed for the +1 odd-cycle adjustment).
    pending_dma_stall: u32,
}

impl Bus {
    pub fn new(ppu: Ppu, cartridge: Cartridge) -> Self {
        Self {
            ram: [0; 0x0800],
            ppu,
            cartridge,
            controller1: ControllerState::new(),
            controller2: ControllerState::new(),
            controller1_shift: 0,
            controller2_shift: 0,
            controller_strobe: false,
            observers: Vec::new(),
            context: EmulatorContext {
                frame: 0,
                cycle: 0,
                pc: 0,
                last_input: 0,
            },
            pending_dma_stall: 0,
        }
    }

    /// Take and clear the base (513-cycle) stall owed since the last
    /// OAMDMA write, or 0 if none is pending.
    pub fn take_dma_stall(&mut self) -> u32 {
        std::mem::take(&mut self.pending_dma_stall)
    }

    pub fn set_controller(&mut self, index: u8, state: ControllerState) {
        match index {
            0 => self.controller1 = state,
            _ => self.controller2 = state,
        }
    }

    /// Write the live strobe bit to $4016. While the strobe is held high both
    /// shift registers continuously reload from the current button state; on
    /// the falling edge they latch and begin shifting out on reads.
    fn write_controller_strobe(&mut self, value: u8) {
        self.controller_strobe = value & 0x01 != 0;
        if self.controller_strobe {
            self.controller1_shift = self.controller1.buttons.bits();
            self.controller2_shift = self.controller2.buttons.bits();
        }
    }

    fn read_controller(shift: &mut u8, strobe: bool, live: Button) -> u8 {
        let bit = if strobe {
            live.bits() & 0x01
        } else {
            let b = *shift & 0x01;
            *shift = (*shift >> 1) | 0x80;
            b
        };
        bit | 0x40
    }

    /// Synchronous OAMDMA: copies 256 bytes from `page << 8` into PPU OAM
    /// starting at the current OAMADDR. Real hardware stalls the CPU for
    /// 513 cycles (514 if the write lands on an odd CPU cycle); the caller
    /// is responsible for burning those cycles against the PPU/CPU clock.
    fn oam_dma(&mut self, page: u8) {
        let base = (page as u16) << 8;
        for i in 0..256u16 {
            let byte = self.read_internal(base + i);
            self.ppu.oam_dma_write(i as u8, byte);
        }
        self.pending_dma_stall = 513;
    }

    fn read_internal(&mut self, addr: u16) -> u8 {
        match addr {
            0x0000..=0x1FFF => self.ram[(addr & 0x07FF) as usize],
            0x2000..=0x3FFF => self.ppu.read_register(addr, &self.cartridge),
            0x4016 => {
                let live = self.controller1.buttons;
                Self::read_controller(&mut self.controller1_shift, self.controller_strobe, live)
            }
            0x4017 => {
                let live = self.controller2.buttons;
                Self::read_controller(&mut self.controller2_shift, self.controller_strobe, live)
            }
            0x4000..=0x4017 => 0,
            0x4020..=0xFFFF => self.cartridge.cpu_read(addr),
            _ => 0,
        }
    }

    fn write_internal(&mut self, addr: u16, value: u8) {
        match addr {
            0x0000..=0x1FFF => self.ram[(addr & 0x07FF) as usize] = value,
            0x2000..=0x3FFF => self.ppu.write_register(addr, value, &mut self.cartridge),
            0x4014 => self.oam_dma(value),
            0x4016 => self.write_controller_strobe(value),
            0x4000..=0x4017 => {}
            0x4020..=0xFFFF => self.cartridge.cpu_write(addr, value),
            _ => {}
        }
    }
}

impl CpuMemory for Bus {
    fn read(&mut self, addr: u16) -> u8 {
        let value = self.read_internal(addr);
        let context = self.context;
        for observer in &mut self.observers {
            observer.on_read(addr, value, &context);
        }
        value
    }

    fn write(&mut self, addr: u16, value: u8) {
        let old_value = self.read_internal(addr);
        self.write_internal(addr, value);
        let context = self.context;
        for observer in &mut self.observers {
            observer.on_write(addr, old_value, value, &context);
        }
    }
}

impl MemoryBus for Bus {
    fn read(&mut self, addr: u16) -> u8 {
        CpuMemory::read(self, addr)
    }

    fn write(&mut self, addr: u16, value: u8) {
        CpuMemory::write(self, addr, value)
    }

    fn attach_observer(&mut self, observer: Box<dyn MemoryObserver>) {
        self.observers.push(observer);
    }

    fn clear_observers(&mut self) {
        self.observers.clear();
    }

    fn context(&self) -> EmulatorContext {
        self.context
    }

    fn update_context(&mut self, context: EmulatorContext) {
        self.context = context;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ines::Mirroring;

    fn test_bus() -> Bus {
        let ppu = Ppu::new(Mirroring::Horizontal, true);
        Bus::new(ppu, Cartridge::empty())
    }

    #[test]
    fn ram_basic_readwrite() {
        let mut bus = test_bus();
        CpuMemory::write(&mut bus, 0x0000, 0x42);
        assert_eq!(CpuMemory::read(&mut bus, 0x0000), 0x42);
    }

    #[test]
    fn ram_mirrors_every_0x800() {
        let mut bus = test_bus();
        CpuMemory::write(&mut bus, 0x0000, 0x42);
        assert_eq!(CpuMemory::read(&mut bus, 0x0800), 0x42);
        assert_eq!(CpuMemory::read(&mut bus, 0x1000), 0x42);
        assert_eq!(CpuMemory::read(&mut bus, 0x1800), 0x42);
    }

    #[test]
    fn ppu_register_mirrors_every_8_bytes() {
        let mut bus = test_bus();
        CpuMemory::write(&mut bus, 0x2003, 0x00);
        CpuMemory::write(&mut bus, 0x2004, 0x42);
        CpuMemory::write(&mut bus, 0x2003, 0x00);
        assert_eq!(CpuMemory::read(&mut bus, 0x2004), 0x42);
        assert_eq!(CpuMemory::read(&mut bus, 0x200C), 0x42);
        assert_eq!(CpuMemory::read(&mut bus, 0x3004), 0x42);
    }

    #[test]
    fn controller_strobe_high_always_returns_a_button() {
        let mut bus = test_bus();
        let mut state = ControllerState::new();
        state.press(Button::A);
        bus.set_controller(0, state);
        CpuMemory::write(&mut bus, 0x4016, 0x01);
        assert_eq!(CpuMemory::read(&mut bus, 0x4016) & 0x01, 0x01);
        assert_eq!(CpuMemory::read(&mut bus, 0x4016) & 0x01, 0x01);
    }

    #[test]
    fn controller_shifts_out_lsb_first_after_strobe_falls() {
        let mut bus = test_bus();
        let mut state = ControllerState::new();
        state.press(Button::A);
        state.press(Button::SELECT);
        bus.set_controller(0, state);

        CpuMemory::write(&mut bus, 0x4016, 0x01);
        CpuMemory::write(&mut bus, 0x4016, 0x00);

        let bits: Vec<u8> = (0..8)
            .map(|_| CpuMemory::read(&mut bus, 0x4016) & 0x01)
            .collect();
        assert_eq!(bits, vec![1, 0, 1, 0, 0, 0, 0, 0]);

        // Past the 8th shift the register reads back all ones.
        assert_eq!(CpuMemory::read(&mut bus, 0x4016) & 0x01, 1);
    }

    #[test]
    fn oamdma_copies_256_bytes_from_the_given_page() {
        let mut bus = test_bus();
        for i in 0..256u16 {
            CpuMemory::write(&mut bus, 0x0000 + i, i as u8);
        }
        CpuMemory::write(&mut bus, 0x2003, 0x00);
        CpuMemory::write(&mut bus, 0x4014, 0x00);
        assert_eq!(bus.ppu.oam[0x10], 0x10);
        assert_eq!(bus.ppu.oam[0xFF], 0xFF);
    }

    #[test]
    fn oamdma_latches_a_513_cycle_stall_that_is_consumed_once() {
        let mut bus = test_bus();
        CpuMemory::write(&mut bus, 0x4014, 0x00);
        assert_eq!(bus.take_dma_stall(), 513);
        assert_eq!(bus.take_dma_stall(), 0);
    }
}

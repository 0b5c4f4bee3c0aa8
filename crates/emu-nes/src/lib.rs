//! Core of a Nintendo Entertainment System emulator: 6502 CPU, 2C02 PPU,
//! CPU bus, and mapper-0 cartridge support. No APU, no input beyond raw
//! controller state, no frontend.

pub mod cartridge;
pub mod config;
pub mod cpu;
pub mod ines;
pub mod memory;
pub mod palette;
pub mod ppu;
pub mod snapshot;
pub mod system;

pub use cartridge::Cartridge;
pub use config::EmulatorConfig;
pub use cpu::{Cpu6502, CpuMemory};
pub use ines::Mirroring;
pub use memory::Bus;
pub use palette::{framebuffer_to_rgb, palette_to_rgb, NES_PALETTE};
pub use ppu::Ppu;
pub use snapshot::CpuSnapshot;
pub use system::Console;

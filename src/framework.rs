//! Simulation harness.
//!
//! Everything in this crate is fully synchronous: a single logical clock,
//! no threads. Each tick runs in two phases, mirroring real hardware.
//! First all combinational signals are propagated from the current
//! registered state (memory addresses, PE operands, the bus response);
//! then, on the rising edge, every register latches at once — the FSM
//! using start-of-tick values of the memory and PE output registers, the
//! memories latching their read data before committing writes, the PE
//! capturing its product. [`crate::bridge::AccelBridge::step`] performs
//! one such tick; `AccelSim` wraps it with a cycle counter and the small
//! conveniences the host side needs.
//!
//! There is no blocking primitive anywhere: "waiting" for the accelerator
//! is always an external loop polling STATUS across many ticks.

use crate::bridge::{AccelBridge, BusReq};
use crate::geom::Geometry;

pub struct AccelSim {
    bridge: AccelBridge,
    cycle_count: u64,
}

impl AccelSim {
    pub fn new(geom: Geometry) -> Self {
        Self {
            bridge: AccelBridge::new(geom),
            cycle_count: 0,
        }
    }

    /// Advance one tick, presenting `req` on the bus. Returns the read
    /// data for read requests, 0 otherwise.
    pub fn step(&mut self, req: Option<BusReq>) -> u32 {
        self.cycle_count += 1;
        self.bridge.step(req)
    }

    /// Run `n` ticks with the bus idle.
    pub fn idle(&mut self, n: u64) {
        for _ in 0..n {
            self.step(None);
        }
    }

    /// Bus read occupying one tick.
    pub fn read(&mut self, addr: u32) -> u32 {
        self.step(Some(BusReq::read(addr)))
    }

    /// Full-word bus write occupying one tick.
    pub fn write(&mut self, addr: u32, wdata: u32) {
        self.step(Some(BusReq::write(addr, wdata)));
    }

    pub fn cycle_count(&self) -> u64 {
        self.cycle_count
    }

    pub fn bridge(&self) -> &AccelBridge {
        &self.bridge
    }
}

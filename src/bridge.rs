//! The register-mapped bridge: owns the matrix storage and the register
//! file, decodes bus addresses, and wires the controller, the memories and
//! the PE together once per tick.

use crate::ctrl::MacController;
use crate::geom::Geometry;
use crate::units::{MacUnit, SyncMem};

/// Register byte offsets from the component's base address.
pub const CONTROL_OFFSET: u32 = 0x000;
pub const STATUS_OFFSET: u32 = 0x004;
pub const CONFIG_OFFSET: u32 = 0x008;
pub const MATRIX_A_OFFSET: u32 = 0x100;
pub const MATRIX_B_OFFSET: u32 = 0x200;
pub const MATRIX_C_OFFSET: u32 = 0x300;

/// Each matrix window spans this many bytes regardless of geometry.
pub const WINDOW_SIZE: u32 = 0x100;

/// CONTROL bit 0: start. Self-clearing one-tick pulse.
pub const CONTROL_START: u32 = 1 << 0;
/// CONTROL bit 1: reset. Level-sensitive; holds the controller in reset
/// for as long as it stays set.
pub const CONTROL_RESET: u32 = 1 << 1;

/// STATUS bit 0: busy. Always the complement of done.
pub const STATUS_BUSY: u32 = 1 << 0;
/// STATUS bit 1: done.
pub const STATUS_DONE: u32 = 1 << 1;

/// One bus transaction: 32-bit address and data, four byte-enable bits.
/// The bridge is always ready and answers combinationally in the tick the
/// request is presented.
#[derive(Debug, Clone, Copy)]
pub struct BusReq {
    /// Byte offset from the component base. The owning interconnect routes
    /// only in-window addresses here.
    pub addr: u32,
    pub wdata: u32,
    /// Byte-enable bits, one per lane of the 32-bit word. Ignored on reads.
    pub wstrb: u8,
    pub write: bool,
}

impl BusReq {
    pub fn read(addr: u32) -> Self {
        Self {
            addr,
            wdata: 0,
            wstrb: 0,
            write: false,
        }
    }

    /// Full-word write (all four byte lanes enabled).
    pub fn write(addr: u32, wdata: u32) -> Self {
        Self {
            addr,
            wdata,
            wstrb: 0xf,
            write: true,
        }
    }

    /// Write with an explicit byte-enable mask.
    pub fn write_strb(addr: u32, wdata: u32, wstrb: u8) -> Self {
        Self {
            addr,
            wdata,
            wstrb,
            write: true,
        }
    }
}

/// Merge the enabled byte lanes of `wdata` into `cur`.
fn merge_lanes(cur: u32, wdata: u32, wstrb: u8) -> u32 {
    let mut out = cur;
    for lane in 0..4 {
        if wstrb & (1 << lane) != 0 {
            let mask = 0xffu32 << (lane * 8);
            out = (out & !mask) | (wdata & mask);
        }
    }
    out
}

/// The bridge owns every piece of registered state behind the register
/// window: CONTROL and CONFIG, the three matrix memories, the controller
/// and the PE. STATUS is derived, never stored.
///
/// Nothing here guards the matrix storage against a bus write landing
/// while a session is in flight; the caller must poll busy first.
pub struct AccelBridge {
    geom: Geometry,
    control: u32,
    config: u32,
    mem_a: SyncMem<i8>,
    mem_b: SyncMem<i8>,
    mem_c: SyncMem<i32>,
    pe: MacUnit,
    ctrl: MacController,
}

impl AccelBridge {
    pub fn new(geom: Geometry) -> Self {
        Self {
            geom,
            control: 0,
            // CONFIG resets to the packed construction-time dimensions;
            // the register is metadata only and never reaches the FSM
            config: geom.config_word(),
            mem_a: SyncMem::new(geom.a_len()),
            mem_b: SyncMem::new(geom.b_len()),
            mem_c: SyncMem::new(geom.c_len()),
            pe: MacUnit::new(),
            ctrl: MacController::new(geom),
        }
    }

    pub fn geometry(&self) -> Geometry {
        self.geom
    }

    /// STATUS word, derived purely from the controller's done output.
    pub fn status(&self) -> u32 {
        if self.ctrl.done() {
            STATUS_DONE
        } else {
            STATUS_BUSY
        }
    }

    pub fn done(&self) -> bool {
        self.ctrl.done()
    }

    /// Advance one tick. The request, if any, is decoded combinationally:
    /// reads return data from start-of-tick state in the same tick, writes
    /// commit on this tick's edge. Returns the read data (0 for writes and
    /// idle ticks).
    pub fn step(&mut self, req: Option<BusReq>) -> u32 {
        // propagate: controller wires from current registered state
        let sigs = self.ctrl.propagate(self.mem_b.out());
        let rdata = match req {
            Some(r) if !r.write => self.read_decode(r.addr),
            _ => 0,
        };
        let start = self.control & CONTROL_START != 0;
        let reset = self.control & CONTROL_RESET != 0;

        // rising edge: the controller samples the memory and PE output
        // registers before those units latch new values
        self.ctrl
            .rising_edge(start, reset, self.mem_a.out(), self.pe.out());
        self.pe
            .rising_edge(sigs.pe_a, sigs.pe_b, sigs.pe_c, sigs.pe_valid);
        self.mem_a.rising_edge(sigs.a_rd_addr, None);
        self.mem_b.rising_edge(sigs.b_rd_addr, None);
        self.mem_c.rising_edge(0, sigs.c_write);
        if let Some((addr, data)) = sigs.c_write {
            tracing::trace!(addr, data, "result write");
        }

        // the start pulse clears one tick after it was observed set; a bus
        // write landing on this same edge takes priority and may re-arm it
        if start {
            self.control &= !CONTROL_START;
        }
        if let Some(r) = req {
            if r.write {
                self.write_decode(r.addr, r.wdata, r.wstrb);
            }
        }
        rdata
    }

    fn read_decode(&self, addr: u32) -> u32 {
        let word = addr & !0x3;
        match word {
            CONTROL_OFFSET => self.control,
            STATUS_OFFSET => self.status(),
            CONFIG_OFFSET => self.config,
            MATRIX_A_OFFSET..=0x1ff => {
                let idx = ((word - MATRIX_A_OFFSET) / 4) as usize;
                if idx < self.geom.a_len() {
                    self.mem_a.peek(idx) as u8 as u32
                } else {
                    0
                }
            }
            MATRIX_B_OFFSET..=0x2ff => {
                let idx = ((word - MATRIX_B_OFFSET) / 4) as usize;
                if idx < self.geom.b_len() {
                    self.mem_b.peek(idx) as u8 as u32
                } else {
                    0
                }
            }
            MATRIX_C_OFFSET..=0x3ff => {
                let idx = ((word - MATRIX_C_OFFSET) / 4) as usize;
                if idx < self.geom.c_len() {
                    self.mem_c.peek(idx) as u32
                } else {
                    0
                }
            }
            // unmapped holes inside the window read as zero; anything past
            // the window is the interconnect's to route elsewhere
            _ => 0,
        }
    }

    fn write_decode(&mut self, addr: u32, wdata: u32, wstrb: u8) {
        let word = addr & !0x3;
        match word {
            CONTROL_OFFSET => {
                // only the two defined bits are implemented
                self.control = merge_lanes(self.control, wdata, wstrb) & 0x3;
                tracing::debug!(control = self.control, "control write");
            }
            STATUS_OFFSET => {
                // read-only, silently ignored
            }
            CONFIG_OFFSET => {
                // stored and readable but functionally inert: the FSM's
                // dimensions are fixed at construction
                self.config = merge_lanes(self.config, wdata, wstrb);
            }
            MATRIX_A_OFFSET..=0x1ff => {
                let idx = ((word - MATRIX_A_OFFSET) / 4) as usize;
                if wstrb & 1 != 0 && idx < self.geom.a_len() {
                    self.mem_a.poke(idx, wdata as u8 as i8);
                }
            }
            MATRIX_B_OFFSET..=0x2ff => {
                let idx = ((word - MATRIX_B_OFFSET) / 4) as usize;
                if wstrb & 1 != 0 && idx < self.geom.b_len() {
                    self.mem_b.poke(idx, wdata as u8 as i8);
                }
            }
            MATRIX_C_OFFSET..=0x3ff => {
                // the FSM owns C; bus writes are silently ignored
            }
            _ => {}
        }
    }
}

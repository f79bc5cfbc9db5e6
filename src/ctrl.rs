//! The multiply-accumulate controller: an explicit finite state machine
//! driving the operand memories and the processing element through the
//! nested-loop dot product.
//!
//! Two latencies shape the state sequence. The operand memories have a
//! registered read (data valid one tick after the address), and the PE has
//! a registered result. `FetchA`/`WaitA` absorb the A-side read latency;
//! B needs no wait state because its address is driven combinationally
//! from the counters on every tick and has therefore been stable since the
//! tick `k` last changed, one tick ahead of A's. `Compute` absorbs the PE
//! latency. `WriteC` holds the C write address stable for its entire tick
//! and defers every counter update to `UpdateIj` — merging the two states
//! races the write address against the counters, and the memory may then
//! commit the result to a half-updated address.

use crate::geom::Geometry;

/// Controller state. One session walks `Idle → (FetchA → WaitA → FetchB →
/// Compute)* → WriteC → UpdateIj → … → Finish → Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum State {
    #[default]
    Idle,
    FetchA,
    WaitA,
    FetchB,
    Compute,
    WriteC,
    UpdateIj,
    Finish,
}

/// Combinational outputs of the controller, recomputed every tick from the
/// registered state. The bridge wires these onto the memory and PE ports.
#[derive(Debug, Clone, Copy)]
pub struct CtrlSignals {
    /// Read address for the A memory (`i*n + k`).
    pub a_rd_addr: usize,
    /// Read address for the B memory (`j*n + k`), driven on every tick.
    pub b_rd_addr: usize,
    /// C write port: `(address, data)` asserted only during `WriteC`.
    pub c_write: Option<(usize, i32)>,
    pub pe_a: i8,
    pub pe_b: i8,
    pub pe_c: i32,
    pub pe_valid: bool,
}

pub struct MacController {
    geom: Geometry,
    state: State,
    i: usize,
    j: usize,
    k: usize,
    acc: i32,
    a_reg: i8,
    done: bool,
}

impl MacController {
    /// A fresh controller reads as done: a never-started core is not busy,
    /// which the host driver relies on right after reset.
    pub fn new(geom: Geometry) -> Self {
        Self {
            geom,
            state: State::Idle,
            i: 0,
            j: 0,
            k: 0,
            acc: 0,
            a_reg: 0,
            done: true,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn done(&self) -> bool {
        self.done
    }

    /// Compute this tick's wire-level outputs. `b_data` is the B memory's
    /// output register, fed combinationally into the PE during `FetchB`.
    pub fn propagate(&self, b_data: i8) -> CtrlSignals {
        let n = self.geom.n;
        CtrlSignals {
            a_rd_addr: self.i * n + self.k,
            b_rd_addr: self.j * n + self.k,
            c_write: match self.state {
                State::WriteC => Some((self.i * self.geom.p + self.j, self.acc)),
                _ => None,
            },
            pe_a: self.a_reg,
            pe_b: b_data,
            // first partial product of each output element starts from zero
            pe_c: if self.k == 0 { 0 } else { self.acc },
            pe_valid: self.state == State::FetchB,
        }
    }

    /// One clock edge. `a_data` is the A memory's output register and
    /// `pe_out` the PE's output register, both holding start-of-tick
    /// values; the caller must sample them before clocking those units.
    ///
    /// `reset` is level-sensitive and overrides everything else; `start`
    /// is only honored in `Idle` (a start observed mid-session is
    /// ignored) and holds off the `Finish → Idle` return while asserted.
    pub fn rising_edge(&mut self, start: bool, reset: bool, a_data: i8, pe_out: (i32, bool)) {
        if reset {
            if self.state != State::Idle {
                tracing::debug!(state = ?self.state, "controller reset mid-session");
            }
            self.state = State::Idle;
            self.i = 0;
            self.j = 0;
            self.k = 0;
            self.acc = 0;
            self.a_reg = 0;
            self.done = true;
            return;
        }

        let prev = self.state;
        match self.state {
            State::Idle => {
                if start {
                    self.i = 0;
                    self.j = 0;
                    self.k = 0;
                    self.acc = 0;
                    self.done = false;
                    self.state = State::FetchA;
                    let Geometry { m, n, p } = self.geom;
                    tracing::info!(m, n, p, "session start");
                }
            }
            State::FetchA => {
                // A read address presented this tick; data arrives next tick
                self.state = State::WaitA;
            }
            State::WaitA => {
                self.a_reg = a_data;
                self.state = State::FetchB;
            }
            State::FetchB => {
                // PE inputs were strobed this tick; result registers now
                self.state = State::Compute;
            }
            State::Compute => {
                let (d, valid) = pe_out;
                if valid {
                    self.acc = d;
                    if self.k < self.geom.n - 1 {
                        self.k += 1;
                        self.state = State::FetchA;
                    } else {
                        self.state = State::WriteC;
                    }
                }
            }
            State::WriteC => {
                // counters are frozen this tick; the memory commits the
                // write on this same edge with the address still stable
                self.state = State::UpdateIj;
            }
            State::UpdateIj => {
                self.k = 0;
                self.acc = 0;
                if self.i == self.geom.m - 1 && self.j == self.geom.p - 1 {
                    self.done = true;
                    self.state = State::Finish;
                    tracing::info!(elements = self.geom.c_len(), "session complete");
                } else if self.j == self.geom.p - 1 {
                    self.i += 1;
                    self.j = 0;
                    self.state = State::FetchA;
                } else {
                    self.j += 1;
                    self.state = State::FetchA;
                }
            }
            State::Finish => {
                // stay here while start is still high so the triggering
                // write cannot immediately relaunch the session
                if !start {
                    self.state = State::Idle;
                }
            }
        }
        if prev != self.state {
            tracing::trace!(from = ?prev, to = ?self.state, i = self.i, j = self.j, k = self.k, "fsm");
        }
    }
}

//! Leaf hardware units: the synchronous memory model and the
//! multiply-accumulate processing element.
//!
//! Both units register their outputs. A value presented on the inputs
//! during tick T is observable on [`SyncMem::out`] / [`MacUnit::out`] only
//! from tick T+1 on. The controller's state sequence exists to absorb
//! exactly these two latencies, so collapsing either register breaks the
//! whole design.

/// Synchronous memory with one write port, one independent read port and a
/// one-cycle registered read latency.
///
/// The read address presented at tick T latches the value stored *as of
/// tick T* into the output register; a write arriving on the same edge is
/// not visible until the next read. Consumers sampling [`SyncMem::out`]
/// during the tick the address changed still observe the previous data.
///
/// `peek`/`poke` bypass the clocked ports. They model the register
/// bridge's direct ownership of the backing array (bus window accesses do
/// not go through the read port and therefore have no latency).
pub struct SyncMem<T> {
    cells: Vec<T>,
    rd_data: T,
}

impl<T: Copy + Default> SyncMem<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            cells: vec![T::default(); capacity],
            rd_data: T::default(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.cells.len()
    }

    /// Contents of the read output register: the data for the address that
    /// was presented on the previous rising edge.
    pub fn out(&self) -> T {
        self.rd_data
    }

    /// Direct (unclocked) read of the backing array.
    pub fn peek(&self, addr: usize) -> T {
        self.cells[addr]
    }

    /// Direct (unclocked) write to the backing array.
    pub fn poke(&mut self, addr: usize, val: T) {
        self.cells[addr] = val;
    }

    /// One clock edge: latch the read output for `rd_addr`, then commit the
    /// write port. Latching first gives the read-old-data behavior of a
    /// registered-output RAM.
    pub fn rising_edge(&mut self, rd_addr: usize, wr: Option<(usize, T)>) {
        self.rd_data = self.cells[rd_addr];
        if let Some((addr, data)) = wr {
            self.cells[addr] = data;
        }
    }
}

/// The processing element: a registered multiply-accumulate unit.
///
/// Given operands `a`, `b`, a running sum `c` and a `valid` strobe at tick
/// T, the output register holds `a * b + c` (32-bit signed, wrapping) at
/// tick T+1 together with a valid flag mirroring the strobe one tick late.
#[derive(Default)]
pub struct MacUnit {
    d: i32,
    valid: bool,
}

impl MacUnit {
    pub fn new() -> Self {
        Self::default()
    }

    /// `(result, valid)` as latched on the previous rising edge.
    pub fn out(&self) -> (i32, bool) {
        (self.d, self.valid)
    }

    pub fn rising_edge(&mut self, a: i8, b: i8, c: i32, valid: bool) {
        self.d = (a as i32).wrapping_mul(b as i32).wrapping_add(c);
        self.valid = valid;
    }
}

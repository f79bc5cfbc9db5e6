//! Matrix geometry fixed at construction time.

/// Dimensions of one accelerator instance: A is `m`×`n`, B is `n`×`p` and
/// C is `m`×`p`. The element type is `i8` and the accumulator is `i32`, so
/// the true sum of `n` products fits without overflow for every `n` up to
/// 2^16 (the accumulator keeps `32 - 16 = 16` headroom bits over a 16-bit
/// product).
///
/// The controller performs no runtime validation of these values; they are
/// checked once here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub m: usize,
    pub n: usize,
    pub p: usize,
}

impl Geometry {
    /// Each matrix window spans 0x100 bytes of the register map, which
    /// bounds a matrix to 64 word-addressed elements.
    pub const MAX_WINDOW_ELEMS: usize = 64;

    pub fn new(m: usize, n: usize, p: usize) -> Self {
        assert!(m > 0 && n > 0 && p > 0, "matrix dimensions must be nonzero");
        assert!(
            m * n <= Self::MAX_WINDOW_ELEMS
                && n * p <= Self::MAX_WINDOW_ELEMS
                && m * p <= Self::MAX_WINDOW_ELEMS,
            "matrix does not fit its register window"
        );
        Self { m, n, p }
    }

    /// Number of elements in A (row-major).
    pub fn a_len(&self) -> usize {
        self.m * self.n
    }

    /// Number of elements in B (stored column-contiguous).
    pub fn b_len(&self) -> usize {
        self.n * self.p
    }

    /// Number of elements in C (row-major).
    pub fn c_len(&self) -> usize {
        self.m * self.p
    }

    /// Dimension metadata as packed into the CONFIG register:
    /// `[31:16] = p`, `[15:8] = n`, `[7:0] = m`.
    pub fn config_word(&self) -> u32 {
        ((self.p as u32) << 16) | ((self.n as u32) << 8) | self.m as u32
    }
}

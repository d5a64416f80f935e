/// The byte order of multi-byte values in the input.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum Endian {
    /// Big-endian (most-significant byte first).
    Big,
    /// Little-endian (least-significant byte first).
    Little,
}

impl Endian {
    /// The native byte order of the target architecture.
    pub const fn native() -> Self {
        #[cfg(target_endian = "big")]
        let endian = Self::Big;

        #[cfg(target_endian = "little")]
        let endian = Self::Little;

        endian
    }

    /// Returns `true` if this is the native byte order, meaning values can be reinterpreted
    /// without reversing their bytes.
    #[inline(always)]
    pub const fn is_native(self) -> bool {
        matches!(
            (self, Self::native()),
            (Self::Big, Self::Big) | (Self::Little, Self::Little)
        )
    }

    /// Puts `bytes`, stored in this byte order, into native order.
    #[inline(always)]
    pub(crate) fn to_native<const N: usize>(self, mut bytes: [u8; N]) -> [u8; N] {
        if !self.is_native() {
            bytes.reverse();
        }
        bytes
    }
}

impl Default for Endian {
    /// Defaults to the native byte order.
    fn default() -> Self {
        Self::native()
    }
}

// SPDX-License-Identifier: MIT

/// Expands to a `read_<ty>_at` / `write_<ty>_at` pair per integer type,
/// as default methods of [`crate::BlockIOExt`].
///
/// On-disk integers are little-endian regardless of the host.
macro_rules! blockio_impl_primitive_rw {
    ($($ty:ident),+ $(,)?) => {
        $(
            paste::paste! {
                #[doc = "Reads a little-endian `" $ty "` at `offset`."]
                #[inline]
                fn [<read_ $ty _at>](&mut self, offset: u64) -> $crate::errors::BlockIOResult<$ty> {
                    let mut raw = [0u8; core::mem::size_of::<$ty>()];
                    self.read_at(offset, &mut raw)?;
                    Ok($ty::from_le_bytes(raw))
                }

                #[doc = "Writes `value` little-endian at `offset`."]
                #[inline]
                fn [<write_ $ty _at>](&mut self, offset: u64, value: $ty) -> $crate::errors::BlockIOResult {
                    self.write_at(offset, &value.to_le_bytes())
                }
            }
        )+
    };
}

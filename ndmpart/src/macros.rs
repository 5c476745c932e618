// SPDX-License-Identifier: MIT

#[macro_export]
/// Defines a set of GPT partition types.
///
/// GUIDs are given in their on-disk byte order (first three fields little-endian).
///
/// This macro generates:
/// - A constant `GPT_PARTITION_TYPE_<NAME>: [u8; 16]` for each partition type.
/// - An enum `GptPartitionKind` with one variant per type and an `Unknown` variant.
/// - `from_guid`, `as_guid` and a `Display` implementation for `GptPartitionKind`.
///
/// # Example
/// ```rust,ignore
/// define_partition_types! {
///     LINUX_FS => "Linux filesystem", [0xAF, 0x3D, 0xC6, 0x0F, 0x83, 0x84, 0x72, 0x47, 0x8E, 0x79, 0x3D, 0x69, 0xD8, 0x47, 0x7D, 0xE4],
/// }
/// ```
///
/// # Note
/// This macro requires the `paste` crate for identifier concatenation.
macro_rules! define_partition_types {
    (
        $(
            $name:ident => $desc:expr, $guid:expr
        ),+ $(,)?
    ) => {
        paste::paste! {
            $(
                #[doc = $desc]
                pub const [<GPT_PARTITION_TYPE_ $name:upper>]: [u8; 16] = $guid;
            )+

            #[allow(non_camel_case_types)]
            #[derive(Debug, Clone, Copy, PartialEq, Eq)]
            pub enum GptPartitionKind {
                $($name,)+
                Unknown([u8; 16]),
            }

            impl GptPartitionKind {
                pub fn from_guid(guid: &[u8; 16]) -> Self {
                    match guid {
                        $(g if g == &[<GPT_PARTITION_TYPE_ $name:upper>] => Self::$name,)+
                        other => Self::Unknown(*other),
                    }
                }

                pub fn as_guid(&self) -> &[u8; 16] {
                    match self {
                        $(Self::$name => &[<GPT_PARTITION_TYPE_ $name:upper>],)+
                        Self::Unknown(guid) => guid,
                    }
                }
            }

            impl core::fmt::Display for GptPartitionKind {
                fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                    match self {
                        $(Self::$name => f.write_str($desc),)+
                        Self::Unknown(guid) => write!(f, "Unknown ({:02X?})", guid),
                    }
                }
            }
        }
    };
}

//! The [`wire_enum!`](crate::wire_enum) macro for enums carried as a single byte.

/// Declare a fieldless enum with explicit one-byte wire codes.
///
/// Generates `code()`, an `ALL` slice in declaration order and a
/// `TryFrom<u8>` that reports unknown codes as
/// [`InteropError::UnknownCode`](crate::InteropError::UnknownCode). The
/// calling crate must depend on `serde`.
///
/// ```
/// worker_interop::wire_enum! {
///     /// Traffic light.
///     pub enum Light: "light" {
///         Red = 1,
///         Green = 2,
///     }
/// }
///
/// assert_eq!(Light::Green.code(), 2);
/// assert_eq!(Light::try_from(1).unwrap(), Light::Red);
/// assert!(Light::try_from(3).is_err());
/// ```
#[macro_export]
macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident: $kind:literal {
            $($(#[$vmeta:meta])* $variant:ident = $code:literal,)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        $vis enum $name {
            $($(#[$vmeta])* $variant,)+
        }

        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant,)+];

            /// The one-byte wire code.
            #[must_use]
            pub const fn code(self) -> u8 {
                match self {
                    $($name::$variant => $code,)+
                }
            }
        }

        impl TryFrom<u8> for $name {
            type Error = $crate::InteropError;

            fn try_from(code: u8) -> Result<Self, <Self as TryFrom<u8>>::Error> {
                match code {
                    $($code => Ok($name::$variant),)+
                    _ => Err($crate::InteropError::UnknownCode { kind: $kind, code }),
                }
            }
        }
    };
}

//! Record declarations.
//!
//! [`xdr_record!`](crate::xdr_record) declares a struct once and derives its
//! wire form from the field list: `encode` and `decode` walk the fields in
//! declaration order, `MAX_ENCODED_LEN` is the sum of the field bounds, and
//! `release` releases every field.
//!
//! ```
//! use krpc_common::xdr::{BoundedBytes, XdrCodec};
//!
//! krpc_common::xdr_record! {
//!     #[derive(Debug, Default)]
//!     pub struct Mount {
//!         pub path: BoundedBytes<32>,
//!         pub flags: u32,
//!     }
//! }
//!
//! assert_eq!(Mount::MAX_ENCODED_LEN, 4 + 32 + 4);
//! ```

/// Declares a record struct together with its `XdrCodec` and `Release`
/// impls.
///
/// Every field type must implement both traits.
#[macro_export]
macro_rules! xdr_record {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$field_meta:meta])*
                $field_vis:vis $field:ident : $ty:ty
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis struct $name {
            $(
                $(#[$field_meta])*
                $field_vis $field: $ty,
            )*
        }

        impl $crate::xdr::XdrCodec for $name {
            const MAX_ENCODED_LEN: usize =
                0 $(+ <$ty as $crate::xdr::XdrCodec>::MAX_ENCODED_LEN)*;

            fn encode(
                &self,
                enc: &mut $crate::xdr::XdrEncoder,
            ) -> $crate::protocol::Result<()> {
                $( $crate::xdr::XdrCodec::encode(&self.$field, enc)?; )*
                Ok(())
            }

            fn decode(
                dec: &mut $crate::xdr::XdrDecoder<'_>,
            ) -> $crate::protocol::Result<Self> {
                $( let $field = <$ty as $crate::xdr::XdrCodec>::decode(dec)?; )*
                Ok(Self { $($field),* })
            }
        }

        impl $crate::xdr::Release for $name {
            fn release(&mut self) {
                $( $crate::xdr::Release::release(&mut self.$field); )*
            }
        }
    };
}

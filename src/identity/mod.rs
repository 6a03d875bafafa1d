//! Resource identity: opaque handles and the codecs that build them.
//!
//! A [`ResourceHandle`] is the only durable artifact the engine hands back to
//! callers. Its structure is private to the [`IdentifierCodec`] that built it.

mod arn;
mod codec;
mod handle;

pub use arn::{Arn, decode_from_arn};
pub use codec::IdentifierCodec;
pub use handle::ResourceHandle;

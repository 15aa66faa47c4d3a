mod archive;
mod compressed;
mod shared;
mod stream;
mod table;

pub mod error;
pub mod member;
pub mod payload;

pub use archive::*;
pub use compressed::CodecReader;
pub use error::{Error, Result};
pub use member::{InodeId, Member};
pub use payload::{Codec, PayloadLayout};
pub use shared::StreamHandle;
pub use stream::{CachingReader, SubFile};

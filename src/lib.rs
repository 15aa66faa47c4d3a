//! Rpmint provides a read-only ***RPM*** payload ***int***erface. The API focuses on the member
//! archive embedded in an RPM package: listing members, looking them up by name, and reading
//! their contents without unpacking the whole payload into memory up front.
//!
//! The outer RPM lead and header sections are out of scope; a header parser tells this crate
//! where the compressed payload begins and which codec compresses it, via [`PayloadLayout`].
//!
//! ## Feature Flags
//! The payload decompressors are optional:
//! * `gzip` (default): gzip payloads via `flate2`
//! * `xz` (default): xz payloads via `lzma-rs`
//! * `zstd` (default): zstd payloads via `ruzstd`
//!
//! Uncompressed payloads (`"none"`) are always supported. Asking for a codec that this build
//! lacks fails with [`Error::UnsupportedCodec`](rpm::Error::UnsupportedCodec), distinct from
//! any malformed-archive error.
//!
//! ## Usage Example
//! ```rust,no_run
//! use std::io;
//! use rpmint::rpm::{PayloadLayout, RpmArchive};
//!
//! fn print_config_from_rpm() -> rpmint::rpm::Result<()> {
//!     // The header parser has located the payload and reported its codec.
//!     let layout = PayloadLayout::new(0x1c40, "gzip");
//!     let rpm = RpmArchive::open("package.rpm", layout)?;
//!
//!     // List the members of the archive
//!     for m in rpm.members()? {
//!         println!("{} ({} bytes)", m.name(), m.size());
//!     }
//!
//!     // Open a member to read its contents
//!     let mut reader = rpm.open_file("./etc/app.conf")?;
//!     let mut stdout = io::stdout().lock();
//!     io::copy(&mut reader, &mut stdout)?;
//!     Ok(())
//! }
//! ```
//!
//! [`PayloadLayout`]: rpm::PayloadLayout

pub mod rpm;

//! # Vault Cryptography
//!
//! The vault key and the encrypted container format.
//!
//! ## Key
//!
//! One AES-256 key per installation, kept in the OS credential store and
//! created on first use by [`KeyProvider`].
//!
//! ## Container format
//!
//! Media is split into fixed-size chunks, each sealed independently with
//! AES-256-GCM, so any byte range can be decrypted by touching only the
//! chunks it overlaps:
//!
//! ```text
//! ┌──────────────────────────── header (30 bytes, LE) ────────────────────────────┐
//! │ version u16 │ chunk_size u32 │ total_length u64 │ chunk_count u32 │ nonce [12] │
//! └───────────────────────────────────────────────────────────────────────────────┘
//! ┌─────────┬──────────────────┐┌─────────┬──────────────────┐     ┌─────────┬──────┐
//! │ tag[16] │ ciphertext[cs]   ││ tag[16] │ ciphertext[cs]   │ ... │ tag[16] │ last │
//! └─────────┴──────────────────┘└─────────┴──────────────────┘     └─────────┴──────┘
//! ```
//!
//! Chunk `i` is sealed under `base_nonce XOR i` with the header bytes as
//! associated data.

pub mod codec;
pub mod container;
pub mod error;
pub mod key;

pub use codec::{decode_range, encode, ContainerEncoder, ContainerReader};
pub use container::{ContainerHeader, DEFAULT_CHUNK_SIZE, HEADER_LEN, MAX_CHUNK_SIZE, TAG_LEN};
pub use error::{CryptoError, Result};
pub use key::{KeyIdentity, KeyProvider, VaultKey};

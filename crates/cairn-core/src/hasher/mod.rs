pub mod fingerprint;

pub use fingerprint::{fingerprint_bytes, fingerprint_file, fingerprint_or_none};

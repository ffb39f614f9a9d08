//! Filename translation seam.
//!
//! The encoding policy for remote names (escaping characters the remote
//! mishandles) is owned by the embedding application; this crate only fixes
//! the boundary. Names coming off the wire pass through
//! [`NameCodec::to_standard_name`] before any comparison, and names sent to
//! the remote pass through [`NameCodec::from_standard_name`].

/// Translates between the remote's wire encoding of names and the standard
/// form used for path resolution.
pub trait NameCodec: Send + Sync {
    /// Decode a name received from the remote.
    fn to_standard_name(&self, wire: &str) -> String;

    /// Encode a standard name for transmission to the remote.
    fn from_standard_name(&self, name: &str) -> String;
}

/// Passthrough codec used when no translation policy is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityCodec;

impl NameCodec for IdentityCodec {
    fn to_standard_name(&self, wire: &str) -> String {
        wire.to_string()
    }

    fn from_standard_name(&self, name: &str) -> String {
        name.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_roundtrip() {
        let codec = IdentityCodec;
        assert_eq!(codec.to_standard_name("weird%name!.bin"), "weird%name!.bin");
        assert_eq!(codec.from_standard_name("a b.txt"), "a b.txt");
    }
}

//! File naming conventions of the storage directory.
//!
//! ```text
//! {common name}.key                       CA private key
//! {common name}.pem                       CA certificate
//! {subject}_signed-by_{ca}.key            leaf private key
//! {subject}_signed-by_{ca}.pem            leaf certificate
//! {subject}_signed-by_{ca}.pfx            PKCS#12 export
//! ```

use crate::{Error, Result};

/// Separates the leaf subject from the issuing CA name in a leaf stem.
pub const SIGNED_BY: &str = "_signed-by_";
/// Extension of certificate files.
pub const CERT_EXT: &str = "pem";
/// Extension of private key files.
pub const KEY_EXT: &str = "key";
/// Extension of PKCS#12 exports.
pub const PKCS12_EXT: &str = "pfx";

/// The file names belonging to one CA or leaf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePair {
	stem: String,
}

impl FilePair {
	/// Files of the CA named `common_name`.
	pub fn ca(common_name: &str) -> Self {
		Self {
			stem: common_name.to_string(),
		}
	}
	/// Files of the leaf for `subject` issued by `ca_name`.
	pub fn leaf(subject: &str, ca_name: &str) -> Self {
		Self {
			stem: format!("{}{SIGNED_BY}{ca_name}", sanitize_subject(subject)),
		}
	}
	/// Files sharing the stem of the certificate file `cert_file`.
	pub fn from_cert_file(cert_file: &str) -> Self {
		let stem = cert_file
			.strip_suffix(&format!(".{CERT_EXT}"))
			.unwrap_or(cert_file);
		Self {
			stem: stem.to_string(),
		}
	}
	pub fn stem(&self) -> &str {
		&self.stem
	}
	pub fn cert(&self) -> String {
		format!("{}.{CERT_EXT}", self.stem)
	}
	pub fn key(&self) -> String {
		format!("{}.{KEY_EXT}", self.stem)
	}
	pub fn pkcs12(&self) -> String {
		format!("{}.{PKCS12_EXT}", self.stem)
	}
}

/// Make a leaf subject usable as part of a file name: `*` becomes
/// `_wildcard`, every other character is kept.
pub fn sanitize_subject(subject: &str) -> String {
	subject.replace('*', "_wildcard")
}

/// True if `file` names a leaf certificate.
pub fn is_leaf_cert(file: &str) -> bool {
	file.ends_with(&format!(".{CERT_EXT}")) && file.contains(SIGNED_BY)
}

/// The CA name of `file` if it looks like a CA certificate. Whether the
/// matching key exists is up to the caller.
pub fn ca_name_of(file: &str) -> Option<&str> {
	if file.contains(SIGNED_BY) {
		return None;
	}
	file.strip_suffix(&format!(".{CERT_EXT}"))
}

/// Reject names that could escape the storage directory.
pub fn validate_name(what: &str, name: &str) -> Result<()> {
	if name.trim().is_empty() {
		return Err(Error::Validation(format!("{what} cannot be empty")));
	}
	if name.contains(['/', '\\', '\0']) || name == "." || name == ".." {
		return Err(Error::Validation(format!(
			"{what} '{name}' may not contain path separators or be '.' or '..'"
		)));
	}
	Ok(())
}

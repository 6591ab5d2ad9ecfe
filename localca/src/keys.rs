//! RSA key material.
//!
//! Keys are generated with the `rsa` crate and stored as PKCS#1
//! (`RSA PRIVATE KEY`) PEM. rcgen signs with a PKCS#8 DER copy of the same
//! key.

use rand::{rngs::OsRng, RngCore};
use rcgen::{KeyPair, SerialNumber};
use rsa::{
	pkcs1::{DecodeRsaPrivateKey, EncodeRsaPrivateKey, LineEnding},
	pkcs8::{DecodePrivateKey, EncodePrivateKey},
	RsaPrivateKey,
};
use time::OffsetDateTime;

use crate::{Error, Result, RsaKeySize, SerialScheme};

const PKCS1_TAG: &str = "RSA PRIVATE KEY";
const PKCS8_TAG: &str = "PRIVATE KEY";

/// An RSA private key.
#[derive(Clone, PartialEq, Eq)]
pub struct RsaKey {
	inner: RsaPrivateKey,
}

impl std::fmt::Debug for RsaKey {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("RsaKey").finish_non_exhaustive()
	}
}

impl RsaKey {
	/// Generate a fresh key of `size`.
	pub fn generate(size: RsaKeySize) -> Result<Self> {
		let inner = RsaPrivateKey::new(&mut OsRng, size.bits())
			.map_err(|e| Error::KeyGeneration(e.to_string()))?;
		Ok(Self { inner })
	}

	/// Parse a PEM private key read from `name`. Accepts PKCS#1 and PKCS#8.
	pub fn from_pem(name: &str, data: &[u8]) -> Result<Self> {
		let block = pem::parse(data).map_err(|e| Error::Decode {
			name: name.to_string(),
			reason: e.to_string(),
		})?;
		let parsed = match block.tag() {
			PKCS1_TAG => RsaPrivateKey::from_pkcs1_der(block.contents()).map_err(|e| e.to_string()),
			PKCS8_TAG => RsaPrivateKey::from_pkcs8_der(block.contents()).map_err(|e| e.to_string()),
			other => Err(format!("unexpected PEM block '{other}'")),
		};
		let inner = parsed.map_err(|reason| Error::Parse {
			what: "private key",
			name: name.to_string(),
			reason,
		})?;
		Ok(Self { inner })
	}

	/// PKCS#1 PEM, the on-disk format.
	pub fn to_pkcs1_pem(&self) -> Result<String> {
		let pem = self
			.inner
			.to_pkcs1_pem(LineEnding::LF)
			.map_err(|e| Error::KeyGeneration(e.to_string()))?;
		Ok(pem.to_string())
	}

	/// PKCS#8 DER, the format PKCS#12 containers and rcgen expect.
	pub fn to_pkcs8_der(&self) -> Result<Vec<u8>> {
		let der = self
			.inner
			.to_pkcs8_der()
			.map_err(|e| Error::KeyGeneration(e.to_string()))?;
		Ok(der.as_bytes().to_vec())
	}

	/// A signing key pair for rcgen.
	pub fn key_pair(&self) -> Result<KeyPair> {
		let der = self.to_pkcs8_der()?;
		Ok(KeyPair::try_from(der.as_slice())?)
	}

	pub fn rsa(&self) -> &RsaPrivateKey {
		&self.inner
	}
}

/// A fresh certificate serial number.
pub fn serial_number(scheme: SerialScheme) -> SerialNumber {
	match scheme {
		SerialScheme::Random => {
			let mut bytes = [0u8; 16];
			OsRng.fill_bytes(&mut bytes);
			// Positive and without a leading zero octet.
			bytes[0] = (bytes[0] & 0x7f) | 0x40;
			SerialNumber::from_slice(&bytes)
		},
		SerialScheme::UnixTime => {
			let secs = OffsetDateTime::now_utc().unix_timestamp().max(1) as u64;
			SerialNumber::from(secs)
		},
	}
}

use std::{fmt, path::PathBuf, str::FromStr};

use crate::Error;

/// Validity of a CA when the request does not name one (10 years).
pub const DEFAULT_CA_DAYS: i64 = 3650;
/// Validity of a leaf when the request does not name one (2 years).
pub const DEFAULT_LEAF_DAYS: i64 = 730;
/// Storage directory used when none is configured.
pub const DEFAULT_DIR: &str = "output";

/// The key size used for RSA key generation
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum RsaKeySize {
	/// 2048 bits
	_2048,
	/// 3072 bits
	_3072,
	/// 4096 bits
	_4096,
}

impl RsaKeySize {
	pub fn bits(self) -> usize {
		match self {
			RsaKeySize::_2048 => 2048,
			RsaKeySize::_3072 => 3072,
			RsaKeySize::_4096 => 4096,
		}
	}
}

impl fmt::Display for RsaKeySize {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "{}", self.bits())
	}
}

impl FromStr for RsaKeySize {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim() {
			"2048" => Ok(RsaKeySize::_2048),
			"3072" => Ok(RsaKeySize::_3072),
			"4096" => Ok(RsaKeySize::_4096),
			other => Err(Error::Validation(format!(
				"unsupported RSA key size '{other}', expected 2048, 3072 or 4096"
			))),
		}
	}
}

/// How certificate serial numbers are chosen.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum SerialScheme {
	/// 16 random bytes. Collision free in practice.
	#[default]
	Random,
	/// Seconds since the Unix epoch. Two certificates issued within the same
	/// second share a serial.
	UnixTime,
}

impl FromStr for SerialScheme {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_ascii_lowercase().as_str() {
			"random" => Ok(SerialScheme::Random),
			"time" | "unix-time" => Ok(SerialScheme::UnixTime),
			other => Err(Error::Validation(format!(
				"unknown serial scheme '{other}', expected random or time"
			))),
		}
	}
}

/// Toolkit configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
	/// Directory holding every key, certificate and export.
	pub dir: PathBuf,
	pub ca_key_size: RsaKeySize,
	pub leaf_key_size: RsaKeySize,
	/// Validity used when a CA request asks for zero or negative days.
	pub ca_days: i64,
	/// Validity used when a leaf request asks for zero or negative days.
	pub leaf_days: i64,
	pub serial_scheme: SerialScheme,
}

impl Default for Settings {
	fn default() -> Self {
		Self {
			dir: PathBuf::from(DEFAULT_DIR),
			ca_key_size: RsaKeySize::_4096,
			leaf_key_size: RsaKeySize::_2048,
			ca_days: DEFAULT_CA_DAYS,
			leaf_days: DEFAULT_LEAF_DAYS,
			serial_scheme: SerialScheme::default(),
		}
	}
}

impl Settings {
	/// Default settings storing into `dir`.
	pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
		Self {
			dir: dir.into(),
			..Self::default()
		}
	}
}

use super::{CaCertificate, TrustStore};
use crate::{Error, Result};

/// Trust store of platforms without a backend. Every installation fails with
/// [`Error::Unsupported`].
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedTrustStore;

impl TrustStore for UnsupportedTrustStore {
	fn platform(&self) -> &'static str {
		std::env::consts::OS
	}

	fn targets(&self) -> Vec<String> {
		vec!["system".to_string()]
	}

	fn add(&self, _target: &str, _cert: &CaCertificate) -> Result<()> {
		Err(Error::Unsupported(self.platform()))
	}

	fn is_elevated(&self) -> bool {
		false
	}
}

//! Installing CA certificates into the operating system trust store.
//!
//! [`install`] reads and decodes the CA certificate once and hands it to a
//! [`TrustStore`] for every store the platform designates. The backend is
//! picked at build time as [`SystemTrustStore`].

use std::fmt;

use pki_types::CertificateDer;
use tracing::{info, warn};
use x509_parser::prelude::{FromDer, X509Certificate};

use crate::{
	inspect::{self, read_certificate},
	naming::FilePair,
	repository::Repository,
	Entity, Error, Result,
};

#[cfg(not(windows))]
mod unsupported;
#[cfg(windows)]
mod windows;

#[cfg(not(windows))]
pub use unsupported::UnsupportedTrustStore as SystemTrustStore;
#[cfg(windows)]
pub use windows::WindowsTrustStore as SystemTrustStore;

/// A CA certificate ready to be handed to a [`TrustStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaCertificate {
	pub name: String,
	pub der: CertificateDer<'static>,
	/// Label shown by certificate managers.
	pub friendly_name: String,
}

/// A platform certificate trust store.
pub trait TrustStore {
	/// Platform name used in messages.
	fn platform(&self) -> &'static str;
	/// Stores that receive a CA certificate, in installation order.
	fn targets(&self) -> Vec<String>;
	/// Add `cert` to the store `target`, replacing an existing copy.
	fn add(&self, target: &str, cert: &CaCertificate) -> Result<()>;
	/// Whether the process may modify machine wide stores.
	fn is_elevated(&self) -> bool;
}

/// Stores that received a CA certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
	pub ca_name: String,
	pub friendly_name: String,
	pub stores: Vec<String>,
}

impl fmt::Display for InstallReport {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(
			f,
			"CA certificate '{}' installed into {} as '{}'. You may need to restart browsers.",
			self.ca_name,
			self.stores.join(", "),
			self.friendly_name
		)
	}
}

/// "`{organization or common name} Signing Root`"
pub fn friendly_name(cert: &X509Certificate) -> String {
	let base = match inspect::organization(cert.subject()) {
		org if org.is_empty() => inspect::common_name(cert.subject()),
		org => org,
	};
	format!("{base} Signing Root")
}

/// Install the CA `ca_name` into every store of `store`.
///
/// Stops at the first failing store. Stores that already received the
/// certificate keep it; the error then is [`Error::PartialInstall`].
pub fn install(
	repo: &impl Repository,
	store: &impl TrustStore,
	ca_name: &str,
) -> Result<InstallReport> {
	let ca_name = ca_name.trim();
	if ca_name.is_empty() {
		return Err(Error::Validation("a CA must be selected to install".into()));
	}
	let der = read_certificate(repo, &FilePair::ca(ca_name).cert()).map_err(|e| match e {
		Error::NotFound { .. } => Error::NotFound {
			entity: Entity::Ca,
			name: ca_name.to_string(),
		},
		other => other,
	})?;
	let (_, cert) = X509Certificate::from_der(&der).map_err(|e| Error::Parse {
		what: "CA certificate",
		name: ca_name.to_string(),
		reason: e.to_string(),
	})?;
	let ca = CaCertificate {
		name: ca_name.to_string(),
		friendly_name: friendly_name(&cert),
		der,
	};

	let mut installed = Vec::new();
	for target in store.targets() {
		if let Err(err) = store.add(&target, &ca) {
			warn!(ca = ca_name, store = %target, %err, "could not install CA");
			if installed.is_empty() {
				return Err(err);
			}
			return Err(Error::PartialInstall {
				installed,
				failed: target,
				source: Box::new(err),
			});
		}
		info!(ca = ca_name, store = %target, platform = store.platform(), "installed CA");
		installed.push(target);
	}

	Ok(InstallReport {
		ca_name: ca.name,
		friendly_name: ca.friendly_name,
		stores: installed,
	})
}

#[cfg(test)]
pub(crate) mod tests {
	use std::cell::RefCell;

	use super::*;
	use crate::{ca, CaRequest, DirRepository, ErrorKind, RsaKeySize, Settings};

	/// Records additions and fails on one scripted store.
	pub(crate) struct ScriptedStore {
		pub targets: Vec<&'static str>,
		pub fail_on: Option<&'static str>,
		pub deny_access: bool,
		pub added: RefCell<Vec<(String, String)>>,
	}

	impl ScriptedStore {
		pub fn new(targets: Vec<&'static str>) -> Self {
			Self {
				targets,
				fail_on: None,
				deny_access: false,
				added: RefCell::new(Vec::new()),
			}
		}
	}

	impl TrustStore for ScriptedStore {
		fn platform(&self) -> &'static str {
			"test"
		}
		fn targets(&self) -> Vec<String> {
			self.targets.iter().map(|t| t.to_string()).collect()
		}
		fn add(&self, target: &str, cert: &CaCertificate) -> Result<()> {
			if self.fail_on == Some(target) {
				return Err(if self.deny_access {
					Error::Privilege {
						store: target.to_string(),
					}
				} else {
					Error::TrustStore {
						action: "add certificate",
						store: target.to_string(),
						reason: "scripted failure".into(),
					}
				});
			}
			self.added
				.borrow_mut()
				.push((target.to_string(), cert.friendly_name.clone()));
			Ok(())
		}
		fn is_elevated(&self) -> bool {
			true
		}
	}

	fn repo_with_ca(temp: &assert_fs::TempDir, org: &str) -> anyhow::Result<DirRepository> {
		let repo = DirRepository::open(temp.path())?;
		let settings = Settings {
			ca_key_size: RsaKeySize::_2048,
			..Settings::with_dir(temp.path())
		};
		let request = CaRequest {
			organization: org.into(),
			..CaRequest::new("Test Root")
		};
		ca::create(&repo, &settings, &request)?;
		Ok(repo)
	}

	#[test]
	fn installs_into_every_store() -> anyhow::Result<()> {
		let temp = assert_fs::TempDir::new()?;
		let repo = repo_with_ca(&temp, "Crab widgits SE")?;
		let store = ScriptedStore::new(vec!["ROOT", "CA"]);

		let report = install(&repo, &store, "Test Root")?;
		assert_eq!(report.stores, vec!["ROOT", "CA"]);
		assert_eq!(report.friendly_name, "Crab widgits SE Signing Root");
		assert_eq!(store.added.borrow().len(), 2);
		Ok(())
	}

	#[test]
	fn friendly_name_falls_back_to_common_name() -> anyhow::Result<()> {
		let temp = assert_fs::TempDir::new()?;
		let repo = repo_with_ca(&temp, "")?;
		let store = ScriptedStore::new(vec!["ROOT"]);

		let report = install(&repo, &store, "Test Root")?;
		assert_eq!(report.friendly_name, "Test Root Signing Root");
		Ok(())
	}

	#[test]
	fn first_store_failure_is_returned_as_is() -> anyhow::Result<()> {
		let temp = assert_fs::TempDir::new()?;
		let repo = repo_with_ca(&temp, "")?;
		let store = ScriptedStore {
			fail_on: Some("ROOT"),
			deny_access: true,
			..ScriptedStore::new(vec!["ROOT", "CA"])
		};

		let err = install(&repo, &store, "Test Root").unwrap_err();
		assert_eq!(err.kind(), ErrorKind::Privilege);
		assert!(store.added.borrow().is_empty());
		Ok(())
	}

	#[test]
	fn later_store_failure_is_partial() -> anyhow::Result<()> {
		let temp = assert_fs::TempDir::new()?;
		let repo = repo_with_ca(&temp, "")?;
		let store = ScriptedStore {
			fail_on: Some("CA"),
			..ScriptedStore::new(vec!["ROOT", "CA"])
		};

		let err = install(&repo, &store, "Test Root").unwrap_err();
		assert_eq!(err.kind(), ErrorKind::PartialFailure);
		match err {
			Error::PartialInstall {
				installed, failed, ..
			} => {
				assert_eq!(installed, vec!["ROOT"]);
				assert_eq!(failed, "CA");
			},
			other => panic!("unexpected error {other:?}"),
		}
		// nothing is rolled back
		assert_eq!(store.added.borrow().len(), 1);
		Ok(())
	}

	#[test]
	fn missing_ca() -> anyhow::Result<()> {
		let temp = assert_fs::TempDir::new()?;
		let repo = DirRepository::open(temp.path())?;
		let store = ScriptedStore::new(vec!["ROOT"]);

		let err = install(&repo, &store, "Nobody").unwrap_err();
		assert_eq!(err.kind(), ErrorKind::NotFound);
		let err = install(&repo, &store, " ").unwrap_err();
		assert_eq!(err.kind(), ErrorKind::Validation);
		Ok(())
	}
}

/*!
Local certificate authority toolkit

Creates self-signed root CAs, issues leaf certificates signed by them,
inspects and exports those certificates as PKCS#12 and installs CA
certificates into the operating system trust store.

Everything lives as PEM files in one flat directory (see [`naming`]); the
directory is the only state. [`LocalCa`] bundles the directory, the
[`Settings`] and the platform [`TrustStore`].

## Example

```no_run
use localca::{CaRequest, LeafRequest, LocalCa, Settings};

# fn main() -> localca::Result<()> {
let ca = LocalCa::open(Settings::with_dir("output"))?;
ca.create_ca(&CaRequest::new("Test Root"))?;
let issued = ca.issue_certificate(
	&LeafRequest::new("svc.local", "Test Root").sans("127.0.0.1"),
)?;
println!("{}", ca.inspect(&issued.cert_file)?);
# Ok(())
# }
```
*/
#![deny(unsafe_code)]

pub mod ca;
mod error;
pub mod export;
pub mod inspect;
pub mod issue;
pub mod keys;
mod locks;
pub mod naming;
pub mod repository;
mod settings;
pub mod trust;

pub use ca::{CaRequest, CreatedCa};
pub use error::{Entity, Error, ErrorKind, Result};
pub use export::ExportedContainer;
pub use inspect::CertificateInfo;
pub use issue::{IssuedCertificate, LeafRequest};
pub use repository::{Deleted, DirRepository, Repository};
pub use settings::{
	RsaKeySize, SerialScheme, Settings, DEFAULT_CA_DAYS, DEFAULT_DIR, DEFAULT_LEAF_DAYS,
};
pub use trust::{InstallReport, SystemTrustStore, TrustStore};

use locks::NameLocks;
use naming::FilePair;

/// The toolkit: a repository, its settings and a trust store.
///
/// Every mutating operation holds the lock of the name it touches, so
/// callers sharing one `LocalCa` never interleave on the same CA or leaf.
#[derive(Debug)]
pub struct LocalCa<R: Repository = DirRepository, T: TrustStore = SystemTrustStore> {
	repo: R,
	trust: T,
	settings: Settings,
	locks: NameLocks,
}

impl LocalCa {
	/// Open the storage directory of `settings` with the platform trust
	/// store.
	pub fn open(settings: Settings) -> Result<Self> {
		let repo = DirRepository::open(&settings.dir)?;
		Ok(Self::with_parts(repo, SystemTrustStore::default(), settings))
	}
}

impl<R: Repository, T: TrustStore> LocalCa<R, T> {
	pub fn with_parts(repo: R, trust: T, settings: Settings) -> Self {
		Self {
			repo,
			trust,
			settings,
			locks: NameLocks::default(),
		}
	}
	pub fn settings(&self) -> &Settings {
		&self.settings
	}
	pub fn repository(&self) -> &R {
		&self.repo
	}

	/// See [`ca::create`].
	pub fn create_ca(&self, request: &CaRequest) -> Result<CreatedCa> {
		self.locks.with(&ca_lock(&request.common_name), || {
			ca::create(&self.repo, &self.settings, request)
		})
	}
	/// See [`ca::list`].
	pub fn list_cas(&self) -> Vec<String> {
		ca::list(&self.repo)
	}
	/// See [`ca::delete`].
	pub fn delete_ca(&self, name: &str) -> Result<Deleted> {
		self.locks.with(&ca_lock(name), || ca::delete(&self.repo, name))
	}

	/// See [`issue::create`].
	pub fn issue_certificate(&self, request: &LeafRequest) -> Result<IssuedCertificate> {
		let stem = FilePair::leaf(request.subject.trim(), request.ca_name.trim());
		self.locks.with(&ca_lock(&request.ca_name), || {
			self.locks.with(&leaf_lock(stem.stem()), || {
				issue::create(&self.repo, &self.settings, request)
			})
		})
	}
	/// See [`issue::list`].
	pub fn list_certificates(&self) -> Vec<String> {
		issue::list(&self.repo)
	}
	/// See [`issue::delete`].
	pub fn delete_certificate(&self, cert_file: &str) -> Result<Deleted> {
		let files = FilePair::from_cert_file(cert_file.trim());
		self.locks.with(&leaf_lock(files.stem()), || {
			issue::delete(&self.repo, cert_file)
		})
	}

	/// See [`inspect::inspect`].
	pub fn inspect(&self, cert_file: &str) -> Result<CertificateInfo> {
		inspect::inspect(&self.repo, cert_file)
	}

	/// See [`export::export`].
	pub fn export_pkcs12(&self, cert_file: &str, password: &str) -> Result<ExportedContainer> {
		let files = FilePair::from_cert_file(cert_file);
		self.locks.with(&leaf_lock(files.stem()), || {
			export::export(&self.repo, cert_file, password)
		})
	}

	/// See [`trust::install`].
	pub fn install_ca(&self, name: &str) -> Result<InstallReport> {
		self.locks.with(&ca_lock(name), || {
			trust::install(&self.repo, &self.trust, name)
		})
	}
	/// Whether the process may install into the system trust store.
	pub fn is_elevated(&self) -> bool {
		self.trust.is_elevated()
	}
}

fn ca_lock(name: &str) -> String {
	format!("ca:{}", name.trim())
}

fn leaf_lock(stem: &str) -> String {
	format!("leaf:{stem}")
}

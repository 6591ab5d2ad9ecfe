//! Storage of keys, certificates and exports.
//!
//! The storage is one flat namespace of files; there is no index. A CA or leaf
//! exists exactly when its files do (see [`crate::naming`]).

use std::{
	fs, io,
	io::Write,
	path::{Path, PathBuf},
};

use tracing::{debug, warn};

use crate::{naming::FilePair, Entity, Error, Result};

/// Who may read a stored file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
	/// Owner only. Used for private keys.
	Private,
	/// World readable. Used for certificates and exports.
	Shared,
}

/// A flat store of named files.
///
/// All methods take bare file names (no directories). Writes must be atomic:
/// a reader sees either the old or the new content, never a partial file.
pub trait Repository {
	/// Where `name` lives, for messages and for callers that need a path.
	fn location(&self, name: &str) -> PathBuf;
	/// True iff `name` exists and is a regular file.
	fn exists(&self, name: &str) -> bool;
	/// Names of all regular files, sorted. Never fails; an unreadable store
	/// is logged and reported as empty.
	fn list(&self) -> Vec<String>;
	/// Contents of `name`.
	fn read(&self, name: &str) -> io::Result<Vec<u8>>;
	/// Store `contents` under `name`, failing with
	/// [`io::ErrorKind::AlreadyExists`] if `name` is taken.
	fn create(&self, name: &str, contents: &[u8], access: Access) -> io::Result<()>;
	/// Store `contents` under `name`, replacing any previous content.
	fn write(&self, name: &str, contents: &[u8], access: Access) -> io::Result<()>;
	/// Remove `name`. Returns `false` if there was nothing to remove.
	fn remove(&self, name: &str) -> io::Result<bool>;
}

/// A [`Repository`] backed by a directory on disk.
#[derive(Debug, Clone)]
pub struct DirRepository {
	dir: PathBuf,
}

impl DirRepository {
	/// Use `dir` as storage, creating it if it is missing.
	pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
		let dir = dir.into();
		fs::create_dir_all(&dir).map_err(|e| Error::io("create storage directory", &dir, e))?;
		Ok(Self { dir })
	}
	/// The storage directory.
	pub fn dir(&self) -> &Path {
		&self.dir
	}

	fn stage(&self, contents: &[u8], access: Access) -> io::Result<tempfile::NamedTempFile> {
		// NamedTempFile is created owner-only, which is what keys need.
		let mut staged = tempfile::Builder::new()
			.prefix(".localca-")
			.suffix(".tmp")
			.tempfile_in(&self.dir)?;
		staged.write_all(contents)?;
		staged.as_file().sync_all()?;
		#[cfg(unix)]
		{
			use std::os::unix::fs::PermissionsExt;
			if access == Access::Shared {
				staged
					.as_file()
					.set_permissions(fs::Permissions::from_mode(0o644))?;
			}
		}
		#[cfg(not(unix))]
		let _ = access;
		Ok(staged)
	}
}

impl Repository for DirRepository {
	fn location(&self, name: &str) -> PathBuf {
		self.dir.join(name)
	}

	fn exists(&self, name: &str) -> bool {
		fs::metadata(self.location(name))
			.map(|meta| meta.is_file())
			.unwrap_or(false)
	}

	fn list(&self) -> Vec<String> {
		let entries = match fs::read_dir(&self.dir) {
			Ok(entries) => entries,
			Err(err) => {
				warn!(dir = %self.dir.display(), %err, "could not read storage directory");
				return Vec::new();
			},
		};
		let mut names: Vec<String> = entries
			.filter_map(|entry| entry.ok())
			.filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
			.filter_map(|entry| entry.file_name().into_string().ok())
			.collect();
		names.sort();
		names
	}

	fn read(&self, name: &str) -> io::Result<Vec<u8>> {
		fs::read(self.location(name))
	}

	fn create(&self, name: &str, contents: &[u8], access: Access) -> io::Result<()> {
		self.stage(contents, access)?
			.persist_noclobber(self.location(name))
			.map_err(|e| e.error)?;
		Ok(())
	}

	fn write(&self, name: &str, contents: &[u8], access: Access) -> io::Result<()> {
		self.stage(contents, access)?
			.persist(self.location(name))
			.map_err(|e| e.error)?;
		Ok(())
	}

	fn remove(&self, name: &str) -> io::Result<bool> {
		match fs::remove_file(self.location(name)) {
			Ok(()) => Ok(true),
			Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
			Err(err) => Err(err),
		}
	}
}

/// PEM serialized certificate and PEM serialized corresponding private key.
#[derive(Debug, Clone)]
pub struct PemCertifiedKey {
	pub cert_pem: String,
	pub private_key_pem: String,
}

/// Whether storing a [`PemCertifiedKey`] may replace existing files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Overwrite {
	Deny,
	Allow,
}

impl PemCertifiedKey {
	/// Store key and certificate under `files`.
	///
	/// With [`Overwrite::Deny`] both files must be new. If the certificate
	/// cannot be stored after the key was, the key is put back the way it was:
	/// removed when it was new, restored when it replaced an older key.
	pub fn store(
		&self,
		repo: &impl Repository,
		files: &FilePair,
		overwrite: Overwrite,
	) -> Result<()> {
		let put = |name: &str, contents: &str, access| match overwrite {
			Overwrite::Deny => repo.create(name, contents.as_bytes(), access),
			Overwrite::Allow => repo.write(name, contents.as_bytes(), access),
		};
		let taken = |entity, err: io::Error| {
			if err.kind() == io::ErrorKind::AlreadyExists {
				Error::AlreadyExists {
					entity,
					name: files.stem().to_string(),
				}
			} else {
				Error::io("write", repo.location(&files.key()), err)
			}
		};

		let previous_key = match overwrite {
			Overwrite::Deny => None,
			Overwrite::Allow => repo.read(&files.key()).ok(),
		};
		put(&files.key(), &self.private_key_pem, Access::Private)
			.map_err(|e| taken(Entity::PrivateKey, e))?;

		if let Err(err) = put(&files.cert(), &self.cert_pem, Access::Shared) {
			let rollback = match &previous_key {
				Some(key) => repo.write(&files.key(), key, Access::Private),
				None => repo.remove(&files.key()).map(drop),
			};
			if let Err(cleanup) = rollback {
				warn!(key = %files.key(), %cleanup, "could not roll back key");
			}
			return Err(match err.kind() {
				io::ErrorKind::AlreadyExists => taken(Entity::Certificate, err),
				_ => Error::io("write", repo.location(&files.cert()), err),
			});
		}
		debug!(stem = files.stem(), "stored key and certificate");
		Ok(())
	}
}

/// Outcome of deleting the files of a CA or leaf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deleted {
	/// CA name or certificate file name that was deleted.
	pub name: String,
	/// Files that actually existed and were removed.
	pub removed: Vec<String>,
}

impl std::fmt::Display for Deleted {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		if self.removed.is_empty() {
			write!(f, "Nothing to delete for '{}'.", self.name)
		} else {
			write!(f, "Deleted '{}' ({}).", self.name, self.removed.join(", "))
		}
	}
}

/// Remove `names`, ignoring those that are already gone. The first real
/// removal failure is reported after every name was attempted.
pub(crate) fn remove_all(repo: &impl Repository, label: &str, names: &[String]) -> Result<Deleted> {
	let mut removed = Vec::new();
	let mut failure = None;
	for name in names {
		match repo.remove(name) {
			Ok(true) => removed.push(name.clone()),
			Ok(false) => {},
			Err(err) => {
				warn!(file = %name, %err, "could not remove file");
				failure.get_or_insert(Error::io("remove", repo.location(name), err));
			},
		}
	}
	match failure {
		Some(err) => Err(err),
		None => Ok(Deleted {
			name: label.to_string(),
			removed,
		}),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn pair() -> PemCertifiedKey {
		PemCertifiedKey {
			cert_pem: "x".into(),
			private_key_pem: "y".into(),
		}
	}

	#[test]
	fn test_write_files() -> anyhow::Result<()> {
		use assert_fs::prelude::*;
		let temp = assert_fs::TempDir::new()?;
		let repo = DirRepository::open(temp.path())?;
		let entity_cert = temp.child("cert.pem");
		let entity_key = temp.child("cert.key");

		pair().store(&repo, &FilePair::ca("cert"), Overwrite::Deny)?;

		// assert contents of created files
		entity_cert.assert("x");
		entity_key.assert("y");
		Ok(())
	}

	#[test]
	fn create_refuses_existing_files() -> anyhow::Result<()> {
		use assert_fs::prelude::*;
		let temp = assert_fs::TempDir::new()?;
		let repo = DirRepository::open(temp.path())?;
		temp.child("cert.key").write_str("old key")?;

		let err = pair()
			.store(&repo, &FilePair::ca("cert"), Overwrite::Deny)
			.unwrap_err();
		assert_eq!(err.kind(), crate::ErrorKind::AlreadyExists);
		temp.child("cert.key").assert("old key");
		assert!(!temp.path().join("cert.pem").exists());
		Ok(())
	}

	#[test]
	fn overwrite_allow_replaces() -> anyhow::Result<()> {
		use assert_fs::prelude::*;
		let temp = assert_fs::TempDir::new()?;
		let repo = DirRepository::open(temp.path())?;
		temp.child("cert.pem").write_str("old")?;

		pair().store(&repo, &FilePair::ca("cert"), Overwrite::Allow)?;
		temp.child("cert.pem").assert("x");
		Ok(())
	}

	/// Refuses to store certificates.
	struct NoCertificates(DirRepository);

	impl Repository for NoCertificates {
		fn location(&self, name: &str) -> PathBuf {
			self.0.location(name)
		}
		fn exists(&self, name: &str) -> bool {
			self.0.exists(name)
		}
		fn list(&self) -> Vec<String> {
			self.0.list()
		}
		fn read(&self, name: &str) -> io::Result<Vec<u8>> {
			self.0.read(name)
		}
		fn create(&self, name: &str, contents: &[u8], access: Access) -> io::Result<()> {
			if name.ends_with(".pem") {
				return Err(io::Error::other("disk full"));
			}
			self.0.create(name, contents, access)
		}
		fn write(&self, name: &str, contents: &[u8], access: Access) -> io::Result<()> {
			if name.ends_with(".pem") {
				return Err(io::Error::other("disk full"));
			}
			self.0.write(name, contents, access)
		}
		fn remove(&self, name: &str) -> io::Result<bool> {
			self.0.remove(name)
		}
	}

	#[test]
	fn failed_certificate_removes_new_key() -> anyhow::Result<()> {
		let temp = assert_fs::TempDir::new()?;
		let repo = NoCertificates(DirRepository::open(temp.path())?);

		let err = pair()
			.store(&repo, &FilePair::ca("cert"), Overwrite::Deny)
			.unwrap_err();
		assert_eq!(err.kind(), crate::ErrorKind::Io);
		assert!(repo.list().is_empty());
		Ok(())
	}

	#[test]
	fn failed_certificate_restores_previous_key() -> anyhow::Result<()> {
		use assert_fs::prelude::*;
		let temp = assert_fs::TempDir::new()?;
		temp.child("cert.key").write_str("old key")?;
		temp.child("cert.pem").write_str("old cert")?;
		let repo = NoCertificates(DirRepository::open(temp.path())?);

		assert!(pair()
			.store(&repo, &FilePair::ca("cert"), Overwrite::Allow)
			.is_err());
		temp.child("cert.key").assert("old key");
		temp.child("cert.pem").assert("old cert");
		Ok(())
	}

	#[cfg(unix)]
	#[test]
	fn key_is_owner_only() -> anyhow::Result<()> {
		use std::os::unix::fs::PermissionsExt;
		let temp = assert_fs::TempDir::new()?;
		let repo = DirRepository::open(temp.path())?;
		pair().store(&repo, &FilePair::ca("cert"), Overwrite::Deny)?;

		let key_mode = fs::metadata(temp.path().join("cert.key"))?.permissions().mode();
		let cert_mode = fs::metadata(temp.path().join("cert.pem"))?.permissions().mode();
		assert_eq!(key_mode & 0o777, 0o600);
		assert_eq!(cert_mode & 0o777, 0o644);
		Ok(())
	}

	#[test]
	fn list_skips_directories_and_sorts() -> anyhow::Result<()> {
		use assert_fs::prelude::*;
		let temp = assert_fs::TempDir::new()?;
		temp.child("b.pem").touch()?;
		temp.child("a.pem").touch()?;
		temp.child("nested.pem").create_dir_all()?;
		let repo = DirRepository::open(temp.path())?;

		assert_eq!(repo.list(), vec!["a.pem", "b.pem"]);
		assert!(repo.exists("a.pem"));
		assert!(!repo.exists("nested.pem"));
		Ok(())
	}

	#[test]
	fn list_of_missing_directory_is_empty() -> anyhow::Result<()> {
		let temp = assert_fs::TempDir::new()?;
		let repo = DirRepository::open(temp.path().join("store"))?;
		fs::remove_dir(repo.dir())?;
		assert!(repo.list().is_empty());
		Ok(())
	}

	#[test]
	fn remove_is_lenient() -> anyhow::Result<()> {
		use assert_fs::prelude::*;
		let temp = assert_fs::TempDir::new()?;
		temp.child("a.pem").touch()?;
		let repo = DirRepository::open(temp.path())?;

		let names = vec!["a.pem".to_string(), "a.key".to_string()];
		let first = remove_all(&repo, "a", &names)?;
		assert_eq!(first.removed, vec!["a.pem"]);
		let second = remove_all(&repo, "a", &names)?;
		assert!(second.removed.is_empty());
		Ok(())
	}
}

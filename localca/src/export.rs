//! PKCS#12 export of an issued certificate.

use std::{fmt, io, path::PathBuf};

use p12_keystore::{Certificate, KeyStore, KeyStoreEntry, PrivateKeyChain};
use ring::digest;
use tracing::{debug, info};
use x509_parser::prelude::{FromDer, X509Certificate};

use crate::{
	inspect::{self, read_certificate},
	keys::RsaKey,
	naming::{self, FilePair},
	repository::{Access, Repository},
	Entity, Error, Result,
};

/// A PKCS#12 container that was written to the repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedContainer {
	/// The exported certificate file.
	pub cert_file: String,
	/// The written container.
	pub path: PathBuf,
	/// Name of the CA whose certificate completes the chain.
	pub ca_name: String,
}

impl fmt::Display for ExportedContainer {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "Exported '{}' to '{}'.", self.cert_file, self.path.display())
	}
}

/// Bundle the key and certificate of `cert_file` together with the issuing
/// CA certificate into `{stem}.pfx`, encrypted with `password`.
///
/// The issuing CA is found through the issuer common name of the
/// certificate. An existing container is replaced.
pub fn export(
	repo: &impl Repository,
	cert_file: &str,
	password: &str,
) -> Result<ExportedContainer> {
	naming::validate_name("certificate name", cert_file)?;
	let files = FilePair::from_cert_file(cert_file);
	let cert_der = read_certificate(repo, &files.cert())?;

	let key_file = files.key();
	let key_data = repo.read(&key_file).map_err(|e| match e.kind() {
		io::ErrorKind::NotFound => Error::NotFound {
			entity: Entity::PrivateKey,
			name: key_file.clone(),
		},
		_ => Error::io("read private key", repo.location(&key_file), e),
	})?;
	let key = RsaKey::from_pem(&key_file, &key_data)?;

	let (_, cert) = X509Certificate::from_der(&cert_der).map_err(|e| Error::Parse {
		what: "certificate",
		name: files.cert(),
		reason: e.to_string(),
	})?;
	let alias = match inspect::common_name(cert.subject()) {
		cn if cn.is_empty() => files.stem().to_string(),
		cn => cn,
	};
	let ca_name = inspect::common_name(cert.issuer());
	let ca_der = resolve_issuer(repo, &ca_name)?;

	let mut chain = vec![to_p12_cert(&cert_der)?];
	// a CA exported on its own is its own issuer
	if ca_der.as_slice() != cert_der.as_ref() {
		chain.push(to_p12_cert(&ca_der)?);
	}
	let local_key_id = digest::digest(&digest::SHA256, &cert_der);
	let key_chain = PrivateKeyChain::new(key.to_pkcs8_der()?, local_key_id.as_ref(), chain);

	let mut keystore = KeyStore::new();
	keystore.add_entry(&alias, KeyStoreEntry::PrivateKeyChain(key_chain));
	let data = keystore
		.writer(password)
		.write()
		.map_err(|e| Error::Pkcs12(e.to_string()))?;
	debug!(alias, bytes = data.len(), "encoded PKCS#12 container");

	let target = files.pkcs12();
	repo.write(&target, &data, Access::Shared)
		.map_err(|e| Error::io("write PKCS#12 container", repo.location(&target), e))?;
	info!(cert = cert_file, ca = %ca_name, "exported PKCS#12 container");

	Ok(ExportedContainer {
		cert_file: files.cert(),
		path: repo.location(&target),
		ca_name,
	})
}

fn resolve_issuer(repo: &impl Repository, ca_name: &str) -> Result<Vec<u8>> {
	let resolved = if ca_name.is_empty() {
		Err(Error::Validation(
			"the certificate names no issuer common name".into(),
		))
	} else {
		read_certificate(repo, &FilePair::ca(ca_name).cert()).map_err(|e| match e {
			Error::NotFound { .. } => Error::NotFound {
				entity: Entity::Ca,
				name: ca_name.to_string(),
			},
			other => other,
		})
	};
	resolved
		.map(|der| der.to_vec())
		.map_err(|source| Error::Issuer {
			name: ca_name.to_string(),
			source: Box::new(source),
		})
}

fn to_p12_cert(der: &[u8]) -> Result<Certificate> {
	Certificate::from_der(der).map_err(|e| Error::Pkcs12(e.to_string()))
}

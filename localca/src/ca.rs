//! Root certificate authorities.

use std::{fmt, path::PathBuf};

use pki_types::CertificateDer;
use rcgen::{
	BasicConstraints, Certificate, CertificateParams, DistinguishedName, DnType, DnValue,
	ExtendedKeyUsagePurpose, IsCa, Issuer, KeyPair, KeyUsagePurpose, SerialNumber,
};
use time::{Duration, OffsetDateTime};
use tracing::{debug, info};

use crate::{
	inspect,
	keys::{self, RsaKey},
	naming::{self, FilePair},
	repository::{remove_all, Deleted, Overwrite, PemCertifiedKey, Repository},
	Entity, Error, Result, Settings,
};

/// Longest validity accepted for any certificate, about a century.
pub const MAX_DAYS: i64 = 36_525;

/// What to put into a new CA.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaRequest {
	pub country: String,
	pub state: String,
	pub locality: String,
	pub organization: String,
	/// Name of the CA. Also the name of its files.
	pub common_name: String,
	/// Zero or negative means the configured default.
	pub expiry_days: i64,
}

impl CaRequest {
	pub fn new(common_name: impl Into<String>) -> Self {
		Self {
			common_name: common_name.into(),
			..Self::default()
		}
	}
}

/// [CertificateParams] from which a [Ca] [Certificate] can be built
pub struct CaParams {
	params: CertificateParams,
}

impl CaParams {
	pub fn new(mut params: CertificateParams) -> Self {
		params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
		params.key_usages.push(KeyUsagePurpose::DigitalSignature);
		params.key_usages.push(KeyUsagePurpose::KeyCertSign);
		params
			.extended_key_usages
			.push(ExtendedKeyUsagePurpose::ClientAuth);
		params
			.extended_key_usages
			.push(ExtendedKeyUsagePurpose::ServerAuth);
		Self { params }
	}
	/// Return `&self.params`.
	pub fn params(&self) -> &CertificateParams {
		&self.params
	}
	pub fn country_name(mut self, country: &str) -> Result<Self> {
		if !country.is_empty() {
			let value = country.try_into().map_err(|_| {
				Error::Validation(format!("country '{country}' is not a printable string"))
			})?;
			self.params
				.distinguished_name
				.push(DnType::CountryName, DnValue::PrintableString(value));
		}
		Ok(self)
	}
	pub fn state_or_province_name(self, state: &str) -> Self {
		self.push(DnType::StateOrProvinceName, state)
	}
	pub fn locality_name(self, locality: &str) -> Self {
		self.push(DnType::LocalityName, locality)
	}
	pub fn organization_name(self, name: &str) -> Self {
		self.push(DnType::OrganizationName, name)
	}
	pub fn common_name(self, name: &str) -> Self {
		self.push(DnType::CommonName, name)
	}
	pub fn validity(mut self, not_before: OffsetDateTime, not_after: OffsetDateTime) -> Self {
		self.params.not_before = not_before;
		self.params.not_after = not_after;
		self
	}
	pub fn serial_number(mut self, serial: SerialNumber) -> Self {
		self.params.serial_number = Some(serial);
		self
	}
	/// Self-sign with `key`.
	pub fn build(self, key: RsaKey) -> Result<Ca> {
		let cert = self.params.self_signed(&key.key_pair()?)?;
		Ok(Ca { cert, key })
	}

	fn push(mut self, ty: DnType, value: &str) -> Self {
		if !value.is_empty() {
			self.params.distinguished_name.push(ty, value);
		}
		self
	}
}

/// A freshly built, self-signed CA.
pub struct Ca {
	cert: Certificate,
	key: RsaKey,
}

impl Ca {
	pub fn serialize_pem(&self) -> Result<PemCertifiedKey> {
		Ok(PemCertifiedKey {
			cert_pem: self.cert.pem(),
			private_key_pem: self.key.to_pkcs1_pem()?,
		})
	}
	pub fn cert(&self) -> &Certificate {
		&self.cert
	}
}

/// A CA that was written to the repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedCa {
	pub name: String,
	pub cert_path: PathBuf,
	pub key_path: PathBuf,
	pub not_after: OffsetDateTime,
}

impl fmt::Display for CreatedCa {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(
			f,
			"CA '{}' created in '{}'.",
			self.name,
			self.cert_path
				.parent()
				.map(|dir| dir.display().to_string())
				.unwrap_or_default()
		)
	}
}

/// Validity window starting now and lasting `days`.
pub(crate) fn validity_window(days: i64) -> Result<(OffsetDateTime, OffsetDateTime)> {
	if days > MAX_DAYS {
		return Err(Error::Validation(format!(
			"validity of {days} days exceeds the maximum of {MAX_DAYS}"
		)));
	}
	let not_before = OffsetDateTime::now_utc();
	Ok((not_before, not_before + Duration::days(days)))
}

/// Create a self-signed root CA and store it under its common name.
pub fn create(
	repo: &impl Repository,
	settings: &Settings,
	request: &CaRequest,
) -> Result<CreatedCa> {
	let name = request.common_name.trim();
	naming::validate_name("CA common name", name)?;
	if name.contains(naming::SIGNED_BY) {
		return Err(Error::Validation(format!(
			"CA common name may not contain '{}'",
			naming::SIGNED_BY
		)));
	}
	let days = match request.expiry_days {
		d if d > 0 => d,
		_ => settings.ca_days,
	};

	let files = FilePair::ca(name);
	if repo.exists(&files.key()) || repo.exists(&files.cert()) {
		return Err(Error::AlreadyExists {
			entity: Entity::Ca,
			name: name.to_string(),
		});
	}

	let (not_before, not_after) = validity_window(days)?;
	let mut params = CertificateParams::default();
	// override default Common Name
	params.distinguished_name = DistinguishedName::new();

	debug!(name, bits = %settings.ca_key_size, "generating CA key");
	let key = RsaKey::generate(settings.ca_key_size)?;
	let ca = CaParams::new(params)
		.country_name(request.country.trim())?
		.state_or_province_name(request.state.trim())
		.locality_name(request.locality.trim())
		.organization_name(request.organization.trim())
		.common_name(name)
		.validity(not_before, not_after)
		.serial_number(keys::serial_number(settings.serial_scheme))
		.build(key)?;

	ca.serialize_pem()?.store(repo, &files, Overwrite::Deny)?;
	info!(name, days, "created CA");

	Ok(CreatedCa {
		name: name.to_string(),
		cert_path: repo.location(&files.cert()),
		key_path: repo.location(&files.key()),
		not_after,
	})
}

/// Names of all CAs: certificates without `_signed-by_` that have a key
/// next to them. Sorted.
pub fn list(repo: &impl Repository) -> Vec<String> {
	let files = repo.list();
	files
		.iter()
		.filter_map(|file| naming::ca_name_of(file))
		.filter(|name| files.contains(&FilePair::ca(name).key()))
		.map(str::to_string)
		.collect()
}

/// Remove both files of the CA `name`. Files that are already gone are not
/// an error.
pub fn delete(repo: &impl Repository, name: &str) -> Result<Deleted> {
	let name = name.trim();
	naming::validate_name("CA name", name)?;
	let files = FilePair::ca(name);
	let deleted = remove_all(repo, name, &[files.key(), files.cert()])?;
	info!(name, removed = deleted.removed.len(), "deleted CA");
	Ok(deleted)
}

/// A CA read back from the repository, ready to sign.
#[derive(Debug, Clone)]
pub struct LoadedCa {
	pub name: String,
	pub cert_pem: String,
	pub cert_der: CertificateDer<'static>,
	pub key: RsaKey,
}

impl LoadedCa {
	/// An rcgen issuer signing with this CA's key.
	pub fn issuer(&self) -> Result<Issuer<'static, KeyPair>> {
		Issuer::from_ca_cert_pem(&self.cert_pem, self.key.key_pair()?).map_err(|e| Error::Parse {
			what: "CA certificate",
			name: FilePair::ca(&self.name).cert(),
			reason: e.to_string(),
		})
	}
}

/// Load certificate and key of the CA `name`.
pub fn load(repo: &impl Repository, name: &str) -> Result<LoadedCa> {
	let name = name.trim();
	naming::validate_name("CA name", name)?;
	let files = FilePair::ca(name);
	if !repo.exists(&files.cert()) {
		return Err(Error::NotFound {
			entity: Entity::Ca,
			name: name.to_string(),
		});
	}
	let cert_der = inspect::read_certificate(repo, &files.cert())?;
	let cert_pem = pem::encode(&pem::Pem::new("CERTIFICATE", cert_der.to_vec()));

	let key_file = files.key();
	let key_data = repo.read(&key_file).map_err(|e| match e.kind() {
		std::io::ErrorKind::NotFound => Error::NotFound {
			entity: Entity::PrivateKey,
			name: key_file.clone(),
		},
		_ => Error::io("read CA key", repo.location(&key_file), e),
	})?;
	let key = RsaKey::from_pem(&key_file, &key_data)?;
	debug!(name, "loaded CA");

	Ok(LoadedCa {
		name: name.to_string(),
		cert_pem,
		cert_der,
		key,
	})
}

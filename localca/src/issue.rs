//! Leaf certificates signed by a stored CA.

use std::{fmt, net::IpAddr, path::PathBuf};

use rcgen::{
	Certificate, CertificateParams, DistinguishedName, DnType, ExtendedKeyUsagePurpose, IsCa,
	KeyUsagePurpose, SanType, SerialNumber,
};
use time::OffsetDateTime;
use tracing::{debug, info};

use crate::{
	ca::{self, LoadedCa},
	keys::{self, RsaKey},
	naming::{self, FilePair},
	repository::{remove_all, Deleted, Overwrite, PemCertifiedKey, Repository},
	Error, Result, Settings,
};

/// What to issue.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LeafRequest {
	/// Primary host name, IP address or common name.
	pub subject: String,
	/// Additional SANs, comma separated.
	pub extra_sans: String,
	/// Common name of the signing CA.
	pub ca_name: String,
	/// Zero or negative means the configured default.
	pub expiry_days: i64,
}

impl LeafRequest {
	pub fn new(subject: impl Into<String>, ca_name: impl Into<String>) -> Self {
		Self {
			subject: subject.into(),
			ca_name: ca_name.into(),
			..Self::default()
		}
	}
	pub fn sans(mut self, extra_sans: impl Into<String>) -> Self {
		self.extra_sans = extra_sans.into();
		self
	}
	pub fn days(mut self, expiry_days: i64) -> Self {
		self.expiry_days = expiry_days;
		self
	}
}

/// The SAN values of a leaf: `subject` first, then every trimmed, non-empty
/// entry of the comma separated `extra` that is not already present.
pub fn san_values(subject: &str, extra: &str) -> Vec<String> {
	let mut all = vec![subject.to_string()];
	for value in extra.split(',').map(str::trim) {
		if !value.is_empty() && !all.iter().any(|existing| existing == value) {
			all.push(value.to_string());
		}
	}
	all
}

/// Parse a SAN value. Try first `IpAddr`, if that fails declare it to be a
/// DnsName.
pub fn parse_san(host: &str) -> Result<SanType> {
	if let Ok(ip) = host.parse::<IpAddr>() {
		return Ok(SanType::IpAddress(ip));
	}
	let name = host.try_into().map_err(|_| {
		Error::Validation(format!("'{host}' is neither an IP address nor a DNS name"))
	})?;
	Ok(SanType::DnsName(name))
}

/// [CertificateParams] from which an [EndEntity] [Certificate] can be built
pub struct EndEntityParams {
	params: CertificateParams,
}

impl EndEntityParams {
	/// Initialize `EndEntityParams`
	pub fn new(mut params: CertificateParams) -> Self {
		params.is_ca = IsCa::NoCa;
		params.use_authority_key_identifier_extension = true;
		params.key_usages.push(KeyUsagePurpose::DigitalSignature);
		Self { params }
	}
	/// Return `&self.params`.
	pub fn params(&self) -> &CertificateParams {
		&self.params
	}
	pub fn common_name(mut self, name: &str) -> Self {
		self.params
			.distinguished_name
			.push(DnType::CommonName, name);
		self
	}
	/// `SanTypes` that will be recorded as `subject_alt_names`. Multiple
	/// calls will append to previous values.
	pub fn subject_alternative_names(mut self, sans: Vec<SanType>) -> Self {
		self.params.subject_alt_names.extend(sans);
		self
	}
	/// Add ClientAuth to `extended_key_usages` if it is not already present.
	pub fn client_auth(&mut self) -> &mut Self {
		self.add_usage(ExtendedKeyUsagePurpose::ClientAuth)
	}
	/// Add ServerAuth to `extended_key_usages` if it is not already present.
	pub fn server_auth(&mut self) -> &mut Self {
		self.add_usage(ExtendedKeyUsagePurpose::ServerAuth)
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
	/// Sign a certificate for `key` with the CA `issuer`.
	pub fn build(self, key: RsaKey, issuer: &LoadedCa) -> Result<EndEntity> {
		let signer = issuer.issuer()?;
		let cert = self.params.signed_by(&key.key_pair()?, &signer)?;
		Ok(EndEntity { cert, key })
	}

	fn add_usage(&mut self, usage: ExtendedKeyUsagePurpose) -> &mut Self {
		if !self.params.extended_key_usages.contains(&usage) {
			self.params.extended_key_usages.push(usage);
		}
		self
	}
}

/// End-entity [Certificate]
pub struct EndEntity {
	cert: Certificate,
	key: RsaKey,
}

impl EndEntity {
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

/// A leaf that was written to the repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedCertificate {
	pub subject: String,
	pub ca_name: String,
	/// File name of the certificate, the handle for inspect, export and delete.
	pub cert_file: String,
	pub cert_path: PathBuf,
	pub key_path: PathBuf,
	pub sans: Vec<String>,
	pub not_after: OffsetDateTime,
}

impl fmt::Display for IssuedCertificate {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(
			f,
			"Certificate for {} signed by '{}' created as '{}'.",
			self.subject, self.ca_name, self.cert_file
		)
	}
}

/// Issue a leaf certificate for `request.subject` signed by `request.ca_name`.
///
/// Issuing the same subject against the same CA again replaces the previous
/// key and certificate.
pub fn create(
	repo: &impl Repository,
	settings: &Settings,
	request: &LeafRequest,
) -> Result<IssuedCertificate> {
	let ca_name = request.ca_name.trim();
	if ca_name.is_empty() {
		return Err(Error::Validation(
			"a CA must be selected to sign the certificate".into(),
		));
	}
	let subject = request.subject.trim();
	naming::validate_name("common name", subject)?;
	let days = match request.expiry_days {
		d if d > 0 => d,
		_ => settings.leaf_days,
	};

	let values = san_values(subject, &request.extra_sans);
	let sans = values
		.iter()
		.map(|value| parse_san(value))
		.collect::<Result<Vec<_>>>()?;

	let issuer = ca::load(repo, ca_name)?;
	let (not_before, not_after) = ca::validity_window(days)?;

	let mut params = CertificateParams::default();
	// override default Common Name
	params.distinguished_name = DistinguishedName::new();

	debug!(subject, bits = %settings.leaf_key_size, "generating leaf key");
	let key = RsaKey::generate(settings.leaf_key_size)?;
	let mut entity = EndEntityParams::new(params)
		.common_name(subject)
		.subject_alternative_names(sans)
		.validity(not_before, not_after)
		.serial_number(keys::serial_number(settings.serial_scheme));
	entity.client_auth().server_auth();
	let leaf = entity.build(key, &issuer)?;

	let files = FilePair::leaf(subject, ca_name);
	leaf.serialize_pem()?
		.store(repo, &files, Overwrite::Allow)?;
	info!(subject, ca = ca_name, days, "issued certificate");

	Ok(IssuedCertificate {
		subject: subject.to_string(),
		ca_name: ca_name.to_string(),
		cert_file: files.cert(),
		cert_path: repo.location(&files.cert()),
		key_path: repo.location(&files.key()),
		sans: values,
		not_after,
	})
}

/// File names of all issued leaf certificates. Sorted.
pub fn list(repo: &impl Repository) -> Vec<String> {
	repo.list()
		.into_iter()
		.filter(|file| naming::is_leaf_cert(file))
		.collect()
}

/// Remove certificate, key and any PKCS#12 export of the leaf `cert_file`.
/// Files that are already gone are not an error.
pub fn delete(repo: &impl Repository, cert_file: &str) -> Result<Deleted> {
	let cert_file = cert_file.trim();
	naming::validate_name("certificate name", cert_file)?;
	if !naming::is_leaf_cert(cert_file) {
		return Err(Error::Validation(format!(
			"'{cert_file}' is not an issued certificate file"
		)));
	}
	let files = FilePair::from_cert_file(cert_file);
	let deleted = remove_all(repo, cert_file, &[files.cert(), files.key(), files.pkcs12()])?;
	info!(cert = cert_file, removed = deleted.removed.len(), "deleted certificate");
	Ok(deleted)
}

//! Read-only projection of a stored certificate.

use std::{
	fmt, io,
	net::{IpAddr, Ipv4Addr, Ipv6Addr},
};

use pki_types::CertificateDer;
use serde::Serialize;
use time::{format_description::well_known::Rfc2822, OffsetDateTime};
use tracing::debug;
use x509_parser::prelude::{AttributeTypeAndValue, FromDer, GeneralName, X509Certificate, X509Name};

use crate::{naming, repository::Repository, Entity, Error, Result};

const CERT_TAG: &str = "CERTIFICATE";

/// What [`inspect`] reports about a certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CertificateInfo {
	/// Common name of the subject, empty if there is none.
	pub subject: String,
	/// Common name of the issuer, empty if there is none.
	pub issuer: String,
	/// Start of validity, RFC 2822.
	pub valid_from: String,
	/// End of validity, RFC 2822.
	pub valid_until: String,
	#[serde(skip)]
	pub not_before: OffsetDateTime,
	#[serde(skip)]
	pub not_after: OffsetDateTime,
	/// Decimal serial number.
	pub serial_number: String,
	pub ip_addresses: Vec<String>,
	pub dns_names: Vec<String>,
	pub is_ca: bool,
}

impl fmt::Display for CertificateInfo {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		writeln!(f, "Subject:       {}", self.subject)?;
		writeln!(f, "Issuer:        {}", self.issuer)?;
		writeln!(f, "Valid from:    {}", self.valid_from)?;
		writeln!(f, "Valid until:   {}", self.valid_until)?;
		writeln!(f, "Serial number: {}", self.serial_number)?;
		writeln!(f, "CA:            {}", if self.is_ca { "yes" } else { "no" })?;
		writeln!(f, "DNS names:     {}", self.dns_names.join(", "))?;
		write!(f, "IP addresses:  {}", self.ip_addresses.join(", "))
	}
}

/// Read the PEM certificate `file` and return its DER.
pub(crate) fn read_certificate(
	repo: &impl Repository,
	file: &str,
) -> Result<CertificateDer<'static>> {
	naming::validate_name("certificate name", file)?;
	let data = repo.read(file).map_err(|e| match e.kind() {
		io::ErrorKind::NotFound => Error::NotFound {
			entity: Entity::Certificate,
			name: file.to_string(),
		},
		_ => Error::io("read certificate", repo.location(file), e),
	})?;
	let block = pem::parse(&data).map_err(|e| Error::Decode {
		name: file.to_string(),
		reason: e.to_string(),
	})?;
	if block.tag() != CERT_TAG {
		return Err(Error::Decode {
			name: file.to_string(),
			reason: format!("expected a {CERT_TAG} block, found '{}'", block.tag()),
		});
	}
	let der = block.into_contents();
	X509Certificate::from_der(&der).map_err(|e| Error::Parse {
		what: "certificate",
		name: file.to_string(),
		reason: e.to_string(),
	})?;
	Ok(CertificateDer::from(der))
}

/// Describe the stored certificate `file`.
pub fn inspect(repo: &impl Repository, file: &str) -> Result<CertificateInfo> {
	let der = read_certificate(repo, file)?;
	let info = describe(file, &der)?;
	debug!(file, subject = %info.subject, "inspected certificate");
	Ok(info)
}

/// Describe a DER certificate. `name` is only used in errors.
pub fn describe(name: &str, der: &[u8]) -> Result<CertificateInfo> {
	let parse_error = |reason: String| Error::Parse {
		what: "certificate",
		name: name.to_string(),
		reason,
	};
	let (_, cert) = X509Certificate::from_der(der).map_err(|e| parse_error(e.to_string()))?;

	let mut dns_names = Vec::new();
	let mut ip_addresses = Vec::new();
	let sans = cert
		.subject_alternative_name()
		.map_err(|e| parse_error(e.to_string()))?;
	if let Some(sans) = sans {
		for general_name in &sans.value.general_names {
			match general_name {
				GeneralName::DNSName(dns) => dns_names.push(dns.to_string()),
				GeneralName::IPAddress(octets) => ip_addresses.push(ip_to_string(octets)),
				_ => {},
			}
		}
	}

	let not_before = cert.validity().not_before.to_datetime();
	let not_after = cert.validity().not_after.to_datetime();
	Ok(CertificateInfo {
		subject: common_name(cert.subject()),
		issuer: common_name(cert.issuer()),
		valid_from: rfc2822(not_before),
		valid_until: rfc2822(not_after),
		not_before,
		not_after,
		serial_number: cert.serial.to_string(),
		ip_addresses,
		dns_names,
		is_ca: cert.is_ca(),
	})
}

/// First common name of `name`, empty if there is none.
pub(crate) fn common_name(name: &X509Name) -> String {
	first_value(name.iter_common_name())
}

/// First organization of `name`, empty if there is none.
pub(crate) fn organization(name: &X509Name) -> String {
	first_value(name.iter_organization())
}

fn first_value<'a, 'b: 'a>(
	mut values: impl Iterator<Item = &'a AttributeTypeAndValue<'b>>,
) -> String {
	values
		.next()
		.and_then(|value| value.as_str().ok())
		.unwrap_or_default()
		.to_string()
}

fn ip_to_string(octets: &[u8]) -> String {
	if let Ok(v4) = <[u8; 4]>::try_from(octets) {
		IpAddr::V4(Ipv4Addr::from(v4)).to_string()
	} else if let Ok(v6) = <[u8; 16]>::try_from(octets) {
		IpAddr::V6(Ipv6Addr::from(v6)).to_string()
	} else {
		octets.iter().map(|b| format!("{b:02x}")).collect()
	}
}

fn rfc2822(at: OffsetDateTime) -> String {
	at.format(&Rfc2822).unwrap_or_else(|_| at.to_string())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{ca, issue, CaRequest, DirRepository, ErrorKind, LeafRequest, RsaKeySize, Settings};

	fn settings(dir: &std::path::Path) -> Settings {
		Settings {
			ca_key_size: RsaKeySize::_2048,
			..Settings::with_dir(dir)
		}
	}

	#[test]
	fn inspect_leaf() -> anyhow::Result<()> {
		let temp = assert_fs::TempDir::new()?;
		let repo = DirRepository::open(temp.path())?;
		let settings = settings(temp.path());
		ca::create(&repo, &settings, &CaRequest::new("Test Root"))?;
		let issued = issue::create(
			&repo,
			&settings,
			&LeafRequest::new("svc.local", "Test Root").sans("127.0.0.1, ::1").days(30),
		)?;

		let info = inspect(&repo, &issued.cert_file)?;
		assert_eq!(info.subject, "svc.local");
		assert_eq!(info.issuer, "Test Root");
		assert_eq!(info.dns_names, vec!["svc.local"]);
		assert_eq!(info.ip_addresses, vec!["127.0.0.1", "::1"]);
		assert!(!info.is_ca);
		assert_eq!((info.not_after - info.not_before).whole_days(), 30);
		assert!(info.serial_number.chars().all(|c| c.is_ascii_digit()));
		Ok(())
	}

	#[test]
	fn inspect_ca() -> anyhow::Result<()> {
		let temp = assert_fs::TempDir::new()?;
		let repo = DirRepository::open(temp.path())?;
		let request = CaRequest {
			organization: "Crab widgits SE".into(),
			..CaRequest::new("Test Root")
		};
		ca::create(&repo, &settings(temp.path()), &request)?;

		let info = inspect(&repo, "Test Root.pem")?;
		assert!(info.is_ca);
		assert_eq!(info.subject, info.issuer);
		assert!(info.dns_names.is_empty());

		let json = serde_json::to_value(&info)?;
		assert_eq!(json["subject"], "Test Root");
		assert!(json.get("not_before").is_none());
		Ok(())
	}

	#[test]
	fn missing_and_malformed() -> anyhow::Result<()> {
		use assert_fs::prelude::*;
		let temp = assert_fs::TempDir::new()?;
		temp.child("junk.pem").write_str("not pem at all")?;
		temp.child("key.pem")
			.write_str(&pem::encode(&pem::Pem::new("PRIVATE KEY", vec![1, 2, 3])))?;
		temp.child("bad.pem")
			.write_str(&pem::encode(&pem::Pem::new("CERTIFICATE", vec![1, 2, 3])))?;
		let repo = DirRepository::open(temp.path())?;

		assert_eq!(inspect(&repo, "gone.pem").unwrap_err().kind(), ErrorKind::NotFound);
		assert_eq!(inspect(&repo, "junk.pem").unwrap_err().kind(), ErrorKind::Decode);
		assert_eq!(inspect(&repo, "key.pem").unwrap_err().kind(), ErrorKind::Decode);
		assert_eq!(inspect(&repo, "bad.pem").unwrap_err().kind(), ErrorKind::Parse);
		Ok(())
	}

	#[test]
	fn ip_octets() {
		assert_eq!(ip_to_string(&[10, 0, 0, 5]), "10.0.0.5");
		assert_eq!(
			ip_to_string(&[0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1]),
			"::1"
		);
		assert_eq!(ip_to_string(&[1, 2]), "0102");
	}
}

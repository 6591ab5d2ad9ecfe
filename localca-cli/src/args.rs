//! Command Line argument parsing
#![allow(missing_docs)]

use std::path::PathBuf;

use bpaf::Bpaf;
use localca::{RsaKeySize, SerialScheme, Settings, DEFAULT_DIR};

#[derive(Clone, Debug, Bpaf)]
#[bpaf(options, version)]
/// localca: a local certificate authority
pub struct Options {
	/// Directory holding keys, certificates and exports
	#[bpaf(
		short,
		long,
		env("LOCALCA_DIR"),
		argument("DIR"),
		fallback(PathBuf::from(DEFAULT_DIR)),
		debug_fallback
	)]
	pub dir: PathBuf,
	/// Log level: trace, debug, info, warn, error or off
	#[bpaf(long, env("LOCALCA_LOG"), argument("LEVEL"))]
	pub log_level: Option<String>,
	/// RSA key size of new CAs
	#[bpaf(long, argument("BITS"), fallback(RsaKeySize::_4096), display_fallback)]
	pub ca_key_bits: RsaKeySize,
	/// RSA key size of new leaf certificates
	#[bpaf(long, argument("BITS"), fallback(RsaKeySize::_2048), display_fallback)]
	pub leaf_key_bits: RsaKeySize,
	/// Serial numbers: random or time
	#[bpaf(long, argument("SCHEME"), fallback(SerialScheme::Random))]
	pub serial: SerialScheme,
	#[bpaf(external(command))]
	pub command: Command,
}

impl Options {
	pub fn settings(&self) -> Settings {
		Settings {
			ca_key_size: self.ca_key_bits,
			leaf_key_size: self.leaf_key_bits,
			serial_scheme: self.serial,
			..Settings::with_dir(&self.dir)
		}
	}
}

#[derive(Clone, Debug, PartialEq, Eq, Bpaf)]
pub enum Command {
	/// Create a self-signed root CA
	#[bpaf(command("create-ca"))]
	CreateCa {
		/// Common name, also the file name of the CA
		#[bpaf(long("cn"), argument("NAME"))]
		common_name: String,
		/// Country code
		#[bpaf(long, argument("C"), fallback(String::new()))]
		country: String,
		/// State or province
		#[bpaf(long, argument("S"), fallback(String::new()))]
		state: String,
		/// Locality
		#[bpaf(long, argument("L"), fallback(String::new()))]
		locality: String,
		/// Organization
		#[bpaf(long("org"), argument("O"), fallback(String::new()))]
		organization: String,
		/// Validity in days
		#[bpaf(long, argument("N"), fallback(localca::DEFAULT_CA_DAYS), display_fallback)]
		days: i64,
	},
	/// List CAs
	#[bpaf(command("list-cas"))]
	ListCas,
	/// Delete the key and certificate of a CA
	#[bpaf(command("delete-ca"))]
	DeleteCa {
		#[bpaf(positional("NAME"))]
		name: String,
	},
	/// Issue a certificate signed by a CA
	#[bpaf(command)]
	Issue {
		/// Primary host name or IP address
		#[bpaf(long, argument("HOST"))]
		subject: String,
		/// Additional subject alt names, comma separated
		#[bpaf(long("san"), argument("LIST"), fallback(String::new()))]
		sans: String,
		/// Name of the signing CA
		#[bpaf(long("ca"), argument("NAME"))]
		ca_name: String,
		/// Validity in days
		#[bpaf(long, argument("N"), fallback(localca::DEFAULT_LEAF_DAYS), display_fallback)]
		days: i64,
	},
	/// List issued certificates
	#[bpaf(command("list-certs"))]
	ListCerts,
	/// Delete an issued certificate, its key and its PKCS#12 export
	#[bpaf(command("delete-cert"))]
	DeleteCert {
		#[bpaf(positional("FILE"))]
		file: String,
	},
	/// Show the contents of a certificate
	#[bpaf(command)]
	Inspect {
		/// Print JSON
		#[bpaf(long)]
		json: bool,
		#[bpaf(positional("FILE"))]
		file: String,
	},
	/// Export a certificate, its key and its CA as PKCS#12
	#[bpaf(command)]
	Export {
		/// Password protecting the container
		#[bpaf(long, argument("PASSWORD"))]
		password: String,
		#[bpaf(positional("FILE"))]
		file: String,
	},
	/// Install a CA into the system trust store
	#[bpaf(command("install-ca"))]
	InstallCa {
		#[bpaf(positional("NAME"))]
		name: String,
	},
	/// Report whether the process runs with administrator rights
	#[bpaf(command)]
	Elevated,
}

#[cfg(test)]
mod tests {
	use super::*;

	fn parse(args: &[&str]) -> Options {
		options().run_inner(args).unwrap()
	}

	#[test]
	fn global_defaults() {
		let opts = parse(&["list-cas"]);
		assert_eq!(opts.command, Command::ListCas);
		assert_eq!(opts.ca_key_bits, RsaKeySize::_4096);
		assert_eq!(opts.leaf_key_bits, RsaKeySize::_2048);
		let settings = opts.settings();
		assert_eq!(settings.ca_days, localca::DEFAULT_CA_DAYS);
	}

	#[test]
	fn create_ca() {
		let opts = parse(&[
			"--dir",
			"certs",
			"--ca-key-bits",
			"2048",
			"create-ca",
			"--cn",
			"Test Root",
			"--org",
			"Crab widgits SE",
		]);
		assert_eq!(opts.dir, PathBuf::from("certs"));
		assert_eq!(opts.settings().ca_key_size, RsaKeySize::_2048);
		assert_eq!(
			opts.command,
			Command::CreateCa {
				common_name: "Test Root".into(),
				country: String::new(),
				state: String::new(),
				locality: String::new(),
				organization: "Crab widgits SE".into(),
				days: 3650,
			}
		);
	}

	#[test]
	fn issue() {
		let opts = parse(&[
			"issue",
			"--subject",
			"10.0.0.5",
			"--san",
			"host.local,api.local",
			"--ca",
			"Test Root",
			"--days",
			"30",
		]);
		assert_eq!(
			opts.command,
			Command::Issue {
				subject: "10.0.0.5".into(),
				sans: "host.local,api.local".into(),
				ca_name: "Test Root".into(),
				days: 30,
			}
		);
	}

	#[test]
	fn inspect_json() {
		let opts = parse(&["inspect", "--json", "a_signed-by_b.pem"]);
		assert_eq!(
			opts.command,
			Command::Inspect {
				json: true,
				file: "a_signed-by_b.pem".into(),
			}
		);
	}

	#[test]
	fn rejects_bad_key_size() {
		assert!(options().run_inner(&["--ca-key-bits", "1024", "list-cas"]).is_err());
	}

	#[test]
	fn export_requires_password() {
		assert!(options().run_inner(&["export", "a.pem"]).is_err());
	}
}

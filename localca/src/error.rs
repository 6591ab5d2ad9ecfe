use std::{fmt, io, path::PathBuf};

/// Things the toolkit stores and looks up by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
	/// A root certificate authority (key + certificate pair).
	Ca,
	/// The certificate file of a CA or leaf.
	Certificate,
	/// The private key file of a CA or leaf.
	PrivateKey,
}

impl fmt::Display for Entity {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			Entity::Ca => write!(f, "CA"),
			Entity::Certificate => write!(f, "certificate"),
			Entity::PrivateKey => write!(f, "private key"),
		}
	}
}

/// Coarse classification of an [`Error`], for callers that branch on the
/// failure category rather than on the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
	Validation,
	AlreadyExists,
	NotFound,
	Io,
	Decode,
	Parse,
	Crypto,
	Privilege,
	PartialFailure,
	Unsupported,
}

/// The error type of every toolkit operation.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
	/// Empty or otherwise unusable user input.
	#[error("{0}")]
	Validation(String),
	/// Creating something whose name is already taken.
	#[error("a {entity} named '{name}' already exists")]
	AlreadyExists { entity: Entity, name: String },
	/// A referenced CA, certificate or key is absent.
	#[error("{entity} '{name}' not found")]
	NotFound { entity: Entity, name: String },
	/// Reading, writing or removing a file failed.
	#[error("could not {action} '{}': {source}", path.display())]
	Io {
		action: &'static str,
		path: PathBuf,
		#[source]
		source: io::Error,
	},
	/// The file holds no usable PEM block.
	#[error("could not decode PEM from '{name}': {reason}")]
	Decode { name: String, reason: String },
	/// The PEM payload is not a valid certificate or key.
	#[error("could not parse {what} from '{name}': {reason}")]
	Parse {
		what: &'static str,
		name: String,
		reason: String,
	},
	/// RSA key generation or encoding failed.
	#[error("key generation failed: {0}")]
	KeyGeneration(String),
	/// Building or signing a certificate failed.
	#[error("could not create certificate: {0}")]
	Certificate(#[from] rcgen::Error),
	/// The issuing CA of a leaf could not be resolved.
	#[error("could not load issuing CA '{name}': {source}")]
	Issuer {
		name: String,
		#[source]
		source: Box<Error>,
	},
	/// Encoding the PKCS#12 container failed.
	#[error("could not create PKCS#12 container: {0}")]
	Pkcs12(String),
	/// The OS refused access to a trust store.
	#[error("access to the {store} certificate store was denied; run as an administrator")]
	Privilege { store: String },
	/// A trust store operation failed for another reason.
	#[error("could not {action} in the {store} certificate store: {reason}")]
	TrustStore {
		action: &'static str,
		store: String,
		reason: String,
	},
	/// Some trust stores received the certificate, a later one did not.
	#[error(
		"installed into {} but failed on {failed}: {source}",
		installed.join(", ")
	)]
	PartialInstall {
		installed: Vec<String>,
		failed: String,
		#[source]
		source: Box<Error>,
	},
	/// No trust store backend exists for this platform.
	#[error("installing into the system trust store is not supported on {0}")]
	Unsupported(&'static str),
}

impl Error {
	/// Classify this error.
	pub fn kind(&self) -> ErrorKind {
		match self {
			Error::Validation(_) => ErrorKind::Validation,
			Error::AlreadyExists { .. } => ErrorKind::AlreadyExists,
			Error::NotFound { .. } => ErrorKind::NotFound,
			Error::Io { .. } => ErrorKind::Io,
			Error::Decode { .. } => ErrorKind::Decode,
			Error::Parse { .. } => ErrorKind::Parse,
			Error::KeyGeneration(_) | Error::Certificate(_) | Error::Pkcs12(_) => ErrorKind::Crypto,
			Error::Issuer { source, .. } => source.kind(),
			Error::Privilege { .. } => ErrorKind::Privilege,
			Error::TrustStore { .. } => ErrorKind::Io,
			Error::PartialInstall { .. } => ErrorKind::PartialFailure,
			Error::Unsupported(_) => ErrorKind::Unsupported,
		}
	}

	pub(crate) fn io(action: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
		Error::Io {
			action,
			path: path.into(),
			source,
		}
	}
}

/// A specialized `Result` type.
pub type Result<T> = std::result::Result<T, Error>;

//! Windows system certificate stores through CryptoAPI.
#![allow(unsafe_code)]

use std::{ffi::c_void, io, ptr};

use tracing::{debug, warn};
use windows_sys::Win32::{
	Foundation::{E_ACCESSDENIED, ERROR_ACCESS_DENIED},
	Security::Cryptography::{
		CertAddCertificateContextToStore, CertCloseStore, CertCreateCertificateContext,
		CertFreeCertificateContext, CertOpenStore, CertSetCertificateContextProperty,
		CERT_CONTEXT, CERT_FRIENDLY_NAME_PROP_ID, CERT_STORE_ADD_REPLACE_EXISTING,
		CERT_STORE_PROV_SYSTEM_W, CERT_SYSTEM_STORE_LOCAL_MACHINE, CRYPT_INTEGER_BLOB,
		PKCS_7_ASN_ENCODING, X509_ASN_ENCODING,
	},
	UI::Shell::IsUserAnAdmin,
};

use super::{CaCertificate, TrustStore};
use crate::{Error, Result};

/// Trusted root authorities, then intermediate authorities.
const STORES: [&str; 2] = ["ROOT", "CA"];

/// The local machine `ROOT` and `CA` system stores.
#[derive(Debug, Default, Clone, Copy)]
pub struct WindowsTrustStore;

impl TrustStore for WindowsTrustStore {
	fn platform(&self) -> &'static str {
		"windows"
	}

	fn targets(&self) -> Vec<String> {
		STORES.iter().map(|s| s.to_string()).collect()
	}

	fn add(&self, target: &str, cert: &CaCertificate) -> Result<()> {
		let store = SystemStore::open(target)?;
		let context = CertContext::create(target, &cert.der)?;
		let added = store.add(&context)?;
		if let Err(err) = added.set_friendly_name(&cert.friendly_name) {
			warn!(store = target, %err, "could not set friendly name");
		}
		debug!(store = target, ca = %cert.name, "added certificate context");
		Ok(())
	}

	fn is_elevated(&self) -> bool {
		unsafe { IsUserAnAdmin() != 0 }
	}
}

fn failure(action: &'static str, store: &str) -> Error {
	classify(action, store, io::Error::last_os_error())
}

/// CryptoAPI reports a missing privilege either as a Win32 code or, from
/// `CertAddCertificateContextToStore`, as the matching HRESULT.
fn is_access_denied(code: i32) -> bool {
	code == ERROR_ACCESS_DENIED as i32 || code == E_ACCESSDENIED
}

fn classify(action: &'static str, store: &str, err: io::Error) -> Error {
	if err.raw_os_error().is_some_and(is_access_denied) {
		return Error::Privilege {
			store: store.to_string(),
		};
	}
	Error::TrustStore {
		action,
		store: store.to_string(),
		reason: err.to_string(),
	}
}

fn wide(s: &str) -> Vec<u16> {
	s.encode_utf16().chain(Some(0)).collect()
}

/// An open system store, closed on drop.
struct SystemStore {
	name: String,
	handle: *mut c_void,
}

impl SystemStore {
	fn open(name: &str) -> Result<Self> {
		let wide_name = wide(name);
		let handle = unsafe {
			CertOpenStore(
				CERT_STORE_PROV_SYSTEM_W,
				0,
				0,
				CERT_SYSTEM_STORE_LOCAL_MACHINE as _,
				wide_name.as_ptr() as *const c_void,
			)
		};
		if handle.is_null() {
			return Err(failure("open", name));
		}
		Ok(Self {
			name: name.to_string(),
			handle: handle as _,
		})
	}

	/// Add `context`, replacing an existing copy. Returns the context of the
	/// stored certificate.
	fn add(&self, context: &CertContext) -> Result<CertContext> {
		let mut stored: *mut CERT_CONTEXT = ptr::null_mut();
		let ok = unsafe {
			CertAddCertificateContextToStore(
				self.handle as _,
				context.0,
				CERT_STORE_ADD_REPLACE_EXISTING,
				&mut stored,
			)
		};
		if ok == 0 {
			return Err(failure("add certificate", &self.name));
		}
		Ok(CertContext(stored))
	}
}

impl Drop for SystemStore {
	fn drop(&mut self) {
		unsafe {
			CertCloseStore(self.handle as _, 0);
		}
	}
}

/// A certificate context, freed on drop.
struct CertContext(*const CERT_CONTEXT);

impl CertContext {
	fn create(store: &str, der: &[u8]) -> Result<Self> {
		let context = unsafe {
			CertCreateCertificateContext(
				X509_ASN_ENCODING | PKCS_7_ASN_ENCODING,
				der.as_ptr(),
				der.len() as u32,
			)
		};
		if context.is_null() {
			return Err(failure("create certificate context", store));
		}
		Ok(Self(context))
	}

	fn set_friendly_name(&self, name: &str) -> io::Result<()> {
		if self.0.is_null() {
			return Ok(());
		}
		let mut value = wide(name);
		let blob = CRYPT_INTEGER_BLOB {
			cbData: (value.len() * 2) as u32,
			pbData: value.as_mut_ptr() as *mut u8,
		};
		let ok = unsafe {
			CertSetCertificateContextProperty(
				self.0,
				CERT_FRIENDLY_NAME_PROP_ID,
				0,
				&blob as *const CRYPT_INTEGER_BLOB as *const c_void,
			)
		};
		if ok == 0 {
			return Err(io::Error::last_os_error());
		}
		Ok(())
	}
}

impl Drop for CertContext {
	fn drop(&mut self) {
		if !self.0.is_null() {
			unsafe {
				CertFreeCertificateContext(self.0);
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::ErrorKind;

	#[test]
	fn access_denied_is_a_privilege_error() {
		for code in [ERROR_ACCESS_DENIED as i32, E_ACCESSDENIED] {
			let err = classify("add certificate", "ROOT", io::Error::from_raw_os_error(code));
			assert_eq!(err.kind(), ErrorKind::Privilege);
		}
	}

	#[test]
	fn other_failures_are_store_errors() {
		// ERROR_FILE_NOT_FOUND
		let err = classify("open", "ROOT", io::Error::from_raw_os_error(2));
		assert_eq!(err.kind(), ErrorKind::Io);
		assert!(matches!(err, Error::TrustStore { action: "open", .. }));
	}
}

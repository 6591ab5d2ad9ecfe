#![allow(dead_code)]

use std::path::Path;

use localca::{CaRequest, LocalCa, RsaKeySize, Settings};

/// Settings with small keys, storing into `dir`.
pub fn settings(dir: &Path) -> Settings {
	Settings {
		ca_key_size: RsaKeySize::_2048,
		leaf_key_size: RsaKeySize::_2048,
		..Settings::with_dir(dir)
	}
}

pub fn toolkit(dir: &Path) -> LocalCa {
	LocalCa::open(settings(dir)).unwrap()
}

pub fn default_ca(name: &str) -> CaRequest {
	CaRequest {
		country: "BR".into(),
		organization: "Crab widgits SE".into(),
		..CaRequest::new(name)
	}
}

/// Names of the files in `dir`, sorted.
pub fn files(dir: &Path) -> Vec<String> {
	let mut names: Vec<String> = std::fs::read_dir(dir)
		.unwrap()
		.map(|entry| entry.unwrap().file_name().into_string().unwrap())
		.collect();
	names.sort();
	names
}

use std::process::ExitCode;

use localca::{CaRequest, LeafRequest, LocalCa};

use crate::args::{Command, Options};

mod args;
mod logging;

fn main() -> ExitCode {
	let opts = args::options().run();
	if let Err(err) = logging::init(opts.log_level.as_deref()) {
		eprintln!("Error: {err}");
		return ExitCode::FAILURE;
	}
	match run(opts) {
		Ok(()) => ExitCode::SUCCESS,
		Err(err) => {
			eprintln!("Error: {err}");
			ExitCode::FAILURE
		},
	}
}

fn run(opts: Options) -> anyhow::Result<()> {
	let toolkit = LocalCa::open(opts.settings())?;

	match opts.command {
		Command::CreateCa {
			common_name,
			country,
			state,
			locality,
			organization,
			days,
		} => {
			let request = CaRequest {
				country,
				state,
				locality,
				organization,
				common_name,
				expiry_days: days,
			};
			println!("{}", toolkit.create_ca(&request)?);
		},
		Command::ListCas => {
			for name in toolkit.list_cas() {
				println!("{name}");
			}
		},
		Command::DeleteCa { name } => println!("{}", toolkit.delete_ca(&name)?),
		Command::Issue {
			subject,
			sans,
			ca_name,
			days,
		} => {
			let request = LeafRequest::new(subject, ca_name).sans(sans).days(days);
			println!("{}", toolkit.issue_certificate(&request)?);
		},
		Command::ListCerts => {
			for file in toolkit.list_certificates() {
				println!("{file}");
			}
		},
		Command::DeleteCert { file } => println!("{}", toolkit.delete_certificate(&file)?),
		Command::Inspect { json, file } => {
			let info = toolkit.inspect(&file)?;
			if json {
				println!("{}", serde_json::to_string_pretty(&info)?);
			} else {
				println!("{info}");
			}
		},
		Command::Export { password, file } => {
			println!("{}", toolkit.export_pkcs12(&file, &password)?)
		},
		Command::InstallCa { name } => {
			if !toolkit.is_elevated() {
				tracing::warn!("not running as an administrator, installation will likely fail");
			}
			println!("{}", toolkit.install_ca(&name)?);
		},
		Command::Elevated => {
			println!("{}", if toolkit.is_elevated() { "yes" } else { "no" })
		},
	}
	Ok(())
}

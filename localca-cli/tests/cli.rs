use assert_cmd::Command;
use assert_fs::prelude::*;
use predicates::prelude::*;

fn localca(temp: &assert_fs::TempDir) -> Command {
	let mut cmd = Command::cargo_bin("localca").unwrap();
	cmd.env_remove("LOCALCA_DIR")
		.env_remove("LOCALCA_LOG")
		.arg("--dir")
		.arg(temp.path())
		.args(["--ca-key-bits", "2048"]);
	cmd
}

#[test]
fn create_issue_inspect_export() -> anyhow::Result<()> {
	let temp = assert_fs::TempDir::new()?;

	localca(&temp)
		.args(["create-ca", "--cn", "Test Root", "--org", "Crab widgits SE"])
		.assert()
		.success()
		.stdout(predicate::str::contains("CA 'Test Root' created"));
	temp.child("Test Root.pem").assert(predicate::path::exists());
	temp.child("Test Root.key").assert(predicate::path::exists());

	localca(&temp)
		.args(["list-cas"])
		.assert()
		.success()
		.stdout("Test Root\n");

	localca(&temp)
		.args([
			"issue",
			"--subject",
			"svc.local",
			"--san",
			"127.0.0.1",
			"--ca",
			"Test Root",
			"--days",
			"30",
		])
		.assert()
		.success()
		.stdout(predicate::str::contains("svc.local_signed-by_Test Root.pem"));

	localca(&temp)
		.args(["list-certs"])
		.assert()
		.success()
		.stdout("svc.local_signed-by_Test Root.pem\n");

	localca(&temp)
		.args(["inspect", "--json", "svc.local_signed-by_Test Root.pem"])
		.assert()
		.success()
		.stdout(predicate::str::contains("\"issuer\": \"Test Root\""))
		.stdout(predicate::str::contains("127.0.0.1"));

	localca(&temp)
		.args(["export", "--password", "pw", "svc.local_signed-by_Test Root.pem"])
		.assert()
		.success();
	temp.child("svc.local_signed-by_Test Root.pfx").assert(predicate::path::exists());

	localca(&temp)
		.args(["delete-cert", "svc.local_signed-by_Test Root.pem"])
		.assert()
		.success();
	temp.child("svc.local_signed-by_Test Root.pfx").assert(predicate::path::missing());
	Ok(())
}

#[test]
fn duplicate_ca_fails() -> anyhow::Result<()> {
	let temp = assert_fs::TempDir::new()?;
	localca(&temp)
		.args(["create-ca", "--cn", "Test Root"])
		.assert()
		.success();

	localca(&temp)
		.args(["create-ca", "--cn", "Test Root"])
		.assert()
		.code(1)
		.stderr(predicate::str::starts_with("Error: a CA named 'Test Root' already exists"));
	Ok(())
}

#[test]
fn issue_without_ca_fails() -> anyhow::Result<()> {
	let temp = assert_fs::TempDir::new()?;
	localca(&temp)
		.args(["issue", "--subject", "svc.local", "--ca", "Nobody"])
		.assert()
		.code(1)
		.stderr(predicate::str::contains("Error: CA 'Nobody' not found"));
	temp.child("svc.local_signed-by_Nobody.pem").assert(predicate::path::missing());
	Ok(())
}

#[test]
fn invalid_log_level_fails() -> anyhow::Result<()> {
	let temp = assert_fs::TempDir::new()?;
	localca(&temp)
		.args(["--log-level", "loud", "list-cas"])
		.assert()
		.code(1)
		.stderr(predicate::str::contains("invalid log level"));
	Ok(())
}

#[cfg(not(windows))]
#[test]
fn install_is_unsupported_off_windows() -> anyhow::Result<()> {
	let temp = assert_fs::TempDir::new()?;
	localca(&temp)
		.args(["create-ca", "--cn", "Test Root"])
		.assert()
		.success();

	localca(&temp)
		.args(["install-ca", "Test Root"])
		.assert()
		.code(1)
		.stderr(predicate::str::contains("not supported"));
	localca(&temp).args(["elevated"]).assert().success().stdout("no\n");
	Ok(())
}

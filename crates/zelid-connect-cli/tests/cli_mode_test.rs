/*
[INPUT]:  Built CLI binary and demo configuration
[OUTPUT]: Test results for non-interactive CLI runs
[POS]:    Integration tests - CLI mode
[UPDATE]: When CLI flags or config validation change
*/

use std::process::Command;

fn binary() -> &'static str {
    env!("CARGO_BIN_EXE_zelid-connect-cli")
}

#[test]
fn cli_mode_with_config_and_dry_run_works() {
    let config_path = format!("{}/demos/config.yaml", env!("CARGO_MANIFEST_DIR"));

    let output = Command::new(binary())
        .arg("--config")
        .arg(config_path)
        .arg("--dry-run")
        .env("RUST_LOG", "error")
        .output()
        .expect("Failed to start zelid-connect-cli binary");

    assert!(
        output.status.success(),
        "Process exited with non-zero status: {}\nStdout: {}\nStderr: {}",
        output.status,
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
}

#[test]
fn cli_mode_rejects_bad_private_key() {
    let dir = std::env::temp_dir().join(format!("zelid-cli-test-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let config_path = dir.join("bad.yaml");
    std::fs::write(&config_path, "evm_private_key: \"not-hex\"\n").unwrap();

    let output = Command::new(binary())
        .arg("--config")
        .arg(&config_path)
        .arg("--dry-run")
        .output()
        .expect("Failed to start zelid-connect-cli binary");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("invalid evm private key"), "stderr: {stderr}");

    std::fs::remove_dir_all(dir).unwrap();
}

#[test]
fn cli_mode_pay_requires_login() {
    let dir = std::env::temp_dir().join(format!("zelid-cli-session-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let config_path = dir.join("config.yaml");
    std::fs::write(
        &config_path,
        format!("session_dir: \"{}\"\n", dir.join("sessions").display()),
    )
    .unwrap();

    let output = Command::new(binary())
        .arg("--config")
        .arg(&config_path)
        .args(["pay", "--amount", "1", "--wallet", "zelcore"])
        .output()
        .expect("Failed to start zelid-connect-cli binary");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("not logged in"), "stderr: {stderr}");

    std::fs::remove_dir_all(dir).unwrap();
}

#[test]
fn cli_mode_rejects_unknown_wallet() {
    let output = Command::new(binary())
        .args(["login", "--wallet", "carrier-pigeon"])
        .output()
        .expect("Failed to start zelid-connect-cli binary");

    assert!(!output.status.success());
}

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;
use tempfile::NamedTempFile;
use zip::write::SimpleFileOptions;

fn package(entries: &[(&str, &[u8])]) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp file");
    {
        let mut writer = zip::ZipWriter::new(file.as_file_mut());
        let options = SimpleFileOptions::default();
        for (name, data) in entries {
            writer.start_file(*name, options).expect("start entry");
            writer.write_all(data).expect("write entry");
        }
        writer.finish().expect("finish archive");
    }
    file
}

fn apkparser() -> Command {
    let mut cmd = Command::cargo_bin("apkparser").expect("binary");
    cmd.env("RUST_LOG", "off");
    cmd
}

#[test]
fn dexes_without_containers_prints_empty_sets() {
    let apk = package(&[("assets/readme.txt", &b"hello"[..])]);
    apkparser()
        .arg("dexes")
        .arg(apk.path())
        .assert()
        .success()
        .stdout("{\n    \"dex_classes\": [],\n    \"dex_strings\": []\n}\n");
}

#[test]
fn invalid_containers_are_skipped() {
    let apk = package(&[("classes.dex", &b"dex\n035\0truncated"[..])]);
    apkparser()
        .arg("dexes")
        .arg(apk.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("\"dex_classes\": []"));
}

#[test]
fn missing_table_fails_strings() {
    let apk = package(&[("classes.dex", &b"dex\n"[..])]);
    apkparser()
        .arg("strings")
        .arg(apk.path())
        .assert()
        .failure()
        .code(1)
        .stdout("")
        .stderr(predicate::str::contains("error: package has no resources.arsc"));
}

#[test]
fn undecodable_manifest_fails_manifest_and_all() {
    let apk = package(&[("AndroidManifest.xml", &b"<manifest/>"[..])]);
    apkparser()
        .arg("manifest")
        .arg(apk.path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("failed decoding AndroidManifest.xml"));
    apkparser()
        .arg("all")
        .arg(apk.path())
        .assert()
        .code(1)
        .stdout("")
        .stderr(predicate::str::contains("error: manifest failed: failed decoding AndroidManifest.xml"));
}

#[test]
fn unreadable_package_fails() {
    let file = NamedTempFile::new().expect("temp file");
    apkparser()
        .arg("manifest")
        .arg(file.path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("error: failed opening package"));
    apkparser()
        .args(["dexes", "/nonexistent/app.apk"])
        .assert()
        .code(1)
        .stderr(predicate::str::starts_with("error: "));
}

#[test]
fn usage_errors_exit_with_two() {
    apkparser().assert().code(2);
    apkparser().args(["resources", "app.apk"]).assert().code(2);
}

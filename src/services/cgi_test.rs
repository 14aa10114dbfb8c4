use std::fs;
use std::os::unix::fs::PermissionsExt;

use testdir::testdir;

use super::*;

fn touch(path: &Path, mode: u32) {
    fs::write(path, "#!/bin/sh\n").expect("write file");
    fs::set_permissions(path, fs::Permissions::from_mode(mode)).expect("chmod");
}

#[test]
fn lists_only_executable_cgi_files() {
    let root = testdir!();
    let axis = root.join("axis-cgi");
    fs::create_dir_all(axis.join("nested.cgi")).expect("dir named like a cgi");
    touch(&axis.join("param.cgi"), 0o755);
    touch(&axis.join("basicdeviceinfo.cgi"), 0o700);
    touch(&axis.join("readonly.cgi"), 0o644);
    touch(&axis.join(".hidden.cgi"), 0o755);
    touch(&axis.join("script.sh"), 0o755);

    let found = collect(&[axis.clone()], MAX_CGI_ENTRIES);
    let expected: Vec<String> = ["basicdeviceinfo.cgi", "param.cgi"]
        .iter()
        .map(|n| axis.join(n).to_string_lossy().into_owned())
        .collect();
    assert_eq!(found, expected);
}

#[test]
fn missing_directories_are_skipped() {
    let root = testdir!();
    let bin = root.join("bin");
    fs::create_dir_all(&bin).expect("bin dir");
    touch(&bin.join("tool.cgi"), 0o755);

    let found = collect(&[root.join("absent"), bin], MAX_CGI_ENTRIES);
    assert_eq!(found.len(), 1);
}

#[test]
fn listing_is_bounded() {
    let root = testdir!();
    for i in 0..5 {
        touch(&root.join(format!("c{i}.cgi")), 0o755);
    }
    assert_eq!(collect(&[root.clone()], 3).len(), 3);
    assert!(collect(&[root], 0).is_empty());
}

use std::collections::HashMap;

use super::*;

fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())).collect();
    move |key| map.get(key).cloned()
}

#[test]
fn empty_environment_yields_defaults() {
    let config = Config::from_lookup(lookup(&[]));
    assert_eq!(config, Config::default());
    assert_eq!(config.port, 9000);
    assert_eq!(config.max_clients, 10);
    assert_eq!(config.send_interval, Duration::from_millis(500));
    assert_eq!(config.storage_paths.len(), 5);
}

#[test]
fn values_are_parsed_from_lookup() {
    let config = Config::from_lookup(lookup(&[
        ("PORT", "9100"),
        ("STATS_SAMPLE_MS", "250"),
        ("MAX_WS_CLIENTS", " 3 "),
        ("PROC_ROOT", "/tmp/fake-proc"),
        ("CGI_PATHS", "/opt/cgi, /srv/cgi ,"),
    ]));
    assert_eq!(config.port, 9100);
    assert_eq!(config.sample_interval, Duration::from_millis(250));
    assert_eq!(config.max_clients, 3);
    assert_eq!(config.proc_root, PathBuf::from("/tmp/fake-proc"));
    assert_eq!(config.cgi_paths, vec![PathBuf::from("/opt/cgi"), PathBuf::from("/srv/cgi")]);
}

#[test]
fn invalid_values_fall_back_to_defaults() {
    let config = Config::from_lookup(lookup(&[("PORT", "ninety"), ("STATS_SEND_MS", "-5"), ("STORAGE_PATHS", " , ")]));
    assert_eq!(config.port, 9000);
    assert_eq!(config.send_interval, Duration::from_millis(500));
    assert_eq!(config.storage_paths, Config::default().storage_paths);
}

#[test]
fn intervals_and_client_limit_have_floors() {
    let config = Config::from_lookup(lookup(&[("STATS_SAMPLE_MS", "1"), ("MAX_WS_CLIENTS", "0")]));
    assert_eq!(config.sample_interval, Duration::from_millis(50));
    assert_eq!(config.max_clients, 1);
}

#[test]
fn storage_list_is_capped() {
    let many = (0..12).map(|i| format!("/m{i}")).collect::<Vec<_>>().join(",");
    let config = Config::from_lookup(lookup(&[("STORAGE_PATHS", many.as_str())]));
    assert_eq!(config.storage_paths.len(), MAX_STORAGE_PATHS);
}

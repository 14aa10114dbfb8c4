use std::fs;
use std::path::Path;

use testdir::testdir;

use super::*;

const STAT: &str = "cpu  100 5 50 800 20 3 2 0 0 0\ncpu0 50 2 25 400 10 1 1 0 0 0\n";

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create fixture dir");
    }
    fs::write(path, content).expect("write fixture");
}

fn stat_line(comm: &str, utime: u64, stime: u64) -> String {
    format!("1234 ({comm}) S 1 1234 1234 0 -1 4194560 100 0 0 0 {utime} {stime} 0 0 20 0 1 0 500 1000 200\n")
}

fn add_process(root: &Path, pid: u32, comm: &str) {
    write(root, &format!("{pid}/comm"), &format!("{comm}\n"));
    write(root, &format!("{pid}/stat"), &stat_line(comm, 10, 5));
}

// --- parsers ---

#[test]
fn cpu_line_sums_counters() {
    let times = parse_cpu_times(STAT).expect("parses");
    assert_eq!(times, CpuTimes { idle: 820, total: 980 });
}

#[test]
fn cpu_line_must_be_aggregate() {
    assert!(parse_cpu_times("cpu0 1 2 3 4 5 6 7 8\n").is_err());
    assert!(parse_cpu_times("cpu 1 2 3\n").is_err());
    assert!(parse_cpu_times("").is_err());
}

#[test]
fn meminfo_fields_default_to_zero() {
    let info = parse_meminfo("MemTotal:       2048000 kB\nMemFree:  100 kB\nMemAvailable:   1024000 kB\n");
    assert_eq!(info, MemInfo { total_kb: 2_048_000, available_kb: 1_024_000 });
    assert_eq!(parse_meminfo("MemFree: 1 kB\n"), MemInfo::default());
}

#[test]
fn kb_field_requires_exact_key() {
    assert_eq!(parse_kb_field("VmRSSX: 5 kB\nVmRSS:    4321 kB\n", "VmRSS"), 4321);
}

#[test]
fn uptime_and_loadavg() {
    assert!((parse_uptime("12345.67 40000.00\n").expect("uptime") - 12345.67).abs() < 1e-9);
    let load = parse_loadavg("0.52 0.41 0.30 2/180 4242\n").expect("loadavg");
    assert_eq!(load, LoadAvg { one: 0.52, five: 0.41, fifteen: 0.30 });
    assert!(parse_loadavg("0.1 x\n").is_err());
}

#[test]
fn stat_jiffies_with_plain_comm() {
    assert_eq!(parse_stat_jiffies(&stat_line("sshd", 120, 30)).expect("parses"), 150);
}

#[test]
fn stat_jiffies_with_hostile_comm() {
    assert_eq!(parse_stat_jiffies(&stat_line("a) b (c) S x", 7, 8)).expect("parses"), 15);
    assert_eq!(parse_stat_jiffies(&stat_line("my proc", 1, 2)).expect("parses"), 3);
}

#[test]
fn stat_jiffies_rejects_garbage() {
    assert!(parse_stat_jiffies("no parens here").is_err());
    assert!(parse_stat_jiffies("1 (x) S 1 2 3").is_err());
    assert!(parse_stat_jiffies("1 (x) Q 1 2 3 4 5 6 7 8 9 10 11 12").is_err());
}

#[test]
fn smaps_rollup_sums_private_lines() {
    let content = "00400000-7fff [rollup]\nRss: 900 kB\nPss: 700 kB\nShared_Clean: 100 kB\n\
                   Private_Clean: 50 kB\nPrivate_Dirty: 400 kB\nPrivate_Hugetlb: 0 kB\nPrivate_Shmem: 25 kB\n";
    assert_eq!(parse_smaps_rollup(content), SmapsRollup { pss_kb: 700, uss_kb: 475 });
}

#[test]
fn mounts_decode_escapes() {
    let mounts = parse_mounts("/dev/root / ext4 rw 0 0\ntmpfs /mnt/my\\040disk tmpfs rw 0 0\nbad\n");
    assert_eq!(
        mounts,
        vec![
            Mount { mount_point: "/".into(), fs_type: "ext4".into() },
            Mount { mount_point: "/mnt/my disk".into(), fs_type: "tmpfs".into() },
        ]
    );
}

// --- fixture tree ---

#[test]
fn reads_system_files_from_root() {
    let root = testdir!();
    write(&root, "stat", STAT);
    write(&root, "meminfo", "MemTotal: 10 kB\nMemAvailable: 4 kB\n");
    write(&root, "uptime", "99.4 1.0\n");
    write(&root, "loadavg", "1.00 2.00 3.00 1/1 1\n");
    write(&root, "self/mounts", "/dev/root / squashfs ro 0 0\n");

    let procfs = ProcFs::new(&root);
    assert_eq!(procfs.cpu_times().expect("stat").total, 980);
    assert_eq!(procfs.meminfo().expect("meminfo").available_kb, 4);
    assert!((procfs.uptime_secs().expect("uptime") - 99.4).abs() < 1e-9);
    assert!((procfs.loadavg().expect("loadavg").fifteen - 3.0).abs() < 1e-9);
    assert_eq!(procfs.mounts().expect("mounts")[0].fs_type, "squashfs");
}

#[test]
fn missing_file_reports_path() {
    let root = testdir!();
    let err = ProcFs::new(&root).cpu_times().expect_err("no stat file");
    assert_eq!(err.error_code(), "E_PROC_IO");
    assert!(err.to_string().contains("stat"));
}

#[test]
fn finds_lowest_matching_pid_and_skips_kernel_threads() {
    let root = testdir!();
    add_process(&root, 300, "worker");
    add_process(&root, 20, "worker");
    add_process(&root, 2, "[kthreadd]");
    write(&root, "self/comm", "not-a-pid\n");

    let procfs = ProcFs::new(&root);
    assert_eq!(procfs.find_pid("worker"), Some(20));
    assert_eq!(procfs.find_pid("[kthreadd]"), None);
    assert_eq!(procfs.find_pid("absent"), None);
    assert!(procfs.comm_matches(300, "worker"));
    assert!(!procfs.comm_matches(300, "other"));
}

#[test]
fn process_names_are_unique_and_sorted() {
    let root = testdir!();
    add_process(&root, 1, "init");
    add_process(&root, 2, "[kworker/0:1]");
    add_process(&root, 10, "sshd");
    add_process(&root, 11, "sshd");
    add_process(&root, 12, "acme");

    let names = ProcFs::new(&root).process_names(256);
    assert_eq!(names, vec!["acme", "init", "sshd"]);
    assert_eq!(ProcFs::new(&root).process_names(1), vec!["acme"]);
}

#[test]
fn per_process_memory_files() {
    let root = testdir!();
    add_process(&root, 7, "app");
    write(&root, "7/status", "Name: app\nVmRSS:    2048 kB\n");
    write(&root, "7/smaps_rollup", "Pss: 1500 kB\nPrivate_Dirty: 1000 kB\n");

    let procfs = ProcFs::new(&root);
    assert_eq!(procfs.vm_rss_kb(7).expect("status"), 2048);
    assert_eq!(procfs.smaps_rollup(7).expect("smaps"), SmapsRollup { pss_kb: 1500, uss_kb: 1000 });
    assert_eq!(procfs.process_jiffies(7).expect("stat"), 15);
}

use std::time::{Duration, Instant};

use warden::{ProcessRegistry, RegistryConfig};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_target(false)
        .with_line_number(true)
        .try_init();
}

#[cfg(unix)]
const EMIT_THREE_LINES: &str = "printf 'L1\\nL2\\nL3\\n'";
#[cfg(windows)]
const EMIT_THREE_LINES: &str = "echo L1& echo L2& echo L3";

// exec pins single-process semantics: a forking shell would absorb the
// termination signal itself and leave the command running as an orphan.
#[cfg(unix)]
const SLEEP_LONG: &str = "exec sleep 30";
#[cfg(windows)]
const SLEEP_LONG: &str = "ping 127.0.0.1 -n 30";

/// Poll a registered process until it yields output or the deadline passes.
async fn poll_output(registry: &mut ProcessRegistry, name: &str, needle: &str) -> String {
    let deadline = Instant::now() + Duration::from_secs(5);
    let mut collected = String::new();
    while !collected.contains(needle) && Instant::now() < deadline {
        collected.push_str(&registry.get_subprocess_output(name).await);
    }
    collected
}

#[tokio::test]
async fn test_operations_on_never_started_names() {
    init_tracing();
    let mut registry = ProcessRegistry::new();

    for name in ["missing", "also-missing"] {
        let stopped = registry.stop_subprocess(name).await.unwrap();
        assert!(stopped.contains(&format!("No subprocess named '{name}'")));

        let output = registry.get_subprocess_output(name).await;
        assert!(output.contains(&format!("No subprocess named '{name}'")));
    }
    assert!(registry.is_empty());
}

#[tokio::test]
async fn test_double_start_leaves_one_live_process() {
    init_tracing();
    let mut registry = ProcessRegistry::new();

    registry.start_subprocess("svc", SLEEP_LONG).unwrap();
    let second = registry.start_subprocess("svc", SLEEP_LONG).unwrap();

    assert!(second.contains("already running"));
    assert_eq!(registry.len(), 1);

    registry.cleanup().await.unwrap();
}

#[tokio::test]
async fn test_multi_line_output_arrives_in_order() {
    init_tracing();
    let mut registry = ProcessRegistry::new();

    registry.start_subprocess("lines", EMIT_THREE_LINES).unwrap();
    let output = poll_output(&mut registry, "lines", "L3").await;

    #[cfg(unix)]
    assert_eq!(output, "L1\nL2\nL3\n");
    #[cfg(windows)]
    {
        let first = output.find("L1").expect("L1 missing");
        let second = output.find("L2").expect("L2 missing");
        let third = output.find("L3").expect("L3 missing");
        assert!(first < second && second < third);
    }

    registry.cleanup().await.unwrap();
}

#[tokio::test]
async fn test_silent_child_reads_return_empty_within_timeout() {
    init_tracing();
    let config = RegistryConfig::builder()
        .output_timeout_ms(50u64)
        .build()
        .unwrap();
    let mut registry = ProcessRegistry::with_config(config);

    registry.start_subprocess("quiet", SLEEP_LONG).unwrap();

    let started = Instant::now();
    let output = registry.get_subprocess_output("quiet").await;
    assert_eq!(output, "");
    assert!(started.elapsed() < Duration::from_secs(1));

    registry.cleanup().await.unwrap();
}

#[tokio::test]
async fn test_stop_removes_the_entry() {
    init_tracing();
    let mut registry = ProcessRegistry::new();

    registry.start_subprocess("svc", SLEEP_LONG).unwrap();
    assert!(registry.contains("svc"));

    let stopped = registry.stop_subprocess("svc").await.unwrap();
    assert_eq!(stopped, "Stopped subprocess 'svc'");
    assert!(!registry.contains("svc"));

    let output = registry.get_subprocess_output("svc").await;
    assert!(output.contains("No subprocess named 'svc'"));
}

#[tokio::test]
async fn test_cleanup_empties_the_registry() {
    init_tracing();
    let mut registry = ProcessRegistry::new();

    for name in ["a", "b", "c"] {
        registry.start_subprocess(name, SLEEP_LONG).unwrap();
    }
    assert_eq!(registry.len(), 3);
    let pids: Vec<u32> = ["a", "b", "c"]
        .iter()
        .map(|name| registry.pid_of(name).expect("child should be live"))
        .collect();

    registry.cleanup().await.unwrap();
    assert!(registry.is_empty());

    // Every child must be terminated, not just forgotten.
    #[cfg(unix)]
    {
        use nix::sys::signal;
        use nix::unistd::Pid;

        for pid in pids {
            assert_eq!(
                signal::kill(Pid::from_raw(pid as i32), None),
                Err(nix::errno::Errno::ESRCH),
                "process {pid} still alive after cleanup"
            );
        }
    }
    #[cfg(not(unix))]
    drop(pids);
}

#[tokio::test]
#[cfg(unix)]
async fn test_echo_scenario_end_to_end() {
    init_tracing();
    let mut registry = ProcessRegistry::new();

    let started = registry
        .start_subprocess("echo", "printf 'a\\nb\\n'")
        .unwrap();
    assert!(started.contains("Started"));

    let output = poll_output(&mut registry, "echo", "b").await;
    assert_eq!(output, "a\nb\n");

    let stopped = registry.stop_subprocess("echo").await.unwrap();
    assert!(stopped.contains("Stopped"));

    let after = registry.get_subprocess_output("echo").await;
    assert!(after.contains("No subprocess named 'echo'"));
}

#[tokio::test]
async fn test_spawn_failure_propagates() {
    init_tracing();
    let config = RegistryConfig::builder()
        .working_directory("/definitely/not/a/real/directory")
        .build()
        .unwrap();
    let mut registry = ProcessRegistry::with_config(config);

    let result = registry.start_subprocess("doomed", "echo hi");
    assert!(result.is_err());
    assert!(registry.is_empty());
}

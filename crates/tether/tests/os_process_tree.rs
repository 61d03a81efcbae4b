//! Real process-group termination through `/bin/sh`.

#![cfg(unix)]

#[cfg(target_os = "linux")]
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};
use tether::{Backend, BackendConfig, BackendEvent, BackendState, Signal, TetherError};

fn sh(script: &str) -> BackendConfig {
  BackendConfig::new("/bin/sh")
    .args(["-c", script])
    .poll_interval(Duration::from_millis(10))
}

#[cfg(target_os = "linux")]
fn wait_until(timeout: Duration, mut f: impl FnMut() -> bool) -> bool {
  let deadline = Instant::now() + timeout;
  while Instant::now() < deadline {
    if f() {
      return true;
    }
    thread::sleep(Duration::from_millis(20));
  }
  f()
}

#[test]
fn terminate_stops_shell_and_its_children() {
  let backend = Backend::new(sh("sleep 30 & sleep 30 & wait").grace_period(Duration::from_millis(500)));
  backend.start().unwrap();
  assert!(backend.is_live());

  assert!(backend.terminate());
  assert!(backend.wait_for_exit(Duration::from_secs(5)));
  assert_eq!(backend.state(), BackendState::Idle);
  assert!(backend.last_exit().is_some());
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn grandchildren_die_with_the_backend() {
  let backend = Backend::new(sh("sleep 30 & echo $!; wait").grace_period(Duration::from_millis(500)));
  let mut events = backend.subscribe();
  backend.start().unwrap();

  let grandchild = loop {
    match events.recv().await.unwrap() {
      BackendEvent::Stdout { line, .. } => break line.trim().to_string(),
      _ => continue,
    }
  };
  assert!(is_running(&grandchild), "grandchild {grandchild} should be running");

  backend.terminate();
  assert!(backend.wait_for_exit(Duration::from_secs(5)));
  assert!(
    wait_until(Duration::from_secs(5), || !is_running(&grandchild)),
    "grandchild {grandchild} outlived the backend"
  );
}

/// Alive and not a zombie awaiting its reaper.
#[cfg(target_os = "linux")]
fn is_running(pid: &str) -> bool {
  let Ok(stat) = std::fs::read_to_string(Path::new("/proc").join(pid).join("stat")) else {
    return false;
  };
  stat
    .rsplit_once(')')
    .and_then(|(_, rest)| rest.trim_start().chars().next())
    .is_some_and(|state| state != 'Z' && state != 'X')
}

#[tokio::test]
async fn unresponsive_tree_is_killed_after_grace() {
  let config =
    sh("trap '' TERM; echo ready; while true; do sleep 0.1; done").grace_period(Duration::from_millis(200));
  let backend = Backend::new(config);
  let mut events = backend.subscribe();
  backend.start().unwrap();

  // Wait for the trap to be installed before signaling.
  loop {
    if let BackendEvent::Stdout { .. } = events.recv().await.unwrap() {
      break;
    }
  }

  backend.terminate();
  assert!(backend.wait_for_exit(Duration::from_secs(5)));

  let mut signals = Vec::new();
  let exit = loop {
    match events.recv().await.unwrap() {
      BackendEvent::Terminating { signal, .. } => signals.push(signal),
      BackendEvent::Exited { exit, .. } => break exit,
      _ => {}
    }
  };
  assert_eq!(signals, vec![Signal::Graceful, Signal::Forceful]);
  assert_eq!(exit.signal, Some(libc::SIGKILL));
}

#[tokio::test]
async fn descendant_ignoring_term_is_killed_after_root_exits() {
  let script = r#"sh -c 'trap "" TERM; echo $$; while true; do sleep 0.1; done' & wait"#;
  let backend = Backend::new(sh(script).grace_period(Duration::from_millis(300)));
  let mut events = backend.subscribe();
  backend.start().unwrap();

  let descendant = loop {
    if let BackendEvent::Stdout { line, .. } = events.recv().await.unwrap() {
      break line.trim().to_string();
    }
  };

  backend.terminate();
  assert!(backend.wait_for_exit(Duration::from_secs(5)));

  let mut signals = Vec::new();
  let exit = loop {
    match events.recv().await.unwrap() {
      BackendEvent::Terminating { signal, .. } => signals.push(signal),
      BackendEvent::Exited { exit, .. } => break exit,
      _ => {}
    }
  };
  assert_eq!(signals, vec![Signal::Graceful, Signal::Forceful]);
  // The root itself went down on the graceful request.
  assert_eq!(exit.signal, Some(libc::SIGTERM));

  #[cfg(target_os = "linux")]
  assert!(
    wait_until(Duration::from_secs(5), || !is_running(&descendant)),
    "descendant {descendant} outlived the backend"
  );
  #[cfg(not(target_os = "linux"))]
  drop(descendant);
}

#[test]
fn missing_executable_is_a_spawn_error() {
  let backend = Backend::new(BackendConfig::new("/nonexistent/tether-backend"));

  let err = backend.start().unwrap_err();
  assert!(matches!(err, TetherError::Spawn { .. }));
  assert_eq!(backend.state(), BackendState::Idle);
  assert!(!backend.terminate());
}

#[test]
fn relay_round_trips_through_cat() {
  let backend = Backend::new(BackendConfig::new("/bin/cat"));
  let mut events = backend.subscribe();
  backend.start().unwrap();

  backend.send(&serde_json::json!({ "ping": 1 })).unwrap();

  let message = wait_for_message(&mut events);
  assert_eq!(message, serde_json::json!({ "ping": 1 }));

  backend.terminate();
  assert!(backend.wait_for_exit(Duration::from_secs(5)));
}

fn wait_for_message(events: &mut async_broadcast::Receiver<BackendEvent>) -> serde_json::Value {
  let deadline = Instant::now() + Duration::from_secs(5);
  while Instant::now() < deadline {
    if let Ok(event) = events.try_recv() {
      if let Some(message) = event.bridge_message() {
        return message.data;
      }
    } else {
      thread::sleep(Duration::from_millis(10));
    }
  }
  panic!("no bridge message within 5s");
}

//! Skips wiremock-backed tests on hosts that cannot bind a localhost socket.

use std::net::TcpListener;

use wiremock::MockServer;

/// Set to `1`/`true`/`yes` to fail instead of skipping.
pub const REQUIRE_SOCKET_TESTS_VAR: &str = "TABFETCH_REQUIRE_SOCKET_TESTS";

#[must_use]
pub fn socket_tests_required() -> bool {
    std::env::var(REQUIRE_SOCKET_TESTS_VAR)
        .ok()
        .is_some_and(|value| matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
}

#[must_use]
pub fn should_skip_socket_bound_test() -> bool {
    if TcpListener::bind("127.0.0.1:0").is_ok() {
        return false;
    }

    let message = "[socket-bound-test] cannot bind a localhost socket; mock-server test cannot run here";
    assert!(
        !socket_tests_required(),
        "{message}. Unset {REQUIRE_SOCKET_TESTS_VAR} to allow skipping."
    );
    eprintln!("{message}. Skipping. Set {REQUIRE_SOCKET_TESTS_VAR}=1 to fail instead.");
    true
}

pub async fn start_mock_server_or_skip() -> Option<MockServer> {
    if should_skip_socket_bound_test() {
        None
    } else {
        Some(MockServer::start().await)
    }
}

use std::sync::OnceLock;

static LOCALHOST_BINDABLE: OnceLock<bool> = OnceLock::new();

/// Mock-server tests call this first; some sandboxes refuse loopback binds.
pub fn should_skip_httpmock() -> bool {
    let bindable = *LOCALHOST_BINDABLE.get_or_init(probe_localhost);
    if !bindable {
        eprintln!("skipping mock APS test: localhost bind is not permitted here");
    }
    !bindable
}

fn probe_localhost() -> bool {
    match std::net::TcpListener::bind(("127.0.0.1", 0)) {
        Ok(_listener) => true,
        Err(err) if err.kind() == std::io::ErrorKind::PermissionDenied => false,
        Err(err) => panic!("unexpected error probing localhost for mock APS: {err}"),
    }
}

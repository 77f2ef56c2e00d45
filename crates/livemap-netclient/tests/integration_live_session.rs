//! Live client against a real server on loopback.

use std::net::SocketAddr;
use std::time::Duration;

use livemap_editor::{
    Action, ActionKind, ActionQueue, AssetLoadError, AssetLoader, Change, LiveEditor,
    LiveObserver, LogLine, MemoryEditor, MemoryMap, NullObserver, RefreshCause,
};
use livemap_netclient::{
    ClientConfig, ClientState, LiveClientError, LiveClientHandle, TransportService, UpdatePump,
    connect,
};
use livemap_netd::net::tcp::run_tcp_listener_with_listener;
use livemap_netd::{ServerCommand, ServerConfig, run_server};
use livemap_netproto::types::{ClientEntry, Color, Position, TileRecord};
use tokio::net::TcpListener;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::time::{Instant, sleep};

const VERSION: u32 = 1098;
const PASSWORD: &str = "secret";

struct TestServer {
    addr: SocketAddr,
    commands: mpsc::Sender<ServerCommand>,
}

async fn setup_server(config: ServerConfig, editor: MemoryEditor) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::channel(1024);
    let (commands, cmd_rx) = mpsc::channel(16);
    let policy = config.read_policy;

    tokio::spawn(async move {
        let _ = run_tcp_listener_with_listener(listener, tx, policy).await;
    });
    tokio::spawn(async move {
        let _ = run_server(rx, cmd_rx, config, editor, NullObserver).await;
    });

    TestServer { addr, commands }
}

fn server_config() -> ServerConfig {
    ServerConfig {
        password: PASSWORD.to_string(),
        max_clients: 4,
        client_version: VERSION,
        ..Default::default()
    }
}

async fn default_server() -> TestServer {
    setup_server(
        server_config(),
        MemoryEditor::new(MemoryMap::new("Test Map", 256, 512)),
    )
    .await
}

fn tile(x: u16, y: u16, z: u8, ground: u16) -> TileRecord {
    TileRecord {
        position: Position::new(x, y, z),
        ground,
        ..Default::default()
    }
}

fn seeded_editor(tiles: Vec<TileRecord>) -> MemoryEditor {
    let mut editor = MemoryEditor::new(MemoryMap::new("Seeded", 256, 256));
    let mut action = Action::new(ActionKind::Local);
    for t in tiles {
        action.add_change(Change::new(t));
    }
    editor.add_action(action);
    editor
}

fn client_config(addr: SocketAddr, name: &str) -> ClientConfig {
    ClientConfig {
        host: "127.0.0.1".to_string(),
        port: addr.port(),
        name: name.to_string(),
        password: PASSWORD.to_string(),
        client_version: VERSION,
        connect_timeout: Some(Duration::from_secs(2)),
        ..Default::default()
    }
}

#[derive(Default)]
struct Recorder {
    refreshes: Vec<RefreshCause>,
    logs: Vec<LogLine>,
    statuses: Vec<String>,
    lists: Vec<Vec<ClientEntry>>,
}

impl LiveObserver for Recorder {
    fn on_refresh(&mut self, cause: RefreshCause) {
        self.refreshes.push(cause);
    }
    fn on_log(&mut self, line: LogLine) {
        self.logs.push(line);
    }
    fn on_status(&mut self, text: &str) {
        self.statuses.push(text.to_string());
    }
    fn on_client_list(&mut self, clients: &[ClientEntry]) {
        self.lists.push(clients.to_vec());
    }
}

impl Recorder {
    fn has_message(&self, needle: &str) -> bool {
        self.logs
            .iter()
            .any(|l| matches!(l, LogLine::Message(m) if m.contains(needle)))
    }
}

struct Loader {
    version: u32,
    requested: Vec<u32>,
    fail: bool,
}

impl AssetLoader for Loader {
    fn current_version(&self) -> u32 {
        self.version
    }

    fn load_version(&mut self, version: u32) -> Result<(), AssetLoadError> {
        self.requested.push(version);
        if self.fail {
            return Err(AssetLoadError {
                version,
                reason: "not installed".to_string(),
            });
        }
        self.version = version;
        Ok(())
    }
}

struct ClientHarness {
    transport: TransportService,
    handle: LiveClientHandle,
    pump: UpdatePump,
    editor: MemoryEditor,
    observer: Recorder,
    loader: Loader,
}

impl ClientHarness {
    fn start(config: ClientConfig) -> Self {
        let transport = TransportService::from_handle(Handle::current());
        let (handle, pump) = connect(&transport, config).unwrap();
        Self {
            transport,
            handle,
            pump,
            editor: MemoryEditor::default(),
            observer: Recorder::default(),
            loader: Loader {
                version: VERSION,
                requested: Vec::new(),
                fail: false,
            },
        }
    }

    fn pump(&mut self) -> usize {
        self.pump
            .pump(&mut self.editor, &mut self.observer, &mut self.loader)
    }

    /// Pumps on the test task until `done` holds.
    async fn pump_until(&mut self, what: &str, done: impl Fn(&Self) -> bool) {
        let deadline = Instant::now() + Duration::from_secs(3);
        loop {
            self.pump();
            if done(self) {
                return;
            }
            assert!(Instant::now() < deadline, "timed out waiting for {what}");
            sleep(Duration::from_millis(10)).await;
        }
    }

    async fn wait_active(&mut self) {
        self.pump_until("login", |c| c.handle.is_active()).await;
    }

    async fn wait_closed(&mut self) {
        self.pump_until("close", |c| c.pump.is_closed()).await;
        assert_eq!(self.handle.state(), ClientState::Closed);
    }

    /// Id the server assigned to `name`, from the latest client list.
    async fn client_id_of(&mut self, name: &str) -> u32 {
        self.pump_until("client list", |c| {
            c.observer
                .lists
                .last()
                .is_some_and(|l| l.iter().any(|e| e.name == name))
        })
        .await;
        self.observer
            .lists
            .last()
            .and_then(|l| l.iter().find(|e| e.name == name))
            .map(|e| e.client_id)
            .unwrap()
    }
}

#[tokio::test]
async fn joins_and_applies_map_info() {
    let server = default_server().await;
    let mut client = ClientHarness::start(client_config(server.addr, "alice"));

    client
        .pump_until("map info", |c| {
            c.editor.map().name() == "Live Map - Test Map"
        })
        .await;
    assert_eq!(client.handle.state(), ClientState::Active);
    assert_eq!(client.editor.map().width(), 256);
    assert_eq!(client.editor.map().height(), 512);
    assert!(client.observer.refreshes.contains(&RefreshCause::MapInfo));
    assert_eq!(client.client_id_of("alice").await, 1);
}

#[tokio::test]
async fn second_attempt_on_busy_transport_is_refused() {
    let server = default_server().await;
    let mut client = ClientHarness::start(client_config(server.addr, "alice"));

    let again = connect(&client.transport, client_config(server.addr, "alice"));
    assert!(matches!(again, Err(LiveClientError::AlreadyConnecting)));

    client.wait_active().await;
    client.handle.close();
    client.wait_closed().await;
    assert!(!client.transport.is_attempt_in_progress());

    let (handle, _pump) = connect(&client.transport, client_config(server.addr, "alice")).unwrap();
    let deadline = Instant::now() + Duration::from_secs(3);
    while !handle.is_active() {
        assert!(Instant::now() < deadline, "reconnect did not log in");
        sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn version_mismatch_reloads_and_logs_in_again() {
    let server = setup_server(
        ServerConfig {
            client_version: 1100,
            ..server_config()
        },
        MemoryEditor::default(),
    )
    .await;
    let mut client = ClientHarness::start(client_config(server.addr, "bob"));

    client.wait_active().await;
    assert_eq!(client.loader.requested, vec![1100]);
    assert_eq!(client.loader.current_version(), 1100);
}

#[tokio::test]
async fn failed_reload_closes_the_session() {
    let server = setup_server(
        ServerConfig {
            client_version: 1100,
            ..server_config()
        },
        MemoryEditor::default(),
    )
    .await;
    let mut client = ClientHarness::start(client_config(server.addr, "bob"));
    client.loader.fail = true;

    client.wait_closed().await;
    assert_eq!(client.loader.requested, vec![1100]);
    assert!(client.observer.has_message("not installed"));
}

#[tokio::test]
async fn wrong_password_ends_in_closed() {
    let server = default_server().await;
    let mut client = ClientHarness::start(ClientConfig {
        password: "guess".into(),
        ..client_config(server.addr, "mallory")
    });

    client.wait_closed().await;
    assert!(client.observer.has_message("Disconnected from"));
}

#[tokio::test]
async fn kick_reason_is_surfaced() {
    let server = setup_server(
        ServerConfig {
            max_clients: 1,
            ..server_config()
        },
        MemoryEditor::default(),
    )
    .await;
    let mut first = ClientHarness::start(client_config(server.addr, "first"));
    first.wait_active().await;

    let mut second = ClientHarness::start(client_config(server.addr, "second"));
    second.wait_closed().await;
    assert!(second.observer.has_message("Server is full."));
}

#[tokio::test]
async fn unreachable_server_fails_the_attempt() {
    let dead = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };
    let mut client = ClientHarness::start(client_config(dead, "alice"));

    client.wait_closed().await;
    assert!(client.observer.has_message("connection failed"));
    assert!(!client.transport.is_attempt_in_progress());
}

#[tokio::test]
async fn requests_before_login_stay_queued() {
    let server = default_server().await;
    let mut client = ClientHarness::start(client_config(server.addr, "early"));

    assert!(client.handle.query_node(0, 0, false));
    assert!(matches!(
        client.handle.flush_node_requests(),
        Err(LiveClientError::NotConnected)
    ));
    assert_eq!(client.handle.pending_requests(), 1);

    client.wait_active().await;
    assert_eq!(client.handle.flush_node_requests().unwrap(), 1);
    assert_eq!(client.handle.pending_requests(), 0);
}

#[tokio::test]
async fn queried_nodes_are_mirrored() {
    let server = setup_server(
        server_config(),
        seeded_editor(vec![tile(8, 12, 7, 4526), tile(9, 13, 9, 351)]),
    )
    .await;
    let mut client = ClientHarness::start(client_config(server.addr, "frank"));
    client.wait_active().await;

    assert!(client.handle.query_node(8, 12, false));
    assert!(!client.handle.query_node(9, 13, false), "same leaf and floors");
    assert!(client.handle.query_node(9, 13, true));
    assert_eq!(client.handle.flush_node_requests().unwrap(), 2);

    client
        .pump_until("both nodes", |c| {
            let map = c.editor.map();
            map.tile(Position::new(8, 12, 7)).is_some()
                && map.tile(Position::new(9, 13, 9)).is_some()
        })
        .await;
    for action in client.editor.history() {
        assert_eq!(action.kind(), ActionKind::Remote);
        assert_eq!(action.owner(), None);
    }
}

#[tokio::test]
async fn edits_propagate_to_clients_that_know_the_node() {
    let server = setup_server(server_config(), seeded_editor(vec![tile(40, 40, 7, 1)])).await;
    let mut a = ClientHarness::start(client_config(server.addr, "a"));
    let mut b = ClientHarness::start(client_config(server.addr, "b"));
    a.wait_active().await;
    b.wait_active().await;

    b.handle.query_node(40, 40, false);
    b.handle.flush_node_requests().unwrap();
    b.pump_until("seed tile", |c| {
        c.editor.map().tile(Position::new(40, 40, 7)).is_some()
    })
    .await;

    a.handle
        .send_changes(vec![tile(41, 42, 7, 777), tile(40, 40, 7, 0)])
        .unwrap();
    b.pump_until("pushed change", |c| {
        let map = c.editor.map();
        map.tile(Position::new(41, 42, 7)).map(|t| t.ground) == Some(777)
            && map.tile(Position::new(40, 40, 7)).is_none()
    })
    .await;
}

#[tokio::test]
async fn chat_and_cursor_reach_other_clients() {
    let server = default_server().await;
    let mut a = ClientHarness::start(client_config(server.addr, "alice"));
    let mut b = ClientHarness::start(client_config(server.addr, "bob"));
    a.wait_active().await;
    b.wait_active().await;
    let alice_id = b.client_id_of("alice").await;

    a.handle.send_chat("hello there").unwrap();
    b.pump_until("chat", |c| {
        c.observer.logs.contains(&LogLine::Chat {
            speaker: "alice".into(),
            text: "hello there".into(),
        })
    })
    .await;

    let position = Position::new(120, 80, 7);
    a.handle
        .update_cursor(position, Color::rgb(200, 10, 10))
        .unwrap();
    b.pump_until("cursor", |c| {
        c.observer.refreshes.iter().any(|r| {
            matches!(r, RefreshCause::Cursor(cur)
                if cur.client_id == alice_id && cur.position == position)
        })
    })
    .await;
}

#[tokio::test]
async fn server_operation_shows_in_status_bar() {
    let server = default_server().await;
    let mut client = ClientHarness::start(client_config(server.addr, "alice"));
    client.wait_active().await;

    for cmd in [
        ServerCommand::StartOperation("Saving".into()),
        ServerCommand::UpdateOperation(50),
        ServerCommand::UpdateOperation(100),
    ] {
        server.commands.send(cmd).await.unwrap();
    }

    client
        .pump_until("operation finished", |c| c.observer.statuses.len() == 3)
        .await;
    assert_eq!(
        client.observer.statuses,
        vec![
            "Server Operation in Progress: Saving... (0%)",
            "Server Operation in Progress: Saving... (50%)",
            "Server Operation Finished.",
        ]
    );
    assert!(client.pump.operation().is_none());
}

#![allow(dead_code)]

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use mcvisor::{
    LaunchSpec, Launcher, Listen, PlayerEvent, QueryError, QueryFn, QueryPlayer, QueryRef,
    QueryResult, RconPacket, RetryPolicy, ServerStatus, ServerStatusInformation, ServerSupervisor,
    SupervisorConfig,
};
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::process::{Child, Command};

pub const PASSWORD: &str = "hunter2";
pub const STOP_FLAG: &str = "stop.flag";

/// Generous bound on anything a test awaits.
pub const PATIENCE: Duration = Duration::from_secs(10);

pub async fn within<F: Future>(fut: F) -> F::Output {
    tokio::time::timeout(PATIENCE, fut)
        .await
        .expect("test step timed out")
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Minimal RCON server. `stop` drops the flag file the fake server process waits on.
pub struct FakeRcon {
    pub port: u16,
    pub commands: Arc<Mutex<Vec<String>>>,
}

impl FakeRcon {
    pub async fn spawn(server_dir: PathBuf) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let commands = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&commands);

        tokio::spawn(async move {
            while let Ok((mut sock, _)) = listener.accept().await {
                let log = Arc::clone(&log);
                let dir = server_dir.clone();
                tokio::spawn(async move {
                    while let Ok(p) = RconPacket::read_from(&mut sock).await {
                        let reply = match p.packet_type {
                            RconPacket::AUTH if p.body == PASSWORD => {
                                RconPacket::new(p.request_id, RconPacket::AUTH_RESPONSE, "")
                            }
                            RconPacket::AUTH => RconPacket::new(-1, RconPacket::AUTH_RESPONSE, ""),
                            _ => {
                                log.lock().unwrap().push(p.body.clone());
                                let body = if p.body == "stop" {
                                    tokio::fs::write(dir.join(STOP_FLAG), b"").await.unwrap();
                                    "Stopping the server".to_string()
                                } else {
                                    format!("ran {}", p.body)
                                };
                                RconPacket::new(p.request_id, RconPacket::RESPONSE, body)
                            }
                        };
                        if reply.write_to(&mut sock).await.is_err() {
                            break;
                        }
                    }
                });
            }
        });

        Self { port, commands }
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }
}

/// Runs a shell script in place of the java command.
pub struct ShLauncher {
    script: String,
}

impl ShLauncher {
    pub fn arc(script: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            script: script.into(),
        })
    }

    /// Prints a few console lines, then idles until the stop flag appears.
    pub fn until_stopped() -> Arc<Self> {
        Self::arc(format!(
            "echo '[12:00:00] [Server thread/INFO]: Starting minecraft server'\n\
             echo '[12:00:01] [Server thread/INFO]: Bob joined the game'\n\
             echo '[12:00:02] [Server thread/INFO]: <Bob> hello'\n\
             while [ ! -f {STOP_FLAG} ]; do sleep 0.02; done\n\
             rm -f {STOP_FLAG}\n\
             echo '[12:00:03] [Server thread/INFO]: Stopping server'\n"
        ))
    }

    pub fn exiting_with(code: i32) -> Arc<Self> {
        Self::arc(format!("echo 'booting'\nsleep 0.1\nexit {code}\n"))
    }
}

impl Launcher for ShLauncher {
    fn launch(&self, spec: &LaunchSpec) -> io::Result<Child> {
        Command::new("sh")
            .arg("-c")
            .arg(&self.script)
            .current_dir(&spec.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
    }
}

/// Status query whose answer the test controls.
#[derive(Clone, Default)]
pub struct QueryControl {
    pub online: Arc<AtomicBool>,
    pub players: Arc<AtomicU32>,
}

impl QueryControl {
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    pub fn set_players(&self, n: u32) {
        self.players.store(n, Ordering::SeqCst);
    }

    pub fn query(&self) -> QueryRef {
        let ctl = self.clone();
        QueryFn::arc(move |_host: String| {
            let ctl = ctl.clone();
            async move {
                if !ctl.online.load(Ordering::SeqCst) {
                    return Err(QueryError::new("server offline"));
                }
                let n = ctl.players.load(Ordering::SeqCst);
                Ok(QueryResult {
                    numplayers: n,
                    maxplayers: 20,
                    players: (0..n)
                        .map(|i| QueryPlayer {
                            name: Some(format!("player{i}")),
                        })
                        .collect(),
                    version: "1.21.1".to_string(),
                })
            }
        })
    }
}

/// Server directory with a jar placeholder and RCON enabled.
pub struct Fixture {
    pub dir: TempDir,
    pub rcon: FakeRcon,
    pub ctl: QueryControl,
}

impl Fixture {
    pub async fn new() -> Self {
        init_tracing();
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "server.jar", "").await;
        let rcon = FakeRcon::spawn(dir.path().to_path_buf()).await;
        write(
            dir.path(),
            "server.properties",
            &format!(
                "enable-rcon=true\nrcon.port={}\nrcon.password={PASSWORD}\n",
                rcon.port
            ),
        )
        .await;
        Self {
            dir,
            rcon,
            ctl: QueryControl::default(),
        }
    }

    pub fn config(&self) -> SupervisorConfig {
        let mut cfg = SupervisorConfig::default();
        cfg.server_path = self.dir.path().to_path_buf();
        cfg.host = "127.0.0.1".to_string();
        cfg.status_interval = Duration::from_millis(20);
        cfg.rcon.retry = RetryPolicy::fixed(Duration::from_millis(20));
        cfg.rcon.stop_retry = RetryPolicy::fixed(Duration::from_millis(20)).with_max_attempts(20);
        cfg.rcon.response_timeout = Duration::from_secs(2);
        cfg
    }

    pub fn supervisor(&self, cfg: SupervisorConfig, launcher: Arc<dyn Launcher>) -> ServerSupervisor {
        ServerSupervisor::builder(cfg, self.ctl.query())
            .with_launcher(launcher)
            .build()
    }
}

pub async fn write(dir: &Path, name: &str, contents: &str) {
    tokio::fs::write(dir.join(name), contents).await.unwrap();
}

/// Polls until the supervisor reports `status`.
pub async fn wait_for(sup: &ServerSupervisor, status: ServerStatus) {
    within(async {
        while sup.status().status != status {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
}

/// Listener that records everything it is handed.
#[derive(Default)]
pub struct Recorder {
    pub statuses: Mutex<Vec<ServerStatus>>,
    pub chat: Mutex<Vec<String>>,
}

#[async_trait]
impl Listen for Recorder {
    async fn on_status(&self, info: &ServerStatusInformation) {
        self.statuses.lock().unwrap().push(info.status);
    }

    async fn on_chat(&self, event: &PlayerEvent) {
        self.chat.lock().unwrap().push(event.message.clone());
    }

    fn name(&self) -> &'static str {
        "recorder"
    }
}

/// Collapses consecutive duplicates (periodic `Up` refreshes).
pub fn distinct(statuses: &[ServerStatus]) -> Vec<ServerStatus> {
    let mut out: Vec<ServerStatus> = Vec::new();
    for s in statuses {
        if out.last() != Some(s) {
            out.push(*s);
        }
    }
    out
}

mod console;

use anyhow::Result;
use autosftp_core::{
    absolute_local, parse_port, watch, CredentialSource, EventSource, NoCredentials, PathFilter,
    Pattern, RemoteSession, SshAddress, StaticPassword, SyncConfig, SyncDispatcher, SyncError,
    WatchMode,
};
use autosftp_remote_sftp::SftpConnector;
use clap::Parser;
use console::ConsolePrompt;
use std::{fs, path::Path, path::PathBuf};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "autosftp",
    version,
    about = "autosftp – mirror a local directory onto a remote host over SFTP",
    override_usage = "autosftp [OPTIONS] /path/to/watch [user@]host[:port][:remote-directory]"
)]
struct Cli {
    /// Local directory to watch
    watch_root: Option<PathBuf>,

    /// Remote address: [user@]host[:port][:remote-directory]
    address: Option<String>,

    /// Remote SSH port
    #[arg(short = 'P', long, value_parser = parse_port_arg)]
    port: Option<u16>,

    /// Private key used instead of a password
    #[arg(short = 'i', value_name = "identity_file")]
    identity: Option<PathBuf>,

    /// Path to config file (YAML / JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Polling interval in milliseconds
    #[arg(long, value_name = "MS")]
    interval: Option<u64>,

    /// Use OS change notifications instead of polling
    #[arg(long)]
    native: bool,

    /// Only sync paths matching this glob (repeatable)
    #[arg(long, value_name = "GLOB")]
    include: Vec<String>,

    /// Never sync paths matching this glob (repeatable)
    #[arg(long, value_name = "GLOB")]
    exclude: Vec<String>,

    /// Password for headless use
    #[arg(long, env = "AUTOSFTP_PASSWORD", hide = true, hide_env_values = true)]
    password: Option<String>,

    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,
}

fn parse_port_arg(value: &str) -> std::result::Result<u16, String> {
    parse_port(value).map_err(|e| e.to_string())
}

fn load_config(path: &Path) -> autosftp_core::Result<SyncConfig> {
    let text = fs::read_to_string(path)
        .map_err(|e| SyncError::Config(format!("read config {} failed: {e}", path.display())))?;
    // Detect format by extension
    let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("");
    let parsed = match ext {
        "json" => serde_json::from_str(&text).map_err(|e| e.to_string()),
        _ => serde_yaml::from_str(&text).map_err(|e| e.to_string()), // default to yaml
    };
    parsed.map_err(|e| SyncError::Config(format!("{}: {e}", path.display())))
}

fn local_user() -> Option<String> {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .ok()
        .filter(|u| !u.is_empty())
}

/// Merges the config file (if any) with command-line values; the command
/// line wins.
fn resolve(cli: Cli) -> autosftp_core::Result<SyncConfig> {
    let mut cfg = match &cli.config {
        Some(path) => load_config(path)?,
        None => {
            let root = cli
                .watch_root
                .clone()
                .ok_or_else(|| SyncError::Config("Please provide a path to watch.".into()))?;
            if cli.address.is_none() {
                return Err(SyncError::Config("Please provide remote ssh information.".into()));
            }
            SyncConfig::new(root, String::new())
        }
    };

    if let Some(root) = cli.watch_root {
        cfg.local = root;
    }
    if let Some(address) = cli.address {
        let addr = SshAddress::parse(&address)?;
        debug!("remote address {addr}");
        cfg.host = addr.host;
        if addr.username.is_some() {
            cfg.user = addr.username;
        }
        if let Some(port) = addr.port {
            cfg.port = port;
        }
        if addr.default_directory.is_some() {
            cfg.remote = addr.default_directory;
        }
    }
    if let Some(port) = cli.port {
        cfg.port = port;
    }
    if cli.identity.is_some() {
        cfg.identity = cli.identity;
    }
    if let Some(ms) = cli.interval {
        cfg.scan_ms = ms;
    }
    if cli.native {
        cfg.watch = WatchMode::Native;
    }
    cfg.include.extend(cli.include.into_iter().map(Pattern));
    cfg.exclude.extend(cli.exclude.into_iter().map(Pattern));
    if cli.password.is_some() {
        cfg.password = cli.password;
    }
    if cfg.user.is_none() {
        cfg.user = local_user();
    }
    // Watcher and target must agree on the root, so it is fixed once here.
    cfg.local = absolute_local(&cfg.local)?;
    cfg.validate()?;
    Ok(cfg)
}

fn credential_source(cfg: &SyncConfig) -> Box<dyn CredentialSource> {
    match (&cfg.password, ConsolePrompt::detect()) {
        (Some(pw), _) => Box::new(StaticPassword::new(pw.clone())),
        (None, Some(console)) => Box::new(console),
        (None, None) => Box::new(NoCredentials),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("cannot listen for Ctrl+C: {e}");
        std::future::pending::<()>().await;
    }
}

async fn run(
    session: &mut RemoteSession<SftpConnector>,
    credentials: &mut dyn CredentialSource,
    cfg: &SyncConfig,
    filter: PathFilter,
    events: Box<dyn EventSource>,
) -> autosftp_core::Result<()> {
    session.connect(credentials).await?;
    let target = session.target(&cfg.local)?;
    let dispatcher = SyncDispatcher::new(session, target, filter);
    info!(
        "watching {} -> {}",
        dispatcher.target().local_root().display(),
        dispatcher.target().remote_root()
    );
    let stats = dispatcher.run(events, shutdown_signal()).await;
    info!(
        uploaded = stats.uploaded,
        removed = stats.removed,
        failed = stats.failed,
        "stopping"
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cfg = resolve(cli)?;
    let filter = PathFilter::new(&cfg.include, &cfg.exclude)?;
    // The watch root is checked before any connection is attempted.
    let events = watch(&cfg.local, cfg.watch, cfg.scan_interval()).await?;

    let user = cfg
        .user
        .clone()
        .ok_or_else(|| SyncError::Config("cannot determine remote user name".into()))?;
    let connector = SftpConnector::new(cfg.host.clone(), cfg.port, cfg.connect_timeout());
    let mut session = RemoteSession::new(connector, user, cfg.identity.clone(), cfg.remote.clone());
    let mut credentials = credential_source(&cfg);

    let res = run(&mut session, credentials.as_mut(), &cfg, filter, events).await;
    session.close().await;
    match &res {
        Err(e) if e.is_fatal() => error!("{e}"),
        Err(e) => warn!("stopped early: {e}"),
        Ok(()) => {}
    }
    info!("Bye~~~");
    res.map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("autosftp").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn positional_arguments_build_config() {
        let cfg = resolve(cli(&["/w", "bob@example.org:/inbox"])).unwrap();
        assert_eq!(cfg.local, PathBuf::from("/w"));
        assert_eq!(cfg.host, "example.org");
        assert_eq!(cfg.user.as_deref(), Some("bob"));
        assert_eq!(cfg.remote.as_deref(), Some("/inbox"));
        assert_eq!(cfg.port, 22);
        assert_eq!(cfg.watch, WatchMode::Poll);
        assert_eq!(cfg.scan_ms, 5000);
    }

    #[test]
    fn port_flag_overrides_address_port() {
        let cfg = resolve(cli(&["-P", "2222", "/w", "bob@h:2200:/x"])).unwrap();
        assert_eq!(cfg.port, 2222);
        let cfg = resolve(cli(&["/w", "bob@h:2200:/x"])).unwrap();
        assert_eq!(cfg.port, 2200);
    }

    #[test]
    fn malformed_port_flag_is_rejected() {
        let res = Cli::try_parse_from(["autosftp", "-P", "ssh", "/w", "bob@h"]);
        assert!(res.is_err());
    }

    #[test]
    fn malformed_address_is_config_error() {
        let err = resolve(cli(&["/w", "bob@"])).unwrap_err();
        assert!(matches!(err, SyncError::Config(_)));
    }

    #[test]
    fn missing_address_is_config_error() {
        let err = resolve(cli(&["/w"])).unwrap_err();
        assert!(matches!(err, SyncError::Config(_)));
    }

    #[test]
    fn config_file_with_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("autosftp.yaml");
        fs::write(
            &path,
            "local: /from/file\nhost: filehost\nuser: carol\nexclude: ['**/*.tmp']\nscan_ms: 1000\n",
        )
        .unwrap();
        let cfg = resolve(cli(&[
            "-c",
            path.to_str().unwrap(),
            "--native",
            "--exclude",
            "**/.git/**",
            "--interval",
            "250",
        ]))
        .unwrap();
        assert_eq!(cfg.local, PathBuf::from("/from/file"));
        assert_eq!(cfg.host, "filehost");
        assert_eq!(cfg.user.as_deref(), Some("carol"));
        assert_eq!(cfg.watch, WatchMode::Native);
        assert_eq!(cfg.scan_ms, 250);
        assert_eq!(
            cfg.exclude,
            vec![Pattern("**/*.tmp".into()), Pattern("**/.git/**".into())]
        );
    }

    #[test]
    fn json_config_is_detected_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("autosftp.json");
        fs::write(&path, r#"{"local": "/j", "host": "jhost", "user": "dan", "port": 2022}"#).unwrap();
        let cfg = resolve(cli(&["--config", path.to_str().unwrap()])).unwrap();
        assert_eq!(cfg.port, 2022);
        assert_eq!(cfg.host, "jhost");
    }

    #[test]
    fn unreadable_config_is_config_error() {
        let err = resolve(cli(&["-c", "/definitely/not/here.yaml"])).unwrap_err();
        assert!(matches!(err, SyncError::Config(_)));
    }

    #[tokio::test]
    async fn missing_watch_root_fails_before_connecting() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = resolve(cli(&[dir.path().join("absent").to_str().unwrap(), "bob@127.0.0.1:1"]))
            .unwrap();
        let err = watch(&cfg.local, cfg.watch, cfg.scan_interval()).await.err().unwrap();
        assert!(matches!(err, SyncError::WatchRootMissing(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn relative_watch_root_is_made_absolute() {
        let cfg = resolve(cli(&["site/./public", "bob@h:/srv"])).unwrap();
        assert!(cfg.local.is_absolute());
        assert_eq!(cfg.local, std::env::current_dir().unwrap().join("site/public"));
    }
}

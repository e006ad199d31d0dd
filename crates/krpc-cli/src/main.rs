//! # KRPC CLI Entry Point
//!
//! ## Usage
//!
//! ```bash
//! # Serve this host's process table on port 2049 with four workers
//! krpc serve -p 2049 -t 4
//!
//! # Serve three fixed demo tasks instead
//! krpc serve -p 2049 --demo
//!
//! # List the server's tasks
//! krpc tasks -H 127.0.0.1 -p 2049
//!
//! # Same, as JSON
//! krpc tasks -p 2049 --json | jq '.[].name'
//!
//! # Check the server answers
//! krpc ping -p 2049
//! ```

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use argh::FromArgs;
use krpc_client::{ClientConfig, ClientContext};
use krpc_common::tasks::{EXAMPLE_PROGRAM, INITIAL_VERSION};
use krpc_server::{example_program, ProcfsTasks, ServerConfig, Service, StaticTasks};

#[derive(FromArgs)]
/// KRPC - bounded ONC-style RPC task service
struct Cli {
    #[argh(subcommand)]
    command: Commands,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum Commands {
    Serve(ServeArgs),
    Tasks(TasksArgs),
    Ping(PingArgs),
}

/// Arguments for running the service.
///
/// # Example
///
/// ```bash
/// krpc serve -b 127.0.0.1 -p 2049 -t 2
/// ```
#[derive(FromArgs)]
#[argh(subcommand, name = "serve")]
/// serve the example task-listing program
struct ServeArgs {
    /// address to bind the listener to
    #[argh(option, short = 'b', default = "\"0.0.0.0\".into()")]
    bind: String,

    /// port to listen on
    ///
    /// Defaults to 0, which picks an ephemeral port. The bound port is
    /// logged at startup.
    #[argh(option, short = 'p', default = "0")]
    port: u16,

    /// number of worker threads serving requests
    #[argh(option, short = 't', default = "1")]
    threads: usize,

    /// serve a fixed list of three tasks instead of the host's processes
    #[argh(switch)]
    demo: bool,

    /// procfs mount to read processes from
    #[argh(option, default = "\"/proc\".into()")]
    proc_root: String,
}

#[derive(FromArgs)]
#[argh(subcommand, name = "tasks")]
/// list the tasks of a server
struct TasksArgs {
    /// server address
    #[argh(option, short = 'H', default = "\"127.0.0.1\".into()")]
    host: String,

    /// server port
    #[argh(option, short = 'p')]
    port: u16,

    /// program version to call
    #[argh(option, short = 'v', default = "INITIAL_VERSION")]
    version: u32,

    /// print a JSON array instead of report lines
    #[argh(switch)]
    json: bool,

    /// give up after this many milliseconds; waits forever if unset
    #[argh(option)]
    timeout_ms: Option<u64>,
}

#[derive(FromArgs)]
#[argh(subcommand, name = "ping")]
/// call the NULL procedure of a server
struct PingArgs {
    /// server address
    #[argh(option, short = 'H', default = "\"127.0.0.1\".into()")]
    host: String,

    /// server port
    #[argh(option, short = 'p')]
    port: u16,

    /// program version to call
    #[argh(option, short = 'v', default = "INITIAL_VERSION")]
    version: u32,

    /// give up after this many milliseconds; waits forever if unset
    #[argh(option)]
    timeout_ms: Option<u64>,
}

fn main() -> Result<()> {
    let cli: Cli = argh::from_env();

    // tasks/ping print results to stdout; keep it clean of log lines.
    if matches!(cli.command, Commands::Serve(_)) {
        let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    match cli.command {
        Commands::Serve(args) => run_serve(args),
        Commands::Tasks(args) => run_tasks(args),
        Commands::Ping(args) => run_ping(args),
    }
}

fn run_serve(args: ServeArgs) -> Result<()> {
    let bind: IpAddr = args
        .bind
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid bind address {}: {}", args.bind, e))?;
    let config = ServerConfig::new()
        .with_bind(bind)
        .with_port(args.port)
        .with_threads(args.threads);

    let program = if args.demo {
        tracing::info!("Serving demo tasks");
        example_program(StaticTasks::demo())?
    } else {
        tracing::info!("Serving tasks from {}", args.proc_root);
        example_program(ProcfsTasks::with_root(&args.proc_root))?
    };

    let service = Service::start(Arc::new(program), &config)?;
    service.wait_for_ctrl_c()?;
    tracing::info!("Shutting down");
    service.stop();

    Ok(())
}

fn client(host: &str, port: u16, version: u32, timeout_ms: Option<u64>) -> Result<ClientContext> {
    let host: IpAddr = host
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid server address {}: {}", host, e))?;
    let mut config = ClientConfig::new(port).with_host(host).with_version(version);
    if let Some(ms) = timeout_ms {
        config = config.with_timeout(Duration::from_millis(ms));
    }

    let mut ctx = ClientContext::new(EXAMPLE_PROGRAM, config);
    ctx.init()?;
    Ok(ctx)
}

fn run_tasks(args: TasksArgs) -> Result<()> {
    let mut ctx = client(&args.host, args.port, args.version, args.timeout_ms)?;
    let mut tasks = krpc_client::get_tasks(&ctx)?;

    if args.json {
        println!("{}", krpc_cli::output::tasks_to_json(&tasks)?);
    } else {
        for task in tasks.iter() {
            println!("{}", krpc_cli::output::format_task(task));
        }
    }

    krpc_client::release_tasks(&mut tasks);
    ctx.shutdown();
    Ok(())
}

fn run_ping(args: PingArgs) -> Result<()> {
    let mut ctx = client(&args.host, args.port, args.version, args.timeout_ms)?;
    krpc_client::null(&ctx)?;
    println!("ok");
    ctx.shutdown();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_serve_defaults() {
        let args: Cli = Cli::from_args(&["krpc"], &["serve"]).unwrap();
        match args.command {
            Commands::Serve(ServeArgs {
                bind,
                port,
                threads,
                demo,
                proc_root,
            }) => {
                assert_eq!(bind, "0.0.0.0");
                assert_eq!(port, 0);
                assert_eq!(threads, 1);
                assert!(!demo);
                assert_eq!(proc_root, "/proc");
            }
            _ => panic!("Expected Serve command"),
        }
    }

    #[test]
    fn test_cli_parse_serve_options() {
        let args: Cli = Cli::from_args(
            &["krpc"],
            &["serve", "-b", "127.0.0.1", "-p", "2049", "-t", "4", "--demo"],
        )
        .unwrap();
        match args.command {
            Commands::Serve(ServeArgs {
                bind,
                port,
                threads,
                demo,
                ..
            }) => {
                assert_eq!(bind, "127.0.0.1");
                assert_eq!(port, 2049);
                assert_eq!(threads, 4);
                assert!(demo);
            }
            _ => panic!("Expected Serve command"),
        }
    }

    #[test]
    fn test_cli_parse_tasks() {
        let args: Cli = Cli::from_args(
            &["krpc"],
            &["tasks", "-p", "2049", "--json", "--timeout-ms", "250"],
        )
        .unwrap();
        match args.command {
            Commands::Tasks(TasksArgs {
                host,
                port,
                version,
                json,
                timeout_ms,
            }) => {
                assert_eq!(host, "127.0.0.1");
                assert_eq!(port, 2049);
                assert_eq!(version, 1);
                assert!(json);
                assert_eq!(timeout_ms, Some(250));
            }
            _ => panic!("Expected Tasks command"),
        }
    }

    #[test]
    fn test_cli_tasks_requires_port() {
        assert!(Cli::from_args(&["krpc"], &["tasks"]).is_err());
    }

    #[test]
    fn test_cli_parse_ping() {
        let args: Cli =
            Cli::from_args(&["krpc"], &["ping", "-H", "10.0.0.1", "-p", "7", "-v", "2"]).unwrap();
        match args.command {
            Commands::Ping(PingArgs {
                host,
                port,
                version,
                timeout_ms,
            }) => {
                assert_eq!(host, "10.0.0.1");
                assert_eq!(port, 7);
                assert_eq!(version, 2);
                assert!(timeout_ms.is_none());
            }
            _ => panic!("Expected Ping command"),
        }
    }

    #[test]
    fn test_client_rejects_bad_host() {
        assert!(client("not-an-ip", 1, 1, None).is_err());
    }
}

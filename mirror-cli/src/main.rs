use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;
use mirror::anonymiser::Anonymiser;
use mirror::conn::ConnOpts;
use mirror::dumper;
use mirror::reader::{self, Reader};
use mirror_config::Spec;
use mirror_telemetry::init_tracing;
use tracing::{info, warn};

mod drivers;

/// Copies a database into another database or a SQL dump, anonymising
/// configured columns on the way.
#[derive(Debug, Parser)]
#[command(name = "mirror", version)]
struct MirrorOptions {
    /// Database DSN to mirror from
    #[arg(long, short = 'f')]
    from: String,

    /// Destination DSN; defaults to writing SQL to stdout
    #[arg(long, short = 't', default_value = "os://stdout")]
    to: String,

    /// Path to the dump specification file
    #[arg(long, short = 'c', default_value = "mirror.yaml")]
    config: PathBuf,

    /// Number of tables dumped concurrently; defaults to the number of CPUs
    #[arg(long)]
    concurrency: Option<usize>,

    /// Timeout for read operations
    #[arg(long, default_value = "5m", value_parser = parse_duration)]
    read_timeout: Duration,

    /// Timeout for write operations
    #[arg(long, default_value = "30s", value_parser = parse_duration)]
    write_timeout: Duration,

    /// Maximum amount of time a connection may be reused on the read database
    #[arg(long, default_value = "0s", value_parser = parse_duration)]
    read_conn_lifetime: Duration,

    /// Maximum number of open connections to the read database
    #[arg(long, default_value_t = 5)]
    read_max_conns: usize,

    /// Maximum number of idle connections to the read database
    #[arg(long, default_value_t = 0)]
    read_max_idle_conns: usize,

    /// Maximum amount of time a connection may be reused on the write database
    #[arg(long, default_value = "0s", value_parser = parse_duration)]
    write_conn_lifetime: Duration,

    /// Maximum number of open connections to the write database
    #[arg(long, default_value_t = 5)]
    write_max_conns: usize,

    /// Maximum number of idle connections to the write database
    #[arg(long, default_value_t = 0)]
    write_max_idle_conns: usize,

    /// Source database prefix, enables view mirroring when set
    #[arg(long, default_value = "")]
    src_db_prefix: String,

    /// Destination database prefix for rewritten view definitions
    #[arg(long, default_value = "")]
    dst_db_prefix: String,
}

impl MirrorOptions {
    fn read_conn_opts(&self) -> ConnOpts {
        ConnOpts {
            dsn: self.from.clone(),
            timeout: self.read_timeout,
            max_conn_lifetime: self.read_conn_lifetime,
            max_conns: self.read_max_conns,
            max_idle_conns: self.read_max_idle_conns,
        }
    }

    fn write_conn_opts(&self) -> ConnOpts {
        ConnOpts {
            dsn: self.to.clone(),
            timeout: self.write_timeout,
            max_conn_lifetime: self.write_conn_lifetime,
            max_conns: self.write_max_conns,
            max_idle_conns: self.write_max_idle_conns,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let options = MirrorOptions::parse();

    init_tracing(env!("CARGO_BIN_NAME"))?;
    drivers::register_all();

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(run(options))
}

async fn run(options: MirrorOptions) -> anyhow::Result<()> {
    let spec = load_spec(&options)?;

    let source = reader::connect(&options.read_conn_opts()).await?;
    let anonymised: Arc<dyn Reader> =
        Arc::new(Anonymiser::new(Arc::clone(&source), spec.tables.clone()));
    let engine = dumper::connect(&options.write_conn_opts(), anonymised).await?;

    let concurrency = options.concurrency.unwrap_or_else(|| {
        std::thread::available_parallelism()
            .map(std::num::NonZeroUsize::get)
            .unwrap_or(4)
    });

    info!(from = %options.from, to = %options.to, concurrency, "mirroring...");
    let started = Instant::now();

    engine.dump(&spec, concurrency).await?;

    if !options.src_db_prefix.is_empty() {
        engine
            .dump_views(&spec, &options.src_db_prefix, &options.dst_db_prefix)
            .await?;
    }

    engine.close().await?;
    source.close().await?;

    info!(total_time = ?started.elapsed(), "done");

    Ok(())
}

fn load_spec(options: &MirrorOptions) -> anyhow::Result<Spec> {
    if options.config.exists() {
        Ok(mirror_config::load_spec(&options.config)?)
    } else {
        warn!(
            config = %options.config.display(),
            "specification file not found, dumping everything untransformed"
        );
        Ok(Spec::default())
    }
}

/// Parses durations of the form `300ms`, `30s`, `5m` or `1h`. A bare number
/// is taken as seconds.
fn parse_duration(input: &str) -> Result<Duration, String> {
    let input = input.trim();

    let (number, unit) = match input.find(|ch: char| !ch.is_ascii_digit()) {
        Some(position) => input.split_at(position),
        None => (input, "s"),
    };

    let value: u64 = number
        .parse()
        .map_err(|_| format!("invalid duration '{input}'"))?;

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        "m" => Ok(Duration::from_secs(value * 60)),
        "h" => Ok(Duration::from_secs(value * 3600)),
        other => Err(format!("unknown duration unit '{other}'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("300ms").unwrap(), Duration::from_millis(300));
        assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_duration("45").unwrap(), Duration::from_secs(45));
        assert_eq!(parse_duration("0s").unwrap(), Duration::ZERO);
    }

    #[test]
    fn test_parse_duration_rejects_garbage() {
        assert!(parse_duration("fast").is_err());
        assert!(parse_duration("5d").is_err());
        assert!(parse_duration("").is_err());
    }

    #[test]
    fn test_cli_parses_minimal_invocation() {
        let options =
            MirrorOptions::parse_from(["mirror", "--from", "mysql://root@localhost/app"]);
        assert_eq!(options.to, "os://stdout");
        assert_eq!(options.read_timeout, Duration::from_secs(300));
        assert_eq!(options.write_timeout, Duration::from_secs(30));
        assert_eq!(options.read_max_conns, 5);
        assert!(options.src_db_prefix.is_empty());
    }
}

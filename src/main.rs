use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use daemonize::Daemonize;
use fuser::{Config as FuseConfig, MountOption, SessionACL};
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use trailfs::api::Backend;
use trailfs::api::http::HttpBackend;
use trailfs::blobcache::BlobCache;
use trailfs::config::{self, Config};
use trailfs::db::Cache;
use trailfs::fs::invalidate::Invalidator;
use trailfs::fs::{Engine, TrailFs};
use trailfs::refresh::Refresher;
use trailfs::repo::Repository;

#[derive(Parser, Debug)]
#[command(name = "trailfs", version, about = "Mount your issue tracker as a filesystem")]
struct Args {
    /// Mount point; falls back to `mount_path` from the config file.
    mountpoint: Option<PathBuf>,

    /// Config file path (default: the platform config directory).
    #[arg(long)]
    config: Option<PathBuf>,

    /// API key; overrides the config file.
    #[arg(long)]
    api_key: Option<String>,

    /// Stay in the foreground instead of daemonizing.
    #[arg(short, long)]
    foreground: bool,

    /// Debug-level logging for this crate.
    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing(config: &Config, verbose: bool) -> anyhow::Result<()> {
    let default_filter =
        if verbose { "trailfs=debug".to_string() } else { config.log_level.clone() };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));

    match &config.log_file {
        Some(path) => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("cannot open log file {}", path.display()))?;
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(Arc::new(file)),
                )
                .init();
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = config::load_config(args.config.as_deref());
    init_tracing(&config, args.verbose)?;

    let mountpoint = args
        .mountpoint
        .clone()
        .or_else(|| config.mount_path.clone())
        .context("no mount point: pass one or set `mount_path` in the config")?;
    let mountpoint = mountpoint
        .canonicalize()
        .with_context(|| format!("mount point {} does not exist", mountpoint.display()))?;

    let api_key = args
        .api_key
        .clone()
        .filter(|k| !k.is_empty())
        .or_else(|| (!config.api_key.is_empty()).then(|| config.api_key.clone()))
        .context("no API key: pass --api-key or set `api_key` in the config")?;

    // Fork before the runtime exists; tokio worker threads do not
    // survive a fork.
    if !args.foreground {
        Daemonize::new()
            .working_directory(std::env::current_dir()?)
            .start()
            .context("daemonize failed")?;
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("tokio runtime")?;

    let db_path = config::default_db_path().context("no data directory for the cache")?;
    let cache = Arc::new(Cache::open(&db_path)?);
    let backend = Arc::new(HttpBackend::new(api_key, config.api_stats));
    let repo = Arc::new(Repository::new(
        cache,
        backend.clone() as Arc<dyn Backend>,
        runtime.handle().clone(),
        Duration::from_secs(config.cache_ttl_seconds),
    ));

    let blob_dir = config::default_blob_dir().context("no cache directory for attachments")?;
    let eng = Arc::new(Engine {
        repo: repo.clone(),
        blobs: BlobCache::new(blob_dir, config.cache_max_entries),
        invalidator: Invalidator::new(),
        uid: unsafe { libc::getuid() },
        gid: unsafe { libc::getgid() },
        initiatives: config.initiatives,
    });

    let refresher = Refresher::spawn(
        runtime.handle(),
        repo.clone(),
        Duration::from_secs(config.cache_ttl_seconds.max(30)),
    );

    let mount_options = vec![MountOption::FSName("trailfs".to_string()), MountOption::AutoUnmount];
    let acl = if config.allow_other {
        SessionACL::All
    } else {
        SessionACL::Owner
    };
    let mut options = FuseConfig::default();
    options.mount_options = mount_options;
    options.acl = acl;

    let filesystem = TrailFs::new(eng.clone());
    let session = fuser::Session::new(filesystem, &mountpoint, &options)
        .with_context(|| format!("cannot mount at {}", mountpoint.display()))?;
    let background = session
        .spawn()
        .with_context(|| format!("cannot mount at {}", mountpoint.display()))?;
    eng.invalidator.attach(background.notifier());

    info!(mountpoint = %mountpoint.display(), "mounted");
    let run_result = background.join();

    // Unmount teardown order: in-flight buffers died with the session,
    // then the refresher, then the cache and client with the runtime.
    refresher.stop();
    if config.api_stats {
        for (op, count) in backend.stats() {
            info!(op, count, "api requests");
        }
    }
    drop(runtime);

    run_result.context("session ended with an error")?;
    info!("unmounted");
    Ok(())
}

use crate::cert::{Certificate, CertificateSummary, RecordColumn};
use crate::cli::args::*;
use crate::client::KeyClient;
use crate::config::{ClientConfig, ServerConfig};
use crate::rpc::{HttpKeyTransport, KeyService, KeySource};
use crate::storage::CertificateStore;
use crate::utils::errors::{KeyServerError, Result};
use crate::utils::output::{build_header, build_table_data, OutputFormat};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Timeout for one-shot listing requests
const LIST_TIMEOUT: Duration = Duration::from_secs(30);

pub async fn handle_command(cli: Cli) -> Result<()> {
    // Initialize logging - always to stderr
    if !cli.quiet {
        let log_level = match cli.verbose {
            0 => "x509_keyserver=warn",  // Default: warnings only
            1 => "x509_keyserver=info",  // -v: info level
            2 => "x509_keyserver=debug", // -vv: debug level
            _ => "x509_keyserver=trace", // -vvv+: trace level
        };

        tracing_subscriber::fmt()
            .with_writer(io::stderr)
            .with_env_filter(log_level)
            .init();
    }

    match cli.command {
        Commands::Serve {
            config,
            bind,
            certificates,
        } => handle_serve_command(config.as_deref(), bind, certificates).await,
        Commands::Fetch {
            server,
            ids,
            max_cache_records,
            fetch_interval_ms,
            cache_prune_interval_ms,
            timeout_ms,
        } => {
            let config = ClientConfig {
                server,
                max_cache_size: max_cache_records,
                timeout: Duration::from_millis(timeout_ms),
                prune_interval: Duration::from_millis(cache_prune_interval_ms),
            };
            handle_fetch_command(config, &ids, Duration::from_millis(fetch_interval_ms)).await
        }
        Commands::List {
            server,
            start_index,
            count,
            columns,
            raw,
        } => {
            let output = OutputFormat::new(raw);
            handle_list_command(&server, start_index, count, columns.as_deref(), &output).await
        }
    }
}

async fn handle_serve_command(
    config_path: Option<&Path>,
    bind: Option<std::net::SocketAddr>,
    certificates: Vec<PathBuf>,
) -> Result<()> {
    let mut config = match config_path {
        Some(path) => ServerConfig::from_yaml_file(path)?,
        None => ServerConfig::default(),
    };
    if let Some(bind) = bind {
        config.bind = bind;
    }
    config.certificates.extend(certificates);

    let store = Arc::new(CertificateStore::in_memory());
    let loaded = load_certificates(&store, &config.certificates).await?;
    tracing::info!("Loaded {} certificate(s)", loaded);

    crate::rpc::serve(&config, KeyService::new(store)).await
}

/// Add every certificate file to the store, stopping at the first failure
pub async fn load_certificates(store: &CertificateStore, paths: &[PathBuf]) -> Result<usize> {
    for path in paths {
        let data = tokio::fs::read(path).await.map_err(|e| {
            KeyServerError::Config(format!("Unable to open {}: {e}", path.display()))
        })?;
        let cert = Certificate::from_pem_or_der(&data).map_err(|e| {
            KeyServerError::Parse(format!("{}: {e}", path.display()))
        })?;

        store.add_certificate(&cert).await?;
        tracing::debug!("Added certificate {} from {}", cert, path.display());
    }
    Ok(paths.len())
}

async fn handle_fetch_command(config: ClientConfig, ids: &str, pause: Duration) -> Result<()> {
    let server = config.server.clone();
    let client = KeyClient::connect(config).map_err(|e| match e {
        KeyServerError::Config(why) => {
            KeyServerError::Config(format!("Unable to connect to {server}: {why}"))
        }
        other => other,
    })?;

    for index in parse_index_list(ids) {
        let size_before = client.cache_len();
        match client.retrieve_certificate_by_index(index).await {
            Ok(cert) => println!("{cert}"),
            Err(e) => eprintln!("Error retrieving certificate {index}: {e}"),
        }

        let stats = client.stats();
        tracing::info!("Cache size: {} -> {}", size_before, stats.size);
        tracing::info!("Cache stats: hits: {}, misses: {}", stats.hits, stats.misses);

        if !pause.is_zero() {
            tokio::time::sleep(pause).await;
        }
    }

    client.shutdown().await;
    Ok(())
}

/// Parse comma-separated indices, skipping anything that is not a number
fn parse_index_list(ids: &str) -> Vec<u64> {
    ids.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .filter_map(|id| match id.parse::<u64>() {
            Ok(index) => Some(index),
            Err(_) => {
                tracing::warn!("Unable to parse {} as a number, skipping", id);
                None
            }
        })
        .collect()
}

async fn handle_list_command(
    server: &Url,
    start_index: u64,
    count: i32,
    columns: Option<&str>,
    output: &OutputFormat,
) -> Result<()> {
    let columns = parse_columns(columns)?;

    let transport = HttpKeyTransport::new(server, LIST_TIMEOUT)?;
    let list = transport.list_certificates(start_index, count).await?;
    let records: Vec<CertificateSummary> = list
        .records
        .iter()
        .map(CertificateSummary::try_from)
        .collect::<Result<_>>()?;

    if records.is_empty() {
        return Ok(());
    }

    let mut table = Vec::with_capacity(records.len() + 1);
    if !output.raw {
        table.push(build_header(&columns));
    }
    table.extend(build_table_data(&records, &columns));
    output.print_table(&table);
    Ok(())
}

/// Parse a column selection; a leading `+` appends to the default columns
fn parse_columns(spec: Option<&str>) -> Result<Vec<RecordColumn>> {
    let Some(spec) = spec else {
        return Ok(RecordColumn::defaults());
    };

    let (mut columns, rest) = match spec.strip_prefix('+') {
        Some(rest) => (RecordColumn::defaults(), rest),
        None => (Vec::new(), spec),
    };

    for name in rest.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        columns.push(
            name.parse::<RecordColumn>()
                .map_err(KeyServerError::InvalidRequest)?,
        );
    }
    Ok(columns)
}

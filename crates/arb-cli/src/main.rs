use std::collections::HashSet;
use std::path::PathBuf;

use alloy::primitives::{Address, B256};
use arb_analysis::bundle::bundle_swaps;
use arb_analysis::cycle::{classify, ClassifierConfig, ConservationMode, CycleReport};
use arb_analysis::normalize::{normalize_events, NormalizerConfig};
use arb_analysis::summary::summarize_addresses;
use arb_analysis::traces::{filter_interesting_calls, flatten_call_tree, ExclusionSet};
use arb_data::config::ScanConfig;
use arb_data::logs::{filter_by_block_range, read_v2_swap_logs, read_v3_swap_logs};
use arb_data::registry::{write_pools_parquet, write_tokens_parquet, PoolRecord, TokenRecord};
use arb_data::rpc::MetadataFetcher;
use arb_data::store::{ArbTxRow, Store, TraceRow};
use arb_data::types::RawSwapEvent;
use arb_data::Registry;
use clap::{ArgAction, Args, Parser, Subcommand};
use color_eyre::eyre::{eyre, Context, Result};
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

/// Concurrent in-flight RPC requests during harvesting.
const RPC_CONCURRENCY: usize = 8;

#[derive(Debug, Clone)]
struct AppContext {
    db_path: String,
    config: ScanConfig,
}

#[derive(Parser, Debug)]
#[command(name = "arb-scan")]
#[command(about = "Classifies decoded AMM swap activity into atomic-arbitrage transactions")]
#[command(version)]
struct Cli {
    #[arg(long, short = 'v', action = ArgAction::Count, global = true)]
    verbose: u8,

    #[arg(long, short = 'q', global = true)]
    quiet: bool,

    #[arg(long, global = true, default_value = "data/arb.sqlite")]
    db_path: String,

    /// Chain configuration JSON file.
    #[arg(long, global = true, default_value = "config.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Resolve pool/token metadata over RPC into per-chain parquet files.
    Harvest(HarvestArgs),
    /// Normalize, bundle and classify swap logs; store detected cycles.
    Classify(ClassifyArgs),
    /// Aggregate stored cycles into per-sender address summaries.
    Summarize(SummarizeArgs),
    /// Fetch and filter call traces of stored arbitrage transactions.
    Traces(TracesArgs),
    /// Show store statistics.
    Status(StatusArgs),
}

#[derive(Args, Debug)]
struct HarvestArgs {
    /// Chain name from the config file.
    #[arg(long)]
    chain: String,

    /// V2 swap-log parquet files.
    #[arg(long = "v2-logs")]
    v2_logs: Vec<PathBuf>,

    /// V3 swap-log parquet files.
    #[arg(long = "v3-logs")]
    v3_logs: Vec<PathBuf>,

    /// Directory for the metadata parquet output.
    #[arg(long, default_value = "data")]
    out_dir: PathBuf,
}

#[derive(Args, Debug)]
struct ClassifyArgs {
    /// Chain name from the config file.
    #[arg(long)]
    chain: String,

    /// V2 swap-log parquet files.
    #[arg(long = "v2-logs")]
    v2_logs: Vec<PathBuf>,

    /// V3 swap-log parquet files.
    #[arg(long = "v3-logs")]
    v3_logs: Vec<PathBuf>,

    /// Pools metadata parquet file.
    #[arg(long)]
    pools: PathBuf,

    /// Tokens metadata parquet file.
    #[arg(long)]
    tokens: PathBuf,

    /// Number of block-range chunks; finished chunks are skipped on rerun.
    #[arg(long, default_value_t = 50)]
    chunks: u64,

    /// Reproduce the bit-exact zero comparison in the conservation test.
    #[arg(long)]
    exact_conservation: bool,

    /// Fixed decimal shift for the V3 spot price instead of deriving it
    /// from each pool's token decimals.
    #[arg(long)]
    spot_price_shift: Option<i32>,

    /// Output format: table (default) or json.
    #[arg(long, default_value = "table")]
    output: String,
}

#[derive(Args, Debug)]
struct SummarizeArgs {
    /// Chain name from the config file.
    #[arg(long)]
    chain: String,

    /// Also fetch each address's deployed bytecode length over RPC.
    #[arg(long)]
    fetch_bytecode: bool,

    /// Output format: table (default) or json.
    #[arg(long, default_value = "table")]
    output: String,
}

#[derive(Args, Debug)]
struct TracesArgs {
    /// Chain name from the config file.
    #[arg(long)]
    chain: String,

    /// Pools metadata parquet file (exclusion baseline).
    #[arg(long)]
    pools: PathBuf,

    /// Tokens metadata parquet file (exclusion baseline).
    #[arg(long)]
    tokens: PathBuf,

    /// Extra addresses to exclude, 0x-prefixed hex.
    #[arg(long = "exclude")]
    exclude: Vec<String>,
}

#[derive(Args, Debug)]
struct StatusArgs {
    /// Chain name from the config file.
    #[arg(long)]
    chain: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet)?;

    let ctx = AppContext {
        db_path: cli.db_path,
        config: ScanConfig::load(&cli.config)?,
    };

    match cli.command {
        Commands::Harvest(args) => handle_harvest(&ctx, args).await,
        Commands::Classify(args) => handle_classify(&ctx, args).await,
        Commands::Summarize(args) => handle_summarize(&ctx, args).await,
        Commands::Traces(args) => handle_traces(&ctx, args).await,
        Commands::Status(args) => handle_status(&ctx, args).await,
    }
}

fn init_tracing(verbose: u8, quiet: bool) -> Result<()> {
    let level = if quiet {
        Level::WARN
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level.as_str()))
        .wrap_err("failed to initialize tracing filter")?;

    tracing_subscriber::fmt().with_env_filter(filter).init();
    Ok(())
}

/// Collect the distinct pool addresses a set of swap-log files touches.
fn collect_pool_addresses(
    v2_logs: &[PathBuf],
    v3_logs: &[PathBuf],
) -> Result<(HashSet<Address>, HashSet<Address>)> {
    let mut v2_addresses = HashSet::new();
    for path in v2_logs {
        for event in read_v2_swap_logs(path)? {
            v2_addresses.insert(event.pool_address);
        }
    }
    let mut v3_addresses = HashSet::new();
    for path in v3_logs {
        for event in read_v3_swap_logs(path)? {
            v3_addresses.insert(event.pool_address);
        }
    }
    Ok((v2_addresses, v3_addresses))
}

async fn handle_harvest(ctx: &AppContext, args: HarvestArgs) -> Result<()> {
    if args.v2_logs.is_empty() && args.v3_logs.is_empty() {
        return Err(eyre!("at least one --v2-logs or --v3-logs path is required"));
    }

    let chain = ctx.config.chain(&args.chain)?;
    let pools_path = args.out_dir.join(format!("{}_pools.parquet", chain.name));
    let tokens_path = args.out_dir.join(format!("{}_tokens.parquet", chain.name));
    if pools_path.exists() && tokens_path.exists() {
        info!(
            pools = %pools_path.display(),
            tokens = %tokens_path.display(),
            "metadata files already exist, skipping harvest"
        );
        return Ok(());
    }
    std::fs::create_dir_all(&args.out_dir)
        .wrap_err_with(|| format!("failed to create output dir {}", args.out_dir.display()))?;

    let (v2_addresses, v3_addresses) = collect_pool_addresses(&args.v2_logs, &args.v3_logs)?;
    info!(
        v2_pools = v2_addresses.len(),
        v3_pools = v3_addresses.len(),
        "collected pool addresses from swap logs"
    );

    let fetcher = MetadataFetcher::new(&chain.rpc_url());

    let pool_jobs: Vec<(Address, bool)> = v2_addresses
        .iter()
        .map(|address| (*address, false))
        .chain(v3_addresses.iter().map(|address| (*address, true)))
        .collect();

    let pb = progress_bar(pool_jobs.len() as u64, "resolving pools")?;
    let pool_records: Vec<PoolRecord> = futures::stream::iter(pool_jobs)
        .map(|(address, is_v3)| {
            let fetcher = &fetcher;
            let pb = &pb;
            async move {
                let result = fetcher.fetch_pool(address, is_v3).await;
                pb.inc(1);
                match result {
                    Ok(record) => Some(record),
                    Err(error) => {
                        tracing::warn!(pool = %address, %error, "failed to resolve pool");
                        None
                    }
                }
            }
        })
        .buffer_unordered(RPC_CONCURRENCY)
        .collect::<Vec<_>>()
        .await
        .into_iter()
        .flatten()
        .collect();
    pb.finish_and_clear();

    let token_addresses: HashSet<Address> = pool_records
        .iter()
        .flat_map(|record| [record.token0, record.token1])
        .collect();

    let pb = progress_bar(token_addresses.len() as u64, "resolving tokens")?;
    let token_records: Vec<TokenRecord> = futures::stream::iter(token_addresses)
        .map(|address| {
            let fetcher = &fetcher;
            let pb = &pb;
            async move {
                let result = fetcher.fetch_token(address).await;
                pb.inc(1);
                match result {
                    Ok(record) => Some(record),
                    Err(error) => {
                        tracing::warn!(token = %address, %error, "failed to resolve token");
                        None
                    }
                }
            }
        })
        .buffer_unordered(RPC_CONCURRENCY)
        .collect::<Vec<_>>()
        .await
        .into_iter()
        .flatten()
        .collect();
    pb.finish_and_clear();

    write_pools_parquet(&pools_path, &pool_records)?;
    write_tokens_parquet(&tokens_path, &token_records)?;

    info!(
        pools = pool_records.len(),
        tokens = token_records.len(),
        pools_file = %pools_path.display(),
        tokens_file = %tokens_path.display(),
        "harvest command completed"
    );
    Ok(())
}

async fn handle_classify(ctx: &AppContext, args: ClassifyArgs) -> Result<()> {
    if args.v2_logs.is_empty() && args.v3_logs.is_empty() {
        return Err(eyre!("at least one --v2-logs or --v3-logs path is required"));
    }
    if args.chunks == 0 {
        return Err(eyre!("--chunks must be at least 1"));
    }

    let chain = ctx.config.chain(&args.chain)?;
    if chain.start_block > chain.end_block {
        return Err(eyre!(
            "invalid range for chain '{}': start_block {} is greater than end_block {}",
            chain.name,
            chain.start_block,
            chain.end_block
        ));
    }
    let registry = Registry::from_parquet(&args.pools, &args.tokens)?;
    let store = Store::new(&ctx.db_path).wrap_err("failed to open SQLite store")?;

    let mut events: Vec<RawSwapEvent> = Vec::new();
    for path in &args.v2_logs {
        events.extend(read_v2_swap_logs(path)?);
    }
    for path in &args.v3_logs {
        events.extend(read_v3_swap_logs(path)?);
    }

    let normalizer_config = NormalizerConfig {
        spot_price_shift: args.spot_price_shift,
    };
    let classifier_config = ClassifierConfig {
        conservation: if args.exact_conservation {
            ConservationMode::Exact
        } else {
            ConservationMode::default()
        },
    };

    let chunk_size = ((chain.end_block - chain.start_block) / args.chunks).max(1);
    let total_chunks = (chain.end_block - chain.start_block) / chunk_size + 1;
    let mut reports: Vec<CycleReport> = Vec::new();
    let mut chunks_done = 0u64;
    let mut chunks_skipped = 0u64;
    let mut bundles_seen = 0usize;

    let pb = progress_bar(total_chunks, "classifying chunks")?;
    let mut current = chain.start_block;
    while current <= chain.end_block {
        let chunk_end = (current + chunk_size - 1).min(chain.end_block);
        if store.is_chunk_processed(chain.chain_id, current, chunk_end)? {
            tracing::debug!(start = current, end = chunk_end, "chunk already classified, skipping");
            chunks_skipped += 1;
            current = chunk_end + 1;
            pb.inc(1);
            continue;
        }

        let chunk_events = filter_by_block_range(events.clone(), current, chunk_end);
        let swaps = normalize_events(&chunk_events, &registry, &normalizer_config);
        let bundles = bundle_swaps(swaps);
        bundles_seen += bundles.len();

        let mut rows: Vec<ArbTxRow> = Vec::new();
        for bundle in &bundles {
            if let Some(report) = classify(bundle, &classifier_config) {
                rows.push(report_to_row(&report));
                reports.push(report);
            }
        }

        store.insert_arb_rows(&rows)?;
        store.mark_chunk_processed(chain.chain_id, current, chunk_end)?;
        chunks_done += 1;
        current = chunk_end + 1;
        pb.inc(1);
    }
    pb.finish_and_clear();

    print_reports(&reports, &args.output)?;

    let mut summary = Table::new();
    summary.load_preset(UTF8_BORDERS_ONLY);
    summary.set_header(vec!["Metric", "Value"]);
    summary.add_row(vec!["Swap events", &format!("{}", events.len())]);
    summary.add_row(vec!["Transactions bundled", &format!("{bundles_seen}")]);
    summary.add_row(vec!["Chunks classified", &format!("{chunks_done}")]);
    summary.add_row(vec!["Chunks skipped (resume)", &format!("{chunks_skipped}")]);
    summary.add_row(vec!["Arbitrage detected", &format!("{}", reports.len())]);
    println!("\n{summary}\n");

    info!(
        chain = %chain.name,
        events = events.len(),
        bundles = bundles_seen,
        arbs = reports.len(),
        chunks_done,
        chunks_skipped,
        "classify command completed"
    );
    Ok(())
}

fn report_to_row(report: &CycleReport) -> ArbTxRow {
    ArbTxRow {
        tx_hash: format!("{:#x}", report.transaction_hash),
        chain_id: report.chain_id,
        block_number: report.block_number,
        tx_index: report.transaction_index,
        profit_token: report.profit_token.symbol.clone(),
        profit_token_address: format!("{:#x}", report.profit_token.address),
        profit_amount: report.profit_amount,
        path: report.path.clone(),
        senders: report
            .senders
            .iter()
            .map(|address| format!("{address:#x}"))
            .collect(),
    }
}

fn print_reports(reports: &[CycleReport], output: &str) -> Result<()> {
    match output.to_lowercase().as_str() {
        "json" => {
            #[derive(serde::Serialize)]
            struct JsonReport {
                transaction_hash: String,
                block_number: u64,
                transaction_index: u64,
                profit_token: String,
                profit_amount: f64,
                path: String,
                senders: Vec<String>,
            }

            let rows: Vec<JsonReport> = reports
                .iter()
                .map(|report| JsonReport {
                    transaction_hash: format!("{:#x}", report.transaction_hash),
                    block_number: report.block_number,
                    transaction_index: report.transaction_index,
                    profit_token: report.profit_token.symbol.clone(),
                    profit_amount: report.profit_amount,
                    path: report.path.clone(),
                    senders: report
                        .senders
                        .iter()
                        .map(|address| format!("{address:#x}"))
                        .collect(),
                })
                .collect();
            let json = serde_json::to_string_pretty(&rows).wrap_err("failed to serialize JSON")?;
            println!("{json}");
        }
        "table" => {
            let mut table = Table::new();
            table.load_preset(UTF8_BORDERS_ONLY);
            table.set_header(vec![
                "Block",
                "Tx Hash",
                "Profit Token",
                "Profit Amount",
                "Path",
                "Senders",
            ]);
            for report in reports {
                table.add_row(vec![
                    &format!("{}", report.block_number),
                    &truncate_hash(&format!("{:#x}", report.transaction_hash)),
                    &report.profit_token.symbol,
                    &format!("{:.6}", report.profit_amount),
                    &report.path,
                    &format!("{}", report.senders.len()),
                ]);
            }
            println!("\n{table}");
        }
        other => return Err(eyre!("unknown output format '{}'; use 'table' or 'json'", other)),
    }
    Ok(())
}

async fn handle_summarize(ctx: &AppContext, args: SummarizeArgs) -> Result<()> {
    let chain = ctx.config.chain(&args.chain)?;
    let store = Store::new(&ctx.db_path).wrap_err("failed to open SQLite store")?;

    let rows = store.get_arb_rows(chain.chain_id)?;
    if rows.is_empty() {
        return Err(eyre!(
            "no classified transactions stored for chain '{}'; run classify first",
            chain.name
        ));
    }

    let mut summaries = summarize_addresses(chain.chain_id, &rows);

    if args.fetch_bytecode {
        let fetcher = MetadataFetcher::new(&chain.rpc_url());
        let pb = progress_bar(summaries.len() as u64, "fetching bytecode")?;
        for summary in &mut summaries {
            let address = summary
                .address
                .parse::<Address>()
                .wrap_err_with(|| format!("stored sender '{}' is not an address", summary.address))?;
            match fetcher.code_len(address).await {
                Ok(len) => summary.bytecode_len = Some(len as u64),
                Err(error) => {
                    tracing::warn!(address = %summary.address, %error, "failed to fetch bytecode");
                }
            }
            pb.inc(1);
        }
        pb.finish_and_clear();
        // Largest contracts first, mirroring the bytecode-driven ranking
        // of the summary report.
        summaries.sort_by(|a, b| b.bytecode_len.cmp(&a.bytecode_len));
    }

    store.insert_address_summaries(&summaries)?;

    match args.output.to_lowercase().as_str() {
        "json" => {
            #[derive(serde::Serialize)]
            struct JsonSummary<'a> {
                address: &'a str,
                arb_count: u64,
                main_profit_token: &'a str,
                main_profit_count: u64,
                bytecode_len: Option<u64>,
            }
            let rows: Vec<JsonSummary> = summaries
                .iter()
                .map(|s| JsonSummary {
                    address: &s.address,
                    arb_count: s.arb_count,
                    main_profit_token: &s.main_profit_token,
                    main_profit_count: s.main_profit_count,
                    bytecode_len: s.bytecode_len,
                })
                .collect();
            println!(
                "{}",
                serde_json::to_string_pretty(&rows).wrap_err("failed to serialize JSON")?
            );
        }
        "table" => {
            let mut table = Table::new();
            table.load_preset(UTF8_BORDERS_ONLY);
            table.set_header(vec![
                "Address",
                "Arb Txs",
                "Main Profit Token",
                "Main Count",
                "Bytecode Bytes",
            ]);
            for summary in &summaries {
                table.add_row(vec![
                    &truncate_hash(&summary.address),
                    &format!("{}", summary.arb_count),
                    &summary.main_profit_token,
                    &format!("{}", summary.main_profit_count),
                    &summary
                        .bytecode_len
                        .map(|len| len.to_string())
                        .unwrap_or_else(|| "-".to_string()),
                ]);
            }
            println!("\n{table}\n");
        }
        other => return Err(eyre!("unknown output format '{}'; use 'table' or 'json'", other)),
    }

    info!(
        chain = %chain.name,
        addresses = summaries.len(),
        "summarize command completed"
    );
    Ok(())
}

async fn handle_traces(ctx: &AppContext, args: TracesArgs) -> Result<()> {
    let chain = ctx.config.chain(&args.chain)?;
    let store = Store::new(&ctx.db_path).wrap_err("failed to open SQLite store")?;

    let rows = store.get_arb_rows(chain.chain_id)?;
    if rows.is_empty() {
        return Err(eyre!(
            "no classified transactions stored for chain '{}'; run classify first",
            chain.name
        ));
    }

    let registry = Registry::from_parquet(&args.pools, &args.tokens)?;
    let extras = args
        .exclude
        .iter()
        .map(|raw| {
            raw.parse::<Address>()
                .wrap_err_with(|| format!("--exclude '{raw}' is not an address"))
        })
        .collect::<Result<Vec<Address>>>()?;
    let exclusions = ExclusionSet::for_chain(&registry, extras);
    info!(baseline = exclusions.len(), "built trace exclusion baseline");

    let fetcher = MetadataFetcher::new(&chain.rpc_url());
    let pb = progress_bar(rows.len() as u64, "tracing transactions")?;
    let mut trace_rows: Vec<TraceRow> = Vec::new();
    let mut traced = 0u64;

    for row in &rows {
        pb.inc(1);
        let tx_hash = row
            .tx_hash
            .parse::<B256>()
            .wrap_err_with(|| format!("stored tx hash '{}' is not valid", row.tx_hash))?;
        let frame = match fetcher.trace_transaction(tx_hash).await {
            Ok(frame) => frame,
            Err(error) => {
                tracing::warn!(tx = %row.tx_hash, %error, "failed to trace transaction");
                continue;
            }
        };
        traced += 1;

        let calls = flatten_call_tree(&frame);
        for call in filter_interesting_calls(&calls, &exclusions) {
            trace_rows.push(TraceRow {
                tx_hash: row.tx_hash.clone(),
                depth_path: call.depth_path,
                from_address: format!("{:#x}", call.from),
                to_address: format!("{:#x}", call.to),
                selector: call.selector,
                gas_used: call.gas_used,
            });
        }
    }
    pb.finish_and_clear();

    let inserted = store.insert_trace_rows(&trace_rows)?;

    info!(
        chain = %chain.name,
        transactions = rows.len(),
        traced,
        interesting_calls = inserted,
        "traces command completed"
    );
    Ok(())
}

async fn handle_status(ctx: &AppContext, args: StatusArgs) -> Result<()> {
    let chain = ctx.config.chain(&args.chain)?;
    let store = Store::new(&ctx.db_path).wrap_err("failed to open SQLite store")?;
    let stats = store.stats(chain.chain_id)?;

    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Metric", "Value"]);
    table.add_row(vec!["Database Path", ctx.db_path.as_str()]);
    table.add_row(vec!["Chain", &chain.name]);
    table.add_row(vec!["Arbitrage Transactions", &format!("{}", stats.arb_count)]);
    if stats.arb_count > 0 {
        table.add_row(vec![
            "Block Range",
            &format!("{} - {}", stats.min_block, stats.max_block),
        ]);
    } else {
        table.add_row(vec!["Block Range", "No classified transactions"]);
    }
    table.add_row(vec!["Chunks Processed", &format!("{}", stats.chunk_count)]);
    table.add_row(vec!["Address Summaries", &format!("{}", stats.summary_count)]);
    table.add_row(vec!["Interesting Traces", &format!("{}", stats.trace_count)]);

    println!("\n{table}\n");

    info!(
        chain = %chain.name,
        arbs = stats.arb_count,
        chunks = stats.chunk_count,
        "status command completed"
    );
    Ok(())
}

fn progress_bar(len: u64, message: &'static str) -> Result<ProgressBar> {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .wrap_err("failed to create progress style")?
            .progress_chars("#>-"),
    );
    pb.set_message(message);
    Ok(pb)
}

/// Truncate a hex hash/address for compact table display.
fn truncate_hash(hash: &str) -> String {
    if hash.len() > 14 {
        format!("{}…{}", &hash[..8], &hash[hash.len() - 4..])
    } else {
        hash.to_string()
    }
}

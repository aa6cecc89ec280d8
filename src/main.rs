use std::process;
use std::time::{Duration, Instant};

use clap::{CommandFactory, Parser};

use drkey::address::{parse_endpoint, ScionAddr};
use drkey::config::get_config;
use drkey::errors::DrkeyResult;
use drkey::logging::init_tracing;
use drkey::roles::{host_meta, KeyClient, KeyServer, Roles};

const DEFAULT_SRC: &str = "1-ff00:0:111,[127.0.0.1]";
const DEFAULT_DST: &str = "1-ff00:0:112,[fd00:f00d:cafe::7f00:a]";

#[derive(Parser, Debug)]
#[clap(
    name = "hellodrkey",
    about = "DRKey host keys: daemon lookup vs. delegation secret",
    after_help = "Flags take two dashes (--client, not -client). Without --client or --server both roles run."
)]
struct Opt {
    /// Do client side derivation
    #[clap(long = "client")]
    client: bool,
    /// Do server side derivation
    #[clap(long = "server")]
    server: bool,
    /// SCIOND address
    #[clap(long = "sciond", env = "DRKEY_SCIOND_ADDR")]
    sciond: Option<String>,
    /// Source address
    #[clap(long = "src", default_value = DEFAULT_SRC)]
    src: String,
    /// Destination address
    #[clap(long = "dst", default_value = DEFAULT_DST)]
    dst: String,
}

fn main() {
    let opt = Opt::parse();

    let src = parse_or_usage(&opt.src);
    let dst = parse_or_usage(&opt.dst);

    let code = {
        if let Err(e) = run(opt, src, dst) {
            println!("Fatal error: {e}");
            1
        } else {
            0
        }
    };
    process::exit(code);
}

fn parse_or_usage(s: &str) -> ScionAddr {
    match parse_endpoint(s) {
        Ok(addr) => addr,
        Err(e) => {
            println!("{e}");
            println!("{}", Opt::command().render_help());
            process::exit(1);
        }
    }
}

#[tokio::main]
async fn run(opt: Opt, src: ScionAddr, dst: ScionAddr) -> DrkeyResult<()> {
    let config = get_config()?;
    init_tracing(&config.logging);

    let sciond = opt
        .sciond
        .unwrap_or_else(|| config.daemon.address.clone());
    let timeout = config.request_timeout();
    let roles = Roles::from_flags(opt.client, opt.server);

    if roles.client {
        run_client(&sciond, timeout, src, dst).await?;
    }
    if roles.server {
        run_server(&sciond, timeout, src, dst).await?;
    }
    Ok(())
}

async fn run_client(
    sciond: &str,
    timeout: Duration,
    src: ScionAddr,
    dst: ScionAddr,
) -> DrkeyResult<()> {
    let client = KeyClient::connect(sciond, timeout).await?;
    let meta = host_meta(src, dst);

    let t0 = Instant::now();
    let key = client.host_key(&meta).await?;
    let duration = t0.elapsed();

    println!(
        "Client: key = {}, epoch = {}, duration = {:?}",
        key.key, key.epoch, duration
    );
    Ok(())
}

async fn run_server(
    sciond: &str,
    timeout: Duration,
    src: ScionAddr,
    dst: ScionAddr,
) -> DrkeyResult<()> {
    let server = KeyServer::connect(sciond, timeout).await?;
    let meta = host_meta(src, dst);

    let report = server.delegation_secret(&meta).await?;
    println!(
        "DS key = {}, epoch = {}",
        report.current.key, report.current.epoch
    );
    println!(
        "Next DS key = {}, epoch = {}",
        report.next.key, report.next.epoch
    );
    println!(
        "Prev DS key = {}, epoch = {}",
        report.prev.key, report.prev.epoch
    );

    let t0 = Instant::now();
    let key = server.host_key_from_ds(&meta, &report.current)?;
    let duration = t0.elapsed();

    println!(
        "Server: key = {}, epoch = {}, duration = {:?}",
        key.key, report.current.epoch, duration
    );
    Ok(())
}

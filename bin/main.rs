use tracing::{error, info};
use tracing_subscriber;

use clap::{value_t, App, Arg};

use std::path::PathBuf;

use onionpost::event_log::EventLog;
use onionpost::node;
use onionpost::settings::{NodeSettings, DEFAULT_SOCKS_PORT};
use onionpost::signal::{self, StateChange};
use onionpost::Result;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_level(false)
        .with_target(false)
        .without_time()
        .compact()
        .with_max_level(tracing::Level::INFO)
        .init();

    let matches = App::new("onionpost")
        .version("0.1")
        .about("Runs an anonymous flood-replicated posting node")
        .arg(
            Arg::with_name("data-dir")
                .short("d")
                .long("data-dir")
                .value_name("DATA_DIR")
                .takes_value(true)
                .default_value("data"),
        )
        .arg(
            Arg::with_name("tor-root")
                .short("t")
                .long("tor-root")
                .value_name("TOR_ROOT")
                .takes_value(true)
                .default_value("."),
        )
        .arg(
            Arg::with_name("socks-port")
                .short("s")
                .long("socks-port")
                .value_name("SOCKS_PORT")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("bootstrap")
                .short("b")
                .long("bootstrap")
                .value_name("BASE64_BLOB")
                .takes_value(true)
                .help("base64 blob of gate/peer addresses"),
        )
        .arg(
            Arg::with_name("post")
                .short("p")
                .long("post")
                .value_name("TEXT")
                .takes_value(true)
                .help("publish one post once the transport is ready"),
        )
        .get_matches();

    let data_dir = value_t!(matches.value_of("data-dir"), PathBuf).unwrap_or_else(|e| e.exit());
    let tor_root = value_t!(matches.value_of("tor-root"), PathBuf).unwrap_or_else(|e| e.exit());
    let socks_port =
        value_t!(matches.value_of("socks-port"), u16).unwrap_or(DEFAULT_SOCKS_PORT);
    let bootstrap_blob = matches.value_of("bootstrap").map(String::from);
    let post = matches.value_of("post").map(String::from);

    let settings = NodeSettings::new(data_dir, tor_root, socks_port, bootstrap_blob);

    let sys = actix::System::new();
    sys.block_on(async move {
        let (events, mut rx) = signal::pair();
        let log = EventLog::new();
        let (node, transport) = node::run(&settings, events, log).unwrap();

        let worker = node.clone();
        tokio::spawn(async move {
            while let Some(change) = rx.recv().await {
                match change {
                    StateChange::TorReady => {
                        info!("transport ready, refreshing peers from the gates");
                        let worker = worker.clone();
                        let post = post.clone();
                        tokio::spawn(async move {
                            match worker.refresh_peers().await {
                                Ok(true) => info!("peer list updated"),
                                Ok(false) => info!("using existing peer list"),
                                Err(err) => error!("discovery failed: {}", err),
                            }
                            if let Ok(result) = worker.fetch_posts().await {
                                for (i, item) in result.posts.iter().enumerate() {
                                    info!("post {}: {}", i + 1, item);
                                }
                            }
                            if let Some(text) = post {
                                match worker.publish(text).await {
                                    Ok(true) => info!("post accepted by the network"),
                                    _ => error!("no peer accepted the post"),
                                }
                            }
                        });
                    }
                    StateChange::TorFailed(detail) => {
                        // the directory keeps its fallback entry, so the
                        // node stays usable for a later attempt
                        error!("transport failed: {}", detail);
                    }
                    StateChange::PeersUpdated(count) => info!("{} peer(s) known", count),
                    StateChange::PostsFetched { posts, any_success } => {
                        info!("fetched {} post(s), any_success={}", posts, any_success)
                    }
                    StateChange::Published(ok) => info!("publish ok={}", ok),
                    StateChange::HiddenAddress(address) => {
                        info!("hidden address: {}", address)
                    }
                }
            }
        });

        let sig = if cfg!(unix) {
            use futures::future::FutureExt;
            use tokio::signal::unix::{signal, SignalKind};

            let mut sigint = signal(SignalKind::interrupt()).unwrap();
            let mut sigterm = signal(SignalKind::terminate()).unwrap();

            futures::select! {
                _ = sigint.recv().fuse() => "SIGINT",
                _ = sigterm.recv().fuse() => "SIGTERM"
            }
        } else {
            tokio::signal::ctrl_c().await.unwrap();
            "Ctrl+C"
        };
        info!("Got {}, stopping...", sig);

        transport.shutdown();
        actix::System::current().stop();
    });
    sys.run().unwrap();

    Ok(())
}

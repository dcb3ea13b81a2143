use tracing::{error, info};
use tracing_subscriber;

use clap::{value_t, App, Arg};

use std::path::PathBuf;
use std::sync::Arc;

use onionpost::directory::{Directory, PeerStore};
use onionpost::event_log::EventLog;
use onionpost::flood::FloodClient;
use onionpost::gate::Responder;
use onionpost::node;
use onionpost::settings::{GateSettings, GATE_LOCAL_PORT, GATE_SOCKS_PORT};
use onionpost::signal::{self, StateChange};
use onionpost::tor::{TorConfig, TorLauncher};
use onionpost::Result;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_level(false)
        .with_target(false)
        .without_time()
        .compact()
        .with_max_level(tracing::Level::INFO)
        .init();

    let matches = App::new("onionpost-gate")
        .version("0.1")
        .about("Runs a discovery gate serving its peer list over a hidden service")
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
            Arg::with_name("listen-port")
                .short("l")
                .long("listen-port")
                .value_name("LISTEN_PORT")
                .takes_value(true)
                .help("local port the hidden listener forwards to"),
        )
        .arg(
            Arg::with_name("announce")
                .short("a")
                .long("announce")
                .value_name("GATE")
                .takes_value(true)
                .multiple(true)
                .help("other gates to register this gate's address with"),
        )
        .get_matches();

    let data_dir = value_t!(matches.value_of("data-dir"), PathBuf).unwrap_or_else(|e| e.exit());
    let tor_root = value_t!(matches.value_of("tor-root"), PathBuf).unwrap_or_else(|e| e.exit());
    let socks_port = value_t!(matches.value_of("socks-port"), u16).unwrap_or(GATE_SOCKS_PORT);
    let local_port =
        value_t!(matches.value_of("listen-port"), u16).unwrap_or(GATE_LOCAL_PORT);
    let announce_to: Vec<String> = matches
        .values_of("announce")
        .map(|values| values.map(String::from).collect())
        .unwrap_or_default();

    let settings = GateSettings::new(data_dir, tor_root, socks_port, local_port);

    let sys = actix::System::new();
    sys.block_on(async move {
        std::fs::create_dir_all(&settings.data_dir).unwrap();

        let log = EventLog::new();
        let directory = Directory::new(PeerStore::new(settings.pioneers_path()));
        directory.init();
        if directory.is_empty() {
            directory.reset_to_default();
        }
        info!("serving {} peer(s)", directory.len());

        let (events, mut rx) = signal::pair();
        let config = TorConfig::hidden_service("gate", settings.socks_port, settings.local_port);
        let launcher = TorLauncher::new(settings.tor_root.clone(), config, log.clone());
        let transport = node::spawn_transport(launcher, events);

        let responder = Arc::new(Responder::new(settings.listen_ip(), directory, log));
        let server = responder.clone();
        let socks_port = settings.socks_port;
        tokio::spawn(async move {
            while let Some(change) = rx.recv().await {
                match change {
                    StateChange::TorReady => {
                        let server = server.clone();
                        tokio::spawn(async move {
                            if let Err(err) = server.listen().await {
                                error!("responder failed: {}", err);
                            }
                        });
                    }
                    StateChange::HiddenAddress(address) => {
                        info!("gate reachable at {}", address);
                        if !announce_to.is_empty() {
                            let gates = announce_to.clone();
                            let client = match FloodClient::new(socks_port) {
                                Ok(client) => client,
                                Err(err) => {
                                    error!("could not build flood client: {}", err);
                                    continue;
                                }
                            };
                            tokio::spawn(async move {
                                if client.announce(&address, &gates).await {
                                    info!("registered with {} gate(s)", gates.len());
                                } else {
                                    error!("no gate accepted the registration");
                                }
                            });
                        }
                    }
                    StateChange::TorFailed(detail) => error!("transport failed: {}", detail),
                    _ => (),
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
        info!("Got {}, stopping... ({} request(s) served)", sig, responder.request_count());

        transport.shutdown();
        actix::System::current().stop();
    });
    sys.run().unwrap();

    Ok(())
}

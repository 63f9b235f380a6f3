use std::env;
use std::net::SocketAddr;

use contracts::SimConfig;
use hearth_api::{serve, EngineApi};

fn print_usage() {
    println!("hearth-cli <command>");
    println!("commands:");
    println!("  status");
    println!("  start");
    println!("  pause");
    println!("  step [n]");
    println!("  run-to <tick>");
    println!("  serve [addr]");
    println!("    default addr: 127.0.0.1:8080");
    println!("  simulate <run_id> <seed> [ticks]");
    println!("    runs the simulation to the target tick and prints a summary");
}

fn parse_u64(value: Option<&String>, label: &str) -> Result<u64, String> {
    let raw = value.ok_or_else(|| format!("missing {}", label))?;
    raw.parse::<u64>()
        .map_err(|_| format!("invalid {}: {}", label, raw))
}

fn parse_socket_addr(value: Option<&String>) -> Result<SocketAddr, String> {
    let raw = value.map(String::as_str).unwrap_or("127.0.0.1:8080");
    raw.parse::<SocketAddr>()
        .map_err(|_| format!("invalid addr: {raw}"))
}

fn build_engine(config: SimConfig) -> EngineApi {
    match EngineApi::from_config(config) {
        Ok(engine) => engine,
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(1);
        }
    }
}

async fn run_simulation(args: &[String]) -> Result<(), String> {
    let run_id = args
        .get(2)
        .cloned()
        .ok_or_else(|| "missing run_id".to_string())?;
    let seed = parse_u64(args.get(3), "seed")?;
    let target_tick = args
        .get(4)
        .map(|value| {
            value
                .parse::<u64>()
                .map_err(|_| format!("invalid ticks: {value}"))
        })
        .transpose()?
        .unwrap_or(720);

    let config = SimConfig {
        run_id: run_id.clone(),
        seed,
        max_ticks: target_tick.max(1),
        ..SimConfig::default()
    };

    let mut api = build_engine(config);
    let _ = api.start();
    let (status, executed) = api.run_to_tick(target_tick).await;
    let _ = api.pause();

    println!(
        "simulated run_id={} seed={} executed={} tick={}/{} harmony={:.2} cache_hit_rate={:.2}",
        run_id,
        seed,
        executed,
        status.current_tick,
        status.max_ticks,
        api.harmony(),
        api.cache_hit_rate()
    );
    Ok(())
}

#[tokio::main]
async fn main() {
    let args: Vec<String> = env::args().collect();
    let command = args.get(1).map(String::as_str);

    match command {
        Some("status") => {
            let api = build_engine(SimConfig::default());
            println!("{}", api.status());
        }
        Some("start") => {
            let mut api = build_engine(SimConfig::default());
            let status = api.start();
            println!("started: {}", status);
        }
        Some("pause") => {
            let mut api = build_engine(SimConfig::default());
            let status = api.pause();
            println!("paused: {}", status);
        }
        Some("step") => {
            let ticks = args.get(2).and_then(|v| v.parse::<u64>().ok()).unwrap_or(1);
            let mut api = build_engine(SimConfig::default());
            let (status, executed) = api.step(ticks).await;
            println!("stepped={} {}", executed, status);
        }
        Some("run-to") => match parse_u64(args.get(2), "tick") {
            Ok(target_tick) => {
                let mut api = build_engine(SimConfig::default());
                let (status, executed) = api.run_to_tick(target_tick).await;
                println!("executed={} {}", executed, status);
            }
            Err(err) => {
                eprintln!("error: {}", err);
                print_usage();
                std::process::exit(2);
            }
        },
        Some("serve") => match parse_socket_addr(args.get(2)) {
            Ok(addr) => {
                println!("serving api on http://{addr}");
                if let Err(err) = serve(addr).await {
                    eprintln!("server error: {err}");
                    std::process::exit(1);
                }
            }
            Err(err) => {
                eprintln!("error: {}", err);
                print_usage();
                std::process::exit(2);
            }
        },
        Some("simulate") => {
            if let Err(err) = run_simulation(&args).await {
                eprintln!("error: {err}");
                print_usage();
                std::process::exit(2);
            }
        }
        _ => {
            print_usage();
        }
    }
}

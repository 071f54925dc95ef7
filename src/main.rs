//! WireFlow - Session Layer for Selector-Driven Transports
//!
//! This is a self-contained demo driver for the WireFlow session core.
//! It wires producer threads, a draining worker thread, and a live worker
//! migration together, then prints the resulting session statistics.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;
use wireflow::recovery::{RecoveryDescriptor, RetransmitBuffer};
use wireflow::session::{Session, WriteHandle};
use wireflow::worker::{RunQueueWorker, SessionOp, Worker, WorkerOp};

/// Demo configuration
struct Config {
    /// Number of producer threads
    producers: usize,
    /// Writes sent by each producer
    messages: usize,
    /// Send-queue permit limit (0 disables backpressure)
    queue_limit: usize,
    /// Capacity of the unacknowledged-write tracker
    recovery_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            producers: 4,
            messages: 5_000,
            queue_limit: 64,
            recovery_capacity: wireflow::DEFAULT_RECOVERY_CAPACITY,
        }
    }
}

impl Config {
    /// Parse configuration from command-line arguments
    fn from_args() -> Self {
        let mut config = Config::default();
        let args: Vec<String> = std::env::args().collect();

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--producers" | "-p" => {
                    config.producers = parse_value(&args, i, "--producers");
                    i += 2;
                }
                "--messages" | "-m" => {
                    config.messages = parse_value(&args, i, "--messages");
                    i += 2;
                }
                "--queue-limit" | "-q" => {
                    config.queue_limit = parse_value(&args, i, "--queue-limit");
                    i += 2;
                }
                "--recovery-capacity" | "-r" => {
                    config.recovery_capacity = parse_value(&args, i, "--recovery-capacity");
                    i += 2;
                }
                "--help" => {
                    print_help();
                    std::process::exit(0);
                }
                "--version" | "-v" => {
                    println!("WireFlow version {}", wireflow::VERSION);
                    std::process::exit(0);
                }
                _ => {
                    eprintln!("Unknown argument: {}", args[i]);
                    print_help();
                    std::process::exit(1);
                }
            }
        }

        config
    }
}

fn parse_value(args: &[String], i: usize, flag: &str) -> usize {
    if i + 1 >= args.len() {
        eprintln!("Error: {} requires a value", flag);
        std::process::exit(1);
    }
    args[i + 1].parse().unwrap_or_else(|_| {
        eprintln!("Error: invalid value for {}", flag);
        std::process::exit(1);
    })
}

fn print_help() {
    println!(
        r#"
WireFlow - Session Layer for Selector-Driven Transports

USAGE:
    wireflow [OPTIONS]

OPTIONS:
    -p, --producers <N>           Producer threads (default: 4)
    -m, --messages <N>            Writes per producer (default: 5000)
    -q, --queue-limit <N>         Send-queue permit limit, 0 disables (default: 64)
    -r, --recovery-capacity <N>   Unacknowledged-write tracker capacity (default: 4096)
    -v, --version                 Print version information
        --help                    Print this help message

EXAMPLES:
    wireflow                      # 4 producers x 5000 writes, limit 64
    wireflow -p 8 -q 16           # heavier contention, tighter backpressure
"#
    );
}

fn print_banner(config: &Config) {
    println!(
        r#"
 __      __.__                _____.__
/  \    /  \__|______   _____/ ____\  |   ______  _  __
\   \/\/   /  \_  __ \_/ __ \   __\|  |  /  _ \ \/ \/ /
 \        /|  ||  | \/\  ___/|  |  |  |_(  <_> )     /
  \__/\  / |__||__|    \___  >__|  |____/\____/ \/\_/
       \/                  \/

WireFlow v{} - Session Layer Demo
──────────────────────────────────────────────────────
{} producers x {} writes, queue limit {}, recovery capacity {}
"#,
        wireflow::VERSION,
        config.producers,
        config.messages,
        config.queue_limit,
        config.recovery_capacity
    );
}

fn main() -> anyhow::Result<()> {
    // Parse command-line arguments
    let config = Config::from_args();

    // Set up logging
    let _subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    print_banner(&config);

    // Two reactor workers: the session starts on A and migrates to B
    // mid-run while producers keep the queue busy.
    let worker_a = Arc::new(RunQueueWorker::new("worker-a"));
    let worker_b = Arc::new(RunQueueWorker::new("worker-b"));

    let session = Arc::new(Session::new(
        Arc::clone(&worker_a) as Arc<dyn Worker>,
        "127.0.0.1:4000".parse()?,
        "127.0.0.1:5000".parse()?,
        false, // this side initiated the connection
        config.queue_limit,
    ));

    let recovery = Arc::new(RetransmitBuffer::new(config.recovery_capacity));
    session.attach_outbound_recovery(Arc::clone(&recovery) as Arc<dyn RecoveryDescriptor>);
    session.attach_inbound_recovery(Arc::new(RetransmitBuffer::new(config.recovery_capacity)))?;
    info!("session created and recovery tracking attached");

    let total_writes = config.producers * config.messages;
    let start = Instant::now();

    // Drain thread, standing in for the owning reactor worker. It releases
    // permits as it dequeues and acknowledges recovery in batches so the
    // bounded tracker never overflows.
    let bytes_out = Arc::new(AtomicU64::new(0));
    let drain = {
        let session = Arc::clone(&session);
        let recovery = Arc::clone(&recovery);
        let bytes_out = Arc::clone(&bytes_out);
        thread::spawn(move || {
            let mut drained = 0usize;
            while drained < total_writes {
                match session.poll_outbound() {
                    Some(handle) => {
                        bytes_out.fetch_add(handle.len() as u64, Ordering::Relaxed);
                        drained += 1;
                        if recovery.len() >= recovery.capacity() / 2 {
                            recovery.acknowledge(recovery.capacity() / 2);
                        }
                    }
                    None => thread::sleep(Duration::from_micros(200)),
                }
            }
            drained
        })
    };

    // Producer threads, each blocking on the permit pool when it runs dry
    let mut producers = Vec::new();
    for producer_id in 0..config.producers {
        let session = Arc::clone(&session);
        let messages = config.messages;
        producers.push(thread::spawn(move || {
            for seq in 0..messages {
                let payload = format!("producer-{} write-{}", producer_id, seq);
                session.send(Arc::new(WriteHandle::new(payload)));
            }
        }));
    }

    // Migrate the session to worker B while traffic is flowing. Operations
    // enqueued during the unassigned window land in the pending buffer and
    // are flushed to B in order.
    thread::sleep(Duration::from_millis(20));
    let a_dyn: Arc<dyn Worker> = Arc::clone(&worker_a) as Arc<dyn Worker>;
    if session.begin_migration(&a_dyn) {
        session.enqueue_to_worker(WorkerOp::new(session.id(), SessionOp::PauseReads));
        session.enqueue_to_worker(WorkerOp::new(session.id(), SessionOp::ResumeReads));
        session.complete_migration(Arc::clone(&worker_b) as Arc<dyn Worker>);
        info!(
            pending_flushed = worker_b.len(),
            "session migrated from worker-a to worker-b"
        );
    }

    for producer in producers {
        producer
            .join()
            .map_err(|_| anyhow::anyhow!("producer thread panicked"))?;
    }
    let drained = drain
        .join()
        .map_err(|_| anyhow::anyhow!("drain thread panicked"))?;
    let elapsed = start.elapsed();

    // Final acknowledgement sweep, then shut the session down
    recovery.acknowledge(recovery.len());
    session.close();

    let stats = session.stats();
    println!("──────────────────────────────────────────────────────");
    println!("writes sent        {}", stats.sends.load(Ordering::Relaxed));
    println!("writes drained     {}", drained);
    println!(
        "bytes transmitted  {}",
        bytes_out.load(Ordering::Relaxed)
    );
    println!(
        "migrations         {}",
        stats.migrations.load(Ordering::Relaxed)
    );
    println!(
        "acknowledged       {}",
        recovery.acked_count()
    );
    println!(
        "throughput         {:.0} writes/sec",
        total_writes as f64 / elapsed.as_secs_f64()
    );
    info!("demo complete");

    Ok(())
}

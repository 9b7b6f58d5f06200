use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{Days, NaiveDate, Utc};
use tokio_postgres::{Config, NoTls};
use ulid::Ulid;

/// Hourly slots in the default 06:00–22:00 day.
const SLOTS_PER_DAY: u64 = 16;

async fn connect(host: &str, port: u16, dbname: &str) -> tokio_postgres::Client {
    let mut config = Config::new();
    config
        .host(host)
        .port(port)
        .dbname(dbname)
        .user("parkslot")
        .password("parkslot");

    let (client, conn) = config.connect(NoTls).await.expect("connect failed");
    tokio::spawn(async move {
        if let Err(e) = conn.await {
            eprintln!("connection error: {e}");
        }
    });
    client
}

/// A fresh tenant per call.
async fn connect_fresh(host: &str, port: u16) -> tokio_postgres::Client {
    connect(host, port, &format!("bench_{}", Ulid::new())).await
}

fn percentile(sorted: &[Duration], p: f64) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let idx = ((sorted.len() as f64) * p / 100.0) as usize;
    sorted[idx.min(sorted.len() - 1)]
}

fn print_latency(label: &str, latencies: &mut [Duration]) {
    if latencies.is_empty() {
        println!("  {label}: no samples");
        return;
    }
    latencies.sort();
    let total: Duration = latencies.iter().sum();
    let avg = total / latencies.len() as u32;
    println!("  {label}:");
    println!(
        "    n={}, avg={:.2}ms, p50={:.2}ms, p95={:.2}ms, p99={:.2}ms, max={:.2}ms",
        latencies.len(),
        avg.as_secs_f64() * 1000.0,
        percentile(latencies, 50.0).as_secs_f64() * 1000.0,
        percentile(latencies, 95.0).as_secs_f64() * 1000.0,
        percentile(latencies, 99.0).as_secs_f64() * 1000.0,
        latencies[latencies.len() - 1].as_secs_f64() * 1000.0,
    );
}

/// The i-th hourly slot, starting three days out so every lead time is met.
fn nth_slot(i: u64) -> (NaiveDate, String) {
    let date = Utc::now()
        .date_naive()
        .checked_add_days(Days::new(3 + i / SLOTS_PER_DAY))
        .expect("date in range");
    let hour = 6 + i % SLOTS_PER_DAY;
    (date, format!("{hour:02}:00"))
}

async fn create_facility(client: &tokio_postgres::Client, capacity: u32) -> Ulid {
    let fid = Ulid::new();
    client
        .batch_execute(&format!(
            "INSERT INTO facilities (id, capacity) VALUES ('{fid}', {capacity})"
        ))
        .await
        .unwrap();
    client
        .batch_execute("INSERT INTO approvals (entity_id) VALUES ('bench-dog')")
        .await
        .unwrap();
    fid
}

fn reservation_sql(fid: Ulid, i: u64) -> String {
    let (date, start) = nth_slot(i);
    format!(
        "INSERT INTO reservations (id, facility_id, account_id, date, start, plan, entities) \
         VALUES ('{}', '{fid}', 'bench', '{date}', '{start}', 'day_pass', 'bench-dog')",
        Ulid::new()
    )
}

async fn phase1_sequential(host: &str, port: u16) {
    let client = connect_fresh(host, port).await;
    let fid = create_facility(&client, 10).await;

    let n = 2000;
    let mut latencies = Vec::with_capacity(n as usize);
    let start = Instant::now();

    for i in 0..n {
        let t = Instant::now();
        client.batch_execute(&reservation_sql(fid, i)).await.unwrap();
        latencies.push(t.elapsed());
    }

    let elapsed = start.elapsed();
    let ops = n as f64 / elapsed.as_secs_f64();
    println!("  {n} reservations in {:.2}s = {ops:.0} ops/sec", elapsed.as_secs_f64());
    print_latency("write latency", &mut latencies);
}

async fn phase2_contended(host: &str, port: u16) {
    let dbname = format!("bench_{}", Ulid::new());
    let setup = connect(host, port, &dbname).await;
    let capacity = 5;
    let fid = create_facility(&setup, capacity).await;

    let n_tasks = 50;
    let wins = Arc::new(AtomicUsize::new(0));
    let conflicts = Arc::new(AtomicUsize::new(0));
    let start = Instant::now();
    let mut handles = Vec::new();

    // everyone goes for the same slot on the same facility
    for _ in 0..n_tasks {
        let host = host.to_string();
        let dbname = dbname.clone();
        let wins = wins.clone();
        let conflicts = conflicts.clone();
        handles.push(tokio::spawn(async move {
            let client = connect(&host, port, &dbname).await;
            match client.batch_execute(&reservation_sql(fid, 0)).await {
                Ok(()) => {
                    wins.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) if e.code().map(|c| c.code()) == Some("23P01") => {
                    conflicts.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => eprintln!("unexpected error: {e}"),
            }
        }));
    }
    for h in handles {
        h.await.unwrap();
    }

    let wins = wins.load(Ordering::Relaxed);
    let conflicts = conflicts.load(Ordering::Relaxed);
    println!(
        "  {n_tasks} clients on one slot (capacity {capacity}): {wins} booked, {conflicts} conflicts in {:.2}s",
        start.elapsed().as_secs_f64()
    );
    assert_eq!(wins, capacity as usize, "slot oversold or undersold");
}

async fn phase3_read_under_load(host: &str, port: u16) {
    let stop = Arc::new(AtomicBool::new(false));

    // Writers keep booking on their own tenants
    let mut writer_handles = Vec::new();
    for _ in 0..5 {
        let host = host.to_string();
        let stop = stop.clone();
        writer_handles.push(tokio::spawn(async move {
            let client = connect_fresh(&host, port).await;
            let fid = create_facility(&client, 10).await;
            let mut i = 0u64;
            while !stop.load(Ordering::Relaxed) {
                let _ = client.batch_execute(&reservation_sql(fid, i % 3000)).await;
                i += 1;
            }
        }));
    }

    let n_readers = 10;
    let reads_per_reader = 500;
    let mut reader_handles = Vec::new();

    for _ in 0..n_readers {
        let host = host.to_string();
        reader_handles.push(tokio::spawn(async move {
            let client = connect_fresh(&host, port).await;
            let fid = create_facility(&client, 10).await;
            // Some bookings to make availability non-trivial
            for i in 0..50 {
                client.batch_execute(&reservation_sql(fid, i)).await.unwrap();
            }
            let (date, _) = nth_slot(0);

            let mut latencies = Vec::with_capacity(reads_per_reader);
            for _ in 0..reads_per_reader {
                let t = Instant::now();
                client
                    .simple_query(&format!(
                        "SELECT * FROM availability WHERE facility_id = '{fid}' AND date = '{date}'"
                    ))
                    .await
                    .unwrap();
                latencies.push(t.elapsed());
            }
            latencies
        }));
    }

    let mut all_latencies = Vec::new();
    for h in reader_handles {
        all_latencies.extend(h.await.unwrap());
    }

    stop.store(true, Ordering::Relaxed);
    for h in writer_handles {
        let _ = h.await;
    }

    print_latency("availability query", &mut all_latencies);
}

async fn phase4_connection_storm(host: &str, port: u16) {
    let n_conns = 50;
    let ops_per_conn = 10;

    let start = Instant::now();
    let mut handles = Vec::new();
    let success = Arc::new(AtomicUsize::new(0));

    for _ in 0..n_conns {
        let host = host.to_string();
        let success = success.clone();
        handles.push(tokio::spawn(async move {
            let client = connect_fresh(&host, port).await;
            let fid = create_facility(&client, 10).await;
            for i in 0..ops_per_conn {
                client.batch_execute(&reservation_sql(fid, i)).await.unwrap();
            }
            success.fetch_add(1, Ordering::Relaxed);
        }));
    }

    for h in handles {
        let _ = h.await;
    }

    let ok = success.load(Ordering::Relaxed);
    println!(
        "  {n_conns} connections, {ops_per_conn} ops each: {ok}/{n_conns} succeeded in {:.2}s",
        start.elapsed().as_secs_f64()
    );
}

#[tokio::main]
async fn main() {
    let host = std::env::var("PARKSLOT_HOST").unwrap_or_else(|_| "127.0.0.1".into());
    let port: u16 = std::env::var("PARKSLOT_PORT")
        .unwrap_or_else(|_| "5433".into())
        .parse()
        .expect("invalid PARKSLOT_PORT");

    println!("=== parkslot stress benchmark ===");
    println!("target: {host}:{port}\n");

    println!("[phase 1] sequential booking throughput");
    phase1_sequential(&host, port).await;

    println!("\n[phase 2] contended slot");
    phase2_contended(&host, port).await;

    println!("\n[phase 3] read latency under write load");
    phase3_read_under_load(&host, port).await;

    println!("\n[phase 4] connection storm");
    phase4_connection_storm(&host, port).await;

    println!("\n=== benchmark complete ===");
}

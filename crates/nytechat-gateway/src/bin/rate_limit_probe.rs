//! Rate-limit probe: fires concurrent `/api/chat` requests at a running gateway and
//! reports how many were admitted, limited (429) or failed.
//! Run with gateway up: cargo run --bin rate_limit_probe
//!
//! Each simulated client sends its own `X-Forwarded-For`, so per-client windows are
//! exercised independently. PROBE_CLIENTS and PROBE_REQUESTS override the defaults.

use futures_util::future::join_all;
use reqwest::{Client, StatusCode};
use serde_json::json;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;

const DEFAULT_URL: &str = "http://127.0.0.1:3000";
const DEFAULT_CLIENTS: usize = 4;
const DEFAULT_REQUESTS_PER_CLIENT: usize = 30;

const PROMPTS: &[&str] = &[
    "What time zone is UTC+9?",
    "Summarize the rules of chess in two sentences.",
    "Write a haiku about terminals.",
    "What does HTTP 429 mean?",
    "Give me a shell one-liner to count lines in a file.",
];

#[derive(Default)]
struct Tally {
    allowed: AtomicU32,
    limited: AtomicU32,
    failed: AtomicU32,
    latencies: RwLock<Vec<u64>>,
}

fn env_usize(name: &str, default: usize) -> usize {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .filter(|n| *n > 0)
        .unwrap_or(default)
}

#[tokio::main]
async fn main() {
    let base = std::env::var("NYTECHAT_URL").unwrap_or_else(|_| DEFAULT_URL.to_string());
    let clients = env_usize("PROBE_CLIENTS", DEFAULT_CLIENTS);
    let per_client = env_usize("PROBE_REQUESTS", DEFAULT_REQUESTS_PER_CLIENT);

    println!(
        "[PROBE] {} clients x {} requests = {} total against {}",
        clients,
        per_client,
        clients * per_client,
        base
    );

    let tally = Arc::new(Tally::default());
    let http = Client::new();

    let tasks = (0..clients).map(|client_id| {
        let http = http.clone();
        let tally = Arc::clone(&tally);
        let url = format!("{}/api/chat", base);
        tokio::spawn(async move {
            let forwarded = format!("198.18.0.{}", client_id + 1);
            for r in 0..per_client {
                let body = json!({
                    "messages": [{"role": "user", "content": PROMPTS[(client_id + r) % PROMPTS.len()]}]
                });
                let start = Instant::now();
                let res = http
                    .post(&url)
                    .header("x-forwarded-for", &forwarded)
                    .json(&body)
                    .send()
                    .await;
                let elapsed_ms = start.elapsed().as_millis() as u64;

                match res {
                    Ok(resp) if resp.status().is_success() => {
                        tally.allowed.fetch_add(1, Ordering::Relaxed);
                        tally.latencies.write().await.push(elapsed_ms);
                    }
                    Ok(resp) if resp.status() == StatusCode::TOO_MANY_REQUESTS => {
                        let remaining = resp
                            .headers()
                            .get("x-ratelimit-remaining")
                            .and_then(|v| v.to_str().ok())
                            .unwrap_or("-")
                            .to_string();
                        tally.limited.fetch_add(1, Ordering::Relaxed);
                        if r + 1 == per_client {
                            println!("[PROBE] client {} limited (remaining {})", forwarded, remaining);
                        }
                    }
                    _ => {
                        tally.failed.fetch_add(1, Ordering::Relaxed);
                    }
                }
            }
        })
    });
    join_all(tasks).await;

    let allowed = tally.allowed.load(Ordering::Relaxed);
    let limited = tally.limited.load(Ordering::Relaxed);
    let failed = tally.failed.load(Ordering::Relaxed);
    let latencies = tally.latencies.read().await;
    let avg_latency_ms = if latencies.is_empty() {
        0.0
    } else {
        latencies.iter().sum::<u64>() as f64 / latencies.len() as f64
    };

    println!(
        "[PROBE] Allowed: {} | Limited: {} | Failed: {} | Avg latency (allowed): {:.0}ms",
        allowed, limited, failed, avg_latency_ms
    );
}

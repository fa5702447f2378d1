use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    time::Duration,
};

use anyhow::Context;
use clap::Parser;

/// Command-line surface of the fake inference server.
#[derive(Debug, Parser)]
#[command(name = "fake-llm-server")]
#[command(about = "OpenAI-compatible fake LLM server with vLLM-shaped metrics")]
pub struct Args {
    /// Address to bind
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, default_value_t = 8000)]
    pub port: u16,

    /// Simulated admission/batching wait (ms)
    #[arg(long, default_value_t = 5)]
    pub queue_delay_ms: u64,

    /// Simulated token generation time (ms)
    #[arg(long, default_value_t = 10)]
    pub compute_delay_ms: u64,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub listen_addr: SocketAddr,
    pub queue_delay: Duration,
    pub compute_delay: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 8000),
            queue_delay: Duration::from_millis(5),
            compute_delay: Duration::from_millis(10),
        }
    }
}

impl AppConfig {
    pub fn from_args(args: Args) -> anyhow::Result<Self> {
        let host: IpAddr = args
            .host
            .parse()
            .with_context(|| format!("invalid listen host `{}`", args.host))?;

        Ok(Self {
            listen_addr: SocketAddr::new(host, args.port),
            queue_delay: Duration::from_millis(args.queue_delay_ms),
            compute_delay: Duration::from_millis(args.compute_delay_ms),
        })
    }

    /// Config with both simulated delays disabled.
    pub fn instant() -> Self {
        Self {
            queue_delay: Duration::ZERO,
            compute_delay: Duration::ZERO,
            ..Self::default()
        }
    }
}

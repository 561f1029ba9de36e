use std::time::Duration;

use clap::Parser;
use tracing_subscriber::{fmt::format, prelude::__tracing_subscriber_field_MakeExt, EnvFilter};

use crate::api::connection::Limits;

#[derive(Debug, Parser)]
pub struct Config {
    /// Address to listen on.
    #[clap(long, default_value = "127.0.0.1", env)]
    pub host: String,
    #[clap(long, default_value = "11300", env)]
    pub port: u16,
    /// Longest accepted command line. Longer lines close the connection.
    #[clap(long, default_value = "1024", env)]
    pub max_line_length: usize,
    /// Largest accepted job body.
    #[clap(long, default_value = "65535", env)]
    pub max_job_size: usize,
    /// How often delayed jobs are checked for promotion.
    #[clap(long, default_value = "100", env)]
    pub delay_tick_ms: u64,
}

impl Config {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn limits(&self) -> Limits {
        Limits {
            max_line_length: self.max_line_length,
            max_job_size: self.max_job_size,
        }
    }

    pub fn delay_tick(&self) -> Duration {
        Duration::from_millis(self.delay_tick_ms.max(1))
    }
}

pub fn configure_tracing() {
    let formatter =
        format::debug_fn(|writer, field, value| write!(writer, "{}={:?}", field, value))
            .delimited(" ");

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .fmt_fields(formatter)
        .init();
}

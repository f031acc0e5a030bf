use std::env::var;
use std::str::FromStr;

use dotenvy::dotenv;

use crate::infrastructure::{
    providers::{sendgrid::SendgridConfig, smtp::SmtpCredentials},
    queue::jetstream::JetstreamQueueConfig,
};

pub struct Config {
    pub port: u16,
    pub scheme: String,
    pub host: String,
    pub database_url: Option<String>,
    pub nats_url: Option<String>,
    pub queue_stream: String,
    pub queue_subject: String,
    pub queue_durable: String,
    pub queue_concurrency: usize,
    pub queue_pull_batch: usize,
    pub queue_ack_wait_seconds: u64,
    pub queue_max_deliver: i64,
    pub send_timeout_seconds: u64,
    pub sendgrid: SendgridConfig,
    pub gmail: SmtpCredentials,
    pub outlook: SmtpCredentials,
}

impl Config {
    pub fn try_parse() -> Result<Config, &'static str> {
        let _ = dotenv();

        Ok(Config {
            port: var("PORT")
                .map_err(|_| "An error occured while getting PORT env param")?
                .parse::<u16>()
                .map_err(|_| "An error occured while parsing PORT env param")?,
            scheme: var("SCHEME").map_err(|_| "An error occured while getting SCHEME env param")?,
            host: var("HOST").map_err(|_| "An error occured while getting HOST env param")?,
            database_url: optional("DATABASE_URL"),
            nats_url: optional("NATS_URL"),
            queue_stream: optional("QUEUE_STREAM").unwrap_or_else(|| "DISPATCH".to_string()),
            queue_subject: optional("QUEUE_SUBJECT").unwrap_or_else(|| "dispatch.jobs".to_string()),
            queue_durable: optional("QUEUE_DURABLE")
                .unwrap_or_else(|| "dispatch-worker".to_string()),
            queue_concurrency: parse_or("QUEUE_CONCURRENCY", 2)?,
            queue_pull_batch: parse_or("QUEUE_PULL_BATCH", 8)?,
            // Must outlast the slowest job a throttle can produce, or the
            // broker redelivers a job that is still being paced.
            queue_ack_wait_seconds: parse_or("QUEUE_ACK_WAIT_SECONDS", 3_600)?,
            queue_max_deliver: parse_or("QUEUE_MAX_DELIVER", 5)?,
            send_timeout_seconds: parse_or("SEND_TIMEOUT_SECONDS", 30)?,
            sendgrid: SendgridConfig {
                api_key: optional("SENDGRID_API_KEY").unwrap_or_default(),
                from_email: optional("SENDGRID_FROM_EMAIL").unwrap_or_default(),
                base_url: optional("SENDGRID_BASE_URL")
                    .unwrap_or_else(|| "https://api.sendgrid.com".to_string()),
            },
            gmail: SmtpCredentials {
                username: optional("GMAIL_USER").unwrap_or_default(),
                password: optional("GMAIL_APP_PASSWORD").unwrap_or_default(),
            },
            outlook: SmtpCredentials {
                username: optional("OUTLOOK_USER").unwrap_or_default(),
                password: optional("OUTLOOK_PASSWORD").unwrap_or_default(),
            },
        })
    }

    pub fn jetstream(&self, url: &str) -> JetstreamQueueConfig {
        JetstreamQueueConfig {
            url: url.to_string(),
            stream: self.queue_stream.clone(),
            subject: self.queue_subject.clone(),
            durable: self.queue_durable.clone(),
            pull_batch: self.queue_pull_batch,
            ack_wait_seconds: self.queue_ack_wait_seconds,
            max_deliver: self.queue_max_deliver,
        }
    }
}

fn optional(name: &str) -> Option<String> {
    var(name).ok().filter(|value| !value.is_empty())
}

fn parse_or<T: FromStr>(name: &str, default: T) -> Result<T, &'static str> {
    match var(name) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|_| "An error occured while parsing a numeric env param"),
        Err(_) => Ok(default),
    }
}

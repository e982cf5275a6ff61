//! HTTP transport settings shared by every service client

use std::time::Duration;

const USER_AGENT: &str = concat!("terraform-provider-aws/", env!("CARGO_PKG_VERSION"));

/// Connection settings for the underlying `reqwest` client
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    pub idle_timeout: Duration,
    pub max_idle_per_host: usize,
    pub tcp_keepalive: Option<Duration>,
    /// Accept self-signed certificates, e.g. from a local emulator
    pub insecure: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            idle_timeout: Duration::from_secs(90),
            max_idle_per_host: 10,
            tcp_keepalive: Some(Duration::from_secs(30)),
            insecure: false,
        }
    }
}

impl HttpConfig {
    pub fn build(&self) -> Result<reqwest::Client, reqwest::Error> {
        if self.insecure {
            tracing::warn!("TLS certificate verification is disabled");
        }

        let mut builder = reqwest::Client::builder()
            .danger_accept_invalid_certs(self.insecure)
            .timeout(self.request_timeout)
            .connect_timeout(self.connect_timeout)
            .pool_idle_timeout(self.idle_timeout)
            .pool_max_idle_per_host(self.max_idle_per_host)
            .user_agent(USER_AGENT);

        if let Some(keepalive) = self.tcp_keepalive {
            builder = builder.tcp_keepalive(keepalive);
        }

        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_and_insecure_clients_build() {
        assert!(HttpConfig::default().build().is_ok());

        let insecure = HttpConfig {
            insecure: true,
            ..Default::default()
        };
        assert!(insecure.build().is_ok());
    }
}

use crate::sink::line_protocol::to_lines;
use crate::sink::{PointSink, SinkError};
use crate::types::point::Point;
use crate::types::settings::InfluxConfig;
use log::{debug, warn};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;

/// Writes points to an InfluxDB 2.x bucket through the HTTP write API.
pub struct InfluxSink {
    client: Client,
    config: InfluxConfig,
}

impl InfluxSink {
    pub fn new(config: InfluxConfig) -> Self {
        Self::with_client(Client::new(), config)
    }

    pub fn with_client(client: Client, config: InfluxConfig) -> Self {
        Self { client, config }
    }

    fn write_url(&self) -> String {
        format!("{}/api/v2/write", self.config.url.trim_end_matches('/'))
    }
}

impl PointSink for InfluxSink {
    async fn write(&mut self, points: &[Point]) -> Result<(), SinkError> {
        if points.is_empty() {
            return Ok(());
        }
        let url = self.write_url();
        let body = to_lines(points);
        debug!("Writing {} points to {}", points.len(), url);

        let response = self
            .client
            .post(&url)
            .query(&[
                ("org", self.config.org.as_str()),
                ("bucket", self.config.bucket.as_str()),
                ("precision", "s"),
            ])
            .header(AUTHORIZATION, format!("Token {}", self.config.token))
            .header(CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(body)
            .send()
            .await
            .map_err(|e| SinkError::Network(url.clone(), e))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            warn!("InfluxDB rejected write to {}: {} {}", url, status, message);
            return Err(SinkError::Rejected { status, message });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_url() {
        let sink = InfluxSink::new(InfluxConfig {
            url: "http://localhost:8086/".to_string(),
            org: "surrey".to_string(),
            bucket: "laqn".to_string(),
            token: "secret".to_string(),
        });
        assert_eq!(sink.write_url(), "http://localhost:8086/api/v2/write");
    }
}

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};

use crate::errors::{AppError, Result};

pub struct MetricsService {
    registry: Registry,
    http_requests: IntCounterVec,
    http_duration: HistogramVec,
    generations: IntCounterVec,
    downloads: IntCounter,
    compositor_fallbacks: IntCounter,
    transcriptions: IntCounterVec,
}

impl MetricsService {
    pub fn new() -> std::result::Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let http_requests = IntCounterVec::new(
            Opts::new("http_requests_total", "HTTP requests by method, route and status class"),
            &["method", "route", "status"],
        )?;
        let http_duration = HistogramVec::new(
            HistogramOpts::new("http_request_duration_seconds", "HTTP request latency"),
            &["method", "route"],
        )?;
        let generations = IntCounterVec::new(
            Opts::new("variation_generations_total", "Variation generation requests by outcome"),
            &["outcome"],
        )?;
        let downloads = IntCounter::new("composite_downloads_total", "Composited images delivered")?;
        let compositor_fallbacks = IntCounter::new(
            "compositor_fallbacks_total",
            "Composites rendered on a transparent canvas because the image failed to load",
        )?;
        let transcriptions = IntCounterVec::new(
            Opts::new("transcriptions_total", "Transcription requests by outcome"),
            &["outcome"],
        )?;

        registry.register(Box::new(http_requests.clone()))?;
        registry.register(Box::new(http_duration.clone()))?;
        registry.register(Box::new(generations.clone()))?;
        registry.register(Box::new(downloads.clone()))?;
        registry.register(Box::new(compositor_fallbacks.clone()))?;
        registry.register(Box::new(transcriptions.clone()))?;

        Ok(Self {
            registry,
            http_requests,
            http_duration,
            generations,
            downloads,
            compositor_fallbacks,
            transcriptions,
        })
    }

    pub fn record_request(&self, method: &str, route: &str, status: u16, seconds: f64) {
        let class = format!("{}xx", status / 100);
        self.http_requests.with_label_values(&[method, route, &class]).inc();
        self.http_duration.with_label_values(&[method, route]).observe(seconds);
    }

    pub fn record_generation(&self, success: bool) {
        let outcome = if success { "success" } else { "failure" };
        self.generations.with_label_values(&[outcome]).inc();
    }

    pub fn record_download(&self, used_fallback: bool) {
        self.downloads.inc();
        if used_fallback {
            self.compositor_fallbacks.inc();
        }
    }

    pub fn record_transcription(&self, success: bool) {
        let outcome = if success { "success" } else { "failure" };
        self.transcriptions.with_label_values(&[outcome]).inc();
    }

    pub fn render(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(|e| AppError::Internal(e.into()))?;
        String::from_utf8(buffer).map_err(|e| AppError::Internal(e.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_includes_recorded_series() {
        let metrics = MetricsService::new().unwrap();
        metrics.record_request("GET", "/health", 200, 0.01);
        metrics.record_download(true);
        metrics.record_generation(false);

        let text = metrics.render().unwrap();
        assert!(text.contains("http_requests_total{method=\"GET\",route=\"/health\",status=\"2xx\"} 1"));
        assert!(text.contains("compositor_fallbacks_total 1"));
        assert!(text.contains("variation_generations_total{outcome=\"failure\"} 1"));
    }
}

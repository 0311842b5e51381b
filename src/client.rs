//! Async client for the analysis backend's REST contract.
//!
//! The contract is consumed behind the `FusionBackend` trait so the editing
//! session and CLI can be exercised against a stub. Transport failures never
//! touch the in-memory configuration; the caller keeps its snapshot and can
//! retry.

use async_trait::async_trait;
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::TransportError;
use crate::wire::{BarChartSubmission, HistogramSubmission, WireConfig};

/// Column list and row sample returned by `/get_file_preview`.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct FilePreview {
    pub columns: Vec<String>,
    pub data: Vec<Value>,
}

/// The backend REST contract.
#[async_trait]
pub trait FusionBackend {
    /// `GET /list_files`: the file catalog `{name: path}` that seeds the
    /// session.
    async fn list_files(&self) -> Result<IndexMap<String, String>, TransportError>;

    /// `POST /submit` with the wire configuration.
    async fn submit(&self, config: &WireConfig) -> Result<Value, TransportError>;

    /// `GET /get_table_html/{variant_key}`: embeddable table fragment.
    async fn table_html(&self, variant_key: &str) -> Result<String, TransportError>;

    /// `GET /get_map_html/{variant_key}`: embeddable map fragment.
    async fn map_html(&self, variant_key: &str) -> Result<String, TransportError>;

    /// `POST /generate_histogram`: returns `{column: htmlFilePath}`.
    async fn generate_histogram(
        &self,
        request: &HistogramSubmission,
    ) -> Result<IndexMap<String, String>, TransportError>;

    /// `POST /generate_barchart`: returns `{column: htmlFilePath}`.
    async fn generate_barchart(
        &self,
        request: &BarChartSubmission,
    ) -> Result<IndexMap<String, String>, TransportError>;

    /// `GET /get_histogram_html/{basename}`.
    async fn histogram_html(&self, basename: &str) -> Result<String, TransportError>;

    /// `GET /get_barchart_html/{basename}`.
    async fn barchart_html(&self, basename: &str) -> Result<String, TransportError>;

    /// `GET /get_file_preview/{file_name}`.
    async fn file_preview(&self, file_name: &str) -> Result<FilePreview, TransportError>;

    /// `GET /get_geojson_data/{file_name}`: raw FeatureCollection.
    async fn geojson_data(&self, file_name: &str) -> Result<Value, TransportError>;
}

/// reqwest-backed implementation of the contract.
pub struct HttpBackend {
    base_url: String,
    client: reqwest::Client,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        HttpBackend {
            base_url,
            client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, TransportError> {
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                url: response.url().to_string(),
            });
        }
        Ok(response)
    }

    async fn get_text(&self, path: &str) -> Result<String, TransportError> {
        let url = self.url(path);
        debug!("GET {}", url);
        let response = Self::check(self.client.get(&url).send().await?).await?;
        Ok(response.text().await?)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<T, TransportError> {
        let url = self.url(path);
        debug!("GET {}", url);
        let response = Self::check(self.client.get(&url).send().await?).await?;
        Ok(response.json().await?)
    }

    async fn post_json<B: serde::Serialize, T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, TransportError> {
        let url = self.url(path);
        debug!("POST {}", url);
        let response = Self::check(self.client.post(&url).json(body).send().await?).await?;
        Ok(response.json().await?)
    }
}

#[async_trait]
impl FusionBackend for HttpBackend {
    async fn list_files(&self) -> Result<IndexMap<String, String>, TransportError> {
        self.get_json("list_files").await
    }

    async fn submit(&self, config: &WireConfig) -> Result<Value, TransportError> {
        self.post_json("submit", config).await
    }

    async fn table_html(&self, variant_key: &str) -> Result<String, TransportError> {
        self.get_text(&format!("get_table_html/{}", variant_key))
            .await
    }

    async fn map_html(&self, variant_key: &str) -> Result<String, TransportError> {
        self.get_text(&format!("get_map_html/{}", variant_key))
            .await
    }

    async fn generate_histogram(
        &self,
        request: &HistogramSubmission,
    ) -> Result<IndexMap<String, String>, TransportError> {
        self.post_json("generate_histogram", request).await
    }

    async fn generate_barchart(
        &self,
        request: &BarChartSubmission,
    ) -> Result<IndexMap<String, String>, TransportError> {
        self.post_json("generate_barchart", request).await
    }

    async fn histogram_html(&self, basename: &str) -> Result<String, TransportError> {
        self.get_text(&format!("get_histogram_html/{}", basename))
            .await
    }

    async fn barchart_html(&self, basename: &str) -> Result<String, TransportError> {
        self.get_text(&format!("get_barchart_html/{}", basename))
            .await
    }

    async fn file_preview(&self, file_name: &str) -> Result<FilePreview, TransportError> {
        self.get_json(&format!("get_file_preview/{}", file_name))
            .await
    }

    async fn geojson_data(&self, file_name: &str) -> Result<Value, TransportError> {
        self.get_json(&format!("get_geojson_data/{}", file_name))
            .await
    }
}

/// Which chart family a `{column: htmlFilePath}` map belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartKind {
    Histogram,
    BarChart,
}

/// Result of one chart-fragment fetch. A failed fragment renders as an
/// inline message for its column only.
#[derive(Debug)]
pub struct FragmentOutcome {
    pub column: String,
    pub html: Result<String, TransportError>,
}

impl FragmentOutcome {
    /// The fragment HTML, or an inline error message for this column.
    pub fn into_html(self) -> String {
        match self.html {
            Ok(html) => html,
            Err(err) => format!("failed to load chart for {}: {}", self.column, err),
        }
    }
}

/// Fetch every chart fragment named in `paths`. One fragment's failure is
/// recorded for that column only and does not abort the remaining fetches.
pub async fn fetch_chart_fragments<B: FusionBackend + ?Sized>(
    backend: &B,
    kind: ChartKind,
    paths: &IndexMap<String, String>,
) -> Vec<FragmentOutcome> {
    let mut outcomes = Vec::with_capacity(paths.len());
    for (column, path) in paths {
        let basename = path.rsplit('/').next().unwrap_or(path);
        let html = match kind {
            ChartKind::Histogram => backend.histogram_html(basename).await,
            ChartKind::BarChart => backend.barchart_html(basename).await,
        };
        if let Err(err) = &html {
            warn!("Chart fragment for column {} failed: {}", column, err);
        }
        outcomes.push(FragmentOutcome {
            column: column.clone(),
            html,
        });
    }
    outcomes
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FlakyBackend;

    #[async_trait]
    impl FusionBackend for FlakyBackend {
        async fn list_files(&self) -> Result<IndexMap<String, String>, TransportError> {
            unimplemented!()
        }

        async fn submit(&self, _config: &WireConfig) -> Result<Value, TransportError> {
            unimplemented!()
        }

        async fn table_html(&self, _variant_key: &str) -> Result<String, TransportError> {
            unimplemented!()
        }

        async fn map_html(&self, _variant_key: &str) -> Result<String, TransportError> {
            unimplemented!()
        }

        async fn generate_histogram(
            &self,
            _request: &HistogramSubmission,
        ) -> Result<IndexMap<String, String>, TransportError> {
            unimplemented!()
        }

        async fn generate_barchart(
            &self,
            _request: &BarChartSubmission,
        ) -> Result<IndexMap<String, String>, TransportError> {
            unimplemented!()
        }

        async fn histogram_html(&self, basename: &str) -> Result<String, TransportError> {
            if basename == "broken.html" {
                Err(TransportError::Status {
                    status: 500,
                    url: format!("stub://get_histogram_html/{}", basename),
                })
            } else {
                Ok(format!("<div>{}</div>", basename))
            }
        }

        async fn barchart_html(&self, _basename: &str) -> Result<String, TransportError> {
            unimplemented!()
        }

        async fn file_preview(&self, _file_name: &str) -> Result<FilePreview, TransportError> {
            unimplemented!()
        }

        async fn geojson_data(&self, _file_name: &str) -> Result<Value, TransportError> {
            unimplemented!()
        }
    }

    #[tokio::test]
    async fn test_fragment_failure_does_not_abort_the_rest() {
        let mut paths = IndexMap::new();
        paths.insert(
            "capacity".to_string(),
            "./out/capacity.html".to_string(),
        );
        paths.insert("broken".to_string(), "./out/broken.html".to_string());
        paths.insert("permis".to_string(), "./out/permis.html".to_string());

        let outcomes = fetch_chart_fragments(&FlakyBackend, ChartKind::Histogram, &paths).await;
        assert_eq!(outcomes.len(), 3);
        assert!(outcomes[0].html.is_ok());
        assert!(outcomes[1].html.is_err());
        assert!(outcomes[2].html.is_ok());

        let rendered: Vec<String> = outcomes.into_iter().map(|o| o.into_html()).collect();
        assert_eq!(rendered[0], "<div>capacity.html</div>");
        assert!(rendered[1].contains("failed to load chart for broken"));
    }

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let backend = HttpBackend::new("http://localhost:5000/");
        assert_eq!(backend.url("list_files"), "http://localhost:5000/list_files");
    }
}

//! ---
//! retic_section: "08-network-analysis"
//! retic_subsection: "module"
//! retic_type: "source"
//! retic_scope: "code"
//! retic_description: "Optional HTTP surface for the analysis engine."
//! retic_version: "v0.0.0-prealpha"
//! retic_owner: "tbd"
//! ---
use serde::{Deserialize, Serialize};

use crate::{io::EditorDocument, model::Network};

#[cfg(feature = "rest-api")]
pub use rest::router;

#[cfg(feature = "rest-api")]
mod rest {
    use std::sync::Arc;

    use axum::{
        extract::State,
        http::StatusCode,
        routing::{get, post},
        Json, Router,
    };
    use tower_http::trace::TraceLayer;

    use crate::{library::Libraries, reports::SimulationResult, Analyzer};

    use super::AnalysisRequest;

    pub fn router(analyzer: Arc<Analyzer>) -> Router {
        Router::new()
            .route("/api/analysis", post(analysis))
            .route("/api/libraries", get(libraries))
            .with_state(analyzer)
            .layer(TraceLayer::new_for_http())
    }

    async fn analysis(
        State(analyzer): State<Arc<Analyzer>>,
        Json(payload): Json<AnalysisRequest>,
    ) -> Result<Json<SimulationResult>, (StatusCode, String)> {
        let network = payload.into_network().ok_or((
            StatusCode::BAD_REQUEST,
            "request needs exactly one of `network` or `editor`".to_owned(),
        ))?;
        Ok(Json(analyzer.analyze(&network).result))
    }

    async fn libraries(State(analyzer): State<Arc<Analyzer>>) -> Json<Libraries> {
        Json(analyzer.libraries().clone())
    }
}

/// Body of `POST /api/analysis`: a tagged network or an editor save file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisRequest {
    #[serde(default)]
    pub network: Option<Network>,
    #[serde(default)]
    pub editor: Option<EditorDocument>,
}

impl AnalysisRequest {
    pub fn into_network(self) -> Option<Network> {
        match (self.network, self.editor) {
            (Some(network), None) => Some(network),
            (None, Some(editor)) => Some(editor.into()),
            _ => None,
        }
    }
}


#[cfg(all(test, feature = "rest-api"))]
mod rest_tests {
    use std::sync::Arc;

    use crate::{demo::demo_network, Analyzer};

    #[tokio::test]
    async fn router_serves_analysis() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = super::router(Arc::new(Analyzer::default()));
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let body = serde_json::to_string(&super::AnalysisRequest {
            network: Some(demo_network()),
            editor: None,
        })
        .unwrap();
        let request = format!(
            "POST /api/analysis HTTP/1.1\r\nHost: {addr}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );

        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();

        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.contains("\"voltageProfile\""));
    }
}

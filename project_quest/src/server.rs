use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use player_db::{RepoError, Repository, SqliteRepository};
use quest::{
    BattleEngine, Coordinator, GameError, MissionCatalog, MissionTracker, PositionWriter,
    RespawnScheduler,
};
use serde_json::json;
use session::SessionRegistry;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::cors::CorsLayer;

use crate::config::ServerConfig;

const RANKING_SIZE: usize = 10;

/// Fully wired game server: repository, coordinator and respawn scheduler.
pub struct QuestServer {
    config: ServerConfig,
    repo: Arc<dyn Repository>,
    coordinator: Arc<Coordinator>,
    respawn: Arc<RespawnScheduler>,
}

impl QuestServer {
    /// Open the SQLite database named in the config and wire everything.
    pub async fn open(config: ServerConfig) -> Result<Self, GameError> {
        let repo = SqliteRepository::open(&config.database.path)?.with_spawn(config.spawn_point());
        tracing::info!(path = %config.database.path, "Database ready");
        Self::with_repository(config, Arc::new(repo)).await
    }

    pub async fn with_repository(
        config: ServerConfig,
        repo: Arc<dyn Repository>,
    ) -> Result<Self, GameError> {
        let registry = Arc::new(SessionRegistry::new());
        let catalog = Arc::new(MissionCatalog::load(repo.as_ref()).await?);

        let missions = Arc::new(MissionTracker::new(Arc::clone(&repo), catalog));
        let battles = BattleEngine::new(
            Arc::clone(&repo),
            Arc::clone(&missions),
            config.battle.clone(),
        );
        let positions = PositionWriter::new(Arc::clone(&repo), config.position_window());
        let coordinator = Arc::new(Coordinator::new(
            Arc::clone(&repo),
            Arc::clone(&registry),
            missions,
            battles,
            positions,
            config.world_rules(),
        ));
        let respawn = Arc::new(RespawnScheduler::new(
            Arc::clone(&repo),
            registry,
            config.respawn_period(),
        ));

        Ok(Self {
            config,
            repo,
            coordinator,
            respawn,
        })
    }

    pub fn coordinator(&self) -> &Arc<Coordinator> {
        &self.coordinator
    }

    /// `/ws` plus the JSON endpoints, with permissive CORS.
    pub fn router(&self, shutdown_rx: watch::Receiver<bool>) -> Router {
        let ws = net::web_server::ws_router(
            self.coordinator.clone(),
            self.config.net.max_input_length,
            shutdown_rx,
        );
        let api = Router::new()
            .route("/api/health", get(health))
            .route("/api/ranking", get(ranking))
            .with_state(Arc::clone(&self.repo));

        ws.merge(api).layer(CorsLayer::permissive())
    }

    /// Serve until shutdown, then stop the respawn task and flush positions.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown_rx: watch::Receiver<bool>,
    ) -> std::io::Result<()> {
        let respawn_task = tokio::spawn(Arc::clone(&self.respawn).run(shutdown_rx.clone()));

        let app = self.router(shutdown_rx.clone());
        let served = net::web_server::serve(listener, app, shutdown_rx.clone()).await;

        if *shutdown_rx.borrow() {
            let _ = respawn_task.await;
        } else {
            respawn_task.abort();
        }
        self.coordinator.positions().flush_all().await;
        tracing::info!("Quest server stopped");
        served
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "OK",
        "message": "Quest server is running",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

async fn ranking(State(repo): State<Arc<dyn Repository>>) -> Response {
    match repo.top_players(RANKING_SIZE).await {
        Ok(entries) => Json(entries).into_response(),
        Err(e) => ranking_error(e),
    }
}

fn ranking_error(e: RepoError) -> Response {
    tracing::error!("Failed to load ranking: {}", e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "Error fetching ranking" })),
    )
        .into_response()
}

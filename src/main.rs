use code_agent_core::adapter::UnconfiguredAdapter;
use code_agent_core::config::load_config;
use code_agent_core::coordinator::ToolCoordinator;
use code_agent_core::logging;
use code_agent_core::server;
use code_agent_core::state::AppState;
use log::info;
use std::net::SocketAddr;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_logging();
    info!("code-agent-core starting...");

    let config = load_config();

    let coordinator = Arc::new(ToolCoordinator::with_default_tools());
    let adapter = Arc::new(UnconfiguredAdapter);
    let state = AppState::new(coordinator, adapter, config.engine.clone());

    let app = server::create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.bind_host, config.server.bind_port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let local_addr = listener.local_addr()?;
    info!("listening on http://{local_addr}");
    info!("  GET  http://{local_addr}/health");
    info!("  POST http://{local_addr}/chat/smart-chat-v2");
    info!("  GET  http://{local_addr}/sessions/list");
    info!("  GET  http://{local_addr}/sessions/load/:task_id");
    info!("  POST http://{local_addr}/sessions/toggle-favorite/:task_id");
    info!("  POST http://{local_addr}/sessions/delete/:task_id");

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
    Ok(())
}

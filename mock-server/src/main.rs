use mock_server::MockBasecamp;
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let account = std::env::var("MOCK_ACCOUNT_ID").unwrap_or_else(|_| "999".to_string());
    let token = std::env::var("MOCK_ACCESS_TOKEN").unwrap_or_else(|_| "dev-token".to_string());

    let mock = MockBasecamp::new(&account, &token);
    let (project, todoset) = mock.add_project("Demo project");
    let todolist = mock.add_todolist(project, todoset, "Inbox");

    let addr = format!("127.0.0.1:{port}");
    let listener = TcpListener::bind(&addr).await?;
    info!(%addr, %account, project, todolist, "mock Basecamp listening");
    mock_server::run(listener, mock).await
}

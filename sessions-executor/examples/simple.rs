//! Simple session pool example - run a short batch and print the outcome
//!
//! Requires `POOL_MANAGEMENT_ENDPOINT` and a credential the default chain can
//! find (for instance `SESSIONS_ACCESS_TOKEN`).

use sessions_executor::sessions_auth::DefaultCredential;
use sessions_executor::{CodeFragment, ExecutionClient, ExecutorConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let config = ExecutorConfig::load(None)?;
    let client = ExecutionClient::with_provider(config, DefaultCredential::from_env())?;

    println!("=== Session Pool Example ===\n");
    println!("Endpoint: {}\n", client.execute_url());

    let batch = [
        CodeFragment::new("print('Hello from the session pool!')"),
        CodeFragment::new("x = 6 * 7\nx"),
        CodeFragment::new("1 / 0"),
        CodeFragment::new("print('still running')"),
    ];

    let outcome = client.execute(&batch).await?;

    println!("{}", outcome.combined_log);
    println!(
        "\nResult: state={} exit_code={} submitted={}/{}",
        outcome.state, outcome.exit_code, outcome.fragments_submitted, outcome.fragments_total
    );

    Ok(())
}

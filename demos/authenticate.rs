//! Browser sign-in example for OneDrive.
//!
//! This example demonstrates:
//! - Loading configuration from environment variables
//! - Signing in through the browser with a local redirect listener
//! - Calling Microsoft Graph with the resulting token
//!
//! # Usage
//!
//! Register an application with the redirect URI
//! `http://localhost:9999/authentication`, then:
//! ```bash
//! export ONEDRIVE_CLIENT_ID="your-client-id"
//! export ONEDRIVE_CLIENT_SECRET="your-client-secret"
//! cargo run --example authenticate
//! ```

use integrations_onedrive::{init_tracing, OneDriveClient, OneDriveConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    init_tracing("integrations_onedrive=info")?;

    let config = OneDriveConfig::from_env()?;
    let client = OneDriveClient::new(config)?;

    let token = client.authenticate().await?;
    println!("Access token expires in {}s", token.expires_in);

    let me = client.current_user().await?;
    println!(
        "Signed in as {} ({})",
        me.display_name.as_deref().unwrap_or("unknown"),
        me.user_principal_name
    );

    Ok(())
}

use serde_json::json;

use crate::auth::{generate_jwt, Claims};
use crate::cli::utils::output_success;
use crate::cli::{CliContext, OutputFormat};
use crate::services::UserService;

/// Sign a bearer token for an existing user with the configured secret
pub async fn issue(username: &str, ctx: &CliContext) -> anyhow::Result<()> {
    let user = UserService::new(ctx.store.clone()).by_username(username).await?;
    let security = &ctx.config.security;
    let token = generate_jwt(&Claims::for_user(&user, security), &security.jwt_secret)?;

    match ctx.output {
        OutputFormat::Json => output_success(
            &ctx.output,
            &format!("Token issued for '{}'", user.username),
            Some(json!({
                "token": token,
                "expires_in": security.jwt_expiry_hours * 3600
            })),
        ),
        OutputFormat::Text => {
            println!("{}", token);
            Ok(())
        }
    }
}

use clap::Subcommand;

use crate::cli::utils::{output_record, output_success};
use crate::cli::CliContext;
use crate::services::UserService;
use crate::types::{GlobalRole, ModerationStatus};

#[derive(Subcommand)]
pub enum UserCommands {
    #[command(about = "Create a user; staff accounts can only be created here")]
    Create {
        #[arg(help = "Username (1-15 characters)")]
        username: String,

        #[arg(long, default_value = "student", help = "student, teacher or staff")]
        role: GlobalRole,
    },

    #[command(about = "Approve a teacher waiting for moderation")]
    Approve {
        #[arg(help = "Username of the teacher")]
        username: String,
    },

    #[command(about = "Show a user")]
    Show {
        #[arg(help = "Username")]
        username: String,
    },
}

pub async fn handle(cmd: UserCommands, ctx: &CliContext) -> anyhow::Result<()> {
    let users = UserService::new(ctx.store.clone());

    match cmd {
        UserCommands::Create { username, role } => {
            let user = match role {
                GlobalRole::Staff => users.create_staff(&username).await?,
                _ => users.register(&username, role).await?,
            };
            output_success(&ctx.output, &format!("Created {} '{}'", user.role, user.username), None)?;
            output_record(&ctx.output, &user)
        }
        UserCommands::Approve { username } => {
            let user = users.by_username(&username).await?;
            if user.role != GlobalRole::Teacher {
                anyhow::bail!("'{}' is a {}, only teachers are moderated", username, user.role);
            }
            let user = users.set_status(user.id, ModerationStatus::Approved).await?;
            output_success(&ctx.output, &format!("Approved teacher '{}'", user.username), None)
        }
        UserCommands::Show { username } => {
            let user = users.by_username(&username).await?;
            output_record(&ctx.output, &user)
        }
    }
}

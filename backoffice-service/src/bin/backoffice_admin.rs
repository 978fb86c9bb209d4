//! Operations CLI: migrations, bulk quotation expiry, tenant data reset,
//! user bootstrap and token issuance.

use anyhow::{bail, Context, Result};
use backoffice_service::config::BackofficeConfig;
use backoffice_service::domain::Role;
use backoffice_service::models::CreateUser;
use backoffice_service::services::{Database, JwtService};
use chrono::Utc;
use clap::{ArgAction, Parser, Subcommand};
use service_core::observability::init_tracing;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "backoffice-admin", about = "Back-office operations", version)]
struct Cli {
    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        help = "Render command output as JSON"
    )]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending database migrations
    Migrate,
    /// Expire every draft or sent quotation whose validity date has passed
    ExpireQuotations {
        /// Restrict to one organization
        #[arg(long)]
        organization_id: Option<Uuid>,
    },
    /// Delete all business data of an organization, keeping users and the organization itself
    ClearOrganization {
        organization_id: Uuid,
        /// Required; the command is destructive
        #[arg(long, action = ArgAction::SetTrue)]
        yes: bool,
    },
    /// Create a user, e.g. the first super-admin
    CreateUser {
        #[arg(long)]
        email: String,
        #[arg(long)]
        full_name: String,
        #[arg(long, default_value = "super_admin")]
        role: Role,
        /// Required for every role except super_admin
        #[arg(long)]
        organization_id: Option<Uuid>,
    },
    /// Issue an access token for an active user
    IssueToken {
        #[arg(long)]
        email: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = BackofficeConfig::load().context("failed to load configuration")?;
    init_tracing("backoffice-admin", &config.log_level, None);

    let db = Database::new(&config.database.url, 2, 1)
        .await
        .context("failed to connect to the database")?;

    match cli.command {
        Commands::Migrate => {
            db.run_migrations().await?;
            println!("Migrations applied");
        }
        Commands::ExpireQuotations { organization_id } => {
            let today = Utc::now().date_naive();
            let expired = db.expire_due_quotations(organization_id, today).await?;
            if cli.json {
                println!("{}", serde_json::json!({ "expired": expired }));
            } else {
                println!("Expired {} quotation(s)", expired);
            }
        }
        Commands::ClearOrganization {
            organization_id,
            yes,
        } => {
            if !yes {
                bail!("refusing to clear organization {organization_id} without --yes");
            }
            if db.get_organization(organization_id).await?.is_none() {
                bail!("organization {organization_id} not found");
            }
            let cleared = db.clear_organization_data(organization_id).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&cleared)?);
            } else {
                println!(
                    "Cleared organization {}: {} tickets, {} invoices, {} orders, {} quotations, {} projects, {} clients",
                    organization_id,
                    cleared.tickets,
                    cleared.invoices,
                    cleared.orders,
                    cleared.quotations,
                    cleared.projects,
                    cleared.clients
                );
            }
        }
        Commands::CreateUser {
            email,
            full_name,
            role,
            organization_id,
        } => {
            if organization_id.is_none() && !role.is_super_admin() {
                bail!("--organization-id is required for role {role}");
            }
            let user = db
                .create_user(
                    &CreateUser {
                        organization_id,
                        email,
                        full_name,
                        role,
                    },
                    config.policy.enforce_plan_limits,
                )
                .await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&user)?);
            } else {
                println!("Created {} user {} ({})", user.role, user.email, user.id);
            }
        }
        Commands::IssueToken { email } => {
            let user = db
                .find_user_by_email(&email.to_lowercase())
                .await?
                .filter(|user| user.is_active)
                .with_context(|| format!("no active user with email {email}"))?;
            let role = user
                .role()
                .with_context(|| format!("user {} has an unknown role", user.id))?;

            let jwt = JwtService::new(&config.auth);
            let token = jwt.generate_access_token(user.id, user.organization_id, role)?;
            if cli.json {
                println!(
                    "{}",
                    serde_json::json!({
                        "access_token": token,
                        "token_type": "Bearer",
                        "expires_in": jwt.access_token_expiry_seconds(),
                    })
                );
            } else {
                println!("{token}");
            }
        }
    }

    Ok(())
}

//! Identity command - manage the local token table

use anyhow::Result;
use clap::Subcommand;

use super::get_data_dir;
use crate::output;
use ritualfin_core::config::Config;
use ritualfin_core::Identity;

#[derive(Subcommand)]
pub enum IdentityCommands {
    /// Register a token for a user
    Add {
        /// Bearer token
        token: String,
        /// Profile id the token resolves to
        #[arg(long)]
        id: String,
        #[arg(long)]
        email: Option<String>,
    },
    /// List registered users
    List,
}

pub fn run(command: IdentityCommands) -> Result<()> {
    let data_dir = get_data_dir()?;
    let mut config = Config::load(&data_dir)?;

    match command {
        IdentityCommands::Add { token, id, email } => {
            config.add_identity(token, Identity::new(id.clone(), email));
            config.save(&data_dir)?;
            output::success(&format!("Token registered for {}", id));
        }
        IdentityCommands::List => {
            if config.identities.is_empty() {
                println!("No identities registered.");
                return Ok(());
            }
            let mut identities: Vec<&Identity> = config.identities.values().collect();
            identities.sort_by(|a, b| a.id.cmp(&b.id));

            let mut table = output::create_table();
            table.set_header(vec!["Profile", "Email"]);
            for identity in identities {
                table.add_row(vec![identity.id.as_str(), identity.email.as_deref().unwrap_or("-")]);
            }
            println!("{}", table);
        }
    }

    Ok(())
}

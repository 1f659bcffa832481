use clap::Subcommand;
use focusgate_core::session::Command;
use focusgate_core::BlockingMode;

#[derive(Subcommand)]
pub enum PolicyAction {
    /// Add a site to the block list (takes it off the allow list)
    Block { site: String },
    /// Remove a site from the block list
    Unblock { site: String },
    /// Add a site to the allow list (takes it off the block list)
    Allow { site: String },
    /// Remove a site from the allow list
    Disallow { site: String },
    /// Choose how the lists are applied (blocklist or allowlist)
    Mode { mode: BlockingMode },
    /// Replace both lists at once
    Replace {
        /// Sites to block (repeatable)
        #[arg(long = "block")]
        blocked: Vec<String>,
        /// Sites to allow (repeatable)
        #[arg(long = "allow")]
        allowed: Vec<String>,
        #[arg(long)]
        mode: Option<BlockingMode>,
    },
    /// Print the lists and mode as JSON
    Show,
    /// Would a navigation to this URL be blocked right now?
    Check { url: String },
}

impl From<PolicyAction> for Command {
    fn from(action: PolicyAction) -> Self {
        match action {
            PolicyAction::Block { site } => Command::AddToBlockList { site },
            PolicyAction::Unblock { site } => Command::RemoveFromBlockList { site },
            PolicyAction::Allow { site } => Command::AddToAllowList { site },
            PolicyAction::Disallow { site } => Command::RemoveFromAllowList { site },
            PolicyAction::Mode { mode } => Command::SetBlockingMode { mode },
            PolicyAction::Replace {
                blocked,
                allowed,
                mode,
            } => Command::UpdateWebsiteRules {
                blocked_sites: blocked,
                allowed_sites: allowed,
                blocking_mode: mode,
            },
            PolicyAction::Show => Command::GetPolicyState,
            PolicyAction::Check { url } => Command::CheckNavigation { url },
        }
    }
}

pub async fn run(action: PolicyAction) -> Result<(), Box<dyn std::error::Error>> {
    super::one_shot(action.into()).await
}

use clap::Subcommand;
use focusgate_core::session::Command;
use focusgate_core::TimerMode;

#[derive(Subcommand)]
pub enum TimerAction {
    /// Start a countdown, or continue a paused one
    Start,
    /// Pause the running countdown
    Pause,
    /// Resume a paused countdown
    Resume,
    /// Stop and reload the current mode
    Reset {
        /// Countdown length in seconds (defaults to the configured duration)
        #[arg(long)]
        seconds: Option<u64>,
    },
    /// Switch mode (study, short-break, long-break)
    Mode {
        mode: TimerMode,
        /// Countdown length in seconds (defaults to the configured duration)
        #[arg(long)]
        seconds: Option<u64>,
    },
    /// Set the configured duration of every mode, in minutes
    Durations {
        #[arg(long)]
        study: u64,
        #[arg(long)]
        short_break: u64,
        #[arg(long)]
        long_break: u64,
    },
    /// Print current timer state as JSON
    Status,
}

impl From<TimerAction> for Command {
    fn from(action: TimerAction) -> Self {
        match action {
            TimerAction::Start => Command::StartTimer,
            TimerAction::Pause => Command::PauseTimer,
            TimerAction::Resume => Command::ResumeTimer,
            TimerAction::Reset { seconds } => Command::ResetTimer {
                new_time_left: seconds,
            },
            TimerAction::Mode { mode, seconds } => Command::SetMode {
                mode,
                time_left: seconds,
            },
            TimerAction::Durations {
                study,
                short_break,
                long_break,
            } => Command::SetDurations {
                study_minutes: study,
                short_break_minutes: short_break,
                long_break_minutes: long_break,
            },
            TimerAction::Status => Command::GetTimerState,
        }
    }
}

pub async fn run(action: TimerAction) -> Result<(), Box<dyn std::error::Error>> {
    super::one_shot(action.into()).await
}

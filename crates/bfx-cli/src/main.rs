//! 🚀 bfx-cli: the front door, the bouncer, the maitre d' of bfx.
//!
//! 🎬 *[narrator voice]* "It all started with a simple main() function..."
//! 📦 This binary crate is the thin CLI wrapper that parses args, loads
//! config, sets up logging, asks the human, and then lets the library do
//! the heavy lifting. Like a manager. 🦆

use std::io::{BufRead, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use bfx::app_config::{ConfigOverrides, load_config_with};
use bfx::progress::{format_number, summary_table};
use bfx::supervisors::{AutoConfirm, Confirm, RunOutcome};
use bfx::RunOptions;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// 🪣➡️📬 Replay S3 PUT events for existing objects into an SQS queue.
#[derive(Debug, Parser)]
#[command(name = "bfx", version, about)]
struct Args {
    /// TOML config file. Env vars (BFX_*, S3_BUCKET_NAME, ...) fill in the rest.
    config: Option<PathBuf>,

    /// Skip the "are you sure?" prompt
    #[arg(short = 'y', long)]
    yes: bool,

    /// List and forge events, but keep them in memory instead of sending to SQS
    #[arg(long)]
    dry_run: bool,

    /// Override runtime.max_concurrency
    #[arg(long)]
    concurrency: Option<usize>,

    /// Override runtime.batch_size
    #[arg(long)]
    batch_size: Option<usize>,
}

/// 📥 Reads one answer line. Blocking; it runs on its own thread.
type LineReader = fn() -> std::io::Result<String>;

fn read_stdin_line() -> std::io::Result<String> {
    let mut the_answer = String::new();
    std::io::stdin().lock().read_line(&mut the_answer)?;
    Ok(the_answer)
}

/// 🙋 Ask on stdout, read one line. Only `y`/`Y` means yes.
#[derive(Debug)]
struct PromptConfirm {
    cancel: CancellationToken,
    read_line: LineReader,
}

impl PromptConfirm {
    fn on_stdin(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            read_line: read_stdin_line,
        }
    }
}

#[async_trait]
impl Confirm for PromptConfirm {
    async fn confirm(&self, object_count: u64) -> Result<bool> {
        print!(
            "Do you want to send S3 PUT events for {} objects to SQS? (y/n) ",
            format_number(object_count)
        );
        std::io::stdout()
            .flush()
            .context("💀 Could not flush the prompt to stdout")?;

        // -- 🧵 detached, not spawn_blocking: after a Ctrl-C the read stays stuck,
        // -- and the runtime must be able to shut down without it
        let (the_sender, the_receiver) = tokio::sync::oneshot::channel();
        let the_reader = self.read_line;
        std::thread::Builder::new()
            .name("bfx-prompt".to_string())
            .spawn(move || {
                // -- 🤷 nobody listening anymore means the prompt was cancelled
                let _ = the_sender.send(the_reader());
            })
            .context("💀 Could not start the prompt reader thread")?;

        let the_answer = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Ok(false),
            read = the_receiver => read
                .context("💀 The prompt reader thread fell over")?
                .context("💀 Could not read the answer from stdin")?,
        };

        Ok(matches!(the_answer.trim(), "y" | "Y"))
    }
}

/// 🚀 main(): where it all begins. The "I pressed Enter and held my breath" moment.
///
/// 🔧 Steps:
/// 1. Init tracing (stderr, so stdout belongs to the prompt and the bar)
/// 2. Parse args
/// 3. Load config with the overrides applied, validate once
/// 4. Hook Ctrl-C to the cancellation token
/// 5. Run, print the summary, pick the exit code
#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    // 🔒 Validate the config file exists before we get too emotionally attached
    if let Some(config_file) = &args.config {
        let it_exists = config_file.try_exists().with_context(|| {
            format!(
                "💀 Couldn't check whether the config file exists. Was checking here: '{}'",
                config_file.display()
            )
        })?;
        if !it_exists {
            anyhow::bail!(
                "💀 Config file '{}' does not exist. Relative paths resolve against the current directory; \
                 an absolute path removes the guesswork.",
                config_file.display()
            );
        }
    }

    let the_overrides = ConfigOverrides {
        max_concurrency: args.concurrency,
        batch_size: args.batch_size,
    };
    let app_config = load_config_with(args.config.as_deref(), &the_overrides).context(
        "💀 In bfx-cli, main, we couldn't load the config. \
         Check the file, the BFX_* env vars and the command line overrides.",
    )?;

    let cancel = CancellationToken::new();
    let the_trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("🛑 Ctrl-C: no new batches will start; running ones finish first");
            the_trigger.cancel();
        }
    });

    let options = RunOptions {
        dry_run: args.dry_run,
    };
    let result = if args.yes {
        bfx::run(app_config, options, &AutoConfirm, &cancel).await
    } else {
        let the_prompt = PromptConfirm::on_stdin(cancel.clone());
        bfx::run(app_config, options, &the_prompt, &cancel).await
    };

    let report = match result {
        Ok(report) => report,
        Err(err) => {
            log_error_chain(&err);
            // 🗑️ Exit with prejudice. Process exitus maximus.
            std::process::exit(1);
        }
    };

    match &report.outcome {
        RunOutcome::NothingToDo | RunOutcome::Cancelled => return Ok(()),
        RunOutcome::Completed => info!("✅ All objects went through a worker"),
        RunOutcome::Aborted(err) => log_error_chain(err),
    }
    println!("{}", summary_table(&report));

    if !report.is_success() {
        std::process::exit(1);
    }
    // ✅ If we got here, everything worked. Pop the champagne. 🍾
    Ok(())
}

/// 🧅 peel the onion of sadness, one layer at a time
fn log_error_chain(err: &anyhow::Error) {
    error!("💀 error: {}", err);
    let mut the_vibes_are_giving_credential_issues = false;
    for cause in err.chain().skip(1) {
        error!("⚠️  cause: {}", cause);
        let cause_str = cause.to_string();
        if cause_str.contains("credentials")
            || cause_str.contains("ExpiredToken")
            || cause_str.contains("InvalidClientTokenId")
            || cause_str.contains("AccessDenied")
        {
            the_vibes_are_giving_credential_issues = true;
        }
    }

    if the_vibes_are_giving_credential_issues {
        error!(
            "🔧 hint: this smells like an AWS credentials problem. \
            Check AWS_PROFILE / AWS_ACCESS_KEY_ID, refresh your SSO session, \
            and make sure the role may list the bucket and send to the queue. ☕"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn a_reader_that_never_answers() -> std::io::Result<String> {
        std::thread::sleep(Duration::from_secs(30));
        Ok("y\n".to_string())
    }

    fn a_reader_that_says_shouty_yes() -> std::io::Result<String> {
        Ok("Y\n".to_string())
    }

    fn a_reader_that_says_yes_please() -> std::io::Result<String> {
        Ok("yes please\n".to_string())
    }

    fn the_prompt(read_line: LineReader) -> PromptConfirm {
        PromptConfirm {
            cancel: CancellationToken::new(),
            read_line,
        }
    }

    #[test]
    fn the_one_where_ctrl_c_at_the_prompt_lets_the_runtime_go_home() {
        let the_runtime = tokio::runtime::Runtime::new().expect("💀 runtime");
        let the_prompt = the_prompt(a_reader_that_never_answers);
        let the_trigger = the_prompt.cancel.clone();

        let the_answer = the_runtime
            .block_on(async {
                tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    the_trigger.cancel();
                });
                the_prompt.confirm(42).await
            })
            .expect("💀 a cancelled prompt is a no, not an error");
        assert!(!the_answer);

        // -- ⏱️ the reader is still asleep; shutdown must not wait for it
        let the_clock = Instant::now();
        drop(the_runtime);
        assert!(
            the_clock.elapsed() < Duration::from_secs(5),
            "runtime shutdown waited {:?} on the stdin reader",
            the_clock.elapsed()
        );
    }

    #[tokio::test]
    async fn the_one_where_only_y_means_yes() {
        assert!(the_prompt(a_reader_that_says_shouty_yes)
            .confirm(1)
            .await
            .expect("💀 prompt"));
        assert!(!the_prompt(a_reader_that_says_yes_please)
            .confirm(1)
            .await
            .expect("💀 prompt"));
    }
}

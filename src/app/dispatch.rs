use crate::cli::commands::{Cli, Commands};
use anyhow::{Context, Result, bail};
use dialoguer::Confirm;
use fleetsync::config::Config;
use fleetsync::fleet::{self, Catalog, FleetInspector, ManagedNamespace, RunOptions, VerifyOptions};
use fleetsync::platform::create_platform;
use fleetsync::ui::style as ui;
use tokio_util::sync::CancellationToken;

use crate::app::status::{render_schedules, render_status};

/// Verification flags from `apply` that override `[verification]`.
struct VerificationOverrides {
    timeout: Option<u64>,
    poll_interval_ms: Option<u64>,
    concurrency: Option<usize>,
}

fn apply_overrides(config: &mut Config, overrides: &VerificationOverrides) {
    if let Some(timeout) = overrides.timeout {
        config.verification.timeout_secs = timeout;
    }
    if let Some(poll_interval_ms) = overrides.poll_interval_ms {
        config.verification.poll_interval_ms = poll_interval_ms;
    }
    if let Some(concurrency) = overrides.concurrency {
        config.verification.concurrency = concurrency;
    }
}

pub async fn dispatch(cli: Cli, mut config: Config, cancel: CancellationToken) -> Result<()> {
    let namespace = ManagedNamespace::new(config.namespace.prefix.clone());

    match cli.command {
        Commands::Schedules => {
            println!("{}", render_schedules());
            Ok(())
        }

        Commands::Plan { catalog, owner } => {
            config.validate()?;
            let owner = config.resolve_owner(owner.as_deref())?;
            let catalog = Catalog::load(&catalog, &namespace)?;
            let platform = create_platform(&config).await?;

            let plan = fleet::dry_run(platform.as_ref(), &owner, &catalog, &namespace).await?;
            print!("{plan}");
            if plan.is_empty() && plan.errors.is_empty() {
                println!("  {}", ui::success("Fleet already matches the catalog"));
            }
            Ok(())
        }

        Commands::Apply {
            catalog,
            owner,
            yes,
            skip_verify,
            timeout,
            poll_interval_ms,
            concurrency,
            json,
        } => {
            apply_overrides(
                &mut config,
                &VerificationOverrides {
                    timeout,
                    poll_interval_ms,
                    concurrency,
                },
            );
            config.validate()?;
            let owner = config.resolve_owner(owner.as_deref())?;
            // An invalid catalog must fail before any platform call.
            let catalog = Catalog::load(&catalog, &namespace)?;
            let platform = create_platform(&config).await?;

            // Without --yes, apply exactly the plan that was confirmed.
            let approved = if yes {
                None
            } else {
                let plan = fleet::dry_run(platform.as_ref(), &owner, &catalog, &namespace).await?;
                print!("{plan}");
                if !plan.is_empty() {
                    let confirmed = Confirm::new()
                        .with_prompt(format!("Apply {} change(s) for {owner}?", plan.actions.len()))
                        .default(false)
                        .interact()
                        .context("Failed to read confirmation")?;
                    if !confirmed {
                        println!("  {}", ui::yellow("Aborted; nothing was changed"));
                        return Ok(());
                    }
                }
                Some(plan)
            };

            let options = RunOptions {
                verify: VerifyOptions::from(&config.verification),
                skip_verify,
            };
            let report = match &approved {
                Some(plan) => {
                    fleet::run_approved(platform, &owner, &catalog, &namespace, plan, options, &cancel)
                        .await?
                }
                None => fleet::run(platform, &owner, &catalog, &namespace, options, &cancel).await?,
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{report}");
            }
            if !report.is_clean() {
                bail!("fleet for {owner} did not fully converge; see report above");
            }
            Ok(())
        }

        Commands::Status { owner, all } => {
            config.validate()?;
            let owner = config.resolve_owner(owner.as_deref())?;
            let platform = create_platform(&config).await?;
            let snapshot = FleetInspector::new(platform.as_ref(), &namespace)
                .snapshot(&owner)
                .await?;
            println!(
                "{}",
                render_status(&owner, platform.name(), &snapshot, &namespace, all)
            );
            Ok(())
        }
    }
}

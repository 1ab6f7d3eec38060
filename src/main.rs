use std::path::Path;

use anyhow::{bail, Context, Result};
use avaguard::asset::ControllerAsset;
use avaguard::batch::{self, BatchOutcome};
use avaguard::compile::assemble;
use avaguard::config::Config;
use avaguard::logging::{self, obj, v_num, v_str, Domain, Level};

fn emit(asset: &ControllerAsset, out_path: Option<&str>) -> Result<()> {
    match out_path {
        Some(dir) => {
            let path = asset
                .write_to_dir(Path::new(dir))
                .with_context(|| format!("writing asset for {}", asset.controller.name))?;
            logging::log(
                Level::Info,
                Domain::System,
                "asset_written",
                obj(&[("avatar", v_str(&asset.controller.name)), ("path", v_str(&path.display().to_string()))]),
            );
        }
        None => println!("{}", asset.to_json()?),
    }
    Ok(())
}

fn run_batch(cfg: &Config, file: &str) -> Result<()> {
    let configs = batch::load_batch(Path::new(file)).with_context(|| format!("loading batch file {file}"))?;
    let outcomes = batch::build_batch(&configs)?;
    for outcome in &outcomes {
        match outcome {
            BatchOutcome::Built(asset) => emit(asset, cfg.out_path.as_deref())?,
            BatchOutcome::Disabled { name } => eprintln!("{name}: disabled (empty password)"),
            BatchOutcome::Failed { name, error } => eprintln!("{name}: {error}"),
        }
    }
    let summary = batch::summarize(&outcomes);
    if summary.failed > 0 {
        bail!("{} of {} avatars failed", summary.failed, outcomes.len());
    }
    Ok(())
}

fn run_single(cfg: &Config) -> Result<()> {
    let protection = cfg.protection()?;
    if protection.is_disabled() {
        logging::log(
            Level::Warn,
            Domain::System,
            "protection_disabled",
            obj(&[("avatar", v_str(&protection.name)), ("msg", v_str("PASSWORD is empty"))]),
        );
        return Ok(());
    }
    let controller = assemble(&protection)?;
    emit(&ControllerAsset::from_controller(controller)?, cfg.out_path.as_deref())
}

fn main() -> Result<()> {
    let cfg = Config::from_env();
    logging::log(
        Level::Info,
        Domain::System,
        "startup",
        obj(&[
            ("avatar", v_str(&cfg.name)),
            ("countdown_secs", v_num(cfg.countdown_secs)),
            ("padding_states", v_num(cfg.padding_states as f64)),
            ("batch", v_str(cfg.batch_file.as_deref().unwrap_or(""))),
        ]),
    );
    match cfg.batch_file.as_deref() {
        Some(file) => run_batch(&cfg, file),
        None => run_single(&cfg),
    }
}

use std::io::{self, BufRead};

use anyhow::Result;
use avaguard::compile::{assemble, deterrent, DETERRENT_LAYER};
use avaguard::config::Config;
use avaguard::logging::{json_log, obj, v_num, v_str};
use avaguard::runtime::{FrameInput, Session};
use serde_json::json;

fn main() -> Result<()> {
    let cfg = Config::from_env();
    let remotes = std::env::var("REMOTES").ok().and_then(|v| v.parse().ok()).unwrap_or(1usize);
    let delay = std::env::var("DELAY_FRAMES").ok().and_then(|v| v.parse().ok()).unwrap_or(3u64);
    let controller = assemble(&cfg.protection()?)?;
    let mut session = Session::new(&controller, &vec![delay; remotes]);

    let stdin = io::stdin();
    for line in stdin.lock().lines().map_while(|l| l.ok()) {
        if line.trim().is_empty() {
            continue;
        }
        let input: FrameInput = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(err) => {
                json_log("replay", obj(&[("msg", v_str("bad frame json")), ("error", v_str(&err.to_string()))]));
                continue;
            }
        };

        let report = session.step(input);
        // State changes only; idle and hold loops fire every frame.
        for t in report.local.transitions.iter().filter(|t| !t.is_self_loop()) {
            println!(
                "{}",
                json!({
                    "frame": report.local.frame,
                    "layer": t.layer,
                    "from": t.from,
                    "to": t.to,
                    "label": t.label,
                })
            );
        }
        if report.local.warning {
            println!("{}", json!({"frame": report.local.frame, "warning": true}));
        }
        if report.local.transitions.iter().any(|t| t.layer == DETERRENT_LAYER && t.to == deterrent::ACTIVE) {
            json_log(
                "replay",
                obj(&[("msg", v_str("deterrent active")), ("frame", v_num(report.local.frame as f64))]),
            );
        }
    }

    let local = session.local();
    println!(
        "{}",
        json!({
            "frames": session.frame(),
            "automaton": local.automaton_state(),
            "success": local.success(),
            "expired": local.expired(),
            "lock": local.lock_state().map(|s| format!("{:?}", s)),
            "timer": local.timer_state().map(|s| format!("{:?}", s)),
            "progress": local.countdown_progress(),
            "deterrent_active": local.deterrent_active(),
            "remotes_converged": session.converged(),
            "remote_locks": session.remotes().map(|r| format!("{:?}", r.lock_state())).collect::<Vec<_>>(),
        })
    );
    Ok(())
}

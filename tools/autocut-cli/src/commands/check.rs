//! Check encoder availability and system resources.

use autocut_common::config::AppConfig;
use autocut_common::memory::SystemMemory;
use autocut_render::check::SystemReport;
use autocut_render::EncoderRunner;

pub async fn run(config: AppConfig, json: bool) -> anyhow::Result<()> {
    let runner = EncoderRunner::new(&config.encoder);
    let located = runner.locate();
    let report =
        SystemReport::collect(&runner, &SystemMemory, config.cut.memory_floor_bytes).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("AutoCut System Check");
    println!("{}", "=".repeat(50));
    match &located {
        Ok((encoder, probe)) => {
            println!("[OK] Encoder: {}", encoder.display());
            println!("[OK] Probe:   {}", probe.display());
        }
        Err(e) => println!("[WARN] {e}"),
    }
    println!();
    println!("{report}");

    println!();
    if report.is_ready() && located.is_ok() {
        println!("AutoCut is ready.");
    } else {
        println!("Some requirements are missing. See above for details.");
    }
    Ok(())
}

// The `devbox-provision verify` command: re-probes a plan's expected artifacts
// without running any stage.

use crate::cli::cmd_enums::VerifyArgs;
use crate::commands::prepare;
use crate::libs::verification::VerificationEngine;
use anyhow::Result;

pub fn run(args: VerifyArgs) -> Result<i32> {
    let prepared = prepare(&args.plan, None, &[])?;
    let report = VerificationEngine.verify(&prepared.plan.artifacts, &prepared.ctx);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        report.to_table().printstd();
    }

    if report.is_clean() || args.lenient_verify {
        Ok(0)
    } else {
        Ok(1)
    }
}

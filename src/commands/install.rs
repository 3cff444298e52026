use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;

use crate::config::ResolvedConfig;
use crate::executor::CommandExecutor;
use crate::exit_codes::{
    aggregate_result, DriverInstallStatus, AGGREGATE_FAILURE, AGGREGATE_SUCCESS,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallStep {
    /// `certmgr /add <cer> /s /r localMachine root`
    RootStore,
    /// `certmgr /add <cer> /s /r localMachine trustedpublisher`
    TrustedPublisherStore,
    /// `pnputil /add-driver <inf> /install`
    DriverPackage,
}

#[derive(Debug, Clone, Serialize)]
pub struct Invocation {
    pub step: InstallStep,
    pub program: String,
    pub args: Vec<String>,
}

impl Invocation {
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug)]
pub struct InstallPlan {
    pub package_dir: PathBuf,
    pub invocations: Vec<Invocation>,
}

#[derive(Debug, Serialize)]
pub struct StepResult {
    pub step: InstallStep,
    pub command: String,
    /// `None` when the step was only planned.
    pub exit_code: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct InstallResult {
    pub package_dir: PathBuf,
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub steps: Vec<StepResult>,
    pub driver_status: Option<DriverInstallStatus>,
    pub reboot_required: bool,
    pub result: i32,
}

fn certmgr_add(config: &ResolvedConfig, step: InstallStep, store: &str) -> Invocation {
    Invocation {
        step,
        program: config.certmgr.clone(),
        args: ["/add", config.certificate.as_str(), "/s", "/r", "localMachine", store]
            .iter()
            .map(|s| s.to_string())
            .collect(),
    }
}

/// Root store, then trusted publishers, then the driver package. The order
/// never changes.
pub fn plan_install(config: &ResolvedConfig) -> InstallPlan {
    let invocations = vec![
        certmgr_add(config, InstallStep::RootStore, "root"),
        certmgr_add(config, InstallStep::TrustedPublisherStore, "trustedpublisher"),
        Invocation {
            step: InstallStep::DriverPackage,
            program: config.pnputil.clone(),
            args: ["/add-driver", config.inf.as_str(), "/install"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        },
    ];

    debug_assert_eq!(
        invocations.last().map(|i| i.step),
        Some(InstallStep::DriverPackage),
        "driver install must be the final step"
    );

    InstallPlan {
        package_dir: config.package_dir.clone(),
        invocations,
    }
}

fn plan_to_result(plan: &InstallPlan) -> InstallResult {
    let now = Utc::now();
    InstallResult {
        package_dir: plan.package_dir.clone(),
        dry_run: true,
        started_at: now,
        finished_at: now,
        steps: plan
            .invocations
            .iter()
            .map(|inv| StepResult {
                step: inv.step,
                command: inv.command_line(),
                exit_code: None,
            })
            .collect(),
        driver_status: None,
        reboot_required: false,
        result: AGGREGATE_SUCCESS,
    }
}

/// Runs every step in order and writes one `Result  <code>` line per step to
/// `progress`. Certificate steps never affect the outcome; only the driver
/// package exit code is mapped to the aggregate result. An executor error
/// stops the sequence.
pub fn execute_plan(
    plan: &InstallPlan,
    executor: &mut dyn CommandExecutor,
    progress: &mut dyn Write,
) -> Result<InstallResult> {
    let started_at = Utc::now();
    let mut steps = Vec::with_capacity(plan.invocations.len());

    for inv in &plan.invocations {
        let code = executor.execute(&inv.program, &inv.args)?;
        // Two spaces: installer logs scrape this exact form.
        writeln!(progress, "Result  {}", code).context("failed to write progress")?;

        if inv.step != InstallStep::DriverPackage && code != 0 {
            tracing::warn!(step = ?inv.step, code, "certificate registration returned non-zero, continuing");
        }

        steps.push(StepResult {
            step: inv.step,
            command: inv.command_line(),
            exit_code: Some(code),
        });
    }

    let driver_code = steps
        .iter()
        .find(|s| s.step == InstallStep::DriverPackage)
        .and_then(|s| s.exit_code);
    let driver_status = driver_code.and_then(DriverInstallStatus::from_exit_code);
    let result = driver_code.map_or(AGGREGATE_FAILURE, aggregate_result);

    tracing::info!(?driver_code, result, "driver install finished");

    Ok(InstallResult {
        package_dir: plan.package_dir.clone(),
        dry_run: false,
        started_at,
        finished_at: Utc::now(),
        steps,
        driver_status,
        reboot_required: driver_status.is_some_and(DriverInstallStatus::reboot_required),
        result,
    })
}

pub fn cmd_install(
    config: &ResolvedConfig,
    dry_run: bool,
    executor: &mut dyn CommandExecutor,
    progress: &mut dyn Write,
) -> Result<InstallResult> {
    let plan = plan_install(config);

    if dry_run {
        return Ok(plan_to_result(&plan));
    }

    execute_plan(&plan, executor, progress)
}

pub fn format_install_human(result: &InstallResult) -> String {
    if result.dry_run {
        let mut lines = vec![
            "Dry run: no changes made.".to_string(),
            String::new(),
            format!("Would run in {}:", result.package_dir.display()),
        ];
        for step in &result.steps {
            lines.push(format!("  {}", step.command));
        }
        return lines.join("\n");
    }

    match result.driver_status {
        Some(DriverInstallStatus::Success) => "Driver installed.".to_string(),
        Some(DriverInstallStatus::SuccessRebootRequired) => {
            "Driver installed. Reboot required.".to_string()
        }
        Some(DriverInstallStatus::SuccessRebootInitiated) => {
            "Driver installed. Reboot initiated.".to_string()
        }
        None => "Driver install failed.".to_string(),
    }
}

#[derive(Debug, Serialize)]
pub struct PlanResult {
    pub package_dir: PathBuf,
    pub commands: Vec<Invocation>,
}

pub fn cmd_plan(config: &ResolvedConfig) -> PlanResult {
    let plan = plan_install(config);
    PlanResult {
        package_dir: plan.package_dir,
        commands: plan.invocations,
    }
}

pub fn format_plan_human(result: &PlanResult) -> String {
    result
        .commands
        .iter()
        .map(Invocation::command_line)
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::RecordingExecutor;

    fn run(codes: &[i32]) -> (InstallResult, RecordingExecutor, String) {
        let mut exec = RecordingExecutor::new(codes);
        let mut progress: Vec<u8> = Vec::new();
        let result =
            cmd_install(&ResolvedConfig::default(), false, &mut exec, &mut progress).unwrap();
        (result, exec, String::from_utf8(progress).unwrap())
    }

    #[test]
    fn default_plan_uses_exact_command_lines() {
        let plan = plan_install(&ResolvedConfig::default());
        let lines: Vec<String> = plan.invocations.iter().map(|i| i.command_line()).collect();
        assert_eq!(
            lines,
            vec![
                "certmgr.exe /add TailLight.cer /s /r localMachine root",
                "certmgr.exe /add TailLight.cer /s /r localMachine trustedpublisher",
                "PNPUTIL /add-driver TailLight.inf /install",
            ]
        );
    }

    #[test]
    fn plan_uses_configured_names() {
        let config = ResolvedConfig {
            package_dir: PathBuf::from("/opt/pkg"),
            certificate: "Other.cer".to_string(),
            inf: "Other.inf".to_string(),
            certmgr: "cm".to_string(),
            pnputil: "pnputil.exe".to_string(),
        };
        let plan = plan_install(&config);
        assert_eq!(plan.package_dir, PathBuf::from("/opt/pkg"));
        assert_eq!(
            plan.invocations[1].command_line(),
            "cm /add Other.cer /s /r localMachine trustedpublisher"
        );
        assert_eq!(
            plan.invocations[2].command_line(),
            "pnputil.exe /add-driver Other.inf /install"
        );
    }

    #[test]
    fn driver_success_codes_give_zero() {
        for code in [0, 3010, 1641] {
            let (result, _, _) = run(&[0, 0, code]);
            assert_eq!(result.result, 0, "driver exit code {}", code);
        }
    }

    #[test]
    fn driver_failure_code_gives_minus_one() {
        let (result, _, _) = run(&[0, 0, 7]);
        assert_eq!(result.result, -1);
        assert_eq!(result.driver_status, None);
        assert!(!result.reboot_required);
    }

    #[test]
    fn certificate_failures_do_not_affect_result() {
        let (result, _, _) = run(&[5, 1, 0]);
        assert_eq!(result.result, 0);
        assert_eq!(result.driver_status, Some(DriverInstallStatus::Success));
        assert_eq!(result.steps[0].exit_code, Some(5));
        assert_eq!(result.steps[1].exit_code, Some(1));
    }

    #[test]
    fn certificate_failures_still_run_driver_step() {
        let (_, exec, _) = run(&[1, 1, 0]);
        assert_eq!(exec.calls.len(), 3);
    }

    #[test]
    fn invocation_order_is_fixed() {
        let (_, exec, _) = run(&[0, 0, 0]);
        assert_eq!(
            exec.command_lines(),
            vec![
                "certmgr.exe /add TailLight.cer /s /r localMachine root",
                "certmgr.exe /add TailLight.cer /s /r localMachine trustedpublisher",
                "PNPUTIL /add-driver TailLight.inf /install",
            ]
        );
    }

    #[test]
    fn each_exit_code_reported_once_in_order() {
        let (_, _, progress) = run(&[5, 2, 3010]);
        assert_eq!(progress, "Result  5\nResult  2\nResult  3010\n");
    }

    #[test]
    fn reboot_required_is_reported() {
        let (result, _, _) = run(&[0, 0, 3010]);
        assert_eq!(
            result.driver_status,
            Some(DriverInstallStatus::SuccessRebootRequired)
        );
        assert!(result.reboot_required);

        let (result, _, _) = run(&[0, 0, 1641]);
        assert_eq!(
            result.driver_status,
            Some(DriverInstallStatus::SuccessRebootInitiated)
        );
        assert!(!result.reboot_required);
    }

    #[test]
    fn dry_run_executes_nothing() {
        let mut exec = RecordingExecutor::new(&[]);
        let mut progress: Vec<u8> = Vec::new();
        let result =
            cmd_install(&ResolvedConfig::default(), true, &mut exec, &mut progress).unwrap();

        assert!(result.dry_run);
        assert!(exec.calls.is_empty());
        assert!(progress.is_empty());
        assert_eq!(result.steps.len(), 3);
        assert!(result.steps.iter().all(|s| s.exit_code.is_none()));
    }

    #[test]
    fn executor_error_stops_sequence() {
        let mut exec = RecordingExecutor::new(&[0, 0, 0]).fail_on_call(1);
        let mut progress: Vec<u8> = Vec::new();
        let result = cmd_install(&ResolvedConfig::default(), false, &mut exec, &mut progress);

        assert!(result.is_err());
        assert_eq!(exec.calls.len(), 2);
        assert_eq!(String::from_utf8(progress).unwrap(), "Result  0\n");
    }

    #[test]
    fn format_success_variants() {
        let (result, _, _) = run(&[0, 0, 0]);
        insta::assert_snapshot!(format_install_human(&result), @"Driver installed.");

        let (result, _, _) = run(&[0, 0, 3010]);
        insta::assert_snapshot!(format_install_human(&result), @"Driver installed. Reboot required.");

        let (result, _, _) = run(&[0, 0, 1641]);
        insta::assert_snapshot!(format_install_human(&result), @"Driver installed. Reboot initiated.");
    }

    #[test]
    fn format_failure() {
        let (result, _, _) = run(&[0, 0, 1]);
        insta::assert_snapshot!(format_install_human(&result), @"Driver install failed.");
    }

    #[test]
    fn format_dry_run_lists_commands() {
        let mut exec = RecordingExecutor::new(&[]);
        let result =
            cmd_install(&ResolvedConfig::default(), true, &mut exec, &mut Vec::<u8>::new()).unwrap();
        insta::assert_snapshot!(format_install_human(&result), @r"
        Dry run: no changes made.

        Would run in .:
          certmgr.exe /add TailLight.cer /s /r localMachine root
          certmgr.exe /add TailLight.cer /s /r localMachine trustedpublisher
          PNPUTIL /add-driver TailLight.inf /install
        ");
    }

    #[test]
    fn format_plan_one_command_per_line() {
        let result = cmd_plan(&ResolvedConfig::default());
        insta::assert_snapshot!(format_plan_human(&result), @r"
        certmgr.exe /add TailLight.cer /s /r localMachine root
        certmgr.exe /add TailLight.cer /s /r localMachine trustedpublisher
        PNPUTIL /add-driver TailLight.inf /install
        ");
    }

    #[test]
    fn install_result_serializes_snake_case() {
        let (result, _, _) = run(&[0, 0, 3010]);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["result"], 0);
        assert_eq!(json["driver_status"], "success_reboot_required");
        assert_eq!(json["steps"][0]["step"], "root_store");
        assert_eq!(json["steps"][2]["exit_code"], 3010);
        assert_eq!(json["reboot_required"], true);
    }
}

//! The idempotent remote provisioning procedure.
//!
//! [`deploy`] drives one host through the ordered steps below; each step
//! finishes before the next starts and any failure in steps 1–6 aborts the
//! run. [`teardown`] removes what a deploy created.
//!
//! 1. directory reset
//! 2. source sync (clone or pull, decided by [`inspect::repository`])
//! 3. dependency provisioning
//! 4. config rendering
//! 5. container (re)creation
//! 6. proxy activation (validate, then reload)
//! 7. validation (informational)

mod session;

pub use session::{IgnoredFailure, Session};

use serde::Serialize;

use crate::error::{Error, ProxyInvalidDetails, Result};
use crate::executor::RemoteExecutor;
use crate::inspect::{self, RemoteState};
use crate::render;
use crate::target::{DeploymentConfig, ProxyTopology, Runtime};
use crate::utils::{shell, token};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    Inspect,
    DirectoryReset,
    SourceSync,
    Dependencies,
    ConfigRender,
    Containers,
    ProxyActivation,
    Validation,
    Teardown,
}

impl Step {
    pub fn as_str(&self) -> &'static str {
        match self {
            Step::Inspect => "inspect",
            Step::DirectoryReset => "directory-reset",
            Step::SourceSync => "source-sync",
            Step::Dependencies => "dependencies",
            Step::ConfigRender => "config-render",
            Step::Containers => "containers",
            Step::ProxyActivation => "proxy-activation",
            Step::Validation => "validation",
            Step::Teardown => "teardown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncAction {
    Cloned,
    Pulled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContainerAction {
    Created,
    Replaced,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub containers: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ValidationReport {
    pub fn responded(&self) -> bool {
        self.http_status.is_some()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentOutcome {
    pub run_id: String,
    pub host: String,
    pub app_dir: String,
    pub branch: String,
    pub proxy: ProxyTopology,
    pub runtime: Runtime,
    pub source: SyncAction,
    pub containers: ContainerAction,
    pub proxy_reloaded: bool,
    pub config_digest: String,
    pub validation: ValidationReport,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ignored_failures: Vec<IgnoredFailure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_path: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeardownOutcome {
    pub run_id: String,
    pub host: String,
    pub removed: Vec<String>,
    pub proxy_reloaded: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ignored_failures: Vec<IgnoredFailure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_path: Option<String>,
}

/// Run the full deploy procedure against one host.
pub fn deploy<E: RemoteExecutor>(
    config: &DeploymentConfig,
    session: &mut Session<E>,
) -> Result<DeploymentOutcome> {
    session.log().redact(&config.target.auth_token);
    session.log().line(&format!(
        "deploy {} ({}) to {}@{}:{}",
        config.target.repo_url,
        config.target.branch,
        config.target.ssh_user,
        config.target.server_address,
        config.settings.app_dir
    ));

    log_status!("deploy", "Resetting {}", config.settings.app_dir);
    reset_directory(config, session)?;

    log_status!("deploy", "Syncing {} ({})", config.target.repo_url, config.target.branch);
    let source = sync_source(config, session)?;

    log_status!("deploy", "Ensuring Docker and proxy packages");
    ensure_dependencies(config, session)?;

    log_status!("deploy", "Rendering compose and proxy descriptors");
    let rendered = write_configs(config, session)?;

    log_status!("deploy", "Recreating containers ({})", config.settings.runtime);
    let containers = recreate_containers(config, session)?;

    log_status!("deploy", "Validating and reloading proxy");
    let proxy_reloaded = activate_proxy(config, session)?;

    log_status!("deploy", "Probing deployment");
    let validation = validate(config, session);

    session.log().line("deploy complete");

    Ok(DeploymentOutcome {
        run_id: session.run_id(),
        host: session.host(),
        app_dir: config.settings.app_dir.clone(),
        branch: config.target.branch.clone(),
        proxy: config.settings.proxy,
        runtime: config.settings.runtime,
        source,
        containers,
        proxy_reloaded,
        config_digest: rendered.digest(),
        validation,
        ignored_failures: session.ignored_failures(),
        log_path: session.log_path(),
    })
}

/// Step 1: remove and recreate the application directory, owned by the SSH user.
pub fn reset_directory<E: RemoteExecutor>(
    config: &DeploymentConfig,
    session: &mut Session<E>,
) -> Result<()> {
    let dir = shell::quote_path(&config.settings.app_dir);
    let owner = shell::quote_arg(&format!(
        "{}:{}",
        config.target.ssh_user, config.target.ssh_user
    ));

    let mut commands = Vec::new();
    if config.settings.reset_directory {
        commands.push(format!("sudo rm -rf {}", dir));
    }
    commands.push(format!("sudo mkdir -p {}", dir));
    commands.push(format!("sudo chown {} {}", owner, dir));

    session.run(Step::DirectoryReset, &shell::and_then(&commands))?;
    Ok(())
}

/// Step 2: pull when a working tree exists, clone otherwise.
pub fn sync_source<E: RemoteExecutor>(
    config: &DeploymentConfig,
    session: &mut Session<E>,
) -> Result<SyncAction> {
    let dir = shell::quote_path(&config.settings.app_dir);
    let branch = shell::quote_arg(&config.target.branch);

    match inspect::repository(session, Step::SourceSync, config)? {
        RemoteState::Present => {
            let command = format!(
                "cd {dir} && git fetch origin {branch} && git checkout {branch} && git pull origin {branch}"
            );
            session.run(Step::SourceSync, &command)?;
            Ok(SyncAction::Pulled)
        }
        RemoteState::Absent => {
            let url = token::embed_in_url(&config.target.repo_url, &config.target.auth_token);
            let command = format!(
                "git clone --branch {} {} {}",
                branch,
                shell::quote_arg(&url),
                dir
            );
            session.run(Step::SourceSync, &command)?;
            Ok(SyncAction::Cloned)
        }
    }
}

fn ensure_package(check: &str, package: &str) -> String {
    format!(
        "{} >/dev/null 2>&1 || (sudo apt-get update -y && sudo DEBIAN_FRONTEND=noninteractive apt-get install -y {})",
        check,
        shell::quote_arg(package)
    )
}

/// Step 3: install what is missing, start Docker, and let the SSH user talk to it.
pub fn ensure_dependencies<E: RemoteExecutor>(
    config: &DeploymentConfig,
    session: &mut Session<E>,
) -> Result<()> {
    let settings = &config.settings;

    session.run(
        Step::Dependencies,
        &ensure_package("docker --version", &settings.packages.docker),
    )?;

    if settings.runtime == Runtime::Compose {
        let check = format!("{} version", settings.compose_command);
        session.run(
            Step::Dependencies,
            &ensure_package(&check, &settings.packages.compose),
        )?;
    }

    if settings.proxy == ProxyTopology::Host {
        session.run(
            Step::Dependencies,
            &ensure_package("command -v nginx", &settings.packages.proxy),
        )?;
        session.run(Step::Dependencies, "sudo systemctl enable --now nginx")?;
    }

    session.run(Step::Dependencies, "sudo systemctl enable --now docker")?;
    session.run(
        Step::Dependencies,
        &format!(
            "sudo usermod -aG docker {}",
            shell::quote_arg(&config.target.ssh_user)
        ),
    )?;

    Ok(())
}

/// Step 4: render both descriptors and write them into the application directory.
pub fn write_configs<E: RemoteExecutor>(
    config: &DeploymentConfig,
    session: &mut Session<E>,
) -> Result<render::RenderedConfig> {
    let rendered = render::render(&config.render_params()).map_err(|e| session.annotate(e))?;

    session.write_file(Step::ConfigRender, &config.compose_path(), &rendered.compose)?;
    session.write_file(Step::ConfigRender, &config.proxy_path(), &rendered.proxy)?;
    session
        .log()
        .line(&format!("config digest {}", rendered.digest()));

    Ok(rendered)
}

fn compose_prefix(config: &DeploymentConfig) -> String {
    format!(
        "cd {} && {} -p {}",
        shell::quote_path(&config.settings.app_dir),
        config.settings.compose_command,
        shell::quote_arg(&config.settings.project_name)
    )
}

fn image_tag(config: &DeploymentConfig) -> String {
    format!("{}:latest", config.settings.container_name)
}

/// Step 5: tear down whatever runs under this project, then build and start fresh.
pub fn recreate_containers<E: RemoteExecutor>(
    config: &DeploymentConfig,
    session: &mut Session<E>,
) -> Result<ContainerAction> {
    let existing = inspect::container(session, Step::Containers, config)?;
    let name = shell::quote_arg(&config.settings.container_name);

    match config.settings.runtime {
        Runtime::Compose => {
            let prefix = compose_prefix(config);
            // `down` on a project that never started is expected to fail.
            session.run_ignoring_failure(
                Step::Containers,
                &format!("{} down --remove-orphans", prefix),
            );
            session.run(Step::Containers, &format!("{} up -d --build", prefix))?;
        }
        Runtime::DockerRun => {
            // docker run refuses to reuse a name, unlike compose.
            if existing.is_present() {
                session.run(Step::Containers, &format!("docker rm -f {}", name))?;
            }
            let tag = shell::quote_arg(&image_tag(config));
            session.run(
                Step::Containers,
                &format!(
                    "cd {} && docker build -t {} .",
                    shell::quote_path(&config.settings.app_dir),
                    tag
                ),
            )?;
            let port = config.target.app_port;
            session.run(
                Step::Containers,
                &format!(
                    "docker run -d --name {} --restart unless-stopped -p {}:{} {}",
                    name, port, port, tag
                ),
            )?;
        }
    }

    Ok(match existing {
        RemoteState::Present => ContainerAction::Replaced,
        RemoteState::Absent => ContainerAction::Created,
    })
}

fn backup_path(site: &str) -> String {
    format!("{}.dockhand-bak", site)
}

/// Step 6: validate the proxy config and reload only when it passes.
pub fn activate_proxy<E: RemoteExecutor>(
    config: &DeploymentConfig,
    session: &mut Session<E>,
) -> Result<bool> {
    match config.settings.proxy {
        ProxyTopology::Host => activate_host_proxy(config, session),
        ProxyTopology::Container => activate_container_proxy(config, session),
    }
}

fn activate_host_proxy<E: RemoteExecutor>(
    config: &DeploymentConfig,
    session: &mut Session<E>,
) -> Result<bool> {
    let site_path = config.site_available_path();
    let site = shell::quote_path(&site_path);
    let enabled = shell::quote_path(&config.site_enabled_path());
    let backup = shell::quote_path(&backup_path(&site_path));
    let default_site = shell::quote_path(&format!(
        "{}/default",
        config.settings.nginx.sites_enabled
    ));

    session.run(
        Step::ProxyActivation,
        &format!(
            "if [ -f {site} ]; then sudo cp {site} {backup}; else sudo rm -f {backup}; fi"
        ),
    )?;
    session.run(
        Step::ProxyActivation,
        &format!(
            "sudo cp {} {site} && sudo ln -sf {site} {enabled} && sudo rm -f {default_site}",
            shell::quote_path(&config.proxy_path())
        ),
    )?;

    let test = session.check(Step::ProxyActivation, "sudo nginx -t")?;
    if !test.success {
        let restore = session.run_ignoring_failure(
            Step::ProxyActivation,
            &format!(
                "if [ -f {backup} ]; then sudo mv {backup} {site}; else sudo rm -f {site} {enabled}; fi"
            ),
        );
        let err = Error::provision_proxy_invalid(ProxyInvalidDetails {
            config_path: site_path,
            output: session.log().scrub(&test.combined()),
            restored_previous: restore.success,
        });
        return Err(session.annotate(err));
    }

    session.run(Step::ProxyActivation, "sudo systemctl reload nginx")?;
    session.run_ignoring_failure(Step::ProxyActivation, &format!("sudo rm -f {}", backup));
    Ok(true)
}

fn activate_container_proxy<E: RemoteExecutor>(
    config: &DeploymentConfig,
    session: &mut Session<E>,
) -> Result<bool> {
    let exec = format!(
        "{} exec -T {}",
        compose_prefix(config),
        render::PROXY_SERVICE
    );

    let test = session.check(Step::ProxyActivation, &format!("{} nginx -t", exec))?;
    if !test.success {
        let err = Error::provision_proxy_invalid(ProxyInvalidDetails {
            config_path: config.proxy_path(),
            output: session.log().scrub(&test.combined()),
            restored_previous: false,
        });
        return Err(session.annotate(err));
    }

    session.run(Step::ProxyActivation, &format!("{} nginx -s reload", exec))?;
    Ok(true)
}

/// URL probed after a deploy: the proxy on port 80, which exercises the full request path.
pub const PROBE_URL: &str = "http://localhost/";

/// Step 7: informational only. Never fails the run.
pub fn validate<E: RemoteExecutor>(
    _config: &DeploymentConfig,
    session: &mut Session<E>,
) -> ValidationReport {
    let mut report = ValidationReport {
        url: PROBE_URL.to_string(),
        ..Default::default()
    };

    let ps = session.probe(
        Step::Validation,
        &format!(
            "docker ps --format {}",
            shell::quote_arg("{{.Names}}\t{{.Status}}\t{{.Ports}}")
        ),
    );
    if ps.success {
        report.containers = Some(ps.stdout.trim_end().to_string());
    } else {
        report.error = Some(format!("docker ps failed: {}", ps.combined()));
    }

    let curl = session.probe(
        Step::Validation,
        &format!(
            "curl -s -o /dev/null -w {} --max-time 10 {}",
            shell::quote_arg("%{http_code}"),
            PROBE_URL
        ),
    );
    match curl.stdout.trim().parse::<u16>() {
        Ok(status) if status > 0 => report.http_status = Some(status),
        _ => {
            let reason = format!("no HTTP response from {} (exit {})", PROBE_URL, curl.exit_code);
            report.error = Some(match report.error.take() {
                Some(previous) => format!("{}; {}", previous, reason),
                None => reason,
            });
        }
    }

    match (report.http_status, &report.error) {
        (Some(status), _) => log_status!("deploy", "{} answered HTTP {}", PROBE_URL, status),
        (None, Some(error)) => log_status!("deploy", "Validation: {}", error),
        (None, None) => {}
    }

    report
}

/// Remove containers, unused images and volumes, the application directory,
/// and the proxy files this tool installed.
pub fn teardown<E: RemoteExecutor>(
    config: &DeploymentConfig,
    session: &mut Session<E>,
) -> Result<TeardownOutcome> {
    let settings = &config.settings;
    session.log().line(&format!(
        "teardown {} on {}@{}",
        settings.app_dir, config.target.ssh_user, config.target.server_address
    ));
    let mut removed = Vec::new();

    log_status!("teardown", "Stopping containers");
    match settings.runtime {
        Runtime::Compose => {
            // Fails when the directory or the project does not exist; both mean nothing to stop.
            session.run_ignoring_failure(
                Step::Teardown,
                &format!("{} down --remove-orphans --volumes", compose_prefix(config)),
            );
        }
        Runtime::DockerRun => {
            session.run_ignoring_failure(
                Step::Teardown,
                &format!("docker rm -f {}", shell::quote_arg(&settings.container_name)),
            );
        }
    }

    log_status!("teardown", "Pruning unused images and volumes");
    session.run(
        Step::Teardown,
        "if command -v docker >/dev/null 2>&1; then docker image prune -af && docker volume prune -f; fi",
    )?;

    log_status!("teardown", "Removing {}", settings.app_dir);
    session.run(
        Step::Teardown,
        &format!("sudo rm -rf {}", shell::quote_path(&settings.app_dir)),
    )?;
    removed.push(settings.app_dir.clone());

    let mut proxy_reloaded = false;
    if settings.proxy == ProxyTopology::Host {
        let site = config.site_available_path();
        let enabled = config.site_enabled_path();
        let backup = backup_path(&site);
        session.run(
            Step::Teardown,
            &format!(
                "sudo rm -f {} {} {}",
                shell::quote_path(&enabled),
                shell::quote_path(&site),
                shell::quote_path(&backup)
            ),
        )?;
        removed.push(enabled);
        removed.push(site);

        log_status!("teardown", "Reloading nginx");
        let reload = session.run(
            Step::Teardown,
            "if command -v nginx >/dev/null 2>&1; then sudo nginx -t && sudo systemctl reload nginx && echo reloaded; fi",
        )?;
        proxy_reloaded = reload.stdout.trim() == "reloaded";
    }

    session.log().line("teardown complete");

    Ok(TeardownOutcome {
        run_id: session.run_id(),
        host: session.host(),
        removed,
        proxy_reloaded,
        ignored_failures: session.ignored_failures(),
        log_path: session.log_path(),
    })
}

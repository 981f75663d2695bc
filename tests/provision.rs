use dockhand::defaults::builtin_defaults;
use dockhand::error::TargetDetails;
use dockhand::executor::RemoteExecutor;
use dockhand::provision::{self, ContainerAction, Session, SyncAction};
use dockhand::run_log::RunLog;
use dockhand::ssh::CommandOutput;
use dockhand::target::{DeploymentConfig, ProxyTopology, Runtime, TargetInput};
use dockhand::ErrorCode;
use std::cell::RefCell;
use std::collections::BTreeMap;

/// A host that answers from a script and remembers everything it was asked.
#[derive(Default)]
struct FakeHost {
    rules: Vec<(String, CommandOutput)>,
    commands: RefCell<Vec<String>>,
    files: RefCell<BTreeMap<String, String>>,
}

impl FakeHost {
    fn on(mut self, pattern: &str, output: CommandOutput) -> Self {
        self.rules.push((pattern.to_string(), output));
        self
    }

    fn commands(&self) -> Vec<String> {
        self.commands.borrow().clone()
    }

    fn ran(&self, needle: &str) -> bool {
        self.commands.borrow().iter().any(|c| c.contains(needle))
    }

    fn position(&self, needle: &str) -> usize {
        self.commands
            .borrow()
            .iter()
            .position(|c| c.contains(needle))
            .unwrap_or_else(|| panic!("no command containing {:?}", needle))
    }

    fn file(&self, path: &str) -> String {
        self.files
            .borrow()
            .get(path)
            .cloned()
            .unwrap_or_else(|| panic!("{} was never written", path))
    }
}

impl RemoteExecutor for FakeHost {
    fn execute(&self, command: &str) -> CommandOutput {
        self.commands.borrow_mut().push(command.to_string());
        self.rules
            .iter()
            .find(|(pattern, _)| command.contains(pattern.as_str()))
            .map(|(_, output)| output.clone())
            .unwrap_or_else(|| CommandOutput::ok(""))
    }

    fn write_file(&self, remote_path: &str, content: &str) -> CommandOutput {
        self.files
            .borrow_mut()
            .insert(remote_path.to_string(), content.to_string());
        CommandOutput::ok("")
    }

    fn target(&self) -> TargetDetails {
        TargetDetails {
            host: "203.0.113.10".to_string(),
            user: "deploy".to_string(),
        }
    }
}

fn input() -> TargetInput {
    TargetInput {
        repo_url: Some("https://github.com/acme/shop.git".to_string()),
        auth_token: Some("ghp_s3cret".to_string()),
        ssh_user: Some("deploy".to_string()),
        server_address: Some("203.0.113.10".to_string()),
        ssh_key_path: Some("/keys/id_ed25519".to_string()),
        app_port: Some(8080),
        ..Default::default()
    }
}

fn config(input: TargetInput) -> DeploymentConfig {
    input.resolve(&builtin_defaults()).unwrap()
}

fn session(host: &FakeHost) -> Session<&FakeHost> {
    Session::new(host, RunLog::disabled())
}

const REPO_PRESENT: &str = "/.git'";
const CONTAINER_CHECK: &str = "docker ps -a --filter";

#[test]
fn fresh_host_clones_and_runs_every_step_in_order() {
    let host = FakeHost::default().on("curl -s", CommandOutput::ok("200"));
    let config = config(input());

    let outcome = provision::deploy(&config, &mut session(&host)).unwrap();

    assert_eq!(outcome.source, SyncAction::Cloned);
    assert_eq!(outcome.containers, ContainerAction::Created);
    assert!(outcome.proxy_reloaded);
    assert_eq!(outcome.validation.http_status, Some(200));
    assert_eq!(outcome.branch, "main");

    let order = [
        "sudo rm -rf '/home/deploy/app'",
        "git clone --branch main",
        "apt-get install -y docker.io",
        "up -d --build",
        "sudo nginx -t",
        "sudo systemctl reload nginx",
        "curl -s",
    ];
    let positions: Vec<usize> = order.iter().map(|c| host.position(c)).collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]), "{:?}", host.commands());
}

#[test]
fn existing_working_tree_is_pulled_not_cloned() {
    let host = FakeHost::default()
        .on(REPO_PRESENT, CommandOutput::ok("present\n"))
        .on("curl -s", CommandOutput::ok("200"));
    let config = config(TargetInput {
        branch: Some("release".to_string()),
        reset_directory: Some(false),
        ..input()
    });

    let outcome = provision::deploy(&config, &mut session(&host)).unwrap();

    assert_eq!(outcome.source, SyncAction::Pulled);
    assert!(host.ran("git fetch origin release && git checkout release && git pull origin release"));
    assert!(!host.ran("git clone"));
    assert!(!host.ran("sudo rm -rf"));
}

#[test]
fn rendered_descriptors_are_identical_across_runs() {
    let config = config(input());
    let first = FakeHost::default();
    let second = FakeHost::default();

    let a = provision::deploy(&config, &mut session(&first)).unwrap();
    let b = provision::deploy(&config, &mut session(&second)).unwrap();

    assert_eq!(a.config_digest, b.config_digest);
    assert_eq!(
        first.file("/home/deploy/app/docker-compose.yml"),
        second.file("/home/deploy/app/docker-compose.yml")
    );
    assert_eq!(
        first.file("/home/deploy/app/nginx.conf"),
        second.file("/home/deploy/app/nginx.conf")
    );
}

#[test]
fn host_proxy_targets_localhost_port() {
    let host = FakeHost::default();
    let config = config(input());

    provision::deploy(&config, &mut session(&host)).unwrap();

    let nginx = host.file("/home/deploy/app/nginx.conf");
    assert!(nginx.contains("proxy_pass http://localhost:8080;"));
    assert!(nginx.contains("proxy_set_header X-Forwarded-Proto $scheme;"));

    let compose: serde_yml::Value =
        serde_yml::from_str(&host.file("/home/deploy/app/docker-compose.yml")).unwrap();
    assert_eq!(
        compose["services"]["app"]["ports"][0].as_str(),
        Some("8080:8080")
    );
    assert!(compose["services"].get("nginx").is_none());
}

#[test]
fn container_proxy_targets_service_name() {
    let host = FakeHost::default();
    let config = config(TargetInput {
        proxy: Some(ProxyTopology::Container),
        ..input()
    });

    provision::deploy(&config, &mut session(&host)).unwrap();

    let nginx = host.file("/home/deploy/app/nginx.conf");
    assert!(nginx.contains("proxy_pass http://app:8080;"));

    let compose: serde_yml::Value =
        serde_yml::from_str(&host.file("/home/deploy/app/docker-compose.yml")).unwrap();
    assert_eq!(compose["services"]["nginx"]["ports"][0].as_str(), Some("80:80"));
    assert!(compose["services"]["app"].get("ports").is_none());
    assert!(host.ran("exec -T nginx nginx -t"));
    assert!(host.ran("exec -T nginx nginx -s reload"));
    assert!(!host.ran("apt-get install -y nginx"));
}

#[test]
fn failed_proxy_check_restores_and_never_reloads() {
    let host = FakeHost::default().on(
        "sudo nginx -t",
        CommandOutput::failed(1, "nginx: [emerg] unexpected \"}\" in /etc/nginx/sites-enabled/myapp:9"),
    );
    let config = config(input());

    let err = provision::deploy(&config, &mut session(&host)).unwrap_err();

    assert_eq!(err.code, ErrorCode::ProvisionProxyInvalid);
    assert_eq!(err.details["restoredPrevious"], true);
    assert!(err.details["output"].as_str().unwrap().contains("emerg"));
    assert!(host.ran("sudo mv '/etc/nginx/sites-available/myapp.dockhand-bak'"));
    assert!(!host.ran("systemctl reload nginx"));
    assert!(!host.ran("curl -s"));
}

#[test]
fn never_started_stack_does_not_fail_the_deploy() {
    let host = FakeHost::default().on(
        "down --remove-orphans",
        CommandOutput::failed(1, "no configuration file provided: not found"),
    );
    let config = config(input());

    let outcome = provision::deploy(&config, &mut session(&host)).unwrap();

    assert_eq!(outcome.ignored_failures.len(), 1);
    assert_eq!(outcome.ignored_failures[0].step, "containers");
    assert!(host.ran("up -d --build"));
}

#[test]
fn docker_run_replaces_existing_container() {
    let host = FakeHost::default().on(CONTAINER_CHECK, CommandOutput::ok("myapp\n"));
    let config = config(TargetInput {
        runtime: Some(Runtime::DockerRun),
        ..input()
    });

    let outcome = provision::deploy(&config, &mut session(&host)).unwrap();

    assert_eq!(outcome.containers, ContainerAction::Replaced);
    assert!(host.position("docker rm -f myapp") < host.position("docker build -t myapp:latest ."));
    assert!(host.ran("docker run -d --name myapp --restart unless-stopped -p 8080:8080 myapp:latest"));
    assert!(!host.ran("docker-compose"));
}

#[test]
fn container_proxy_check_failure_never_reloads() {
    let host = FakeHost::default().on(
        "exec -T nginx nginx -t",
        CommandOutput::failed(1, "nginx: [emerg] invalid number of arguments in \"proxy_pass\""),
    );
    let config = config(TargetInput {
        proxy: Some(ProxyTopology::Container),
        ..input()
    });

    let err = provision::deploy(&config, &mut session(&host)).unwrap_err();

    assert_eq!(err.code, ErrorCode::ProvisionProxyInvalid);
    assert_eq!(err.details["configPath"], "/home/deploy/app/nginx.conf");
    assert_eq!(err.details["restoredPrevious"], false);
    assert!(err.details["output"].as_str().unwrap().contains("emerg"));
    assert!(!host.ran("nginx -s reload"));
    assert!(!host.ran("curl -s"));
}

#[test]
fn docker_run_fresh_host_creates_without_rm() {
    let host = FakeHost::default();
    let config = config(TargetInput {
        runtime: Some(Runtime::DockerRun),
        ..input()
    });

    let outcome = provision::deploy(&config, &mut session(&host)).unwrap();

    assert_eq!(outcome.containers, ContainerAction::Created);
    assert!(!host.ran("docker rm -f"));
    assert!(host.position("docker build -t myapp:latest .") < host.position("docker run -d --name myapp"));
}

#[test]
fn unreachable_app_is_reported_not_raised() {
    let host = FakeHost::default().on("curl -s", CommandOutput::failed(7, ""));
    let config = config(input());

    let outcome = provision::deploy(&config, &mut session(&host)).unwrap();

    assert_eq!(outcome.validation.http_status, None);
    assert!(outcome.validation.error.as_deref().unwrap().contains("http://localhost/"));
}

#[test]
fn clone_failure_never_leaks_the_token() {
    let host = FakeHost::default().on(
        "git clone",
        CommandOutput::failed(128, "fatal: Authentication failed for 'https://ghp_s3cret@github.com/acme/shop.git/'"),
    );
    let config = config(input());
    let mut session = session(&host);
    session.log().redact(&config.target.auth_token);

    let err = provision::deploy(&config, &mut session).unwrap_err();

    assert_eq!(err.code, ErrorCode::RemoteCommandFailed);
    assert_eq!(err.details["step"], "source-sync");
    let rendered = err.details.to_string();
    assert!(!rendered.contains("ghp_s3cret"));
    assert!(rendered.contains("https://***@github.com/acme/shop.git"));
}

#[test]
fn refused_connection_is_an_ssh_error() {
    let host = FakeHost::default().on(
        "sudo mkdir -p",
        CommandOutput::failed(255, "ssh: connect to host 203.0.113.10 port 22: Connection refused"),
    );
    let config = config(input());

    let err = provision::deploy(&config, &mut session(&host)).unwrap_err();

    assert_eq!(err.code, ErrorCode::SshConnectFailed);
    assert_eq!(host.commands().len(), 1);
}

#[test]
fn any_ssh_exit_255_is_an_ssh_error() {
    let host = FakeHost::default().on(
        "sudo mkdir -p",
        CommandOutput::failed(255, "Received disconnect from 203.0.113.10 port 22:2: Too many authentication failures"),
    );
    let config = config(input());

    let err = provision::deploy(&config, &mut session(&host)).unwrap_err();

    assert_eq!(err.code, ErrorCode::SshConnectFailed);
    assert_eq!(err.retryable, Some(true));
}

#[test]
fn docker_socket_denied_points_at_group_membership() {
    let host = FakeHost::default().on(
        "up -d --build",
        CommandOutput::failed(
            1,
            "permission denied while trying to connect to the Docker daemon socket at unix:///var/run/docker.sock",
        ),
    );
    let config = config(input());

    let err = provision::deploy(&config, &mut session(&host)).unwrap_err();

    assert_eq!(err.code, ErrorCode::RemoteCommandFailed);
    assert_eq!(err.details["step"], "containers");
    assert!(err
        .hints
        .iter()
        .any(|h| h.message.contains("docker group") && h.message.contains("deploy")));
}

#[test]
fn teardown_of_never_started_stack_succeeds() {
    let host = FakeHost::default()
        .on("down --remove-orphans --volumes", CommandOutput::failed(1, "no such file or directory"))
        .on("sudo nginx -t", CommandOutput::ok("reloaded\n"));
    let config = config(input());

    let outcome = provision::teardown(&config, &mut session(&host)).unwrap();

    assert_eq!(outcome.ignored_failures.len(), 1);
    assert!(outcome.proxy_reloaded);
    assert!(outcome.removed.contains(&"/home/deploy/app".to_string()));
    assert!(outcome.removed.contains(&"/etc/nginx/sites-available/myapp".to_string()));
    assert!(host.ran("docker image prune -af && docker volume prune -f"));
}

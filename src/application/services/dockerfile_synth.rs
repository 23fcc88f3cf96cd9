use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{Result, VersionGateError};

pub const SENTINEL: &str = "# VersionGate:auto-generated";

/// Detects a project's runtime from files on disk and, when no
/// hand-written Dockerfile exists, writes one. Mirrors the detection
/// cascade a remote-tree-based detector would use, but walks a local
/// checkout and actually emits the Dockerfile rather than just naming a
/// runtime.
pub struct DockerfileSynthesizer;

impl DockerfileSynthesizer {
    pub fn new() -> Self {
        DockerfileSynthesizer
    }

    /// Returns the directory that should be used as the build context,
    /// which may differ from `configured_context` if detection had to
    /// climb to the repo root or a subdirectory.
    pub async fn synthesize(
        &self,
        repo_root: &Path,
        configured_context: &str,
    ) -> Result<PathBuf> {
        let configured_dir = repo_root.join(configured_context);
        let existing = configured_dir.join("Dockerfile");
        if existing.exists() && !starts_with_sentinel(&existing).await {
            info!(dir = %configured_dir.display(), "using existing hand-written Dockerfile");
            return Ok(configured_dir);
        }

        let mut candidates = vec![configured_dir.clone()];
        if configured_dir != repo_root {
            candidates.push(repo_root.to_path_buf());
        }
        if let Ok(mut entries) = tokio::fs::read_dir(repo_root).await {
            while let Ok(Some(entry)) = entries.next_entry().await {
                let path = entry.path();
                if !path.is_dir() {
                    continue;
                }
                let name = entry.file_name();
                let name = name.to_string_lossy();
                if name.starts_with('.') || name == "node_modules" {
                    continue;
                }
                candidates.push(path);
            }
        }

        for dir in candidates {
            if let Some(template) = detect_template(&dir).await {
                write_dockerfile(&dir, &template).await?;
                info!(dir = %dir.display(), runtime = template.name, "synthesized Dockerfile");
                return Ok(dir);
            }
        }

        Err(VersionGateError::UndetectableProjectType)
    }
}

async fn starts_with_sentinel(dockerfile: &Path) -> bool {
    match tokio::fs::read_to_string(dockerfile).await {
        Ok(content) => content.lines().next() == Some(SENTINEL),
        Err(_) => false,
    }
}

struct Template {
    name: &'static str,
    body: String,
}

async fn detect_template(dir: &Path) -> Option<Template> {
    if dir.join("package.json").is_file() {
        return Some(detect_node(dir).await);
    }
    if dir.join("requirements.txt").is_file() {
        return Some(Template {
            name: "python",
            body: python_template(),
        });
    }
    if dir.join("go.mod").is_file() {
        return Some(Template {
            name: "go",
            body: go_template(),
        });
    }
    None
}

async fn detect_node(dir: &Path) -> Template {
    let package_json = tokio::fs::read_to_string(dir.join("package.json"))
        .await
        .unwrap_or_default();

    let scripts_mention_bun = package_json.contains("\"bun ") || package_json.contains("bunx ");

    let manager = if scripts_mention_bun {
        "bun"
    } else if dir.join("bun.lockb").is_file() {
        "bun"
    } else if dir.join("yarn.lock").is_file() {
        "yarn"
    } else if dir.join("pnpm-lock.yaml").is_file() {
        "pnpm"
    } else {
        "npm"
    };

    let has_build_script = package_json.contains("\"build\"");

    Template {
        name: "node",
        body: node_template(manager, has_build_script),
    }
}

fn node_template(manager: &str, has_build_script: bool) -> String {
    let (install, build, run) = match manager {
        "bun" => ("bun install", "bun run build", "bun run start"),
        "yarn" => ("yarn install --frozen-lockfile", "yarn build", "yarn start"),
        "pnpm" => ("pnpm install --frozen-lockfile", "pnpm build", "pnpm start"),
        _ => ("npm install", "npm run build", "npm start"),
    };

    let build_step = if has_build_script {
        format!("RUN {}\n", build)
    } else {
        String::new()
    };

    format!(
        "{sentinel}\nFROM node:20-slim\nWORKDIR /app\nCOPY . .\nRUN {install}\n{build_step}EXPOSE 8080\nCMD {run:?}\n",
        sentinel = SENTINEL,
        install = install,
        build_step = build_step,
        run = shell_cmd(run),
    )
}

fn python_template() -> String {
    format!(
        "{sentinel}\nFROM python:3.11-slim\nWORKDIR /app\nCOPY . .\nRUN pip install --no-cache-dir -r requirements.txt\nEXPOSE 8080\nCMD {run:?}\n",
        sentinel = SENTINEL,
        run = shell_cmd("python main.py"),
    )
}

fn go_template() -> String {
    format!(
        "{sentinel}\nFROM golang:1.22 AS build\nWORKDIR /app\nCOPY . .\nRUN go build -o /app/bin/app .\n\nFROM debian:bookworm-slim\nCOPY --from=build /app/bin/app /app/bin/app\nEXPOSE 8080\nCMD {run:?}\n",
        sentinel = SENTINEL,
        run = shell_cmd("/app/bin/app"),
    )
}

fn shell_cmd(command: &str) -> Vec<String> {
    vec!["/bin/sh".to_string(), "-c".to_string(), command.to_string()]
}

async fn write_dockerfile(dir: &Path, template: &Template) -> Result<()> {
    tokio::fs::write(dir.join("Dockerfile"), &template.body)
        .await
        .map_err(|e| VersionGateError::Internal(anyhow::anyhow!(e)))?;
    Ok(())
}

//! Provider for files fetched from a URL.
//!
//! Downloads stream into `<target>.part` while being hashed, and only move
//! into place once the checksum (if any) matches. Zip archives are
//! extracted into a directory named after the target.

use anyhow::{bail, Context};
use chrono::Utc;
use reqwest::blocking::Client;
use serde_json::{json, Value};
use sha2::digest::DynDigest;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use super::{ConfigChoice, ProvideContext, Provider, StatusContext, UnprovideContext};
use crate::requirements::{
    DownloadSpec, HashAlgorithm, Requirement, RequirementKind, RequirementStatus, Status,
};
use crate::state::{LocalStateFile, RunState};

/// Source of download bytes.
pub trait Fetch {
    /// Stream the body at `url` into `writer`, returning the byte count.
    ///
    /// Non-success HTTP statuses are errors.
    fn fetch(&self, url: &str, writer: &mut dyn Write) -> anyhow::Result<u64>;
}

/// Fetches over HTTP/HTTPS.
pub struct HttpFetcher {
    client: Client,
    timeout: Duration,
}

impl HttpFetcher {
    /// Create a fetcher with a 5 minute timeout.
    pub fn new() -> anyhow::Result<Self> {
        Self::with_timeout(Duration::from_secs(300))
    }

    /// Create a fetcher with a custom timeout.
    pub fn with_timeout(timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("prepkit/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client, timeout })
    }

    /// The configured timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Fetch for HttpFetcher {
    fn fetch(&self, url: &str, writer: &mut dyn Write) -> anyhow::Result<u64> {
        let mut response = self.client.get(url).send()?;

        if !response.status().is_success() {
            bail!("HTTP {} fetching {}", response.status(), url);
        }

        let written = io::copy(&mut response, writer)?;
        Ok(written)
    }
}

fn hasher_for(algorithm: HashAlgorithm) -> Box<dyn DynDigest> {
    match algorithm {
        HashAlgorithm::Md5 => Box::new(md5::Md5::default()),
        HashAlgorithm::Sha1 => Box::new(sha1::Sha1::default()),
        HashAlgorithm::Sha224 => Box::new(sha2::Sha224::default()),
        HashAlgorithm::Sha256 => Box::new(sha2::Sha256::default()),
        HashAlgorithm::Sha384 => Box::new(sha2::Sha384::default()),
        HashAlgorithm::Sha512 => Box::new(sha2::Sha512::default()),
    }
}

/// Writes through to a file while feeding a digest.
struct HashingWriter {
    file: File,
    digest: Option<Box<dyn DynDigest>>,
}

impl Write for HashingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.file.write(buf)?;
        if let Some(digest) = self.digest.as_mut() {
            digest.update(&buf[..written]);
        }
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

fn append_extension(path: &Path, extension: &str) -> PathBuf {
    let mut os = path.as_os_str().to_os_string();
    os.push(extension);
    PathBuf::from(os)
}

/// Extract `archive` into `dest`.
///
/// When every entry sits under one top-level directory, that directory is
/// stripped so its contents land directly in `dest`.
fn unzip_into(archive: &Path, dest: &Path) -> anyhow::Result<()> {
    let file = File::open(archive)?;
    let mut zip = zip::ZipArchive::new(file)?;

    let mut names = Vec::with_capacity(zip.len());
    for i in 0..zip.len() {
        let entry = zip.by_index(i)?;
        let Some(name) = entry.enclosed_name() else {
            bail!("archive entry '{}' has an unsafe path", entry.name());
        };
        names.push((name, entry.is_dir()));
    }

    let first_component = |p: &Path| {
        p.components().next().and_then(|c| match c {
            Component::Normal(s) => Some(s.to_os_string()),
            _ => None,
        })
    };
    let strip = match names.first().and_then(|(p, _)| first_component(p)) {
        Some(top)
            if names.iter().all(|(p, is_dir)| {
                first_component(p).as_ref() == Some(&top) && (p.components().count() > 1 || *is_dir)
            }) =>
        {
            Some(PathBuf::from(top))
        }
        _ => None,
    };

    fs::create_dir_all(dest)?;
    for (i, (name, is_dir)) in names.iter().enumerate() {
        let relative = match &strip {
            Some(top) => name.strip_prefix(top).unwrap_or(name).to_path_buf(),
            None => name.clone(),
        };
        if relative.as_os_str().is_empty() {
            continue;
        }
        let out = dest.join(&relative);
        if *is_dir {
            fs::create_dir_all(&out)?;
            continue;
        }
        if let Some(parent) = out.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut entry = zip.by_index(i)?;
        let mut target = File::create(&out)?;
        io::copy(&mut entry, &mut target)?;
    }
    Ok(())
}

/// Fetches files into the project directory.
pub struct DownloadProvider {
    fetcher: Box<dyn Fetch>,
}

impl DownloadProvider {
    pub fn new(fetcher: Box<dyn Fetch>) -> Self {
        Self { fetcher }
    }

    fn spec(requirement: &Requirement) -> Option<&DownloadSpec> {
        match &requirement.kind {
            RequirementKind::Download(spec) => Some(spec),
            _ => None,
        }
    }

    /// Where the file lives: the recorded filename if a previous provide
    /// stored one, else the declared filename.
    fn target_path(
        spec: &DownloadSpec,
        env_var: &str,
        local_state: &LocalStateFile,
        project_dir: &Path,
    ) -> PathBuf {
        let run_state = local_state.get_service_run_state(env_var);
        let filename = run_state
            .get("filename")
            .and_then(Value::as_str)
            .unwrap_or(&spec.filename);
        project_dir.join(filename)
    }

    fn resolve_user_path(value: &str, project_dir: &Path) -> PathBuf {
        let path = PathBuf::from(value);
        if path.is_absolute() {
            path
        } else {
            project_dir.join(path)
        }
    }

    /// Fetch, verify and (optionally) extract into `target`.
    fn download(&self, spec: &DownloadSpec, target: &Path) -> Result<(), String> {
        let stored = if spec.unzip {
            append_extension(target, ".zip")
        } else {
            target.to_path_buf()
        };
        let partial = append_extension(&stored, ".part");

        if let Some(parent) = partial.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Error downloading {}: {}", spec.url, e))?;
        }

        tracing::info!("Downloading {} to {}", spec.url, stored.display());
        let fetched = File::create(&partial)
            .context("Failed to create download file")
            .and_then(|file| {
                let mut writer = HashingWriter {
                    file,
                    digest: spec.checksum.as_ref().map(|c| hasher_for(c.algorithm)),
                };
                self.fetcher.fetch(&spec.url, &mut writer)?;
                writer.flush()?;
                Ok(writer.digest.map(|d| hex::encode(d.finalize())))
            });

        let calculated = match fetched {
            Ok(calculated) => calculated,
            Err(e) => {
                let _ = fs::remove_file(&partial);
                tracing::warn!("Download of {} failed: {}", spec.url, e);
                return Err(format!("Error downloading {}: {}", spec.url, e));
            }
        };

        if let (Some(expected), Some(calculated)) = (&spec.checksum, calculated) {
            if !expected.value.eq_ignore_ascii_case(&calculated) {
                let _ = fs::remove_file(&partial);
                return Err(format!(
                    "Error downloading {}: mismatched hashes. Expected: {}, calculated: {}",
                    spec.url, expected.value, calculated
                ));
            }
        }

        fs::rename(&partial, &stored)
            .map_err(|e| format!("Error downloading {}: {}", spec.url, e))?;

        if spec.unzip {
            let extracted = unzip_into(&stored, target);
            let _ = fs::remove_file(&stored);
            if let Err(e) = extracted {
                let _ = fs::remove_dir_all(target);
                return Err(format!("Failed to unzip {}: {}", stored.display(), e));
            }
        }
        Ok(())
    }
}

impl Provider for DownloadProvider {
    fn kind(&self) -> &str {
        "download"
    }

    fn check_status(
        &self,
        requirement: &Requirement,
        ctx: &StatusContext<'_>,
    ) -> RequirementStatus {
        let Some(spec) = Self::spec(requirement) else {
            return RequirementStatus::unsatisfied(requirement, "Not a download requirement.");
        };
        let target = Self::target_path(spec, &requirement.env_var, ctx.local_state, ctx.project_dir);
        let environ_path = ctx
            .environ
            .get(&requirement.env_var)
            .filter(|v| !v.is_empty())
            .map(|v| Self::resolve_user_path(v, ctx.project_dir))
            .filter(|p| p.exists());

        let analysis = json!({
            "path": target.to_string_lossy(),
            "url": spec.url,
        });

        let found = environ_path.or_else(|| target.exists().then(|| target.clone()));
        let status = match found {
            Some(path) => RequirementStatus::satisfied(
                requirement,
                format!("File downloaded to {}", path.display()),
            ),
            None => RequirementStatus::unsatisfied(requirement, requirement.title()),
        };
        status.with_analysis(analysis)
    }

    fn configuration_choices(&self, status: &RequirementStatus) -> Vec<ConfigChoice> {
        let url = status.analysis["url"].as_str().unwrap_or_default();
        vec![
            ConfigChoice::new("download", format!("Download {}", url)).default_selected(true),
            ConfigChoice::new("use_existing", "Use an already-downloaded file at:")
                .with_value(false),
        ]
    }

    fn provide(
        &self,
        ctx: &mut ProvideContext<'_>,
        status: &RequirementStatus,
    ) -> RequirementStatus {
        let requirement = &status.requirement;
        let Some(spec) = Self::spec(requirement) else {
            return status.clone();
        };
        let name = requirement.env_var.as_str();

        if ctx.overrides.option_for(name) == Some("use_existing") {
            if let Some(value) = ctx.overrides.value_for(name) {
                let path = Self::resolve_user_path(value, ctx.project_dir);
                if !path.exists() {
                    return self
                        .check_status(requirement, &ctx.status_context())
                        .with_errors(vec![format!("File not found: {}", path.display())]);
                }
                ctx.environ
                    .insert(name.to_string(), path.to_string_lossy().to_string());
                return self.check_status(requirement, &ctx.status_context());
            }
        }

        let current = self.check_status(requirement, &ctx.status_context());
        if current.is_satisfied() {
            if !ctx.environ.get(name).is_some_and(|v| !v.is_empty()) {
                let target =
                    Self::target_path(spec, name, ctx.local_state, ctx.project_dir);
                ctx.environ
                    .insert(name.to_string(), target.to_string_lossy().to_string());
            }
            return current;
        }

        if !ctx.mode.provides() {
            return current;
        }

        let target = ctx.project_dir.join(&spec.filename);
        let mut logs = Vec::new();
        let mut errors = Vec::new();
        match self.download(spec, &target) {
            Ok(()) => {
                logs.push(format!("Downloaded {} to {}.", spec.url, target.display()));
                let mut run_state = RunState::new();
                run_state.insert("filename".to_string(), json!(spec.filename));
                run_state.insert("downloaded_at".to_string(), json!(Utc::now().to_rfc3339()));
                ctx.local_state.set_service_run_state(name, run_state);
                ctx.environ
                    .insert(name.to_string(), target.to_string_lossy().to_string());
            }
            Err(message) => errors.push(message),
        }

        self.check_status(requirement, &ctx.status_context())
            .with_errors(errors)
            .with_logs(logs)
    }

    fn unprovide(&self, ctx: &mut UnprovideContext<'_>, status: &RequirementStatus) -> Status {
        let requirement = &status.requirement;
        let Some(spec) = Self::spec(requirement) else {
            return Status::success("Nothing to clean up.");
        };
        let path = Self::target_path(spec, &requirement.env_var, ctx.local_state, ctx.project_dir);

        if !path.exists() {
            let message = format!("No need to remove {} which wasn't downloaded.", path.display());
            return Status::success(message.clone()).with_logs(vec![message]);
        }

        let removed = if path.is_dir() {
            fs::remove_dir_all(&path)
        } else {
            fs::remove_file(&path)
        };
        match removed {
            Ok(()) => {
                ctx.local_state.clear_service_run_state(&requirement.env_var);
                let message = format!("Removed downloaded file {}.", path.display());
                Status::success(message.clone()).with_logs(vec![message])
            }
            Err(e) => {
                let message = format!("Failed to remove {}: {}.", path.display(), e);
                Status::failure(message.clone()).with_errors(vec![message])
            }
        }
    }
}
